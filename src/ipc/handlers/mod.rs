pub mod core;
pub mod orgs;
pub mod roster;
pub mod rows;
