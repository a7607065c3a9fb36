use serde::Serialize;
use std::collections::BTreeMap;

use crate::identity::{Person, Role};

pub const NO_TEACHER: &str = "No teacher assigned";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub class_name: String,
    pub teacher_name: String,
    pub students: Vec<Person>,
    pub all_members: Vec<Person>,
}

impl ClassGroup {
    fn new(class_name: &str) -> Self {
        ClassGroup {
            class_name: class_name.to_string(),
            teacher_name: NO_TEACHER.to_string(),
            students: Vec::new(),
            all_members: Vec::new(),
        }
    }
}

/// Groups people by class membership. Three passes so the result is
/// independent of record order: teacher and student records for the same
/// class may arrive either way round within one fetch.
pub fn group(people: &[Person]) -> BTreeMap<String, ClassGroup> {
    let mut groups: BTreeMap<String, ClassGroup> = BTreeMap::new();

    // Pass 1: class discovery. A class exists the moment anyone names it,
    // even before any members are attributed.
    for person in people {
        for class in &person.class_memberships {
            let key = class.trim();
            if key.is_empty() {
                continue;
            }
            groups
                .entry(key.to_string())
                .or_insert_with(|| ClassGroup::new(key));
        }
    }

    // Pass 2: teacher attribution. Overwrite on repeat: a later teacher
    // record is a correction, and a class has at most one teacher here.
    for person in people {
        if person.role != Role::Teacher {
            continue;
        }
        for class in &person.class_memberships {
            if let Some(g) = groups.get_mut(class.trim()) {
                g.teacher_name = person.name.clone();
            }
        }
    }

    // Pass 3: membership population.
    for person in people {
        for class in &person.class_memberships {
            if let Some(g) = groups.get_mut(class.trim()) {
                g.all_members.push(person.clone());
                if !person.role.is_staff() {
                    g.students.push(person.clone());
                }
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{normalize, Person};
    use serde_json::json;

    fn person(raw: serde_json::Value) -> Person {
        normalize(&raw).expect("person")
    }

    #[test]
    fn trimmed_class_names_land_in_one_group() {
        let people = vec![
            person(json!({ "id": 1, "first_name": "Amy", "role": "teacher", "class": "9-A " })),
            person(json!({ "id": 2, "first_name": "Bo", "role": "student", "class": "9-A" })),
        ];
        let groups = group(&people);
        assert_eq!(groups.len(), 1);
        let g = &groups["9-A"];
        assert_eq!(g.teacher_name, "Amy");
        assert_eq!(g.students.len(), 1);
        assert_eq!(g.all_members.len(), 2);
    }

    #[test]
    fn order_independence_teacher_after_students() {
        let teacher = person(json!({ "id": 1, "name": "Amy", "role": "teacher", "class": "9-A" }));
        let student = person(json!({ "id": 2, "name": "Bo", "class": "9-A" }));

        let forward = group(&[teacher.clone(), student.clone()]);
        let reverse = group(&[student, teacher]);
        assert_eq!(forward["9-A"].teacher_name, reverse["9-A"].teacher_name);
        assert_eq!(forward["9-A"].students.len(), reverse["9-A"].students.len());
    }

    #[test]
    fn last_teacher_wins() {
        let people = vec![
            person(json!({ "id": 1, "name": "Old Teacher", "role": "teacher", "class": "9-A" })),
            person(json!({ "id": 2, "name": "New Teacher", "role": "teacher", "class": "9-A" })),
        ];
        assert_eq!(group(&people)["9-A"].teacher_name, "New Teacher");
    }

    #[test]
    fn staff_are_members_but_not_students() {
        let people = vec![
            person(json!({ "id": 1, "name": "Pat", "role": "principal", "class": "9-A" })),
            person(json!({ "id": 2, "name": "Ada", "role": "admin", "class": "9-A" })),
            person(json!({ "id": 3, "name": "Bo", "class": "9-A" })),
        ];
        let g = &group(&people)["9-A"];
        assert_eq!(g.all_members.len(), 3);
        assert_eq!(g.students.len(), 1);
        // Principal and admin never claim the teacher slot.
        assert_eq!(g.teacher_name, NO_TEACHER);
    }

    #[test]
    fn teacher_only_class_still_surfaces() {
        let people = vec![person(
            json!({ "id": 1, "name": "Amy", "role": "teacher", "class": "10-B" }),
        )];
        let g = &group(&people)["10-B"];
        assert_eq!(g.teacher_name, "Amy");
        assert!(g.students.is_empty());
    }

    #[test]
    fn zero_membership_person_is_in_no_group() {
        let people = vec![
            person(json!({ "id": 1, "name": "Solo" })),
            person(json!({ "id": 2, "name": "Bo", "class": "9-A" })),
        ];
        let groups = group(&people);
        assert_eq!(groups.len(), 1);
        assert!(groups["9-A"].all_members.iter().all(|p| p.id != "1"));
    }

    #[test]
    fn multi_class_person_appears_in_each() {
        let people = vec![person(
            json!({ "id": 1, "name": "Bo", "class": ["9-A", "10-B"] }),
        )];
        let groups = group(&people);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["9-A"].students.len(), 1);
        assert_eq!(groups["10-B"].students.len(), 1);
    }
}
