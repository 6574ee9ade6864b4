//! Shared fixtures: a `humans` master table with `students` and `instructors`
//! role tables and a `study_groups` table hanging off `students`, seeded with
//! two students, one instructor and two study groups.
#![allow(dead_code)]

use cobalto_role::settings::Settings;
use cobalto_role::{Attributes, Db, Error, InheritRole, Model, Record, Relation, Result, Value};

pub struct Human;

impl Model for Human {
    fn table_name(&self) -> &'static str {
        "humans"
    }

    fn fillable(&self) -> &'static [&'static str] {
        &["role", "name", "address"]
    }

    fn guarded(&self) -> &'static [&'static str] {
        &["id"]
    }

    fn has_get_mutator(&self, attribute: &str) -> bool {
        attribute == "display_name"
    }

    fn get_mutator(&self, record: &Record, attribute: &str) -> Option<Value> {
        match attribute {
            "display_name" => {
                let name = record.attribute("name")?;
                let role = record.attribute("role").cloned().unwrap_or_default();
                Some(format!("{} ({})", name, role).into())
            }
            _ => None,
        }
    }

    fn has_method(&self, method: &str) -> bool {
        method == "say_hello"
    }

    fn call(&self, _record: &mut Record, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "say_hello" => {
                let name = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(format!("Hello, {}", name).into())
            }
            _ => Err(Error::UnknownMethod {
                table: self.table_name(),
                method: method.to_string(),
            }),
        }
    }
}

pub struct StudentRole;

impl Model for StudentRole {
    fn table_name(&self) -> &'static str {
        "students"
    }

    fn primary_key(&self) -> &'static str {
        "human_id"
    }

    fn incrementing(&self) -> bool {
        false
    }

    fn fillable(&self) -> &'static [&'static str] {
        &["study_group_id", "has_scholarship"]
    }

    fn guarded(&self) -> &'static [&'static str] {
        &["human_id"]
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "group" => Some(Relation::belongs_to(&StudyGroup, "study_group_id", "id")),
            _ => None,
        }
    }
}

pub struct StudyGroup;

impl Model for StudyGroup {
    fn table_name(&self) -> &'static str {
        "study_groups"
    }

    fn fillable(&self) -> &'static [&'static str] {
        &["title"]
    }
}

/// Master side: a human row owning a `students` row.
pub struct Student;

impl Model for Student {
    fn table_name(&self) -> &'static str {
        "humans"
    }

    fn fillable(&self) -> &'static [&'static str] {
        &["role", "name", "address"]
    }

    fn guarded(&self) -> &'static [&'static str] {
        &["id"]
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "student_role" => Some(Relation::has_one(&StudentRole, "human_id", "id")),
            _ => None,
        }
    }

    fn inherit_role(&self) -> Option<&dyn InheritRole> {
        Some(self)
    }
}

impl InheritRole for Student {
    fn role_relation_name(&self) -> &str {
        "student_role"
    }

    fn role_marking_attributes(&self) -> Attributes {
        Attributes::from([("role".to_string(), Value::from("student"))])
    }
}

/// Slave side: an `instructors` row pointing at a human row.
pub struct Instructor;

impl Model for Instructor {
    fn table_name(&self) -> &'static str {
        "instructors"
    }

    fn primary_key(&self) -> &'static str {
        "human_id"
    }

    fn incrementing(&self) -> bool {
        false
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "human" => Some(Relation::belongs_to(&Human, "human_id", "id")),
            _ => None,
        }
    }

    // computed on the human row
    fn has_get_mutator(&self, attribute: &str) -> bool {
        attribute == "display_name"
    }

    fn inherit_role(&self) -> Option<&dyn InheritRole> {
        Some(self)
    }
}

impl InheritRole for Instructor {
    fn role_relation_name(&self) -> &str {
        "human"
    }

    fn role_marking_attributes(&self) -> Attributes {
        Attributes::from([("role".to_string(), Value::from("instructor"))])
    }
}

/// Role model without a role relation name.
pub struct Unnamed;

impl Model for Unnamed {
    fn table_name(&self) -> &'static str {
        "humans"
    }

    fn inherit_role(&self) -> Option<&dyn InheritRole> {
        Some(self)
    }
}

impl InheritRole for Unnamed {
    fn role_relation_name(&self) -> &str {
        ""
    }
}

/// Role model naming a relation it never declares.
pub struct Undeclared;

impl Model for Undeclared {
    fn table_name(&self) -> &'static str {
        "humans"
    }

    fn inherit_role(&self) -> Option<&dyn InheritRole> {
        Some(self)
    }
}

impl InheritRole for Undeclared {
    fn role_relation_name(&self) -> &str {
        "missing"
    }
}

pub async fn setup() -> Db {
    let db = Db::from_settings(&Settings::default()).await.unwrap();

    db.execute(
        "CREATE TABLE humans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT,
            address TEXT,
            nickname TEXT
        )",
    )
    .await
    .unwrap();
    db.execute(
        "CREATE TABLE students (
            human_id INTEGER NOT NULL PRIMARY KEY,
            study_group_id INTEGER,
            has_scholarship BOOLEAN
        )",
    )
    .await
    .unwrap();
    db.execute(
        "CREATE TABLE study_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL
        )",
    )
    .await
    .unwrap();
    db.execute(
        "CREATE TABLE instructors (
            human_id INTEGER NOT NULL PRIMARY KEY,
            rank_id INTEGER,
            salary REAL
        )",
    )
    .await
    .unwrap();

    db.execute(
        "INSERT INTO humans (name, address, role) VALUES
            ('Mark', 'Wall Street', 'student'),
            ('Michael', '1st Avenue', 'student'),
            ('John', '2st Avenue', 'instructor')",
    )
    .await
    .unwrap();
    db.execute("INSERT INTO study_groups (title) VALUES ('g1'), ('g2')")
        .await
        .unwrap();

    db
}
