#![allow(dead_code)]

use recordkit_core::{open_db_in_memory, optional, Entity, Migration};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE contacts (
            id INTEGER PRIMARY KEY,
            name TEXT,
            email TEXT,
            age INTEGER
        );",
    ),
    Migration::new(2, "CREATE INDEX idx_contacts_name ON contacts(name);"),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl Entity for Contact {
    type Key = i64;

    const TABLE: &'static str = "contacts";
    const COLUMNS: &'static [&'static str] = &["id", "name", "email", "age"];
    const KEY_COLUMN: &'static str = "id";

    fn values(&self) -> Vec<Value> {
        vec![
            optional(self.id),
            optional(self.name.clone()),
            optional(self.email.clone()),
            optional(self.age),
        ]
    }

    fn key_value(key: &i64) -> Value {
        Value::Integer(*key)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            age: row.get("age")?,
        })
    }
}

pub fn contact(id: i64, name: &str, age: i64) -> Contact {
    Contact {
        id: Some(id),
        name: Some(name.to_string()),
        email: Some(format!("{name}@example.com")),
        age: Some(age),
    }
}

pub fn by_id(id: i64) -> Contact {
    Contact {
        id: Some(id),
        ..Contact::default()
    }
}

pub fn by_name(name: &str) -> Contact {
    Contact {
        name: Some(name.to_string()),
        ..Contact::default()
    }
}

pub fn migrated_conn() -> Connection {
    open_db_in_memory(MIGRATIONS).unwrap()
}

pub fn ids(contacts: &[Contact]) -> Vec<i64> {
    contacts.iter().filter_map(|item| item.id).collect()
}
