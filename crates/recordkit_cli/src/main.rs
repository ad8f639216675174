//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `recordkit_core` linkage end to end against an in-memory database.
//! - Keep output deterministic apart from generated ids.
//!
//! Usage: `recordkit_cli [absolute_log_dir]`

use log::info;
use recordkit_core::{
    default_log_level, init_logging, open_db_in_memory, optional, BaseService, Criteria, Entity,
    Migration, PageBounds, ServiceError, SqliteMapper,
};
use rusqlite::types::Value;
use rusqlite::Row;
use std::error::Error;

const MIGRATIONS: &[Migration] = &[Migration::new(
    1,
    "CREATE TABLE tasks (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        done INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER
    );",
)];

#[derive(Debug, Clone, Default)]
struct Task {
    id: Option<i64>,
    title: Option<String>,
    done: Option<bool>,
    created_at: Option<i64>,
}

impl Entity for Task {
    type Key = i64;

    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &["id", "title", "done", "created_at"];
    const KEY_COLUMN: &'static str = "id";

    fn values(&self) -> Vec<Value> {
        vec![
            optional(self.id),
            optional(self.title.clone()),
            optional(self.done),
            optional(self.created_at),
        ]
    }

    fn key_value(key: &i64) -> Value {
        Value::Integer(*key)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            done: row.get("done")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = std::env::args().nth(1) {
        init_logging(default_log_level(), &log_dir)?;
    }
    println!("recordkit_core version={}", recordkit_core::core_version());

    let conn = open_db_in_memory(MIGRATIONS)?;
    let service = BaseService::new(SqliteMapper::<Task>::try_new(&conn)?);

    let mut tasks = Vec::new();
    for (title, done) in [("write", false), ("review", true), ("ship", false)] {
        tasks.push(Task {
            id: service.generate_id(),
            title: Some(title.to_string()),
            done: Some(done),
            created_at: Some(service.current_time()),
        });
    }
    println!("inserted={}", service.batch_insert(&tasks)?);

    let open = Criteria::new().eq("done", false).order_by_asc("title");
    let open_tasks = service.select_by_example_and_page(&open, PageBounds::page(1, 10))?;
    let titles: Vec<&str> = open_tasks
        .iter()
        .filter_map(|task| task.title.as_deref())
        .collect();
    println!("open={}", titles.join(","));

    let finished = Task {
        done: Some(true),
        ..Task::default()
    };
    println!("deleted={}", service.batch_delete(&[finished.clone()])?);

    match service.batch_delete(&[finished]) {
        Err(ServiceError::BatchDeleteFailed { index, deleted }) => {
            println!("second_delete=rejected index={index} deleted={deleted}");
        }
        other => println!("second_delete=unexpected {other:?}"),
    }

    info!("event=cli_smoke module=cli status=ok");
    Ok(())
}
