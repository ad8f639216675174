//! Generic SQLite mapper for any `Entity`.
//!
//! # Responsibility
//! - Implement every `Mapper` primitive over one borrowed connection.
//! - Keep SQL text construction inside the mapper boundary.
//!
//! # Invariants
//! - Table/column names are validated identifiers before reaching SQL text.
//! - Selective writes skip `Null` values; filters skip them too.
//! - Reads default to primary key order so pages are stable.
//! - Whole-table `DELETE`/`UPDATE` is rejected unless options allow it.

use super::criteria::Criteria;
use super::{Mapper, MapperError, MapperOptions, MapperResult};
use crate::model::entity::{key_index, Entity};
use crate::model::page::PageBounds;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashSet;
use std::marker::PhantomData;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// SQLite-backed mapper for entity `E`.
pub struct SqliteMapper<'conn, E: Entity> {
    conn: &'conn Connection,
    options: MapperOptions,
    key_index: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> SqliteMapper<'conn, E> {
    /// Creates a mapper after validating the entity descriptor and the schema.
    pub fn try_new(conn: &'conn Connection) -> MapperResult<Self> {
        let key_index = validate_entity::<E>()?;
        ensure_table_ready::<E>(conn)?;
        debug!(
            "event=mapper_init module=mapper status=ok table={} columns={}",
            E::TABLE,
            E::COLUMNS.len()
        );
        Ok(Self {
            conn,
            options: MapperOptions::default(),
            key_index,
            _entity: PhantomData,
        })
    }

    pub fn with_options(mut self, options: MapperOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> MapperOptions {
        self.options
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    fn column_values(&self, record: &E) -> MapperResult<Vec<Value>> {
        let values = record.values();
        if values.len() != E::COLUMNS.len() {
            return Err(MapperError::InvalidEntity {
                table: E::TABLE,
                message: format!(
                    "expected {} column values, got {}",
                    E::COLUMNS.len(),
                    values.len()
                ),
            });
        }
        Ok(values)
    }

    /// Equality predicate over the set fields of `record`.
    fn record_filter(&self, record: &E) -> MapperResult<(String, Vec<Value>)> {
        let mut terms = Vec::new();
        let mut binds = Vec::new();
        for (column, value) in E::COLUMNS.iter().zip(self.column_values(record)?) {
            if value == Value::Null {
                continue;
            }
            terms.push(format!("{column} = ?"));
            binds.push(value);
        }
        Ok((terms.join(" AND "), binds))
    }

    fn select_where(
        &self,
        where_sql: &str,
        mut binds: Vec<Value>,
        order_sql: &str,
        distinct: bool,
        bounds: PageBounds,
    ) -> MapperResult<Vec<E>> {
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if distinct { "DISTINCT " } else { "" },
            E::COLUMNS.join(", "),
            E::TABLE
        );
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        if order_sql.is_empty() {
            sql.push_str(&format!(" ORDER BY {} ASC", E::KEY_COLUMN));
        } else {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_sql);
        }
        bounds.push_sql(&mut sql, &mut binds);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(E::from_row(row)?);
        }
        Ok(records)
    }

    fn count_where(&self, where_sql: &str, binds: Vec<Value>) -> MapperResult<u64> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", E::TABLE);
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn delete_where(&self, where_sql: &str, binds: Vec<Value>) -> MapperResult<usize> {
        let mut sql = format!("DELETE FROM {}", E::TABLE);
        if where_sql.is_empty() {
            if self.options.safe_delete {
                return Err(MapperError::UnsafeStatement {
                    statement: "DELETE",
                    table: E::TABLE,
                });
            }
        } else {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }

    fn update_where(
        &self,
        assignments: Vec<(&'static str, Value)>,
        where_sql: &str,
        where_binds: Vec<Value>,
    ) -> MapperResult<usize> {
        if assignments.is_empty() {
            return Err(MapperError::EmptyUpdate(E::TABLE));
        }
        if where_sql.is_empty() && self.options.safe_update {
            return Err(MapperError::UnsafeStatement {
                statement: "UPDATE",
                table: E::TABLE,
            });
        }

        let set_sql = assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {set_sql}", E::TABLE);
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }

        let binds = assignments
            .into_iter()
            .map(|(_, value)| value)
            .chain(where_binds);
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }
}

impl<E: Entity> Mapper for SqliteMapper<'_, E> {
    type Record = E;
    type Key = E::Key;
    type Example = Criteria;

    fn select(&self, record: &E) -> MapperResult<Vec<E>> {
        self.select_by_row_bounds(record, PageBounds::unbounded())
    }

    fn select_by_primary_key(&self, key: &E::Key) -> MapperResult<Option<E>> {
        let where_sql = format!("{} = ?", E::KEY_COLUMN);
        let mut records = self.select_where(
            &where_sql,
            vec![E::key_value(key)],
            "",
            false,
            PageBounds::new(0, 1),
        )?;
        Ok(records.pop())
    }

    fn select_all(&self) -> MapperResult<Vec<E>> {
        self.select_where("", Vec::new(), "", false, PageBounds::unbounded())
    }

    fn select_one(&self, record: &E) -> MapperResult<Option<E>> {
        let (where_sql, binds) = self.record_filter(record)?;
        let mut records = self.select_where(&where_sql, binds, "", false, PageBounds::new(0, 2))?;
        if records.len() > 1 {
            return Err(MapperError::TooManyResults(E::TABLE));
        }
        Ok(records.pop())
    }

    fn select_count(&self, record: &E) -> MapperResult<u64> {
        let (where_sql, binds) = self.record_filter(record)?;
        self.count_where(&where_sql, binds)
    }

    fn select_by_example(&self, example: &Criteria) -> MapperResult<Vec<E>> {
        self.select_by_example_and_row_bounds(example, PageBounds::unbounded())
    }

    fn insert_selective(&self, record: &E) -> MapperResult<usize> {
        let mut columns = Vec::new();
        let mut binds = Vec::new();
        for (column, value) in E::COLUMNS.iter().zip(self.column_values(record)?) {
            if value == Value::Null {
                continue;
            }
            columns.push(*column);
            binds.push(value);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", E::TABLE)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                E::TABLE,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }

    fn update_by_primary_key_selective(&self, record: &E) -> MapperResult<usize> {
        let values = self.column_values(record)?;
        let key = values[self.key_index].clone();
        if key == Value::Null {
            return Err(MapperError::MissingKey(E::TABLE));
        }

        let assignments = E::COLUMNS
            .iter()
            .copied()
            .zip(values)
            .enumerate()
            .filter(|(index, (_, value))| *index != self.key_index && *value != Value::Null)
            .map(|(_, assignment)| assignment)
            .collect();
        let where_sql = format!("{} = ?", E::KEY_COLUMN);
        self.update_where(assignments, &where_sql, vec![key])
    }

    fn delete(&self, record: &E) -> MapperResult<usize> {
        let (where_sql, binds) = self.record_filter(record)?;
        self.delete_where(&where_sql, binds)
    }

    fn delete_by_primary_key(&self, key: &E::Key) -> MapperResult<usize> {
        let where_sql = format!("{} = ?", E::KEY_COLUMN);
        self.delete_where(&where_sql, vec![E::key_value(key)])
    }

    fn select_count_by_example(&self, example: &Criteria) -> MapperResult<u64> {
        let rendered = example.render(E::TABLE, E::COLUMNS)?;
        self.count_where(&rendered.where_sql, rendered.binds)
    }

    /// Sets every non-null field of `record`, the key column included, on all
    /// rows matching `example`.
    fn update_by_example_selective(&self, record: &E, example: &Criteria) -> MapperResult<usize> {
        let assignments = E::COLUMNS
            .iter()
            .copied()
            .zip(self.column_values(record)?)
            .filter(|(_, value)| *value != Value::Null)
            .collect();
        let rendered = example.render(E::TABLE, E::COLUMNS)?;
        self.update_where(assignments, &rendered.where_sql, rendered.binds)
    }

    fn delete_by_example(&self, example: &Criteria) -> MapperResult<usize> {
        let rendered = example.render(E::TABLE, E::COLUMNS)?;
        self.delete_where(&rendered.where_sql, rendered.binds)
    }

    fn select_by_row_bounds(&self, record: &E, bounds: PageBounds) -> MapperResult<Vec<E>> {
        let (where_sql, binds) = self.record_filter(record)?;
        self.select_where(&where_sql, binds, "", false, bounds)
    }

    fn select_by_example_and_row_bounds(
        &self,
        example: &Criteria,
        bounds: PageBounds,
    ) -> MapperResult<Vec<E>> {
        let rendered = example.render(E::TABLE, E::COLUMNS)?;
        self.select_where(
            &rendered.where_sql,
            rendered.binds,
            &rendered.order_sql,
            rendered.distinct,
            bounds,
        )
    }
}

fn ensure_identifier(value: &str) -> MapperResult<()> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(MapperError::InvalidIdentifier(value.to_string()))
    }
}

/// Checks the descriptor and returns the key column index.
fn validate_entity<E: Entity>() -> MapperResult<usize> {
    ensure_identifier(E::TABLE)?;
    if E::COLUMNS.is_empty() {
        return Err(MapperError::InvalidEntity {
            table: E::TABLE,
            message: "no columns mapped".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for column in E::COLUMNS {
        ensure_identifier(column)?;
        if !seen.insert(*column) {
            return Err(MapperError::InvalidEntity {
                table: E::TABLE,
                message: format!("column `{column}` mapped twice"),
            });
        }
    }

    key_index::<E>().ok_or_else(|| MapperError::InvalidEntity {
        table: E::TABLE,
        message: format!("key column `{}` is not mapped", E::KEY_COLUMN),
    })
}

fn ensure_table_ready<E: Entity>(conn: &Connection) -> MapperResult<()> {
    if !table_exists(conn, E::TABLE)? {
        return Err(MapperError::MissingRequiredTable(E::TABLE));
    }

    let present = table_columns(conn, E::TABLE)?;
    for &column in E::COLUMNS {
        if !present.contains(column) {
            return Err(MapperError::MissingRequiredColumn {
                table: E::TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> MapperResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> MapperResult<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = HashSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>(1)?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::{ensure_identifier, validate_entity};
    use crate::mapper::MapperError;
    use crate::model::entity::Entity;
    use rusqlite::types::Value;
    use rusqlite::Row;

    struct Unkeyed;

    impl Entity for Unkeyed {
        type Key = i64;
        const TABLE: &'static str = "unkeyed";
        const COLUMNS: &'static [&'static str] = &["name"];
        const KEY_COLUMN: &'static str = "id";

        fn values(&self) -> Vec<Value> {
            vec![Value::Null]
        }

        fn key_value(key: &i64) -> Value {
            Value::Integer(*key)
        }

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self)
        }
    }

    struct Duplicated;

    impl Entity for Duplicated {
        type Key = i64;
        const TABLE: &'static str = "duplicated";
        const COLUMNS: &'static [&'static str] = &["id", "name", "name"];
        const KEY_COLUMN: &'static str = "id";

        fn values(&self) -> Vec<Value> {
            vec![Value::Null; 3]
        }

        fn key_value(key: &i64) -> Value {
            Value::Integer(*key)
        }

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn identifiers_reject_sql_fragments() {
        assert!(ensure_identifier("contacts").is_ok());
        assert!(ensure_identifier("_col_2").is_ok());
        assert!(matches!(
            ensure_identifier("name; DROP TABLE x"),
            Err(MapperError::InvalidIdentifier(_))
        ));
        assert!(ensure_identifier("2col").is_err());
        assert!(ensure_identifier("").is_err());
    }

    #[test]
    fn key_column_must_be_mapped() {
        let err = validate_entity::<Unkeyed>().unwrap_err();
        assert!(matches!(err, MapperError::InvalidEntity { table: "unkeyed", .. }));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = validate_entity::<Duplicated>().unwrap_err();
        assert!(
            matches!(err, MapperError::InvalidEntity { message, .. } if message.contains("twice"))
        );
    }
}
