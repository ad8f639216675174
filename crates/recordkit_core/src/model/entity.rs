//! Entity descriptor trait.
//!
//! # Responsibility
//! - Expose table name, ordered columns and primary key of a record type.
//! - Convert records to column values and rows back to records.
//!
//! # Invariants
//! - `values()` returns exactly one value per entry in `COLUMNS`, in order.
//! - `KEY_COLUMN` is one of `COLUMNS`.
//! - `Value::Null` marks a field as unset; selective writes skip it.

use rusqlite::types::Value;
use rusqlite::Row;

/// Table mapping for one record type.
///
/// Implemented by hand for each record; there is no code generation step.
pub trait Entity: Sized {
    /// Primary key type accepted by key-based lookups.
    type Key;

    /// Backing table name.
    const TABLE: &'static str;
    /// Ordered column list used for reads and writes.
    const COLUMNS: &'static [&'static str];
    /// Primary key column.
    const KEY_COLUMN: &'static str;

    /// Column values aligned with `COLUMNS`.
    fn values(&self) -> Vec<Value>;

    /// Converts a key into its SQLite value.
    fn key_value(key: &Self::Key) -> Value;

    /// Builds a record from a row selected with `COLUMNS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Converts an optional field into a column value, `None` becoming `Null`.
pub fn optional<V: Into<Value>>(value: Option<V>) -> Value {
    value.map_or(Value::Null, Into::into)
}

/// Returns the position of `KEY_COLUMN` in `COLUMNS`.
pub(crate) fn key_index<E: Entity>() -> Option<usize> {
    E::COLUMNS.iter().position(|column| *column == E::KEY_COLUMN)
}
