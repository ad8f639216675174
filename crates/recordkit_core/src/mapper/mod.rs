//! Per-entity persistence primitives.
//!
//! # Responsibility
//! - Define the primitive mapper contract consumed by `BaseService`.
//! - Provide the `Criteria` example object and a SQLite implementation.
//!
//! # Invariants
//! - Mapper calls are individually atomic; no cross-call transaction is opened.
//! - Mappers report semantic errors (`TooManyResults`, `MissingKey`) in
//!   addition to SQLite transport errors.

use crate::db::DbError;
use crate::model::page::PageBounds;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod criteria;
pub mod sqlite;

pub use criteria::{Criteria, SortDirection};
pub use sqlite::SqliteMapper;

pub type MapperResult<T> = Result<T, MapperError>;

/// Errors raised by mapper primitives.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Db(#[from] DbError),
    /// Table or column name is not a plain SQL identifier.
    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),
    /// Entity descriptor is inconsistent with itself.
    #[error("invalid entity `{table}`: {message}")]
    InvalidEntity { table: &'static str, message: String },
    #[error("mapper requires table `{0}`")]
    MissingRequiredTable(&'static str),
    #[error("mapper requires column `{column}` in table `{table}`")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Criteria references a column the entity does not map.
    #[error("unknown column `{column}` for table `{table}`")]
    UnknownColumn { table: &'static str, column: String },
    #[error("record for table `{0}` has no primary key value")]
    MissingKey(&'static str),
    #[error("update on table `{0}` has no column to set")]
    EmptyUpdate(&'static str),
    /// Guarded statement would affect the whole table.
    #[error("refusing unconditioned {statement} on table `{table}`")]
    UnsafeStatement {
        statement: &'static str,
        table: &'static str,
    },
    #[error("expected at most one `{0}` row, found several")]
    TooManyResults(&'static str),
}

impl From<rusqlite::Error> for MapperError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Guards applied to whole-table statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Reject `DELETE` without a `WHERE` clause.
    pub safe_delete: bool,
    /// Reject `UPDATE` without a `WHERE` clause.
    pub safe_update: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            safe_delete: true,
            safe_update: true,
        }
    }
}

/// Primitive data access contract for one record type.
///
/// `Record` is used both as a full entity and as a partial filter where
/// unset fields are ignored. `Example` is interpreted only by the mapper.
pub trait Mapper {
    type Record;
    type Key;
    type Example;

    /// Rows whose columns equal every set field of `record`.
    fn select(&self, record: &Self::Record) -> MapperResult<Vec<Self::Record>>;
    fn select_by_primary_key(&self, key: &Self::Key) -> MapperResult<Option<Self::Record>>;
    fn select_all(&self) -> MapperResult<Vec<Self::Record>>;
    /// Single match for `record`; fails with `TooManyResults` on several matches.
    fn select_one(&self, record: &Self::Record) -> MapperResult<Option<Self::Record>>;
    fn select_count(&self, record: &Self::Record) -> MapperResult<u64>;
    fn select_by_example(&self, example: &Self::Example) -> MapperResult<Vec<Self::Record>>;
    /// Inserts only the set fields of `record`.
    fn insert_selective(&self, record: &Self::Record) -> MapperResult<usize>;
    /// Updates the set non-key fields of the row matching `record`'s key.
    fn update_by_primary_key_selective(&self, record: &Self::Record) -> MapperResult<usize>;
    fn delete(&self, record: &Self::Record) -> MapperResult<usize>;
    fn delete_by_primary_key(&self, key: &Self::Key) -> MapperResult<usize>;
    fn select_count_by_example(&self, example: &Self::Example) -> MapperResult<u64>;
    fn update_by_example_selective(
        &self,
        record: &Self::Record,
        example: &Self::Example,
    ) -> MapperResult<usize>;
    fn delete_by_example(&self, example: &Self::Example) -> MapperResult<usize>;
    fn select_by_row_bounds(
        &self,
        record: &Self::Record,
        bounds: PageBounds,
    ) -> MapperResult<Vec<Self::Record>>;
    fn select_by_example_and_row_bounds(
        &self,
        example: &Self::Example,
        bounds: PageBounds,
    ) -> MapperResult<Vec<Self::Record>>;
}
