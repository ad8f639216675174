//! Generic record service over an injected mapper.
//!
//! # Responsibility
//! - Expose one entity-agnostic CRUD/paging/criteria contract.
//! - Delegate every primitive to the mapper, adding id/time helpers and
//!   batch loops.
//!
//! # Invariants
//! - The service holds no mutable state; all state lives behind the mapper.
//! - Batches run sequentially in caller order without a transaction.
//! - `batch_delete` stops at the first record that deletes no row.
//! - `generate_id` never surfaces generator failures to the caller.

use crate::clock::{Clock, SystemClock};
use crate::id::{IdGenerator, SnowflakeIdWorker};
use crate::mapper::{Mapper, MapperError};
use crate::model::page::PageBounds;
use log::{debug, error};
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from record service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Mapper failure, passed through unchanged.
    #[error(transparent)]
    Mapper(#[from] MapperError),
    /// A batch delete hit a record that deleted nothing.
    ///
    /// `index` is the failing record's position; `deleted` counts rows
    /// already removed by earlier records, which stay removed.
    #[error("batch delete failed at record {index}: record not found or not deleted ({deleted} rows deleted before abort)")]
    BatchDeleteFailed { index: usize, deleted: usize },
}

/// Record service wrapping mapper `M`.
pub struct BaseService<M, G = SnowflakeIdWorker, C = SystemClock> {
    mapper: M,
    id_generator: G,
    clock: C,
}

impl<M: Mapper> BaseService<M> {
    /// Creates a service with the default id worker and system clock.
    pub fn new(mapper: M) -> Self {
        Self::with_components(mapper, SnowflakeIdWorker::default(), SystemClock)
    }
}

impl<M, G, C> BaseService<M, G, C>
where
    M: Mapper,
    G: IdGenerator,
    C: Clock,
{
    pub fn with_components(mapper: M, id_generator: G, clock: C) -> Self {
        Self {
            mapper,
            id_generator,
            clock,
        }
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Returns a fresh id, or `None` when the generator fails.
    ///
    /// Failures are logged at error level and never propagated.
    pub fn generate_id(&self) -> Option<i64> {
        match self.id_generator.next_id() {
            Ok(id) => Some(id),
            Err(err) => {
                error!(
                    "event=id_generate module=service status=error error_code=id_generation_failed error={}",
                    err
                );
                None
            }
        }
    }

    /// Current time in epoch milliseconds.
    pub fn current_time(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn select(&self, record: &M::Record) -> ServiceResult<Vec<M::Record>> {
        Ok(self.mapper.select(record)?)
    }

    pub fn select_by_key(&self, key: &M::Key) -> ServiceResult<Option<M::Record>> {
        Ok(self.mapper.select_by_primary_key(key)?)
    }

    /// Returns every row. No bound is applied.
    pub fn select_all(&self) -> ServiceResult<Vec<M::Record>> {
        Ok(self.mapper.select_all()?)
    }

    /// Returns the single match, `None` on zero matches, and
    /// `MapperError::TooManyResults` on several.
    pub fn select_one(&self, record: &M::Record) -> ServiceResult<Option<M::Record>> {
        Ok(self.mapper.select_one(record)?)
    }

    pub fn select_count(&self, record: &M::Record) -> ServiceResult<u64> {
        Ok(self.mapper.select_count(record)?)
    }

    pub fn select_by_example(&self, example: &M::Example) -> ServiceResult<Vec<M::Record>> {
        Ok(self.mapper.select_by_example(example)?)
    }

    /// Inserts the set fields of `record`.
    pub fn insert(&self, record: &M::Record) -> ServiceResult<usize> {
        Ok(self.mapper.insert_selective(record)?)
    }

    /// Inserts each record in order and sums affected rows.
    ///
    /// There is no transaction: a failing insert aborts the loop and
    /// propagates, while earlier inserts remain persisted.
    pub fn batch_insert(&self, records: &[M::Record]) -> ServiceResult<usize> {
        let mut inserted = 0;
        for (index, record) in records.iter().enumerate() {
            match self.mapper.insert_selective(record) {
                Ok(count) => inserted += count,
                Err(err) => {
                    error!(
                        "event=batch_insert module=service status=error index={} inserted={} error={}",
                        index, inserted, err
                    );
                    return Err(err.into());
                }
            }
        }
        debug!(
            "event=batch_insert module=service status=ok records={} inserted={}",
            records.len(),
            inserted
        );
        Ok(inserted)
    }

    /// Updates the set non-key fields of the row matching `entity`'s key.
    pub fn update(&self, entity: &M::Record) -> ServiceResult<usize> {
        Ok(self.mapper.update_by_primary_key_selective(entity)?)
    }

    pub fn delete(&self, record: &M::Record) -> ServiceResult<usize> {
        Ok(self.mapper.delete(record)?)
    }

    pub fn delete_by_key(&self, key: &M::Key) -> ServiceResult<usize> {
        Ok(self.mapper.delete_by_primary_key(key)?)
    }

    /// Deletes each record in order and sums affected rows.
    ///
    /// Fails fast with `ServiceError::BatchDeleteFailed` on the first record
    /// deleting no row. A record with no set fields fails with the mapper's
    /// `UnsafeStatement` while `safe_delete` is on. Later records are not attempted and earlier deletes
    /// are not rolled back.
    pub fn batch_delete(&self, records: &[M::Record]) -> ServiceResult<usize> {
        let mut deleted = 0;
        for (index, record) in records.iter().enumerate() {
            let count = self.mapper.delete(record)?;
            if count < 1 {
                error!(
                    "event=batch_delete module=service status=error error_code=record_not_deleted index={} deleted={} remaining={}",
                    index,
                    deleted,
                    records.len() - index - 1
                );
                return Err(ServiceError::BatchDeleteFailed { index, deleted });
            }
            deleted += count;
        }
        debug!(
            "event=batch_delete module=service status=ok records={} deleted={}",
            records.len(),
            deleted
        );
        Ok(deleted)
    }

    pub fn select_count_by_example(&self, example: &M::Example) -> ServiceResult<u64> {
        Ok(self.mapper.select_count_by_example(example)?)
    }

    /// Sets the non-null fields of `record` on every row matching `example`.
    pub fn update_by_example(
        &self,
        record: &M::Record,
        example: &M::Example,
    ) -> ServiceResult<usize> {
        Ok(self.mapper.update_by_example_selective(record, example)?)
    }

    /// Deletes every row matching `example`.
    ///
    /// Filters by criteria; does not fall back to key lookup.
    pub fn delete_by_example(&self, example: &M::Example) -> ServiceResult<usize> {
        Ok(self.mapper.delete_by_example(example)?)
    }

    pub fn select_by_page(
        &self,
        record: &M::Record,
        bounds: PageBounds,
    ) -> ServiceResult<Vec<M::Record>> {
        Ok(self.mapper.select_by_row_bounds(record, bounds)?)
    }

    pub fn select_by_example_and_page(
        &self,
        example: &M::Example,
        bounds: PageBounds,
    ) -> ServiceResult<Vec<M::Record>> {
        Ok(self.mapper.select_by_example_and_row_bounds(example, bounds)?)
    }
}
