//! Unique id generation.
//!
//! # Responsibility
//! - Define the id generator contract used by `BaseService::generate_id`.
//! - Provide a Snowflake-layout worker for 64-bit ids.
//!
//! # Invariants
//! - Generated ids are positive and strictly increasing per worker.

use thiserror::Error;

mod snowflake;

pub use snowflake::{IdWorkerConfig, SnowflakeIdWorker, DEFAULT_EPOCH_MS, MAX_NODE_ID};

/// Errors raised while generating ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("worker id {0} exceeds maximum {max}", max = MAX_NODE_ID)]
    InvalidWorkerId(u64),
    #[error("datacenter id {0} exceeds maximum {max}", max = MAX_NODE_ID)]
    InvalidDatacenterId(u64),
    #[error("clock moved backwards: last={last_ms} now={now_ms}")]
    ClockMovedBackwards { last_ms: i64, now_ms: i64 },
    #[error("clock {now_ms} is before id epoch {epoch_ms}")]
    ClockBeforeEpoch { now_ms: i64, epoch_ms: i64 },
    #[error("id epoch {0} is negative")]
    InvalidEpoch(i64),
    #[error("{elapsed_ms}ms since id epoch does not fit the 41-bit timestamp")]
    TimestampOverflow { elapsed_ms: i64 },
    #[error("id worker state lock poisoned")]
    LockPoisoned,
}

/// Produces globally unique 64-bit identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<i64, IdError>;
}
