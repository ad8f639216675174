//! Generic record services over per-entity SQLite mappers.
//! The mapper owns SQL; services own batch and id/time semantics.

pub mod clock;
pub mod config;
pub mod db;
pub mod id;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, CoreConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult, Migration};
pub use id::{IdError, IdGenerator, IdWorkerConfig, SnowflakeIdWorker};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status};
pub use mapper::{
    Criteria, Mapper, MapperError, MapperOptions, MapperResult, SortDirection, SqliteMapper,
};
pub use model::entity::{optional, Entity};
pub use model::page::PageBounds;
pub use service::base_service::{BaseService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
