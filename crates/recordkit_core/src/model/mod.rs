//! Record descriptors shared by mappers and services.
//!
//! # Responsibility
//! - Describe how a caller-defined record maps onto one SQLite table.
//! - Define result windows used by paged queries.
//!
//! # Invariants
//! - A null column value means "not set" for selective operations.

pub mod entity;
pub mod page;
