//! Record use-case services.
//!
//! # Responsibility
//! - Orchestrate mapper calls into uniform record-level APIs.
//! - Keep callers decoupled from SQL and storage details.

pub mod base_service;
