#![forbid(unsafe_code)]

//! Core domain model and business logic for the health journal.
//!
//! This crate provides:
//! - Domain types (time slots, slot entries, daily records, health log)
//! - Medication catalog and standard pattern
//! - Consistency engine for medication rename/delete
//! - Import/export codec (JSON bundle, base64 token)
//! - Persistence (store trait, memory and file backends, audit log, CSV report)
//! - Users, sessions and configuration

pub mod types;
pub mod error;
pub mod catalog;
pub mod pattern;
pub mod engine;
pub mod codec;
pub mod store;
pub mod users;
pub mod file_io;
pub mod file_store;
pub mod audit;
pub mod report;
pub mod session;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::MedicationCatalog;
pub use pattern::StandardPattern;
pub use engine::{CatalogPolicy, Journal, Propagation};
pub use codec::Bundle;
pub use store::{JournalStore, MemoryStore, UserId};
pub use file_store::FileStore;
pub use audit::{AuditEvent, AuditKind, AuditSink, JsonlAuditLog};
pub use session::JournalSession;
pub use config::Config;
