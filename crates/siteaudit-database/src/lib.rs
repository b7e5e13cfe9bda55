//! # siteaudit-database
//!
//! Persistence for the audit pipeline. The [`store`] module defines the
//! [`JobStore`] and [`AuditStore`] contracts; [`repositories`] implements
//! them on PostgreSQL and [`memory`] implements them in process memory.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{AuditStore, JobStore};
