//! # siteaudit-entity
//!
//! Domain entity models for SiteAudit. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities derive `sqlx::FromRow`; status enums map to PostgreSQL enum
//! types through `sqlx::Type`.

pub mod audit;
pub mod issue;
pub mod job;
pub mod page;
