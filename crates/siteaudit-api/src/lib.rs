//! # siteaudit-api
//!
//! HTTP API for SiteAudit built on Axum.
//!
//! Exposes audit submission, progress, page listing, CSV export and
//! deletion, plus health and queue statistics, all mounted under `/api`.
//! [`Application`] wires the whole process together for the binaries.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use app::{Application, Collaborators, Stores, shutdown_signal};
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
