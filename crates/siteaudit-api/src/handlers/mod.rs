//! HTTP request handlers.

pub mod audit;
pub mod health;
pub mod queue;
