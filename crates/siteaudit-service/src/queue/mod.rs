//! Queue introspection.

pub mod stats;

pub use stats::{QueueService, QueueStats};
