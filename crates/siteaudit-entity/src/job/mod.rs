//! Queued job entities.

pub mod model;
pub mod payload;
pub mod status;

pub use model::{CreateJob, Job};
pub use payload::{AnalyzePagePayload, CrawlPagePayload, JobPayload};
pub use status::{JobStatus, JobType};
