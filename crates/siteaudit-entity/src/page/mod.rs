//! Page entities.

pub mod model;
pub mod status;

pub use model::Page;
pub use status::PageStatus;
