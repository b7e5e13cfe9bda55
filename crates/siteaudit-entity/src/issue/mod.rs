//! Content issue entities.

pub mod model;

pub use model::Issue;
