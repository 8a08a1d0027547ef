//! Database schemas for the Scriptura gateway
//!
//! Defines the MongoDB document structure for lesson progress records.

mod metadata;
mod progress;

pub use metadata::Metadata;
pub use progress::{ProgressDoc, PROGRESS_COLLECTION};
