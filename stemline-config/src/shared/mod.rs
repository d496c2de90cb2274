//! Shared configuration types for stemline pipelines.

mod base;
mod pipeline;

pub use base::ValidationError;
pub use pipeline::{OutputOrder, PipelineConfig};
