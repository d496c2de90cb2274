//! Utilities for testing pipelines.
//!
//! - [`output`] provides an in-memory writer whose contents can be inspected after a run.
//! - [`pipeline`] builds test configurations, generates inputs and runs pipelines on them.
//! - [`transform`] provides transforms that are slow, fail or panic on demand.
//! - `failpoints` (behind the `failpoints` feature) configures fault injection scenarios.

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod output;
pub mod pipeline;
pub mod transform;
