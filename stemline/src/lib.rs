//! A bounded, multi-stage concurrent pipeline transforming the lines of a text input.
//!
//! A single source thread reads the input, a pool of workers transforms every line and a
//! single sink thread writes the results:
//!
//! ```text
//! source ──► input channel ──► worker 0..N ──► output channel ──► sink
//! ```
//!
//! Both channels are bounded, so memory use does not depend on the input size. Termination
//! is signalled in-band and every non-blank input line is written exactly once. See
//! [`pipeline::Pipeline`] for the entry point.
//!
//! ```no_run
//! use stemline::pipeline::Pipeline;
//! use stemline::transform::EnglishStemmer;
//! use stemline_config::shared::PipelineConfig;
//!
//! # fn main() -> stemline::error::StemResult<()> {
//! let mut pipeline = Pipeline::new(PipelineConfig::default(), EnglishStemmer::new());
//! let report = pipeline.run()?;
//! println!("{} lines written", report.lines_written);
//! # Ok(())
//! # }
//! ```

pub mod concurrency;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
pub mod pipeline;
pub mod sink;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
pub mod workers;
