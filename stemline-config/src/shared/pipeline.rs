use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Controls the order in which processed lines are written to the output.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrder {
    /// Lines are written as soon as any worker finishes them.
    #[default]
    Arrival,
    /// Lines are buffered and written in the order they were read.
    Input,
}

impl fmt::Display for OutputOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputOrder::Arrival => f.write_str("arrival"),
            OutputOrder::Input => f.write_str("input"),
        }
    }
}

/// Configuration for a line processing pipeline.
///
/// Every field has a default, so an empty configuration source yields a runnable pipeline
/// reading `input.txt` and writing `output.txt` with five workers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Path of the line-oriented input file.
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    /// Path of the output file, truncated when the pipeline starts writing.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Number of transformation workers running in parallel.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Capacity of both the input and the output channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Maximum time, in milliseconds, to wait for all workers to finish once the input is
    /// exhausted.
    #[serde(default = "default_worker_join_timeout_ms")]
    pub worker_join_timeout_ms: u64,
    /// Order in which processed lines are written.
    #[serde(default)]
    pub output_order: OutputOrder,
}

impl PipelineConfig {
    /// Default input file path.
    pub const DEFAULT_INPUT_PATH: &'static str = "input.txt";

    /// Default output file path.
    pub const DEFAULT_OUTPUT_PATH: &'static str = "output.txt";

    /// Default number of workers.
    pub const DEFAULT_WORKER_COUNT: usize = 5;

    /// Default capacity of each channel.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

    /// Default worker join timeout in milliseconds (one minute).
    pub const DEFAULT_WORKER_JOIN_TIMEOUT_MS: u64 = 60_000;

    /// Returns the worker join timeout as a [`Duration`].
    pub fn worker_join_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_join_timeout_ms)
    }

    /// Returns how many lines may be in flight between source and sink in input order mode.
    ///
    /// One line per worker plus a full channel.
    pub fn order_window_size(&self) -> usize {
        self.channel_capacity.saturating_add(self.worker_count)
    }

    /// Validates pipeline configuration settings.
    ///
    /// Ensures the worker count, the channel capacity and the join timeout are non-zero and
    /// that the pipeline does not write over its own input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.worker_count == 0 {
            return Err(ValidationError::WorkerCountZero);
        }

        if self.channel_capacity == 0 {
            return Err(ValidationError::ChannelCapacityZero);
        }

        if self.worker_join_timeout_ms == 0 {
            return Err(ValidationError::WorkerJoinTimeoutZero);
        }

        if self.input_path == self.output_path {
            return Err(ValidationError::SameInputAndOutput(
                self.input_path.display().to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_path: default_output_path(),
            worker_count: default_worker_count(),
            channel_capacity: default_channel_capacity(),
            worker_join_timeout_ms: default_worker_join_timeout_ms(),
            output_order: OutputOrder::default(),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from(PipelineConfig::DEFAULT_INPUT_PATH)
}

fn default_output_path() -> PathBuf {
    PathBuf::from(PipelineConfig::DEFAULT_OUTPUT_PATH)
}

fn default_worker_count() -> usize {
    PipelineConfig::DEFAULT_WORKER_COUNT
}

fn default_channel_capacity() -> usize {
    PipelineConfig::DEFAULT_CHANNEL_CAPACITY
}

fn default_worker_join_timeout_ms() -> u64 {
    PipelineConfig::DEFAULT_WORKER_JOIN_TIMEOUT_MS
}
