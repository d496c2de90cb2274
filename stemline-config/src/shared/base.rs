use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The worker pool needs at least one worker.
    #[error("`worker_count` cannot be zero")]
    WorkerCountZero,
    /// Channels must be able to hold at least one item.
    #[error("`channel_capacity` cannot be zero")]
    ChannelCapacityZero,
    /// A zero timeout would fail every run before workers can drain.
    #[error("`worker_join_timeout_ms` cannot be zero")]
    WorkerJoinTimeoutZero,
    /// Reading and writing the same file would truncate the input before it is read.
    #[error("`input_path` and `output_path` must differ, both are `{0}`")]
    SameInputAndOutput(String),
}
