//! Worker threads transforming lines between the input and the output channel.

pub mod pool;
pub mod transform;

pub use pool::WorkerPool;
pub use transform::{TransformWorker, WorkerId, WorkerStats};
