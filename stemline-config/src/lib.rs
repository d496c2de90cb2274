//! Configuration types and loading for stemline pipelines.

mod load;
pub mod shared;

pub use load::{ENV_PREFIX, LoadConfigError, load_config};
