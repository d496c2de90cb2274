mod config_test;
mod lifecycle_test;
mod pipeline_test;
