//! Telemetry setup shared by stemline binaries and tests.

pub mod tracing;
