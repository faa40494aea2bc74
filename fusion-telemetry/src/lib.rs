//! Telemetry setup for fusion binaries and tests.

pub mod tracing;
