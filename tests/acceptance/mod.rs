//! Integration tests for pulsegen acceptance testing.
//!
//! Each module runs complete deployments through the public runtime
//! API on the simulated line bank:
//! - Cycle cadence and drift compensation
//! - Gate serialization of active phases
//! - Telemetry delivery and per-channel ordering
//! - Startup failure isolation
//! - Real-time initialization and degradation

mod common;
mod exclusion_test;
mod failure_test;
mod realtime_test;
mod telemetry_test;
mod timing_test;
