//! bringup-harness: incremental device bring-up from operator inputs
//!
//! The harness is a telemetry *consumer*: it instantiates actuator
//! handles on operator request, forwards stick axes to them, and reads
//! the diagnostics bridge's published fields back out for its own status
//! table. It never feeds the liveness tracker.

mod edge;
pub use edge::EdgeDetector;

mod actuator;
pub use actuator::{Actuator, ActuatorPool, HealthFlags, SimCanCoder, SimKraken, SimNeo};

mod harness;
pub use harness::{deadband, filter_enabled, BringupCore, DEADBAND, DISABLED_CAN_ID};
