//! can-transport: CAN bus abstractions for the diagnostics bridge
//!
//! This crate provides the frame/event types and a blocking `CanBus` trait
//! with feature-gated backends. The default build enables a scriptable
//! `mock` backend so binaries and tests compile on any host without a CAN
//! adapter attached; the `slcan` feature adds a serial-line CAN backend for
//! USB dongles speaking the SLCAN text protocol.

mod types;
pub use types::{BusEvent, BusInfo, CanFrame, CanId, Timestamp};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::CanBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockBus;

#[cfg(feature = "slcan")]
mod slcan;

#[cfg(feature = "slcan")]
pub use slcan::{find_matching_ports, SlcanBitrate, SlcanBus};
