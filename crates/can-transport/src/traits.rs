use crate::{BusEvent, BusInfo, CanFrame, Result};

/// A minimal blocking CAN bus interface.
///
/// `recv` must honor its timeout: the bridge interleaves frame draining
/// with periodic publish/print ticks on one thread, so a backend that
/// blocks indefinitely would stall the whole loop.
pub trait CanBus {
    /// Open an interface by name (e.g., "mock0", "/dev/tty.usbmodem1").
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// List interfaces this backend could open.
    fn list() -> Result<Vec<BusInfo>>;

    /// Receive one bus event, waiting at most `timeout_ms` when given.
    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<BusEvent>;

    /// Send one frame.
    fn send(&mut self, frame: &CanFrame) -> Result<()>;
}
