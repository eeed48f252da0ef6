use std::collections::VecDeque;

use crate::{BusEvent, BusInfo, CanBus, CanFrame, CanId, Result, Timestamp, TransportError};

/// Extended id the idle mock emits: manufacturer 8 (team use), device
/// type 2 (motor controller), instance 1.
const HEARTBEAT_ID: u32 = (2 << 24) | (8 << 16) | 1;

/// An in-process bus. Opened normally it emits a synthetic heartbeat
/// frame whenever its script runs dry, so end-to-end flows stay testable
/// without hardware; opened with [`MockBus::silent`] it times out
/// instead, which is what unit tests usually want.
pub struct MockBus {
    name: String,
    queue: VecDeque<BusEvent>,
    idle_heartbeat: bool,
}

impl MockBus {
    pub fn silent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queue: VecDeque::new(),
            idle_heartbeat: false,
        }
    }

    /// Queue a data frame for a later `recv`.
    pub fn push_frame(&mut self, frame: CanFrame) {
        self.queue.push_back(BusEvent::Frame(frame));
    }

    /// Queue an error-frame notification for a later `recv`.
    pub fn push_error(&mut self) {
        self.queue.push_back(BusEvent::ErrorFrame { timestamp: None });
    }

    fn heartbeat() -> Result<BusEvent> {
        let id = CanId::extended(HEARTBEAT_ID).ok_or(TransportError::InvalidFrame("id"))?;
        let mut frame =
            CanFrame::new(id, &[0x00; 4]).ok_or(TransportError::InvalidFrame("len"))?;
        frame.timestamp = Some(Timestamp::now());
        Ok(BusEvent::Frame(frame))
    }
}

impl CanBus for MockBus {
    fn open(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            queue: VecDeque::new(),
            idle_heartbeat: true,
        })
    }

    fn list() -> Result<Vec<BusInfo>> {
        Ok(vec![BusInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
            description: "in-process mock bus".to_string(),
        }])
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<BusEvent> {
        if let Some(mut event) = self.queue.pop_front() {
            // Stamp arrival like a real backend would.
            match &mut event {
                BusEvent::Frame(frame) if frame.timestamp.is_none() => {
                    frame.timestamp = Some(Timestamp::now());
                }
                BusEvent::ErrorFrame { timestamp } if timestamp.is_none() => {
                    *timestamp = Some(Timestamp::now());
                }
                _ => {}
            }
            return Ok(event);
        }
        if self.idle_heartbeat {
            // Pace the heartbeat at roughly the caller's poll rate so a
            // drain loop behaves like a real ~20 Hz device.
            std::thread::sleep(std::time::Duration::from_millis(
                timeout_ms.unwrap_or(50).min(50),
            ));
            Self::heartbeat()
        } else {
            Err(TransportError::Timeout)
        }
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let _ = (&self.name, frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_bus_times_out_when_drained() {
        let mut bus = MockBus::silent("mock0");
        assert!(matches!(
            bus.recv(Some(10)),
            Err(TransportError::Timeout)
        ));
    }

    #[test]
    fn scripted_events_come_back_in_order() {
        let mut bus = MockBus::silent("mock0");
        let id = CanId::extended(0x0205_000A).unwrap();
        bus.push_frame(CanFrame::new(id, &[1, 2]).unwrap());
        bus.push_error();

        match bus.recv(None) {
            Ok(BusEvent::Frame(frame)) => {
                assert_eq!(frame.id, id);
                assert!(frame.timestamp.is_some());
            }
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(matches!(bus.recv(None), Ok(BusEvent::ErrorFrame { .. })));
        assert!(matches!(bus.recv(None), Err(TransportError::Timeout)));
    }

    #[test]
    fn open_bus_idles_with_heartbeat() {
        let mut bus = MockBus::open("mock0").unwrap();
        match bus.recv(Some(10)) {
            Ok(BusEvent::Frame(frame)) => assert!(frame.id.is_extended()),
            other => panic!("expected heartbeat frame, got {other:?}"),
        }
    }
}
