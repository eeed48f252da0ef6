//! Per-device liveness state: last-seen tracking, staleness, bus counters.
//!
//! The tracker is purely reactive. Every operation is total: frames that
//! never decode are the ingestion loop's problem (counted as bus errors
//! before they get here), and status is derived on demand from timestamps
//! the caller supplies, so nothing in here can fail or block.

use std::collections::{BTreeSet, HashMap};

use crate::decode::DeviceKey;
use crate::registry::DeviceRegistry;

pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Derived device health. One timeout threshold, no hysteresis: a device
/// either has never been heard from, went quiet past the timeout, or is
/// current.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    NoData,
    Stale,
    Ok,
}

impl Status {
    pub fn derive(last_seen: Option<f64>, now: f64, timeout: f64) -> Status {
        match last_seen {
            None => Status::NoData,
            Some(at) if now - at > timeout => Status::Stale,
            Some(_) => Status::Ok,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NoData => "NO_DATA",
            Status::Stale => "STALE",
            Status::Ok => "OK",
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub label: String,
    pub declared: bool,
    pub last_seen: Option<f64>,
    pub frame_count: u64,
}

/// Result of recording one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameSeen {
    /// True when the device was not OK before this frame (never seen, or
    /// stale) — drives the "device seen" console line.
    pub reseen: bool,
    pub frame_count: u64,
}

/// One row of the full-state view handed to the publisher and reporter.
#[derive(Debug, Clone)]
pub struct DeviceSnapshot {
    pub key: DeviceKey,
    pub label: String,
    pub declared: bool,
    pub status: Status,
    /// Seconds since last frame, -1.0 when never seen.
    pub age_secs: f64,
    pub frame_count: u64,
    pub last_seen: Option<f64>,
}

/// Process-wide bus accounting. The window pair feeds frames/sec and
/// errors/sec and resets on each summary tick; everything else is
/// monotonic for the process lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusCounters {
    pub bus_errors: u64,
    pub total_frames: u64,
    pub window_frames: u64,
    pub window_errors: u64,
}

#[derive(Debug)]
pub struct LivenessTracker {
    timeout: f64,
    records: HashMap<DeviceKey, DeviceRecord>,
    declared_order: Vec<DeviceKey>,
    discovered: BTreeSet<DeviceKey>,
    counters: BusCounters,
}

impl LivenessTracker {
    /// Seed records for every declared key so "declared but never seen"
    /// is visible from the first snapshot.
    pub fn new(registry: &DeviceRegistry, timeout: f64) -> Self {
        let mut records = HashMap::new();
        let mut declared_order = Vec::new();
        for spec in registry.specs() {
            declared_order.push(spec.key);
            records.insert(
                spec.key,
                DeviceRecord {
                    label: spec.label.clone(),
                    declared: true,
                    last_seen: None,
                    frame_count: 0,
                },
            );
        }
        Self {
            timeout,
            records,
            declared_order,
            discovered: BTreeSet::new(),
            counters: BusCounters::default(),
        }
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    /// Record one valid frame for `key` at time `at` (epoch seconds).
    pub fn on_frame(&mut self, key: DeviceKey, at: f64) -> FrameSeen {
        let timeout = self.timeout;
        let record = self.records.entry(key).or_insert_with(|| {
            DeviceRecord {
                label: UNKNOWN_LABEL.to_string(),
                declared: false,
                last_seen: None,
                frame_count: 0,
            }
        });
        if !record.declared {
            self.discovered.insert(key);
        }
        let reseen = Status::derive(record.last_seen, at, timeout) != Status::Ok;
        // last_seen only moves forward, even if the transport hands us
        // timestamps out of order.
        record.last_seen = Some(record.last_seen.map_or(at, |prev| prev.max(at)));
        record.frame_count += 1;
        self.counters.total_frames += 1;
        self.counters.window_frames += 1;
        FrameSeen {
            reseen,
            frame_count: record.frame_count,
        }
    }

    pub fn on_bus_error(&mut self) {
        self.counters.bus_errors += 1;
        self.counters.window_errors += 1;
    }

    pub fn status_of(&self, key: DeviceKey, now: f64) -> Status {
        let last_seen = self.records.get(&key).and_then(|r| r.last_seen);
        Status::derive(last_seen, now, self.timeout)
    }

    pub fn record(&self, key: DeviceKey) -> Option<&DeviceRecord> {
        self.records.get(&key)
    }

    pub fn counters(&self) -> BusCounters {
        self.counters
    }

    /// Frames/sec and errors/sec over the current window.
    pub fn window_rates(&self, period_secs: f64) -> (f64, f64) {
        if period_secs <= 0.0 {
            return (0.0, 0.0);
        }
        (
            self.counters.window_frames as f64 / period_secs,
            self.counters.window_errors as f64 / period_secs,
        )
    }

    pub fn reset_window(&mut self) {
        self.counters.window_frames = 0;
        self.counters.window_errors = 0;
    }

    /// Full state: declared devices in declaration order, then discovered
    /// unknowns in key order.
    pub fn snapshot(&self, now: f64) -> Vec<DeviceSnapshot> {
        let keys = self
            .declared_order
            .iter()
            .chain(self.discovered.iter())
            .copied();
        keys.filter_map(|key| {
            let record = self.records.get(&key)?;
            let status = Status::derive(record.last_seen, now, self.timeout);
            let age_secs = record.last_seen.map_or(-1.0, |at| now - at);
            Some(DeviceSnapshot {
                key,
                label: record.label.clone(),
                declared: record.declared,
                status,
                age_secs,
                frame_count: record.frame_count,
                last_seen: record.last_seen,
            })
        })
        .collect()
    }
}
