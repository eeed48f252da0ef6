//! bus-diag: device-state aggregation for CAN bring-up diagnostics
//!
//! Ingests decoded CAN frames, tracks per-device liveness against a
//! timeout policy, rolls device groups up into seen/missing counts, and
//! exposes the result as key-value telemetry fields, console summaries,
//! and an optional CSV trend log.

pub mod config;
pub use config::{BridgeConfig, ConfigError, DeviceDecl, GroupRef};

pub mod decode;
pub use decode::{decode_frame, decode_id, DecodedId, DeviceKey};

pub mod registry;
pub use registry::{
    device_type_name, manufacturer_name, DeviceRegistry, DeviceSpec, DISABLED_INSTANCE,
};

pub mod tracker;
pub use tracker::{
    BusCounters, DeviceRecord, DeviceSnapshot, FrameSeen, LivenessTracker, Status, UNKNOWN_LABEL,
};

pub mod groups;
pub use groups::{rollups, GroupRollup};

pub mod publish;
pub use publish::{project_legacy, LegacyRecord, Publisher, DEFAULT_PREFIX};

pub mod report;
pub use report::TableOptions;

pub mod csvlog;
pub use csvlog::CsvLogger;

pub mod metrics;
pub use metrics::{BridgeMetrics, MetricsHub};

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_store::{MemoryStore, TelemetryStore};

    /// Frames in, fields out: the whole pipeline against one config.
    #[test]
    fn ingest_to_publish_end_to_end() {
        let mut cfg = BridgeConfig::default();
        cfg.devices = vec![
            DeviceDecl {
                label: "FR NEO".to_string(),
                manufacturer: 5,
                device_type: 2,
                instance: 10,
                group: "neos".to_string(),
            },
            DeviceDecl {
                label: "FL NEO".to_string(),
                manufacturer: 5,
                device_type: 2,
                instance: 1,
                group: "neos".to_string(),
            },
        ];
        cfg.timeout = 2.0;
        let (registry, warnings) = DeviceRegistry::from_config(&cfg);
        assert!(warnings.is_empty());

        let mut tracker = LivenessTracker::new(&registry, cfg.timeout);
        // FR NEO fresh, FL NEO quiet past the timeout, plus one frame
        // from an undeclared gyro and one bus error.
        tracker.on_frame(DeviceKey::new(5, 2, 10), 99.9);
        tracker.on_frame(DeviceKey::new(5, 2, 1), 90.0);
        tracker.on_frame(DeviceKey::new(9, 4, 1), 99.8);
        tracker.on_bus_error();

        let now = 100.0;
        let snapshot = tracker.snapshot(now);
        let groups = rollups(&registry, &tracker, now);
        let mut store = MemoryStore::new();
        Publisher::default().publish(&mut store, &snapshot, &groups, tracker.counters().bus_errors);

        assert_eq!(store.get_f64("bringup/diag/busErrorCount"), Some(1.0));
        assert_eq!(
            store.get_text("bringup/diag/dev/5/2/10/status"),
            Some("OK".into())
        );
        assert_eq!(
            store.get_text("bringup/diag/dev/5/2/1/status"),
            Some("STALE".into())
        );
        assert_eq!(
            store.get_text("bringup/diag/dev/9/4/1/label"),
            Some("UNKNOWN".into())
        );
        assert_eq!(store.get_f64("bringup/diag/group/neos/seen"), Some(1.0));
        assert_eq!(store.get_f64("bringup/diag/group/neos/total"), Some(2.0));
        // Legacy flat fields: both NEOs and the gyro project onto their
        // bare instances.
        assert_eq!(store.get_bool("bringup/diag/missing/10"), Some(false));
        assert_eq!(store.get_bool("bringup/diag/missing/1"), Some(false));
        assert_eq!(
            store.get_text("bringup/diag/type/1"),
            Some("Mixed".into())
        );
    }
}
