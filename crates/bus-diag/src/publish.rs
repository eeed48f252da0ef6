//! Telemetry publication: the full tracker state as key-value fields.
//!
//! Two schemes are written on every tick. The composite scheme keyed by
//! the full triple is primary; the flat per-instance scheme predates
//! composite keys and is kept for consumers that only understand bare
//! device ids. The flat fields are a pure projection of the composite
//! records — nothing is tracked twice.

use std::collections::BTreeMap;

use telemetry_store::TelemetryStore;

use crate::groups::GroupRollup;
use crate::tracker::{DeviceSnapshot, Status};

/// Field-path prefix in the store, e.g. `bringup/diag/busErrorCount`.
pub const DEFAULT_PREFIX: &str = "bringup/diag";

pub struct Publisher {
    prefix: String,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl Publisher {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Overwrite the store with the current state. Idempotent: the same
    /// snapshot and `now` always produce the same field values. Write
    /// failures are the store client's concern; nothing is retried here.
    pub fn publish(
        &self,
        store: &mut dyn TelemetryStore,
        snapshot: &[DeviceSnapshot],
        rollups: &[GroupRollup],
        bus_errors: u64,
    ) {
        store.set_f64(&self.path("busErrorCount"), bus_errors as f64);

        for dev in snapshot {
            let base = format!(
                "dev/{}/{}/{}",
                dev.key.manufacturer, dev.key.device_type, dev.key.instance
            );
            store.set_text(&self.path(&format!("{base}/label")), &dev.label);
            store.set_text(&self.path(&format!("{base}/status")), dev.status.as_str());
            store.set_f64(&self.path(&format!("{base}/ageSec")), dev.age_secs);
            store.set_f64(
                &self.path(&format!("{base}/msgCount")),
                dev.frame_count as f64,
            );
            store.set_f64(
                &self.path(&format!("{base}/lastSeen")),
                dev.last_seen.unwrap_or(-1.0),
            );
            store.set_f64(
                &self.path(&format!("{base}/manufacturer")),
                f64::from(dev.key.manufacturer),
            );
            store.set_f64(
                &self.path(&format!("{base}/deviceType")),
                f64::from(dev.key.device_type),
            );
            store.set_f64(
                &self.path(&format!("{base}/deviceId")),
                f64::from(dev.key.instance),
            );
        }

        for flat in project_legacy(snapshot) {
            let id = flat.instance;
            store.set_f64(
                &self.path(&format!("lastSeen/{id}")),
                flat.last_seen.unwrap_or(-1.0),
            );
            store.set_bool(
                &self.path(&format!("missing/{id}")),
                flat.status != Status::Ok,
            );
            store.set_f64(&self.path(&format!("msgCount/{id}")), flat.msg_count as f64);
            store.set_text(&self.path(&format!("status/{id}")), flat.status.as_str());
            store.set_f64(&self.path(&format!("ageSec/{id}")), flat.age_secs);
            store.set_text(&self.path(&format!("type/{id}")), "Mixed");
        }

        for group in rollups {
            store.set_f64(
                &self.path(&format!("group/{}/seen", group.name)),
                group.seen as f64,
            );
            store.set_f64(
                &self.path(&format!("group/{}/total", group.name)),
                group.total as f64,
            );
        }
    }

    fn path(&self, tail: &str) -> String {
        format!("{}/{}", self.prefix, tail)
    }
}

/// One flat per-instance record projected from the composite snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRecord {
    pub instance: u8,
    pub status: Status,
    pub last_seen: Option<f64>,
    pub age_secs: f64,
    pub msg_count: u64,
}

/// Collapse composite records sharing an instance number. Flat keys can
/// alias two physical devices; the projection takes the most recent
/// `last_seen` (and its age), the best status across the collision set,
/// and the summed message count.
pub fn project_legacy(snapshot: &[DeviceSnapshot]) -> Vec<LegacyRecord> {
    let mut by_instance: BTreeMap<u8, LegacyRecord> = BTreeMap::new();
    for dev in snapshot {
        let entry = by_instance
            .entry(dev.key.instance)
            .or_insert_with(|| LegacyRecord {
                instance: dev.key.instance,
                status: dev.status,
                last_seen: dev.last_seen,
                age_secs: dev.age_secs,
                msg_count: 0,
            });
        entry.msg_count += dev.frame_count;
        if dev.last_seen > entry.last_seen {
            entry.last_seen = dev.last_seen;
            entry.age_secs = dev.age_secs;
        }
        entry.status = best_status(entry.status, dev.status);
    }
    by_instance.into_values().collect()
}

fn best_status(a: Status, b: Status) -> Status {
    match (a, b) {
        (Status::Ok, _) | (_, Status::Ok) => Status::Ok,
        (Status::Stale, _) | (_, Status::Stale) => Status::Stale,
        _ => Status::NoData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DeviceKey;
    use telemetry_store::MemoryStore;

    fn snap(
        key: DeviceKey,
        label: &str,
        status: Status,
        last_seen: Option<f64>,
        age: f64,
        count: u64,
    ) -> DeviceSnapshot {
        DeviceSnapshot {
            key,
            label: label.to_string(),
            declared: true,
            status,
            age_secs: age,
            frame_count: count,
            last_seen,
        }
    }

    #[test]
    fn hierarchical_fields_for_each_device() {
        let mut store = MemoryStore::new();
        let snapshot = vec![snap(
            DeviceKey::new(5, 2, 10),
            "FR NEO",
            Status::Ok,
            Some(99.5),
            0.5,
            42,
        )];
        Publisher::default().publish(&mut store, &snapshot, &[], 3);

        assert_eq!(store.get_f64("bringup/diag/busErrorCount"), Some(3.0));
        assert_eq!(
            store.get_text("bringup/diag/dev/5/2/10/label"),
            Some("FR NEO".into())
        );
        assert_eq!(
            store.get_text("bringup/diag/dev/5/2/10/status"),
            Some("OK".into())
        );
        assert_eq!(store.get_f64("bringup/diag/dev/5/2/10/ageSec"), Some(0.5));
        assert_eq!(store.get_f64("bringup/diag/dev/5/2/10/msgCount"), Some(42.0));
        assert_eq!(store.get_f64("bringup/diag/dev/5/2/10/lastSeen"), Some(99.5));
        assert_eq!(
            store.get_f64("bringup/diag/dev/5/2/10/manufacturer"),
            Some(5.0)
        );
        assert_eq!(
            store.get_f64("bringup/diag/dev/5/2/10/deviceType"),
            Some(2.0)
        );
        assert_eq!(store.get_f64("bringup/diag/dev/5/2/10/deviceId"), Some(10.0));
    }

    #[test]
    fn never_seen_devices_publish_minus_one_sentinels() {
        let mut store = MemoryStore::new();
        let snapshot = vec![snap(
            DeviceKey::new(5, 2, 10),
            "FR NEO",
            Status::NoData,
            None,
            -1.0,
            0,
        )];
        Publisher::default().publish(&mut store, &snapshot, &[], 0);
        assert_eq!(store.get_f64("bringup/diag/dev/5/2/10/lastSeen"), Some(-1.0));
        assert_eq!(store.get_f64("bringup/diag/ageSec/10"), Some(-1.0));
        assert_eq!(store.get_bool("bringup/diag/missing/10"), Some(true));
        assert_eq!(
            store.get_text("bringup/diag/status/10"),
            Some("NO_DATA".into())
        );
    }

    #[test]
    fn legacy_projection_merges_instance_collisions() {
        // A NEO and a CANCoder sharing instance 3: most recent last_seen
        // wins, counts sum, OK beats STALE.
        let snapshot = vec![
            snap(DeviceKey::new(5, 2, 3), "NEO", Status::Stale, Some(1.0), 9.0, 10),
            snap(DeviceKey::new(4, 7, 3), "CANC", Status::Ok, Some(9.5), 0.5, 7),
        ];
        let flat = project_legacy(&snapshot);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].instance, 3);
        assert_eq!(flat[0].status, Status::Ok);
        assert_eq!(flat[0].last_seen, Some(9.5));
        assert_eq!(flat[0].age_secs, 0.5);
        assert_eq!(flat[0].msg_count, 17);
    }

    #[test]
    fn legacy_type_field_is_constant_placeholder() {
        let mut store = MemoryStore::new();
        let snapshot = vec![snap(
            DeviceKey::new(5, 2, 3),
            "NEO",
            Status::Ok,
            Some(1.0),
            0.1,
            1,
        )];
        Publisher::default().publish(&mut store, &snapshot, &[], 0);
        assert_eq!(store.get_text("bringup/diag/type/3"), Some("Mixed".into()));
    }

    #[test]
    fn publish_is_idempotent() {
        let snapshot = vec![snap(
            DeviceKey::new(5, 2, 10),
            "FR NEO",
            Status::Ok,
            Some(5.0),
            0.2,
            12,
        )];
        let rollups = vec![GroupRollup {
            name: "neos".to_string(),
            seen: 1,
            total: 1,
        }];

        let mut first = MemoryStore::new();
        let publisher = Publisher::default();
        publisher.publish(&mut first, &snapshot, &rollups, 2);
        let mut second = first.clone();
        publisher.publish(&mut second, &snapshot, &rollups, 2);

        let a: Vec<_> = first.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let b: Vec<_> = second.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn group_rollups_are_published() {
        let mut store = MemoryStore::new();
        let rollups = vec![GroupRollup {
            name: "neos".to_string(),
            seen: 2,
            total: 3,
        }];
        Publisher::default().publish(&mut store, &[], &rollups, 0);
        assert_eq!(store.get_f64("bringup/diag/group/neos/seen"), Some(2.0));
        assert_eq!(store.get_f64("bringup/diag/group/neos/total"), Some(3.0));
    }
}
