//! Group rollups: seen/missing counts over configured device sets.

use crate::registry::DeviceRegistry;
use crate::tracker::{LivenessTracker, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRollup {
    pub name: String,
    /// Members currently OK.
    pub seen: usize,
    /// Enabled declared members.
    pub total: usize,
}

impl GroupRollup {
    pub fn missing(&self) -> usize {
        self.total - self.seen
    }
}

/// Roll every configured group up against the tracker at time `now`.
pub fn rollups(
    registry: &DeviceRegistry,
    tracker: &LivenessTracker,
    now: f64,
) -> Vec<GroupRollup> {
    registry
        .groups()
        .iter()
        .map(|(name, members)| {
            let seen = members
                .iter()
                .filter(|&&key| tracker.status_of(key, now) == Status::Ok)
                .count();
            GroupRollup {
                name: name.clone(),
                seen,
                total: members.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, DeviceDecl};
    use crate::decode::DeviceKey;

    fn setup() -> (DeviceRegistry, LivenessTracker) {
        let mut cfg = BridgeConfig::default();
        let decl = |label: &str, instance: i32, group: &str| DeviceDecl {
            label: label.to_string(),
            manufacturer: 5,
            device_type: 2,
            instance,
            group: group.to_string(),
        };
        cfg.devices = vec![
            decl("FR NEO", 10, "neos"),
            decl("FL NEO", 1, "neos"),
            decl("BL NEO", -1, "neos"),
            decl("PDH", 20, "power"),
        ];
        let (registry, _) = DeviceRegistry::from_config(&cfg);
        let tracker = LivenessTracker::new(&registry, 1.0);
        (registry, tracker)
    }

    #[test]
    fn totals_count_enabled_members_only() {
        let (registry, tracker) = setup();
        let rollup = rollups(&registry, &tracker, 0.0);
        assert_eq!(rollup.len(), 2);
        assert_eq!(rollup[0].name, "neos");
        assert_eq!(rollup[0].total, 2);
        assert_eq!(rollup[0].seen, 0);
        assert_eq!(rollup[0].missing(), 2);
    }

    #[test]
    fn seen_never_exceeds_total() {
        let (registry, mut tracker) = setup();
        tracker.on_frame(DeviceKey::new(5, 2, 10), 5.0);
        tracker.on_frame(DeviceKey::new(5, 2, 1), 5.0);
        // A stray frame for an undeclared key must not inflate any group.
        tracker.on_frame(DeviceKey::new(4, 2, 10), 5.0);
        let rollup = rollups(&registry, &tracker, 5.1);
        assert_eq!(rollup[0].seen, 2);
        assert_eq!(rollup[0].total, 2);
        for g in &rollup {
            assert!(g.seen <= g.total);
        }
    }

    #[test]
    fn stale_members_drop_out_of_seen() {
        let (registry, mut tracker) = setup();
        tracker.on_frame(DeviceKey::new(5, 2, 10), 0.0);
        let rollup = rollups(&registry, &tracker, 10.0);
        assert_eq!(rollup[0].seen, 0);
        assert_eq!(rollup[0].missing(), 2);
    }
}
