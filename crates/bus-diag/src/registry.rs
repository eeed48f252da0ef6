//! Static device registry: labels, groups, and startup validation.
//!
//! Built once from configuration and never mutated afterwards. Anything
//! observed on the wire that is not declared here is still tracked, just
//! labeled UNKNOWN.

use std::collections::{HashMap, HashSet};

use crate::config::{BridgeConfig, GroupRef};
use crate::decode::DeviceKey;

/// Sentinel instance for a declaration slot that is parked/disabled.
pub const DISABLED_INSTANCE: i32 = -1;

/// Highest instance number the 6-bit device-id field can carry.
pub const MAX_INSTANCE: i32 = 0x3F;

/// One enabled declared device.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub label: String,
    pub key: DeviceKey,
    pub group: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    specs: Vec<DeviceSpec>,
    by_key: HashMap<DeviceKey, usize>,
    groups: Vec<(String, Vec<DeviceKey>)>,
}

impl DeviceRegistry {
    /// Build the registry and collect startup-validation warnings:
    /// one per instance number declared more than once, one combined
    /// confusion warning if any duplicate exists, and one per group left
    /// with zero enabled members.
    pub fn from_config(cfg: &BridgeConfig) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let mut specs: Vec<DeviceSpec> = Vec::new();
        let mut by_key = HashMap::new();

        let mut seen_instances: HashSet<i32> = HashSet::new();
        let mut has_duplicate = false;

        for decl in &cfg.devices {
            if decl.instance == DISABLED_INSTANCE || decl.instance < 0 {
                continue;
            }
            if decl.instance > MAX_INSTANCE {
                warnings.push(format!(
                    "CAN ID {} out of range for '{}', skipping",
                    decl.instance, decl.label
                ));
                continue;
            }
            if !seen_instances.insert(decl.instance) {
                warnings.push(format!("duplicate CAN ID: {}", decl.instance));
                has_duplicate = true;
            }
            let key = DeviceKey::new(decl.manufacturer, decl.device_type, decl.instance as u8);
            let index = specs.len();
            specs.push(DeviceSpec {
                label: decl.label.clone(),
                key,
                group: decl.group.clone(),
            });
            by_key.entry(key).or_insert(index);
        }

        if has_duplicate {
            warnings.push("duplicate CAN IDs can cause bringup confusion".to_string());
        }

        let groups = if cfg.groups.is_empty() {
            Self::groups_from_decls(cfg, &specs, &mut warnings)
        } else {
            Self::groups_from_refs(cfg, &specs, &mut warnings)
        };

        (
            Self {
                specs,
                by_key,
                groups,
            },
            warnings,
        )
    }

    /// Groups derived from per-device `group:` fields. Disabled
    /// declarations still name their group so a fully-parked group gets
    /// its warning instead of vanishing silently.
    fn groups_from_decls(
        cfg: &BridgeConfig,
        specs: &[DeviceSpec],
        warnings: &mut Vec<String>,
    ) -> Vec<(String, Vec<DeviceKey>)> {
        let mut order: Vec<String> = Vec::new();
        for decl in &cfg.devices {
            if !decl.group.is_empty() && !order.iter().any(|g| g == &decl.group) {
                order.push(decl.group.clone());
            }
        }
        let mut groups = Vec::new();
        for name in order {
            let members: Vec<DeviceKey> = specs
                .iter()
                .filter(|s| s.group == name)
                .map(|s| s.key)
                .collect();
            if members.is_empty() {
                warnings.push(format!("all CAN IDs disabled for group '{name}'"));
                continue;
            }
            groups.push((name, members));
        }
        groups
    }

    /// Explicit `groups:` map; members reference declared labels or bare
    /// instance numbers (pulling in every declared key at that instance).
    fn groups_from_refs(
        cfg: &BridgeConfig,
        specs: &[DeviceSpec],
        warnings: &mut Vec<String>,
    ) -> Vec<(String, Vec<DeviceKey>)> {
        let mut groups = Vec::new();
        for (name, refs) in &cfg.groups {
            let mut members = Vec::new();
            for r in refs {
                match r {
                    GroupRef::Label(label) => {
                        if let Some(spec) = specs.iter().find(|s| &s.label == label) {
                            members.push(spec.key);
                        }
                    }
                    GroupRef::Instance(instance) => {
                        for spec in specs {
                            if i64::from(spec.key.instance) == *instance {
                                members.push(spec.key);
                            }
                        }
                    }
                }
            }
            if members.is_empty() {
                warnings.push(format!("all CAN IDs disabled for group '{name}'"));
                continue;
            }
            groups.push((name.clone(), members));
        }
        groups
    }

    pub fn lookup(&self, key: DeviceKey) -> Option<&str> {
        self.by_key
            .get(&key)
            .map(|&i| self.specs[i].label.as_str())
    }

    /// Enabled declarations, in declaration order.
    pub fn specs(&self) -> &[DeviceSpec] {
        &self.specs
    }

    pub fn declared_keys(&self) -> impl Iterator<Item = DeviceKey> + '_ {
        self.specs.iter().map(|s| s.key)
    }

    pub fn groups(&self) -> &[(String, Vec<DeviceKey>)] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// FRC manufacturer code table. Display only; identity is always the
/// numeric triple.
pub fn manufacturer_name(code: u8) -> &'static str {
    match code {
        0 => "Broadcast",
        1 => "NI",
        2 => "Luminary Micro",
        3 => "DEKA",
        4 => "CTR Electronics",
        5 => "REV Robotics",
        6 => "Grapple",
        7 => "MindSensors",
        8 => "Team Use",
        9 => "Kauai Labs",
        10 => "Copperforge",
        11 => "Playing With Fusion",
        12 => "Studica",
        13 => "TheThriftyBot",
        14 => "Redux Robotics",
        15 => "AndyMark",
        16 => "Vivid-Hosting",
        _ => "Unknown",
    }
}

/// FRC device type code table. Display only.
pub fn device_type_name(code: u8) -> &'static str {
    match code {
        0 => "Broadcast",
        1 => "Robot Controller",
        2 => "Motor Controller",
        3 => "Relay Controller",
        4 => "Gyro Sensor",
        5 => "Accelerometer",
        6 => "Ultrasonic Sensor",
        7 => "Geartooth Sensor",
        8 => "Power Distribution",
        9 => "Pneumatics",
        10 => "Miscellaneous",
        11 => "IO Breakout",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceDecl;

    fn decl(label: &str, mfg: u8, ty: u8, instance: i32, group: &str) -> DeviceDecl {
        DeviceDecl {
            label: label.to_string(),
            manufacturer: mfg,
            device_type: ty,
            instance,
            group: group.to_string(),
        }
    }

    #[test]
    fn disabled_sentinel_is_filtered_everywhere() {
        let mut cfg = BridgeConfig::default();
        cfg.devices = vec![
            decl("FR NEO", 5, 2, 10, "neos"),
            decl("BL NEO", 5, 2, -1, "neos"),
        ];
        let (reg, warnings) = DeviceRegistry::from_config(&cfg);
        assert_eq!(reg.specs().len(), 1);
        assert_eq!(reg.groups().len(), 1);
        assert_eq!(reg.groups()[0].1.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn duplicate_instance_across_groups_warns_once_plus_summary() {
        let mut cfg = BridgeConfig::default();
        cfg.devices = vec![
            decl("FR NEO", 5, 2, 4, "neos"),
            decl("FR KRAK", 4, 2, 4, "krakens"),
        ];
        let (_, warnings) = DeviceRegistry::from_config(&cfg);
        let dup: Vec<_> = warnings
            .iter()
            .filter(|w| w.contains("duplicate CAN ID: 4"))
            .collect();
        assert_eq!(dup.len(), 1);
        let combined: Vec<_> = warnings
            .iter()
            .filter(|w| w.contains("can cause bringup confusion"))
            .collect();
        assert_eq!(combined.len(), 1);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn fully_disabled_group_warns_and_is_dropped() {
        let mut cfg = BridgeConfig::default();
        cfg.devices = vec![
            decl("FR NEO", 5, 2, 10, "neos"),
            decl("FR KRAK", 4, 2, -1, "krakens"),
            decl("FL KRAK", 4, 2, -1, "krakens"),
        ];
        let (reg, warnings) = DeviceRegistry::from_config(&cfg);
        assert_eq!(reg.groups().len(), 1);
        assert_eq!(reg.groups()[0].0, "neos");
        assert!(warnings
            .iter()
            .any(|w| w.contains("all CAN IDs disabled for group 'krakens'")));
    }

    #[test]
    fn explicit_groups_resolve_labels_and_instances() {
        let mut cfg = BridgeConfig::default();
        cfg.devices = vec![
            decl("FR NEO", 5, 2, 10, ""),
            decl("FR CANC", 4, 7, 12, ""),
        ];
        cfg.groups.insert(
            "front".to_string(),
            vec![
                GroupRef::Label("FR NEO".to_string()),
                GroupRef::Instance(12),
            ],
        );
        let (reg, warnings) = DeviceRegistry::from_config(&cfg);
        assert!(warnings.is_empty());
        assert_eq!(reg.groups().len(), 1);
        let (name, members) = &reg.groups()[0];
        assert_eq!(name, "front");
        assert_eq!(
            members,
            &vec![DeviceKey::new(5, 2, 10), DeviceKey::new(4, 7, 12)]
        );
    }

    #[test]
    fn lookup_knows_declared_keys_only() {
        let mut cfg = BridgeConfig::default();
        cfg.devices = vec![decl("FR NEO", 5, 2, 10, "neos")];
        let (reg, _) = DeviceRegistry::from_config(&cfg);
        assert_eq!(reg.lookup(DeviceKey::new(5, 2, 10)), Some("FR NEO"));
        assert_eq!(reg.lookup(DeviceKey::new(4, 2, 10)), None);
    }

    #[test]
    fn display_tables_cover_known_codes() {
        assert_eq!(manufacturer_name(5), "REV Robotics");
        assert_eq!(manufacturer_name(4), "CTR Electronics");
        assert_eq!(device_type_name(2), "Motor Controller");
        assert_eq!(manufacturer_name(200), "Unknown");
    }
}
