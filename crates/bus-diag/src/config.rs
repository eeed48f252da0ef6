//! Bridge configuration: device declarations, groups, periods, thresholds.
//!
//! Every field is defaulted so an absent or empty file is a valid
//! configuration. Files may be YAML or JSON, chosen by extension.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// One statically declared device.
///
/// `instance` is signed so installations can park a slot with the disabled
/// sentinel (-1) without deleting the line; disabled declarations are
/// filtered out of every downstream view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDecl {
    pub label: String,
    pub manufacturer: u8,
    pub device_type: u8,
    pub instance: i32,
    #[serde(default)]
    pub group: String,
}

/// A group member reference: a declared device's label, or a bare
/// instance number (which pulls in every declared key at that instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupRef {
    Instance(i64),
    Label(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Telemetry store address (host or IP).
    pub store: String,
    /// Bus backend: "slcan" or "mock".
    pub interface: String,
    /// Serial port for slcan; empty means auto-detect.
    pub channel: String,
    pub bitrate: u32,
    /// Seconds without frames before a device counts as stale.
    pub timeout: f64,
    pub publish_period: f64,
    pub print_summary_period: f64,
    /// Seconds with zero frames before warning (0 disables).
    pub no_traffic_secs: f64,
    /// Seconds between store-connectivity warnings (0 disables).
    pub no_store_secs: f64,
    /// CSV log path (empty disables).
    pub log_csv: String,
    pub log_period: f64,
    pub quick_wait: f64,
    /// Description substring used for serial-port auto-detection.
    pub auto_match: String,
    pub devices: Vec<DeviceDecl>,
    /// Explicit groups; when present they replace the per-device
    /// `group:` fields entirely.
    pub groups: BTreeMap<String, Vec<GroupRef>>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            store: "172.22.11.2".to_string(),
            interface: "slcan".to_string(),
            channel: String::new(),
            bitrate: 1_000_000,
            timeout: 1.0,
            publish_period: 0.2,
            print_summary_period: 2.0,
            no_traffic_secs: 5.0,
            no_store_secs: 5.0,
            log_csv: String::new(),
            log_period: 1.0,
            quick_wait: 1.0,
            auto_match: "USB Serial Device".to_string(),
            devices: default_devices(),
            groups: BTreeMap::new(),
        }
    }
}

fn default_devices() -> Vec<DeviceDecl> {
    let neo = |label: &str, instance: i32| DeviceDecl {
        label: label.to_string(),
        manufacturer: 5,
        device_type: 2,
        instance,
        group: "neos".to_string(),
    };
    vec![neo("NEO 22", 22), neo("NEO 25", 25), neo("NEO 10", 10)]
}

impl BridgeConfig {
    /// Load from a YAML or JSON file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);
        if is_json {
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        } else {
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    }
}
