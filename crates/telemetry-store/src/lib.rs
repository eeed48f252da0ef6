//! telemetry-store: the remote key-value telemetry service, seen from here
//!
//! The actual store (the thing remote dashboards read) lives outside this
//! repository. The bridge only needs typed set/get on slash-separated field
//! paths plus a connectivity probe, so that is all the trait models. The
//! in-memory implementation backs tests, the demo harness, and the bridge's
//! offline mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field value in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    F64(f64),
    Bool(bool),
    Text(String),
}

/// Typed set/get against slash-separated field paths.
///
/// Writes are fire-and-forget: the publisher overwrites the full state on
/// every tick, so a lost write is corrected one period later. `connected`
/// returns `None` when the backend cannot tell.
pub trait TelemetryStore {
    fn set_f64(&mut self, path: &str, value: f64);
    fn set_bool(&mut self, path: &str, value: bool);
    fn set_text(&mut self, path: &str, value: &str);

    fn get(&self, path: &str) -> Option<Value>;

    fn connected(&self) -> Option<bool>;

    fn get_f64(&self, path: &str) -> Option<f64> {
        match self.get(path)? {
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    fn get_bool(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn get_text(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// In-process store. BTreeMap keeps dumps deterministically ordered.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    fields: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl TelemetryStore for MemoryStore {
    fn set_f64(&mut self, path: &str, value: f64) {
        self.fields.insert(path.to_string(), Value::F64(value));
    }

    fn set_bool(&mut self, path: &str, value: bool) {
        self.fields.insert(path.to_string(), Value::Bool(value));
    }

    fn set_text(&mut self, path: &str, value: &str) {
        self.fields
            .insert(path.to_string(), Value::Text(value.to_string()));
    }

    fn get(&self, path: &str) -> Option<Value> {
        self.fields.get(path).cloned()
    }

    fn connected(&self) -> Option<bool> {
        Some(true)
    }
}
