//! The bring-up state machine: operator buttons in, handle pools out.

use telemetry_store::TelemetryStore;
use tracing::info;

use crate::actuator::{ActuatorPool, SimCanCoder, SimKraken, SimNeo};
use crate::edge::EdgeDetector;

/// Declaration slot value for a parked CAN id.
pub const DISABLED_CAN_ID: i32 = -1;

/// Default stick deadband.
pub const DEADBAND: f64 = 0.12;

/// Zero out axis values inside the deadband; pass the rest unchanged.
pub fn deadband(value: f64, threshold: f64) -> f64 {
    if value.abs() < threshold {
        0.0
    } else {
        value
    }
}

/// Drop disabled/out-of-range slots from a declared id list.
pub fn filter_enabled(ids: &[i32]) -> Vec<u8> {
    ids.iter()
        .filter(|&&id| id != DISABLED_CAN_ID && (0..=0x3F).contains(&id))
        .map(|&id| id as u8)
        .collect()
}

/// Operator-driven bring-up core. Four edge-triggered actions plus a
/// continuous two-axis speed command; `reset` returns everything to the
/// no-handles state on mode transitions.
pub struct BringupCore {
    neos: ActuatorPool,
    krakens: ActuatorPool,
    cancoders: ActuatorPool,
    add_neo_next: bool,
    deadband: f64,
    last_commanded: (f64, f64),
    add_edge: EdgeDetector,
    add_all_edge: EdgeDetector,
    print_edge: EdgeDetector,
    health_edge: EdgeDetector,
    diag_edge: EdgeDetector,
}

impl BringupCore {
    pub fn new(neo_ids: &[i32], kraken_ids: &[i32], cancoder_ids: &[i32]) -> Self {
        Self {
            neos: ActuatorPool::new(
                "NEO",
                filter_enabled(neo_ids),
                Box::new(|id| Box::new(SimNeo::new(id))),
            ),
            krakens: ActuatorPool::new(
                "KRAKEN",
                filter_enabled(kraken_ids),
                Box::new(|id| Box::new(SimKraken::new(id))),
            ),
            cancoders: ActuatorPool::new(
                "CANCoder",
                filter_enabled(cancoder_ids),
                Box::new(|id| Box::new(SimCanCoder::new(id))),
            ),
            add_neo_next: true,
            deadband: DEADBAND,
            last_commanded: (0.0, 0.0),
            add_edge: EdgeDetector::new(),
            add_all_edge: EdgeDetector::new(),
            print_edge: EdgeDetector::new(),
            health_edge: EdgeDetector::new(),
            diag_edge: EdgeDetector::new(),
        }
    }

    pub fn with_deadband(mut self, threshold: f64) -> Self {
        self.deadband = threshold;
        self
    }

    /// Add button: alternates between the NEO and Kraken pools.
    pub fn handle_add(&mut self, pressed: bool) {
        if self.add_edge.rising(pressed) {
            self.add_next_motor();
        }
    }

    /// Add-all button: instantiate every declared handle at once.
    pub fn handle_add_all(&mut self, pressed: bool) {
        if self.add_all_edge.rising(pressed) {
            let added = self.neos.add_all() + self.krakens.add_all() + self.cancoders.add_all();
            self.add_neo_next = true;
            println!("Added all NEOs, Krakens, and CANCoders ({added} new handles).");
        }
    }

    pub fn handle_print(&mut self, pressed: bool) {
        if self.print_edge.rising(pressed) {
            println!("{}", self.state_report());
        }
    }

    pub fn handle_health(&mut self, pressed: bool) {
        if self.health_edge.rising(pressed) {
            println!("{}", self.health_report());
        }
    }

    /// Diagnostics button: read the bridge's published fields back out.
    pub fn handle_store_diag(
        &mut self,
        pressed: bool,
        store: &dyn TelemetryStore,
        prefix: &str,
        now_epoch: f64,
    ) {
        if self.diag_edge.rising(pressed) {
            println!("{}", self.store_diagnostics(store, prefix, now_epoch));
        }
    }

    /// Continuous axis mapping: left stick to NEOs, right stick to
    /// Krakens, both through the deadband.
    pub fn set_speeds(&mut self, neo_axis: f64, kraken_axis: f64) {
        let neo_speed = deadband(neo_axis, self.deadband);
        let kraken_speed = deadband(kraken_axis, self.deadband);
        self.neos.set_all(neo_speed);
        self.krakens.set_all(kraken_speed);
        self.last_commanded = (neo_speed, kraken_speed);
    }

    /// Speeds after deadband from the most recent `set_speeds` call.
    pub fn last_commanded(&self) -> (f64, f64) {
        self.last_commanded
    }

    /// Close every handle and clear all pools, counters, and edge state.
    pub fn reset(&mut self) {
        self.neos.set_all(0.0);
        self.krakens.set_all(0.0);
        self.neos.close_all();
        self.krakens.close_all();
        self.cancoders.close_all();
        self.add_neo_next = true;
        self.last_commanded = (0.0, 0.0);
        self.add_edge.reset();
        self.add_all_edge.reset();
        self.print_edge.reset();
        self.health_edge.reset();
        self.diag_edge.reset();
        info!("bringup reset: no handles instantiated");
        println!("=== Bringup reset: no motors instantiated ===");
    }

    pub fn active_counts(&self) -> (usize, usize, usize) {
        (
            self.neos.active_count(),
            self.krakens.active_count(),
            self.cancoders.active_count(),
        )
    }

    pub fn next_add_is_neo(&self) -> bool {
        self.add_neo_next
    }

    fn add_next_motor(&mut self) {
        if self.add_neo_next {
            match self.neos.add_next() {
                Some(id) => println!("Added NEO (CAN {id})"),
                None => println!("No more NEOs to add"),
            }
            self.add_neo_next = false;
        } else {
            match self.krakens.add_next() {
                Some(id) => println!("Added KRAKEN (CAN {id})"),
                None => println!("No more Krakens to add"),
            }
            self.add_neo_next = true;
        }
    }

    pub fn state_report(&self) -> String {
        let mut out = String::from("=== Bringup State ===\n");
        out.push_str("NEOs:\n");
        for line in self.neos.state_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("Krakens:\n");
        for line in self.krakens.state_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!(
            "Next add will be: {}\n",
            if self.add_neo_next { "NEO" } else { "KRAKEN" }
        ));
        out.push_str("=====================");
        out
    }

    pub fn health_report(&self) -> String {
        let mut out = String::from("=== Bringup Health ===\n");
        for line in self
            .neos
            .health_lines()
            .into_iter()
            .chain(self.krakens.health_lines())
            .chain(self.cancoders.health_lines())
        {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("======================");
        out
    }

    /// The "NT: no data" table: per configured id, the legacy lastSeen
    /// and missing fields from the store, with ages computed here.
    pub fn store_diagnostics(
        &self,
        store: &dyn TelemetryStore,
        prefix: &str,
        now_epoch: f64,
    ) -> String {
        let mut out = String::from("=== Bringup Telemetry ===\n");
        if let Some(errors) = store.get_f64(&format!("{prefix}/busErrorCount")) {
            out.push_str(&format!("Bus error count: {}\n", errors as u64));
        }
        out.push_str("NEOs:\n");
        for &id in self.neos.ids() {
            out.push_str(&device_diag_line(store, prefix, "NEO", id, now_epoch));
            out.push('\n');
        }
        out.push_str("Krakens:\n");
        for &id in self.krakens.ids() {
            out.push_str(&device_diag_line(store, prefix, "KRAKEN", id, now_epoch));
            out.push('\n');
        }
        out.push_str("=========================");
        out
    }
}

fn device_diag_line(
    store: &dyn TelemetryStore,
    prefix: &str,
    label: &str,
    id: u8,
    now_epoch: f64,
) -> String {
    let last_seen = store.get_f64(&format!("{prefix}/lastSeen/{id}"));
    let missing = store
        .get_bool(&format!("{prefix}/missing/{id}"))
        .unwrap_or(false);
    match last_seen {
        None => format!("  {label} CAN {id} NT: no data"),
        Some(at) if at < 0.0 => format!("  {label} CAN {id} NT: no data"),
        Some(at) => {
            let age = now_epoch - at;
            format!(
                "  {label} CAN {id} NT: {} lastSeen={at:.3} ageSec={age:.1}",
                if missing { "MISSING" } else { "seen" }
            )
        }
    }
}
