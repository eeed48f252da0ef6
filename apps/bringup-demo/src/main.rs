//! Scripted bring-up session against the in-memory telemetry store.
//!
//! Stands in for the handheld-controller glue: presses each button once,
//! sweeps the sticks, and reads the bridge's published fields back out,
//! so the whole harness can be exercised on a bench with no hardware.

use anyhow::Result;
use tracing::warn;

use bringup_harness::{BringupCore, DEADBAND};
use bus_diag::{rollups, BridgeConfig, DeviceRegistry, LivenessTracker, Publisher, DEFAULT_PREFIX};
use telemetry_store::MemoryStore;

// Swerve bench id tables; -1 parks a slot.
const NEO_CAN_IDS: [i32; 4] = [25, 22, 10, -1];
const KRAKEN_CAN_IDS: [i32; 4] = [11, 2, 8, -1];
const CANCODER_CAN_IDS: [i32; 4] = [12, 3, 9, -1];

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    print_startup_info();

    // Validation warnings come from the same registry the bridge uses.
    let cfg = BridgeConfig::default();
    let (registry, warnings) = DeviceRegistry::from_config(&cfg);
    for warning in &warnings {
        warn!("{warning}");
    }

    // Seed the store the way a running bridge would: a tracker that has
    // heard from two NEOs, published once.
    let mut store = MemoryStore::new();
    let mut tracker = LivenessTracker::new(&registry, cfg.timeout);
    let now = 100.0;
    for spec in registry.specs().iter().take(2) {
        tracker.on_frame(spec.key, now - 0.1);
        tracker.on_frame(spec.key, now - 0.05);
    }
    tracker.on_bus_error();
    let snapshot = tracker.snapshot(now);
    let groups = rollups(&registry, &tracker, now);
    Publisher::default().publish(&mut store, &snapshot, &groups, tracker.counters().bus_errors);

    let mut core = BringupCore::new(&NEO_CAN_IDS, &KRAKEN_CAN_IDS, &CANCODER_CAN_IDS);

    println!("\n-- operator presses A three times --");
    for _ in 0..3 {
        core.handle_add(true);
        core.handle_add(false);
    }

    println!("\n-- operator presses B (state) --");
    core.handle_print(true);
    core.handle_print(false);

    println!("\n-- operator holds the sticks --");
    core.set_speeds(0.10, 0.35);
    let (neo_speed, kraken_speed) = core.last_commanded();
    println!("commanded: neo={neo_speed} kraken={kraken_speed} (deadband {DEADBAND})");

    println!("\n-- operator presses add-all, then X (health) --");
    core.handle_add_all(true);
    core.handle_add_all(false);
    core.handle_health(true);
    core.handle_health(false);

    println!("\n-- operator presses Y (telemetry read-back) --");
    core.handle_store_diag(true, &store, DEFAULT_PREFIX, now + 0.2);
    core.handle_store_diag(false, &store, DEFAULT_PREFIX, now + 0.2);

    println!("\n-- mode transition --");
    core.reset();

    Ok(())
}

fn print_startup_info() {
    println!("=== Swerve Bringup Demo ===");
    println!("A: add motor (alternates NEO/KRAKEN)");
    println!("B: print state");
    println!("X: print health status");
    println!("Y: print telemetry diagnostics");
    println!("Left Y: NEO speed, Right Y: KRAKEN speed");
    println!("Deadband: {DEADBAND}");
    println!("===========================");
}
