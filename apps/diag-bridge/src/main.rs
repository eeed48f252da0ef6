//! diag-bridge: sniff CAN traffic, republish device liveness.
//!
//! One thread, one loop: bounded-timeout frame reads interleaved with
//! periodic publish/summary/warning/CSV ticks. Opening the bus is the
//! only fatal error; everything after startup degrades gracefully.

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{debug, error, info, warn};

use bus_diag::{
    decode_frame, rollups, BridgeConfig, CsvLogger, DeviceRegistry, LivenessTracker, MetricsHub,
    Publisher, TableOptions,
};
use bus_diag::report;
use can_transport as can;
use can_transport::{BusEvent, CanBus};
use telemetry_store::{MemoryStore, TelemetryStore};

#[derive(Parser, Debug)]
#[command(
    name = "diag-bridge",
    version,
    about = "CAN -> telemetry store diagnostics bridge"
)]
struct Cli {
    /// Path to YAML or JSON config
    #[arg(long, default_value = "configs/bridge.yaml")]
    config: String,

    /// Telemetry store host/IP (informational for the memory backend)
    #[arg(long)]
    store: Option<String>,

    /// Bus backend to open
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Serial port for slcan (omit to auto-detect by description)
    #[arg(long)]
    channel: Option<String>,

    /// SLCAN bitrate
    #[arg(long, value_enum)]
    bitrate: Option<Bitrate>,

    /// Seconds without frames before a device counts as stale
    #[arg(long)]
    timeout: Option<f64>,

    /// Seconds between telemetry publishes
    #[arg(long)]
    publish_period: Option<f64>,

    /// Seconds between summary prints (0 to disable)
    #[arg(long)]
    print_summary_period: Option<f64>,

    /// Seconds with zero frames before warning (0 to disable)
    #[arg(long)]
    no_traffic_secs: Option<f64>,

    /// Seconds between store-connectivity warnings (0 to disable)
    #[arg(long)]
    no_store_secs: Option<f64>,

    /// CSV log path (empty to disable)
    #[arg(long)]
    log_csv: Option<String>,

    /// Seconds between CSV rows (0 to disable)
    #[arg(long)]
    log_period: Option<f64>,

    /// Print every received device id
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Print when a device is seen after being missing or stale
    #[arg(long, action = ArgAction::SetTrue)]
    print_publish: bool,

    /// Print one summary after a short wait, then exit
    #[arg(long, action = ArgAction::SetTrue)]
    quick_check: bool,

    /// Seconds to wait before the quick-check summary
    #[arg(long)]
    quick_wait: Option<f64>,

    /// Substring to match when auto-detecting serial ports
    #[arg(long)]
    auto_match: Option<String>,

    /// Fail instead of prompting when several ports match
    #[arg(long, action = ArgAction::SetTrue)]
    no_prompt: bool,

    /// List available serial ports and exit
    #[arg(long, action = ArgAction::SetTrue)]
    list_ports: bool,

    /// Dump Prometheus counters on exit
    #[arg(long, action = ArgAction::SetTrue)]
    metrics_dump: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Slcan,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Bitrate {
    #[value(name = "125k")]
    B125k,
    #[value(name = "250k")]
    B250k,
    #[value(name = "500k")]
    B500k,
    #[value(name = "1m")]
    B1M,
}

impl Bitrate {
    fn into_transport(self) -> can::SlcanBitrate {
        match self {
            Bitrate::B125k => can::SlcanBitrate::B125k,
            Bitrate::B250k => can::SlcanBitrate::B250k,
            Bitrate::B500k => can::SlcanBitrate::B500k,
            Bitrate::B1M => can::SlcanBitrate::B1M,
        }
    }
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    if cli.list_ports {
        return list_ports();
    }

    let mut cfg = BridgeConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config))?;
    apply_overrides(&mut cfg, &cli);

    let (registry, warnings) = DeviceRegistry::from_config(&cfg);
    for warning in &warnings {
        warn!("{warning}");
    }
    if registry.is_empty() {
        warn!("no enabled devices declared; only discovered devices will be tracked");
    }

    let backend = match cli.backend {
        Some(b) => b,
        None if cfg.interface == "mock" => Backend::Mock,
        None => Backend::Slcan,
    };

    let mut store = MemoryStore::new();
    print_banner(&cfg, backend, &registry, store.connected());

    match backend {
        Backend::Mock => {
            let mut bus = can::MockBus::open("mock0").context("opening mock bus")?;
            run_bridge(&mut bus, &cfg, &registry, &mut store, &cli)
        }
        Backend::Slcan => {
            let channel = resolve_channel(&cfg, cli.no_prompt)?;
            let bitrate = cli
                .bitrate
                .map(Bitrate::into_transport)
                .or_else(|| slcan_bitrate(cfg.bitrate));
            let mut bus = can::SlcanBus::open_with(&channel, bitrate)
                .with_context(|| format!("opening slcan bus on {channel}"))?;
            info!(channel = %channel, "slcan bus open");
            run_bridge(&mut bus, &cfg, &registry, &mut store, &cli)
        }
    }
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn apply_overrides(cfg: &mut BridgeConfig, cli: &Cli) {
    if let Some(store) = &cli.store {
        cfg.store = store.clone();
    }
    if let Some(channel) = &cli.channel {
        cfg.channel = channel.clone();
    }
    if let Some(timeout) = cli.timeout {
        cfg.timeout = timeout;
    }
    if let Some(period) = cli.publish_period {
        cfg.publish_period = period;
    }
    if let Some(period) = cli.print_summary_period {
        cfg.print_summary_period = period;
    }
    if let Some(secs) = cli.no_traffic_secs {
        cfg.no_traffic_secs = secs;
    }
    if let Some(secs) = cli.no_store_secs {
        cfg.no_store_secs = secs;
    }
    if let Some(path) = &cli.log_csv {
        cfg.log_csv = path.clone();
    }
    if let Some(period) = cli.log_period {
        cfg.log_period = period;
    }
    if let Some(wait) = cli.quick_wait {
        cfg.quick_wait = wait;
    }
    if let Some(m) = &cli.auto_match {
        cfg.auto_match = m.clone();
    }
}

fn list_ports() -> Result<()> {
    let ports = can::SlcanBus::list()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    println!("Available serial ports:");
    for port in ports {
        println!("  {} ({})", port.name, port.description);
    }
    Ok(())
}

/// Use the configured channel, or auto-detect by description substring.
fn resolve_channel(cfg: &BridgeConfig, no_prompt: bool) -> Result<String> {
    if !cfg.channel.is_empty() {
        return Ok(cfg.channel.clone());
    }
    let matches = can::find_matching_ports(&cfg.auto_match)?;
    match matches.len() {
        0 => Err(anyhow!(
            "no serial ports matched '{}'; specify --channel explicitly",
            cfg.auto_match
        )),
        1 => {
            println!(
                "Auto-detected CAN channel: {} ({})",
                matches[0].name, matches[0].description
            );
            Ok(matches[0].name.clone())
        }
        _ if no_prompt => Err(anyhow!(
            "multiple serial ports matched '{}': {}; specify --channel explicitly",
            cfg.auto_match,
            matches
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
        _ => prompt_for_port(&matches),
    }
}

fn prompt_for_port(matches: &[can::BusInfo]) -> Result<String> {
    println!("Multiple matching serial ports found:");
    for (index, port) in matches.iter().enumerate() {
        println!("  {}. {} ({})", index + 1, port.name, port.description);
    }
    println!("Select port by number: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading port selection")?;
    let choice: usize = line
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid selection; specify --channel explicitly"))?;
    matches
        .get(choice.checked_sub(1).unwrap_or(usize::MAX))
        .map(|port| port.name.clone())
        .ok_or_else(|| anyhow!("selection out of range; specify --channel explicitly"))
}

fn slcan_bitrate(bitrate: u32) -> Option<can::SlcanBitrate> {
    let mapped = match bitrate {
        10_000 => can::SlcanBitrate::B10k,
        20_000 => can::SlcanBitrate::B20k,
        50_000 => can::SlcanBitrate::B50k,
        100_000 => can::SlcanBitrate::B100k,
        125_000 => can::SlcanBitrate::B125k,
        250_000 => can::SlcanBitrate::B250k,
        500_000 => can::SlcanBitrate::B500k,
        800_000 => can::SlcanBitrate::B800k,
        1_000_000 => can::SlcanBitrate::B1M,
        other => {
            warn!(bitrate = other, "unsupported bitrate, defaulting to 1M");
            can::SlcanBitrate::B1M
        }
    };
    Some(mapped)
}

fn print_banner(
    cfg: &BridgeConfig,
    backend: Backend,
    registry: &DeviceRegistry,
    store_connected: Option<bool>,
) {
    println!("=== CAN Diagnostics Bridge ===");
    println!("Store: {}", cfg.store);
    println!(
        "CAN: backend={backend:?} channel={} bitrate={}",
        if cfg.channel.is_empty() {
            "(auto)"
        } else {
            &cfg.channel
        },
        cfg.bitrate
    );
    println!("Tracking devices: {} entries", registry.specs().len());
    if !registry.groups().is_empty() {
        let groups: Vec<String> = registry
            .groups()
            .iter()
            .map(|(name, members)| format!("{name}({})", members.len()))
            .collect();
        println!("Groups: {}", groups.join(", "));
    }
    match store_connected {
        Some(true) => println!("Store status: connected"),
        Some(false) => println!("Store status: NOT connected"),
        None => println!("Store status: unknown"),
    }
    println!("Press Ctrl+C to stop.");
}

fn epoch_now() -> f64 {
    can::Timestamp::now().epoch_secs()
}

fn run_bridge<B: CanBus>(
    bus: &mut B,
    cfg: &BridgeConfig,
    registry: &DeviceRegistry,
    store: &mut MemoryStore,
    cli: &Cli,
) -> Result<()> {
    let mut tracker = LivenessTracker::new(registry, cfg.timeout);
    let publisher = Publisher::default();
    let table_opts = TableOptions::default();
    let metrics = MetricsHub::new().map_err(|e| anyhow!(e))?;
    let mut csv = if cfg.log_csv.is_empty() || cfg.log_period <= 0.0 {
        None
    } else {
        Some(CsvLogger::new(&cfg.log_csv))
    };

    let start = epoch_now();
    let mut last_publish = 0.0f64;
    let mut last_summary = 0.0f64;
    let mut last_traffic_warn = start;
    let mut last_store_warn = start;
    let mut last_log = 0.0f64;

    loop {
        let now = epoch_now();

        match bus.recv(Some(50)) {
            Ok(BusEvent::Frame(frame)) => {
                let at = frame.timestamp.map(|t| t.epoch_secs()).unwrap_or(now);
                match decode_frame(&frame) {
                    Some((decoded, _payload)) => {
                        let seen = tracker.on_frame(decoded.key, at);
                        metrics.bridge.rx_frames.inc();
                        if cli.print_publish && seen.reseen {
                            println!("{}", report::device_seen_line(decoded.key, seen.frame_count));
                        }
                        if cli.verbose {
                            println!(
                                "RX mfg={} type={} id={} arb={}",
                                decoded.key.manufacturer,
                                decoded.key.device_type,
                                decoded.key.instance,
                                frame.id
                            );
                        }
                    }
                    None => {
                        // Standard-id traffic is not device addressing.
                        tracker.on_bus_error();
                        metrics.bridge.bus_errors.inc();
                        debug!(id = %frame.id, "non-extended frame counted as bus error");
                    }
                }
            }
            Ok(BusEvent::ErrorFrame { .. }) => {
                tracker.on_bus_error();
                metrics.bridge.bus_errors.inc();
            }
            Err(e) if e.is_frame_error() => {
                tracker.on_bus_error();
                metrics.bridge.bus_errors.inc();
            }
            Err(can::TransportError::Timeout) => {}
            Err(e) => {
                // Transport hiccups are never fatal once the bus is open.
                error!("bus read error: {e}");
            }
        }

        if now - last_publish >= cfg.publish_period {
            let snapshot = tracker.snapshot(now);
            let groups = rollups(registry, &tracker, now);
            publisher.publish(store, &snapshot, &groups, tracker.counters().bus_errors);
            metrics.bridge.devices_tracked.set(snapshot.len() as i64);
            last_publish = now;
        }

        if cfg.print_summary_period > 0.0 && now - last_summary >= cfg.print_summary_period {
            let period = if last_summary > 0.0 {
                now - last_summary
            } else {
                cfg.print_summary_period
            };
            let (fps, eps) = tracker.window_rates(period);
            let snapshot = tracker.snapshot(now);
            let groups = rollups(registry, &tracker, now);
            print!(
                "{}",
                report::summary(
                    "Summary",
                    &snapshot,
                    &groups,
                    tracker.counters().bus_errors,
                    fps,
                    eps,
                    now,
                    &table_opts
                )
            );
            tracker.reset_window();
            last_summary = now;
        }

        if cfg.no_traffic_secs > 0.0 && now - last_traffic_warn >= cfg.no_traffic_secs {
            if tracker.counters().total_frames == 0 {
                println!("{}", report::no_traffic_warning(now));
            }
            last_traffic_warn = now;
        }

        if cfg.no_store_secs > 0.0 && now - last_store_warn >= cfg.no_store_secs {
            if store.connected() == Some(false) {
                println!("{}", report::store_down_warning(now));
            }
            last_store_warn = now;
        }

        if let Some(logger) = csv.as_mut() {
            if now - last_log >= cfg.log_period {
                let period = if last_log > 0.0 {
                    now - last_log
                } else {
                    cfg.log_period
                };
                let (fps, eps) = tracker.window_rates(period);
                let snapshot = tracker.snapshot(now);
                let groups = rollups(registry, &tracker, now);
                if let Err(e) = logger.log(
                    registry,
                    &snapshot,
                    &groups,
                    tracker.counters().bus_errors,
                    fps,
                    eps,
                    now,
                ) {
                    error!("CSV log write failed: {e}");
                }
                last_log = now;
            }
        }

        if cli.quick_check && now - start >= cfg.quick_wait {
            break;
        }
    }

    // Graceful exit: one last publish and summary so the store and
    // console reflect the final state.
    let now = epoch_now();
    let snapshot = tracker.snapshot(now);
    let groups = rollups(registry, &tracker, now);
    publisher.publish(store, &snapshot, &groups, tracker.counters().bus_errors);
    let period = if last_summary > 0.0 {
        now - last_summary
    } else {
        (now - start).max(0.5)
    };
    let (fps, eps) = tracker.window_rates(period);
    print!(
        "{}",
        report::summary(
            "Final Summary",
            &snapshot,
            &groups,
            tracker.counters().bus_errors,
            fps,
            eps,
            now,
            &table_opts
        )
    );

    if cli.metrics_dump {
        print!("{}", metrics.encode_text());
    }
    Ok(())
}
