use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct BridgeMetrics {
    pub rx_frames: IntCounter,
    pub bus_errors: IntCounter,
    pub devices_tracked: IntGauge,
}

/// Prometheus registry for the bridge's own counters, dumpable as text
/// with `--metrics-dump`.
#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub bridge: BridgeMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let rx_frames = IntCounter::new("pit_can_rx_frames", "Total CAN data frames received")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let bus_errors = IntCounter::new("pit_can_bus_errors", "Total CAN bus errors observed")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let devices_tracked =
            IntGauge::new("pit_devices_tracked", "Number of devices currently tracked")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let bridge = BridgeMetrics {
            rx_frames,
            bus_errors,
            devices_tracked,
        };
        let _ = registry.register(Box::new(bridge.rx_frames.clone()));
        let _ = registry.register(Box::new(bridge.bus_errors.clone()));
        let _ = registry.register(Box::new(bridge.devices_tracked.clone()));
        Ok(Self { registry, bridge })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_text_dump() {
        let hub = MetricsHub::new().unwrap();
        hub.bridge.rx_frames.inc_by(3);
        hub.bridge.bus_errors.inc();
        hub.bridge.devices_tracked.set(4);
        let text = hub.encode_text();
        assert!(text.contains("pit_can_rx_frames 3"));
        assert!(text.contains("pit_can_bus_errors 1"));
        assert!(text.contains("pit_devices_tracked 4"));
    }
}
