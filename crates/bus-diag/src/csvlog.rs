//! CSV trend log: one row per log tick, appended to a file.
//!
//! The column set is fixed at the first write from the declared device
//! list and configured groups, so rows stay aligned for the whole run.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::groups::GroupRollup;
use crate::registry::DeviceRegistry;
use crate::tracker::DeviceSnapshot;

pub struct CsvLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    header_written: bool,
}

impl CsvLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            header_written: false,
        }
    }

    /// Append one row (writing the header first on the initial call).
    /// Flushes so a crash mid-run loses at most the current row.
    pub fn log(
        &mut self,
        registry: &DeviceRegistry,
        snapshot: &[DeviceSnapshot],
        rollups: &[GroupRollup],
        bus_errors: u64,
        frames_per_sec: f64,
        errors_per_sec: f64,
        now_epoch: f64,
    ) -> std::io::Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.path)?;
            tracing::debug!(path = %self.path.display(), "opened CSV log");
            self.writer = Some(BufWriter::new(file));
        }
        let header = if self.header_written {
            None
        } else {
            Some(Self::header(registry, rollups))
        };
        let row = Self::row(
            registry,
            snapshot,
            rollups,
            bus_errors,
            frames_per_sec,
            errors_per_sec,
            now_epoch,
        );
        if let Some(writer) = self.writer.as_mut() {
            if let Some(header) = header {
                writer.write_all(header.as_bytes())?;
                writer.write_all(b"\n")?;
                self.header_written = true;
            }
            writer.write_all(row.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(())
    }

    fn header(registry: &DeviceRegistry, rollups: &[GroupRollup]) -> String {
        let mut cols = vec![
            "timestamp".to_string(),
            "busErrorCount".to_string(),
            "framesPerSec".to_string(),
            "errorsPerSec".to_string(),
        ];
        for spec in registry.specs() {
            let key = format!(
                "m{}_t{}_id{}",
                spec.key.manufacturer, spec.key.device_type, spec.key.instance
            );
            cols.push(format!("{key}_count"));
            cols.push(format!("{key}_ageSec"));
            cols.push(format!("{key}_status"));
        }
        for group in rollups {
            cols.push(format!("group_{}_seen", group.name));
            cols.push(format!("group_{}_missing", group.name));
        }
        cols.join(",")
    }

    fn row(
        registry: &DeviceRegistry,
        snapshot: &[DeviceSnapshot],
        rollups: &[GroupRollup],
        bus_errors: u64,
        frames_per_sec: f64,
        errors_per_sec: f64,
        now_epoch: f64,
    ) -> String {
        let mut cols = vec![
            format!("{now_epoch:.3}"),
            bus_errors.to_string(),
            format!("{frames_per_sec:.2}"),
            format!("{errors_per_sec:.2}"),
        ];
        for spec in registry.specs() {
            let dev = snapshot.iter().find(|d| d.key == spec.key);
            match dev {
                Some(dev) => {
                    cols.push(dev.frame_count.to_string());
                    cols.push(if dev.age_secs < 0.0 {
                        String::new()
                    } else {
                        format!("{:.3}", dev.age_secs)
                    });
                    cols.push(dev.status.to_string());
                }
                None => {
                    cols.push("0".to_string());
                    cols.push(String::new());
                    cols.push("NO_DATA".to_string());
                }
            }
        }
        for group in rollups {
            cols.push(group.seen.to_string());
            cols.push(group.missing().to_string());
        }
        cols.join(",")
    }
}
