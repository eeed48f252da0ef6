//! Console formatting: device tables, periodic summaries, warnings.
//!
//! Everything here is pure string building; the bridge decides when to
//! print. Warnings are emitted from the periodic tick, never per frame,
//! so a dead bus cannot flood the console.

use time::format_description;
use time::OffsetDateTime;

use crate::decode::DeviceKey;
use crate::groups::GroupRollup;
use crate::registry::{device_type_name, manufacturer_name};
use crate::tracker::{DeviceSnapshot, Status};

#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Columns never grow wider than this; longer cells wrap.
    pub max_col_width: usize,
    /// Wrapped cells get at most this many lines, then an ellipsis.
    pub max_cell_lines: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_col_width: 24,
            max_cell_lines: 2,
        }
    }
}

/// Render rows under headers, sizing each column to its widest cell
/// (bounded by the wrap policy).
pub fn render_table(headers: &[&str], rows: &[Vec<String>], opts: &TableOptions) -> String {
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            let longest = cell.chars().count().min(opts.max_col_width);
            if longest > widths[i] {
                widths[i] = longest;
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, headers.iter().map(|h| vec![h.to_string()]), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        let cells: Vec<Vec<String>> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| wrap_cell(cell, widths.get(i).copied().unwrap_or(8), opts))
            .collect();
        push_line(&mut out, cells.into_iter(), &widths);
    }
    out
}

fn push_line(out: &mut String, cells: impl Iterator<Item = Vec<String>>, widths: &[usize]) {
    let cells: Vec<Vec<String>> = cells.collect();
    let height = cells.iter().map(Vec::len).max().unwrap_or(1);
    for line in 0..height {
        let mut parts = Vec::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            let text = cell.get(line).map(String::as_str).unwrap_or("");
            let width = widths.get(i).copied().unwrap_or(0);
            parts.push(format!("{text:<width$}"));
        }
        out.push_str(parts.join("  ").trim_end());
        out.push('\n');
    }
}

/// Split one cell into display lines of at most `width` chars, bounded
/// by the line budget; the final line is ellipsis-truncated when the
/// cell would need more.
fn wrap_cell(cell: &str, width: usize, opts: &TableOptions) -> Vec<String> {
    let chars: Vec<char> = cell.chars().collect();
    if chars.len() <= width {
        return vec![cell.to_string()];
    }
    let mut lines: Vec<String> = chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect();
    if lines.len() > opts.max_cell_lines {
        lines.truncate(opts.max_cell_lines);
        if let Some(last) = lines.last_mut() {
            let mut kept: String = last.chars().take(width.saturating_sub(1)).collect();
            kept.push('…');
            *last = kept;
        }
    }
    lines
}

fn age_text(age_secs: f64) -> String {
    if age_secs < 0.0 {
        "n/a".to_string()
    } else {
        format!("{age_secs:.2}s")
    }
}

/// HH:MM:SS wall-clock text for warning and summary stamps.
pub fn clock(now_epoch: f64) -> String {
    let ts = OffsetDateTime::from_unix_timestamp(now_epoch as i64)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let fmt = match format_description::parse("[hour]:[minute]:[second]") {
        Ok(f) => f,
        Err(_) => return String::new(),
    };
    ts.format(&fmt).unwrap_or_default()
}

/// The single-line-per-device tabular view.
pub fn device_table(snapshot: &[DeviceSnapshot], opts: &TableOptions) -> String {
    let headers = ["id", "label", "mfg", "type", "status", "age", "count"];
    let rows: Vec<Vec<String>> = snapshot
        .iter()
        .map(|dev| {
            vec![
                dev.key.instance.to_string(),
                dev.label.clone(),
                format!(
                    "{} {}",
                    dev.key.manufacturer,
                    manufacturer_name(dev.key.manufacturer)
                ),
                format!(
                    "{} {}",
                    dev.key.device_type,
                    device_type_name(dev.key.device_type)
                ),
                dev.status.to_string(),
                age_text(dev.age_secs),
                dev.frame_count.to_string(),
            ]
        })
        .collect();
    render_table(&headers, &rows, opts)
}

/// The periodic summary block: title, pit-check line, device table,
/// group rollups.
pub fn summary(
    title: &str,
    snapshot: &[DeviceSnapshot],
    rollups: &[GroupRollup],
    bus_errors: u64,
    frames_per_sec: f64,
    errors_per_sec: f64,
    now_epoch: f64,
    opts: &TableOptions,
) -> String {
    let missing = snapshot
        .iter()
        .filter(|d| d.status != Status::Ok)
        .count();
    let total = snapshot.len();
    let mut out = format!("{title} @ {}\n", clock(now_epoch));
    out.push_str(&format!(
        "  Pit check: seen={}/{} missing={} errors={} frames/s={:.1} errors/s={:.2}\n",
        total - missing,
        total,
        missing,
        bus_errors,
        frames_per_sec,
        errors_per_sec
    ));
    for line in device_table(snapshot, opts).lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    for group in rollups {
        out.push_str(&format!(
            "  Group {}: seen={}/{} missing={}\n",
            group.name,
            group.seen,
            group.total,
            group.missing()
        ));
    }
    out
}

pub fn no_traffic_warning(now_epoch: f64) -> String {
    format!("No CAN traffic detected as of {}.", clock(now_epoch))
}

pub fn store_down_warning(now_epoch: f64) -> String {
    format!(
        "Not connected to the telemetry store as of {}.",
        clock(now_epoch)
    )
}

/// One line for a device coming back after silence or staleness.
pub fn device_seen_line(key: DeviceKey, frame_count: u64) -> String {
    format!(
        "Device seen: mfg={} type={} id={} count={}",
        key.manufacturer, key.device_type, key.instance, frame_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_row(label: &str, status: Status, age: f64, count: u64) -> DeviceSnapshot {
        DeviceSnapshot {
            key: DeviceKey::new(5, 2, 10),
            label: label.to_string(),
            declared: true,
            status,
            age_secs: age,
            frame_count: count,
            last_seen: None,
        }
    }

    #[test]
    fn columns_size_to_widest_cell() {
        let opts = TableOptions::default();
        let out = render_table(
            &["id", "label"],
            &[
                vec!["10".into(), "FR NEO".into()],
                vec!["1".into(), "x".into()],
            ],
            &opts,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "id  label");
        assert_eq!(lines[1], "--  ------");
        assert_eq!(lines[2], "10  FR NEO");
        assert_eq!(lines[3], "1   x");
    }

    #[test]
    fn long_cells_wrap_onto_bounded_lines() {
        let opts = TableOptions {
            max_col_width: 4,
            max_cell_lines: 2,
        };
        let out = render_table(&["v"], &[vec!["abcdefgh".into()]], &opts);
        let lines: Vec<&str> = out.lines().collect();
        // header, rule, two wrapped lines
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "abcd");
        assert_eq!(lines[3], "efgh");
    }

    #[test]
    fn over_budget_cells_truncate_with_ellipsis() {
        let opts = TableOptions {
            max_col_width: 4,
            max_cell_lines: 2,
        };
        let out = render_table(&["v"], &[vec!["abcdefghij".into()]], &opts);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "efg…");
    }

    #[test]
    fn age_formats_sentinel_and_seconds() {
        assert_eq!(age_text(-1.0), "n/a");
        assert_eq!(age_text(0.105), "0.10s");
    }

    #[test]
    fn summary_counts_missing_and_prints_groups() {
        let snapshot = vec![
            snapshot_row("FR NEO", Status::Ok, 0.1, 5),
            snapshot_row("FL NEO", Status::NoData, -1.0, 0),
        ];
        let rollups = vec![GroupRollup {
            name: "neos".to_string(),
            seen: 1,
            total: 2,
        }];
        let out = summary(
            "Summary",
            &snapshot,
            &rollups,
            3,
            4.0,
            0.0,
            0.0,
            &TableOptions::default(),
        );
        assert!(out.contains("Pit check: seen=1/2 missing=1 errors=3"));
        assert!(out.contains("Group neos: seen=1/2 missing=1"));
        assert!(out.contains("frames/s=4.0"));
    }

    #[test]
    fn warnings_carry_a_clock_stamp() {
        let line = no_traffic_warning(3661.0);
        assert_eq!(line, "No CAN traffic detected as of 01:01:01.");
    }
}
