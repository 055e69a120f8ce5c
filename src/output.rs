//! Plain-text rendering of log rows for the terminal

use chrono::{DateTime, Local, Utc};

use rsyslox_client::{HealthStatus, MetaValues};
use rsyslox_logs::LogEntry;
use rsyslox_types::facility_label;

use crate::config::TimeFormat;

const HOST_WIDTH: usize = 16;
const TAG_WIDTH: usize = 16;

/// Format a timestamp in the user's local zone
pub fn format_timestamp(ts: DateTime<Utc>, format: TimeFormat) -> String {
    let local = ts.with_timezone(&Local);
    match format {
        TimeFormat::H24 => local.format("%Y-%m-%d %H:%M:%S").to_string(),
        TimeFormat::H12 => local.format("%Y-%m-%d %I:%M:%S %p").to_string(),
    }
}

/// One line per entry: time, severity, host, tag and message
pub fn format_row(entry: &LogEntry, format: TimeFormat) -> String {
    let time = entry
        .received_at()
        .map(|ts| format_timestamp(ts, format))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{:>8} {} {:<9} {:<hw$} {:<tw$} {}",
        entry.id(),
        time,
        entry.severity_label(),
        truncate(entry.host().unwrap_or("-"), HOST_WIDTH),
        truncate(entry.tag().unwrap_or("-"), TAG_WIDTH),
        single_line(entry.message()),
        hw = HOST_WIDTH,
        tw = TAG_WIDTH,
    )
}

/// Every column of one entry, one per line
pub fn format_detail(entry: &LogEntry) -> String {
    let width = entry.columns().keys().map(|k| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (name, value) in entry.columns() {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        out.push_str(&format!("{name:<width$}  {value}\n"));
    }
    if let Some(facility) = entry.facility().and_then(facility_label) {
        out.push_str(&format!("{:<width$}  {facility}\n", "(facility)"));
    }
    out
}

/// Page footer, e.g. `page 2/7 (98 entries)`
pub fn format_footer(page: u32, total_pages: u32, total: u64) -> String {
    format!("page {page}/{total_pages} ({total} entries)")
}

pub fn format_meta(values: MetaValues) -> Vec<String> {
    match values {
        MetaValues::Labeled(values) => values
            .into_iter()
            .map(|v| format!("{:>3}  {}", v.val, v.label))
            .collect(),
        plain => plain.into_strings(),
    }
}

pub fn format_health(health: &HealthStatus) -> String {
    let mut out = format!("status:   {}\n", health.status);
    if let Some(db) = &health.database {
        out.push_str(&format!("database: {db}\n"));
    }
    if !health.version.is_empty() {
        out.push_str(&format!("version:  {}\n", health.version));
    }
    if health.setup_mode {
        out.push_str("setup mode is active\n");
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
