use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use rsyslox_types::{TimeMode, TimeWindow};

/// Concrete query bounds as RFC3339 UTC strings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Resolve a time window against `now`.
///
/// Relative windows end at `now`; absolute bounds are normalized but never
/// rejected. Blank absolute bounds resolve to `None`.
pub fn resolve(window: &TimeWindow, now: DateTime<Utc>) -> ResolvedWindow {
    match window.mode {
        TimeMode::Relative => {
            let start = now - Duration::seconds(window.relative.as_seconds());
            ResolvedWindow {
                start: Some(format_instant(start)),
                end: Some(format_instant(now)),
            }
        }
        TimeMode::Absolute => ResolvedWindow {
            start: normalize_bound(&window.start),
            end: normalize_bound(&window.end),
        },
    }
}

/// Format as `YYYY-MM-DDTHH:MM:SSZ`, dropping sub-second precision
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Normalize a user-entered bound to RFC3339 UTC.
///
/// `2025-02-15T10:00` (or with a space separator) gains `:00Z`, zone-less values gain `Z`, and values
/// carrying a zone pass through. Nothing is rejected here; malformed
/// bounds are left for the server to report.
pub fn normalize_bound(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let minute_precision = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok());
    if minute_precision {
        return Some(format!("{value}:00Z"));
    }

    if has_zone(value) {
        Some(value.to_string())
    } else {
        Some(format!("{value}Z"))
    }
}

fn has_zone(value: &str) -> bool {
    if value.ends_with(['Z', 'z']) {
        return true;
    }
    // Offsets only count after the time separator; dates contain '-' too
    match value.find(['T', ' ']) {
        Some(idx) => value[idx + 1..].contains(['+', '-']),
        None => false,
    }
}
