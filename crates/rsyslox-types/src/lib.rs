//! Shared types for rsyslox
//!
//! This crate contains data structures used across multiple rsyslox crates:
//! the wire model of the query API and the filter/time state the engine
//! turns into requests.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Syslog Classification (RFC 5424)
// ============================================================================

/// Severity labels indexed by severity value
pub const SEVERITY_LABELS: [&str; 8] = [
    "Emergency",
    "Alert",
    "Critical",
    "Error",
    "Warning",
    "Notice",
    "Info",
    "Debug",
];

/// Facility labels indexed by facility value
pub const FACILITY_LABELS: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron", "authpriv",
    "ftp", "ntp", "audit", "alert", "clock", "local0", "local1", "local2", "local3", "local4",
    "local5", "local6", "local7",
];

/// Human-readable label for a severity value
pub fn severity_label(severity: i64) -> Option<&'static str> {
    usize::try_from(severity)
        .ok()
        .and_then(|i| SEVERITY_LABELS.get(i).copied())
}

/// Human-readable label for a facility value
pub fn facility_label(facility: i64) -> Option<&'static str> {
    usize::try_from(facility)
        .ok()
        .and_then(|i| FACILITY_LABELS.get(i).copied())
}

// ============================================================================
// Log Entries
// ============================================================================

/// Column holding the unique row identifier
pub const ID_COLUMN: &str = "ID";

/// Unique identifier of a stored log row
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub i64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A single log row as returned by the query API.
///
/// Rows are opaque column maps. Only the `ID` column is required; column
/// order is kept as received so exports mirror the server's layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct LogEntry {
    id: LogId,
    columns: Map<String, Value>,
}

impl LogEntry {
    /// Create an entry holding only its `ID` column
    pub fn new(id: i64) -> Self {
        let mut columns = Map::new();
        columns.insert(ID_COLUMN.to_string(), Value::from(id));
        Self {
            id: LogId(id),
            columns,
        }
    }

    /// Add a column (builder style)
    pub fn with_column(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if name == ID_COLUMN {
            if let Some(id) = value.as_i64() {
                self.id = LogId(id);
            }
        }
        self.columns.insert(name.to_string(), value);
        self
    }

    pub fn id(&self) -> LogId {
        self.id
    }

    /// All columns in server order
    pub fn columns(&self) -> &Map<String, Value> {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    fn str_column(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(Value::as_str)
    }

    pub fn severity(&self) -> Option<i64> {
        self.columns.get("Severity").and_then(Value::as_i64)
    }

    pub fn facility(&self) -> Option<i64> {
        self.columns.get("Facility").and_then(Value::as_i64)
    }

    pub fn host(&self) -> Option<&str> {
        self.str_column("FromHost")
    }

    pub fn tag(&self) -> Option<&str> {
        self.str_column("SysLogTag")
    }

    pub fn message(&self) -> &str {
        self.str_column("Message").unwrap_or_default()
    }

    /// Time the store received the entry
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.str_column("ReceivedAt")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Severity label, preferring the server-provided one
    pub fn severity_label(&self) -> &str {
        self.str_column("Severity_Label")
            .or_else(|| self.severity().and_then(severity_label))
            .unwrap_or("?")
    }
}

impl TryFrom<Map<String, Value>> for LogEntry {
    type Error = String;

    fn try_from(columns: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = columns
            .get(ID_COLUMN)
            .and_then(Value::as_i64)
            .ok_or_else(|| format!("log row is missing an integer {ID_COLUMN} column"))?;
        Ok(Self {
            id: LogId(id),
            columns,
        })
    }
}

impl From<LogEntry> for Map<String, Value> {
    fn from(entry: LogEntry) -> Self {
        entry.columns
    }
}

// ============================================================================
// API Responses
// ============================================================================

/// One page of results from the query endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rows: Vec<LogEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Enumerated column value with its label (severity, facility)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaValue {
    pub val: i64,
    pub label: String,
}

/// Distinct values of a column as returned by the metadata endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValues {
    Labeled(Vec<MetaValue>),
    Plain(Vec<Value>),
}

impl MetaValues {
    /// Values as display strings
    pub fn into_strings(self) -> Vec<String> {
        match self {
            Self::Labeled(values) => values.into_iter().map(|v| v.label).collect(),
            Self::Plain(values) => values
                .into_iter()
                .filter(|v| !v.is_null())
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        }
    }

    /// Labeled values; plain lists yield nothing
    pub fn into_labeled(self) -> Vec<MetaValue> {
        match self {
            Self::Labeled(values) => values,
            Self::Plain(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Labeled(values) => values.len(),
            Self::Plain(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of the public health endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub setup_mode: bool,
}

// ============================================================================
// Query State
// ============================================================================

/// Request descriptor for the query endpoint.
///
/// An ordered list of key/value pairs; multi-valued filters appear once per
/// value under the same key (`Severity=3&Severity=4`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, keeping any earlier values for the same key
    pub fn push(&mut self, key: &str, value: impl ToString) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    /// First value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a key, in insertion order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Filters sent to the query API. Non-empty fields are ANDed server-side;
/// members of one field are ORed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub severities: BTreeSet<u8>,
    pub facilities: BTreeSet<u8>,
    pub hosts: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub message: String,
}

impl FilterState {
    /// True when no filter would be transmitted
    pub fn is_empty(&self) -> bool {
        self.severities.is_empty()
            && self.facilities.is_empty()
            && self.hosts.is_empty()
            && self.tags.is_empty()
            && self.message.trim().is_empty()
    }
}

/// Relative time window presets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RelativeDuration {
    /// Last 15 minutes
    Last15m,
    /// Last 1 hour
    #[default]
    Last1h,
    /// Last 6 hours
    Last6h,
    /// Last 24 hours
    Last24h,
    /// Last 7 days
    Last7d,
    /// Last 30 days
    Last30d,
}

impl RelativeDuration {
    pub const ALL: [Self; 6] = [
        Self::Last15m,
        Self::Last1h,
        Self::Last6h,
        Self::Last24h,
        Self::Last7d,
        Self::Last30d,
    ];

    /// Get the number of seconds for this window
    pub fn as_seconds(&self) -> i64 {
        match self {
            Self::Last15m => 15 * 60,
            Self::Last1h => 60 * 60,
            Self::Last6h => 6 * 60 * 60,
            Self::Last24h => 24 * 60 * 60,
            Self::Last7d => 7 * 24 * 60 * 60,
            Self::Last30d => 30 * 24 * 60 * 60,
        }
    }

    /// Get display label for this window
    pub fn label(&self) -> &'static str {
        match self {
            Self::Last15m => "15m",
            Self::Last1h => "1h",
            Self::Last6h => "6h",
            Self::Last24h => "24h",
            Self::Last7d => "7d",
            Self::Last30d => "30d",
        }
    }

    /// Parse a label, falling back to 1h for anything unrecognized
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for RelativeDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.label() == s.trim())
            .ok_or_else(|| format!("unknown duration '{s}' (expected one of 15m, 1h, 6h, 24h, 7d, 30d)"))
    }
}

impl fmt::Display for RelativeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which half of a [`TimeWindow`] is active
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimeMode {
    #[default]
    Relative,
    Absolute,
}

/// Query time window.
///
/// Both the relative preset and the absolute bounds are stored; `mode`
/// selects which one is sent. Switching modes keeps the inactive values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub mode: TimeMode,
    pub relative: RelativeDuration,
    /// User-entered start, e.g. `2025-02-15T10:00`
    pub start: String,
    /// User-entered end
    pub end: String,
}

impl TimeWindow {
    pub fn relative(duration: RelativeDuration) -> Self {
        Self {
            relative: duration,
            ..Self::default()
        }
    }

    pub fn absolute(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            mode: TimeMode::Absolute,
            start: start.into(),
            end: end.into(),
            ..Self::default()
        }
    }
}
