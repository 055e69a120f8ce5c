use serde_json::Value;
use thiserror::Error;

use rsyslox_types::LogEntry;

pub const CSV_FILE_NAME: &str = "rsyslox-logs.csv";
pub const JSON_FILE_NAME: &str = "rsyslox-logs.json";

/// A serialized export ready to be saved or downloaded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub contents: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("export buffer error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize rows as CSV.
///
/// Columns come from the first row. Every cell is quoted; missing and null
/// values are empty. Returns `None` for an empty row list.
pub fn export_csv(rows: &[LogEntry]) -> Result<Option<ExportArtifact>, ExportError> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let columns: Vec<&str> = first.columns().keys().map(String::as_str).collect();

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| cell(row.get(c))))?;
    }
    let contents = writer.into_inner().map_err(|e| e.into_error())?;

    Ok(Some(ExportArtifact {
        file_name: CSV_FILE_NAME,
        mime: "text/csv",
        contents,
    }))
}

/// Serialize rows as pretty-printed JSON. Returns `None` for an empty row
/// list.
pub fn export_json(rows: &[LogEntry]) -> Result<Option<ExportArtifact>, ExportError> {
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(ExportArtifact {
        file_name: JSON_FILE_NAME,
        mime: "application/json",
        contents: serde_json::to_vec_pretty(rows)?,
    }))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
