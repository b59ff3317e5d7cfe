//! CSV report of the health log, one row per recorded slot.
//!
//! Export only: the JSON bundle remains the import/export contract.

use crate::types::HealthLog;
use crate::Result;
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CsvRow {
    pub date: String,
    pub slot: String,
    pub value: Option<f64>,
    pub medications: String,
    pub comments: String,
}

/// Flatten the log into rows, ordered by date then slot
pub fn rows(log: &HealthLog) -> Vec<CsvRow> {
    log.iter()
        .flat_map(|(date, day)| {
            day.iter().map(move |(slot, entry)| CsvRow {
                date: date.format("%Y-%m-%d").to_string(),
                slot: slot.to_string(),
                value: entry.value,
                medications: entry.medications.join("; "),
                comments: entry.comment.clone(),
            })
        })
        .collect()
}

/// Write the report to `path`, replacing any previous report
///
/// Returns the number of rows written.
pub fn write_csv_report(log: &HealthLog, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    let rows = rows(log);
    for row in &rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(rows.len())
}
