//! Import/export codec for the full journal bundle.
//!
//! The bundle is a JSON object with exactly three keys:
//!
//! ```text
//! {
//!   "healthData":      { "2024-01-01": { "08:00": { "value": 5, "medications": [...], "comments": "" } } },
//!   "medications":     ["Ibuprofen", "Paracetamol"],
//!   "standardPattern": { "20:00": ["Ibuprofen"] }
//! }
//! ```
//!
//! Files use pretty JSON. The clipboard token is the minified JSON, base64
//! encoded.

use crate::catalog::MedicationCatalog;
use crate::engine::Journal;
use crate::pattern::StandardPattern;
use crate::types::HealthLog;
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

const KEY_HEALTH_DATA: &str = "healthData";
const KEY_MEDICATIONS: &str = "medications";
const KEY_STANDARD_PATTERN: &str = "standardPattern";

/// Snapshot of everything a user owns
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "healthData")]
    pub health_log: HealthLog,
    #[serde(rename = "medications")]
    pub catalog: MedicationCatalog,
    #[serde(rename = "standardPattern")]
    pub pattern: StandardPattern,
}

impl Bundle {
    pub fn from_journal(journal: &Journal) -> Self {
        Self {
            health_log: journal.health_log.clone(),
            catalog: journal.catalog.clone(),
            pattern: journal.pattern.clone(),
        }
    }

    pub fn into_journal(self) -> Journal {
        Journal::new(self.health_log, self.catalog, self.pattern)
    }
}

/// Exact snapshot of the journal
pub fn export(journal: &Journal) -> Bundle {
    Bundle::from_journal(journal)
}

/// Pretty JSON, as written to export files
pub fn to_pretty_json(bundle: &Bundle) -> Result<String> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

/// Minified JSON, the token payload
pub fn to_compact_json(bundle: &Bundle) -> Result<String> {
    Ok(serde_json::to_string(bundle)?)
}

/// Parse and validate a bundle from JSON text
///
/// Checks, in order: the text is a JSON object; all three keys are
/// present; each key has the expected shape; the catalog has no blank or
/// duplicate names. Unknown top-level keys are ignored with a warning.
pub fn parse_bundle(text: &str) -> Result<Bundle> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Validation(format!("bundle is not valid JSON: {}", e)))?;
    validate_bundle(value)
}

/// Validate an already-parsed JSON value as a bundle
pub fn validate_bundle(value: Value) -> Result<Bundle> {
    let Value::Object(mut map) = value else {
        return Err(Error::Validation("bundle must be a JSON object".into()));
    };

    let missing: Vec<&str> = [KEY_HEALTH_DATA, KEY_MEDICATIONS, KEY_STANDARD_PATTERN]
        .into_iter()
        .filter(|key| !map.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "bundle is missing required keys: {}",
            missing.join(", ")
        )));
    }

    let health_log: HealthLog = take_field(&mut map, KEY_HEALTH_DATA)?;
    let catalog: MedicationCatalog = take_field(&mut map, KEY_MEDICATIONS)?;
    let pattern: StandardPattern = take_field(&mut map, KEY_STANDARD_PATTERN)?;

    for extra in map.keys() {
        tracing::warn!("Ignoring unknown bundle key '{}'", extra);
    }

    let errors = catalog.validate();
    if !errors.is_empty() {
        return Err(Error::Validation(format!(
            "{}: {}",
            KEY_MEDICATIONS,
            errors.join("; ")
        )));
    }

    tracing::debug!(
        "Validated bundle: {} days, {} medications, {} pattern slots",
        health_log.len(),
        catalog.len(),
        pattern.len()
    );

    Ok(Bundle {
        health_log,
        catalog,
        pattern,
    })
}

fn take_field<T: DeserializeOwned>(map: &mut serde_json::Map<String, Value>, key: &str) -> Result<T> {
    let value = map.remove(key).unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| Error::Validation(format!("{}: {}", key, e)))
}

/// Encode a bundle as a printable clipboard token
pub fn encode_token(bundle: &Bundle) -> Result<String> {
    let json = to_compact_json(bundle)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Decode a token back to the exact JSON text it was built from
pub fn decode_token_text(token: &str) -> Result<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("token is empty".into()));
    }
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| Error::Validation(format!("token is not valid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Validation(format!("token is not valid UTF-8: {}", e)))
}

/// Decode and validate a clipboard token
pub fn decode_token(token: &str) -> Result<Bundle> {
    parse_bundle(&decode_token_text(token)?)
}

/// Default export file name for a given day
pub fn export_file_name(date: NaiveDate) -> String {
    format!("health_monitor_data_{}.json", date.format("%Y-%m-%d"))
}

/// Write a pretty JSON export file
pub fn write_export_file(bundle: &Bundle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_pretty_json(bundle)?)?;
    tracing::info!("Exported bundle to {:?}", path);
    Ok(())
}

/// Read and validate an export file
pub fn read_export_file(path: &Path) -> Result<Bundle> {
    let contents = std::fs::read_to_string(path)?;
    parse_bundle(&contents)
}
