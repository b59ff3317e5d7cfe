//! Append-only audit log of journal mutations.
//!
//! Events are appended to a JSONL (JSON Lines) file with file locking
//! so a mixed state after a failed write can be reconciled by hand.

use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What happened
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditKind {
    DaySaved {
        date: NaiveDate,
        slots: usize,
    },
    PatternSaved {
        slots: usize,
    },
    MedicationAdded {
        name: String,
    },
    MedicationRenamed {
        from: String,
        to: String,
        references: usize,
        days: usize,
    },
    MedicationDeleted {
        name: String,
        references: usize,
        days: usize,
    },
    Imported {
        days: usize,
        medications: usize,
        pattern_slots: usize,
    },
    ImportRejected {
        reason: String,
    },
    PartialImport {
        written: Vec<String>,
        failed: Vec<String>,
        reason: String,
    },
    StoreFailure {
        operation: String,
        reason: String,
        recovered_from: String,
    },
}

/// One line of the audit log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub user: String,
    #[serde(flatten)]
    pub kind: AuditKind,
}

impl AuditEvent {
    pub fn new(user: impl Into<String>, kind: AuditKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            user: user.into(),
            kind,
        }
    }
}

/// Audit sink trait for recording events
pub trait AuditSink {
    fn append(&mut self, event: &AuditEvent) -> Result<()>;
}

/// JSONL-based audit sink with file locking
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&mut self, event: &AuditEvent) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended audit event {} to {:?}", event.id, self.path);
        Ok(())
    }
}

/// Read all events from an audit log, oldest first
pub fn read_events(path: &Path) -> Result<Vec<AuditEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<AuditEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse audit event at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} audit events", events.len());
    Ok(events)
}
