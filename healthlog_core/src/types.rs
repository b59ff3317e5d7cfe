//! Core domain types for the health journal.
//!
//! This module defines the time-indexed record store:
//! - Time slots (fixed half-hour labels, 08:00 through 23:30)
//! - Slot entries (value, medications, comment)
//! - Daily records and the full health log

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Time Slots
// ============================================================================

const FIRST_SLOT_HOUR: u16 = 8;
const LAST_SLOT_HOUR: u16 = 23;
const SLOT_MINUTES: u16 = 30;

/// A half-hour time-of-day label, stored as minutes since midnight
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u16);

impl TimeSlot {
    /// Every valid slot in chronological order
    pub fn all() -> impl Iterator<Item = TimeSlot> {
        let first = FIRST_SLOT_HOUR * 60;
        let last = LAST_SLOT_HOUR * 60 + SLOT_MINUTES;
        (first..=last).step_by(SLOT_MINUTES as usize).map(TimeSlot)
    }

    /// Parse a `HH:MM` label, rejecting anything outside the enumerated set
    pub fn parse(label: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("invalid time slot '{}'", label));

        let (h, m) = label.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;

        if !(FIRST_SLOT_HOUR..=LAST_SLOT_HOUR).contains(&hour)
            || (minute != 0 && minute != SLOT_MINUTES)
        {
            return Err(invalid());
        }

        Ok(TimeSlot(hour * 60 + minute))
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    pub fn minute(&self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TimeSlot::parse(s)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        TimeSlot::parse(&label).map_err(serde::de::Error::custom)
    }
}

/// Parse an ISO `YYYY-MM-DD` date. Unpadded or signed forms are rejected.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("invalid date '{}': {}", s, e)))?;
    if s.len() != 10 || date.format("%Y-%m-%d").to_string() != s {
        return Err(Error::Validation(format!(
            "invalid date '{}': expected YYYY-MM-DD",
            s
        )));
    }
    Ok(date)
}

// ============================================================================
// Slot Entries
// ============================================================================

/// One measurement/event at one slot on one date
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotEntry {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default, rename = "comments")]
    pub comment: String,
}

impl TimeSlotEntry {
    pub fn new(value: Option<f64>, medications: Vec<String>, comment: impl Into<String>) -> Self {
        Self {
            value,
            medications,
            comment: comment.into(),
        }
    }

    /// Reject values JSON cannot carry (NaN, infinities)
    pub fn validate(&self) -> Result<()> {
        match self.value {
            Some(v) if !v.is_finite() => Err(Error::Validation(format!(
                "value must be a finite number, got {}",
                v
            ))),
            _ => Ok(()),
        }
    }

    /// An entry with nothing recorded is equivalent to an absent key
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.medications.is_empty() && self.comment.trim().is_empty()
    }
}

// ============================================================================
// Daily Records
// ============================================================================

/// All entries for one calendar date, keyed by slot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyRecord {
    entries: BTreeMap<TimeSlot, TimeSlotEntry>,
}

impl DailyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: TimeSlot) -> Option<&TimeSlotEntry> {
        self.entries.get(&slot)
    }

    /// Replace the entry at `slot` wholesale
    pub fn set(&mut self, slot: TimeSlot, entry: TimeSlotEntry) {
        self.entries.insert(slot, entry);
    }

    pub fn clear(&mut self, slot: TimeSlot) -> Option<TimeSlotEntry> {
        self.entries.remove(&slot)
    }

    /// Entry for `slot`, created empty if absent
    pub fn entry_mut(&mut self, slot: TimeSlot) -> &mut TimeSlotEntry {
        self.entries.entry(slot).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TimeSlot, &TimeSlotEntry)> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut TimeSlotEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries that carry no data
    pub fn compact(&mut self) {
        self.entries.retain(|_, entry| !entry.is_empty());
    }

    /// Whether any slot holds a value, a medication or a comment
    pub fn has_data(&self) -> bool {
        self.entries.values().any(|entry| !entry.is_empty())
    }

    /// Chronological `(slot, value)` pairs for slots with a numeric value
    pub fn series(&self) -> Vec<(TimeSlot, f64)> {
        self.entries
            .iter()
            .filter_map(|(slot, entry)| entry.value.map(|v| (*slot, v)))
            .collect()
    }
}

// ============================================================================
// Health Log
// ============================================================================

/// Every daily record, keyed by date
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HealthLog {
    days: BTreeMap<NaiveDate, DailyRecord>,
}

impl<'de> Deserialize<'de> for HealthLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, DailyRecord>::deserialize(deserializer)?;
        let mut days = BTreeMap::new();
        for (key, record) in raw {
            let date = parse_date(&key).map_err(serde::de::Error::custom)?;
            days.insert(date, record);
        }
        Ok(HealthLog { days })
    }
}

impl HealthLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.days.get(&date)
    }

    /// Record for `date`, created on first write
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DailyRecord {
        self.days.entry(date).or_default()
    }

    pub fn insert(&mut self, date: NaiveDate, record: DailyRecord) {
        self.days.insert(date, record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DailyRecord)> {
        self.days.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NaiveDate, &mut DailyRecord)> {
        self.days.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of medication references across every entry
    pub fn reference_count(&self, medication: &str) -> usize {
        self.days
            .values()
            .flat_map(|day| day.iter())
            .map(|(_, entry)| entry.medications.iter().filter(|m| *m == medication).count())
            .sum()
    }
}
