//! Standard medication pattern: a per-slot template used to pre-fill days.

use crate::types::{DailyRecord, TimeSlot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slot → medication names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardPattern {
    slots: BTreeMap<TimeSlot, Vec<String>>,
}

impl StandardPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: TimeSlot) -> Option<&[String]> {
        self.slots.get(&slot).map(Vec::as_slice)
    }

    /// Set the medications for a slot. An empty list removes the slot.
    pub fn set(&mut self, slot: TimeSlot, medications: Vec<String>) {
        if medications.is_empty() {
            self.slots.remove(&slot);
        } else {
            self.slots.insert(slot, medications);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TimeSlot, &Vec<String>)> {
        self.slots.iter()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut BTreeMap<TimeSlot, Vec<String>> {
        &mut self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Copy of the pattern without empty slots, as it is persisted
    pub fn cleaned(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .filter(|(_, meds)| !meds.is_empty())
                .map(|(slot, meds)| (*slot, meds.clone()))
                .collect(),
        }
    }

    pub fn reference_count(&self, medication: &str) -> usize {
        self.slots
            .values()
            .map(|meds| meds.iter().filter(|m| *m == medication).count())
            .sum()
    }

    /// Pre-fill a day: each pattern slot's entry gets the pattern's
    /// medication list, keeping any value and comment already there.
    ///
    /// Returns the number of slots written.
    pub fn apply_to(&self, record: &mut DailyRecord) -> usize {
        for (slot, meds) in &self.slots {
            record.entry_mut(*slot).medications = meds.clone();
        }
        self.slots.len()
    }
}
