//! Consistency engine for medication catalog mutations.
//!
//! A [`Journal`] holds the three user entities (health log, medication
//! catalog, standard pattern). Renaming or deleting a medication rewrites
//! every reference to it so that no record or pattern slot ever names a
//! medication missing from the catalog:
//!
//! - **rename**: each occurrence is replaced in place, keeping list length
//!   and order. Duplicates that result are left as they are.
//! - **delete**: each occurrence is removed. Slot entries survive with an
//!   empty list (they may still hold a value or comment); pattern slots
//!   whose list becomes empty are removed.
//!
//! All operations are synchronous and in-memory. Precondition violations
//! return [`Error::Precondition`] before anything is touched.

use crate::catalog::MedicationCatalog;
use crate::pattern::StandardPattern;
use crate::types::{HealthLog, TimeSlot};
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;

/// Display policy for the catalog after a mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogPolicy {
    /// Keep the catalog sorted ascending after add/rename/delete
    pub sort_after_mutation: bool,
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        Self {
            sort_after_mutation: true,
        }
    }
}

/// Summary of what a catalog mutation changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Dates whose daily record was modified
    pub touched_dates: BTreeSet<NaiveDate>,
    /// Slot entries modified across all dates
    pub entries_rewritten: usize,
    /// Individual medication references replaced or removed
    pub references_rewritten: usize,
    /// Pattern slots whose list was modified (including removed ones)
    pub pattern_slots_rewritten: usize,
    /// Pattern slots removed because their list became empty
    pub pattern_slots_removed: usize,
    /// Whether the catalog itself changed
    pub catalog_changed: bool,
}

impl Propagation {
    pub fn pattern_changed(&self) -> bool {
        self.pattern_slots_rewritten > 0
    }

    pub fn is_noop(&self) -> bool {
        !self.catalog_changed && self.touched_dates.is_empty() && !self.pattern_changed()
    }
}

/// Where a medication reference lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceLocation {
    Record { date: NaiveDate, slot: TimeSlot },
    Pattern { slot: TimeSlot },
}

impl fmt::Display for ReferenceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceLocation::Record { date, slot } => write!(f, "{} {}", date, slot),
            ReferenceLocation::Pattern { slot } => write!(f, "pattern {}", slot),
        }
    }
}

/// A medication reference whose name is not in the catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DanglingReference {
    pub location: ReferenceLocation,
    pub name: String,
}

/// The complete state of one user's journal
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Journal {
    pub(crate) health_log: HealthLog,
    pub(crate) catalog: MedicationCatalog,
    pub(crate) pattern: StandardPattern,
    policy: CatalogPolicy,
}

impl Journal {
    pub fn new(health_log: HealthLog, catalog: MedicationCatalog, pattern: StandardPattern) -> Self {
        Self {
            health_log,
            catalog,
            pattern,
            policy: CatalogPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CatalogPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CatalogPolicy {
        self.policy
    }

    pub fn health_log(&self) -> &HealthLog {
        &self.health_log
    }

    pub fn catalog(&self) -> &MedicationCatalog {
        &self.catalog
    }

    pub fn pattern(&self) -> &StandardPattern {
        &self.pattern
    }

    /// Add a medication to the catalog. No-op if already present.
    ///
    /// Returns whether the catalog changed.
    pub fn add_medication(&mut self, name: &str) -> Result<bool> {
        let name = normalize_name(name)?;
        let inserted = self.catalog.insert(name.to_string());
        if inserted {
            self.apply_sort_policy();
            tracing::info!("Added medication '{}'", name);
        } else {
            tracing::debug!("Medication '{}' already in catalog", name);
        }
        Ok(inserted)
    }

    /// Rename a medication everywhere it is referenced
    ///
    /// If `new_name` is already in the catalog the two catalog entries
    /// merge into one; references are rewritten but never deduplicated.
    pub fn rename_medication(&mut self, old_name: &str, new_name: &str) -> Result<Propagation> {
        let new_name = normalize_name(new_name)?;
        let index = self.catalog.position(old_name).ok_or_else(|| {
            Error::Precondition(format!("cannot rename unknown medication '{}'", old_name))
        })?;

        if old_name == new_name {
            return Ok(Propagation::default());
        }

        if self.catalog.contains(new_name) {
            tracing::warn!(
                "Renaming '{}' onto existing medication '{}'; merging catalog entries",
                old_name,
                new_name
            );
            self.catalog.remove(old_name);
        } else {
            self.catalog.replace_at(index, new_name.to_string());
        }
        self.apply_sort_policy();

        let mut report = Propagation {
            catalog_changed: true,
            ..Default::default()
        };

        for (date, day) in self.health_log.iter_mut() {
            for entry in day.entries_mut() {
                let replaced = replace_all(&mut entry.medications, old_name, new_name);
                if replaced > 0 {
                    report.touched_dates.insert(*date);
                    report.entries_rewritten += 1;
                    report.references_rewritten += replaced;
                }
            }
        }

        for meds in self.pattern.slots_mut().values_mut() {
            let replaced = replace_all(meds, old_name, new_name);
            if replaced > 0 {
                report.pattern_slots_rewritten += 1;
                report.references_rewritten += replaced;
            }
        }

        tracing::info!(
            "Renamed medication '{}' -> '{}': {} references in {} days, {} pattern slots",
            old_name,
            new_name,
            report.references_rewritten,
            report.touched_dates.len(),
            report.pattern_slots_rewritten
        );

        Ok(report)
    }

    /// Delete a medication and every reference to it
    pub fn delete_medication(&mut self, name: &str) -> Result<Propagation> {
        if !self.catalog.contains(name) {
            return Err(Error::Precondition(format!(
                "cannot delete unknown medication '{}'",
                name
            )));
        }

        self.catalog.remove(name);
        self.apply_sort_policy();

        let mut report = Propagation {
            catalog_changed: true,
            ..Default::default()
        };

        for (date, day) in self.health_log.iter_mut() {
            for entry in day.entries_mut() {
                let removed = remove_all(&mut entry.medications, name);
                if removed > 0 {
                    report.touched_dates.insert(*date);
                    report.entries_rewritten += 1;
                    report.references_rewritten += removed;
                }
            }
        }

        let slots = self.pattern.slots_mut();
        for meds in slots.values_mut() {
            let removed = remove_all(meds, name);
            if removed > 0 {
                report.pattern_slots_rewritten += 1;
                report.references_rewritten += removed;
            }
        }
        let before = slots.len();
        slots.retain(|_, meds| !meds.is_empty());
        report.pattern_slots_removed = before - slots.len();

        tracing::info!(
            "Deleted medication '{}': {} references in {} days, {} pattern slots ({} removed)",
            name,
            report.references_rewritten,
            report.touched_dates.len(),
            report.pattern_slots_rewritten,
            report.pattern_slots_removed
        );

        Ok(report)
    }

    /// Every reference to a name absent from the catalog
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();

        for (date, day) in self.health_log.iter() {
            for (slot, entry) in day.iter() {
                for name in &entry.medications {
                    if !self.catalog.contains(name) {
                        dangling.push(DanglingReference {
                            location: ReferenceLocation::Record {
                                date: *date,
                                slot: *slot,
                            },
                            name: name.clone(),
                        });
                    }
                }
            }
        }

        for (slot, meds) in self.pattern.iter() {
            for name in meds {
                if !self.catalog.contains(name) {
                    dangling.push(DanglingReference {
                        location: ReferenceLocation::Pattern { slot: *slot },
                        name: name.clone(),
                    });
                }
            }
        }

        dangling
    }

    /// References to `name` across records and pattern
    pub fn reference_count(&self, name: &str) -> usize {
        self.health_log.reference_count(name) + self.pattern.reference_count(name)
    }

    fn apply_sort_policy(&mut self) {
        if self.policy.sort_after_mutation {
            self.catalog.sort();
        }
    }
}

fn normalize_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Precondition("medication name is empty".into()));
    }
    Ok(trimmed)
}

fn replace_all(meds: &mut [String], from: &str, to: &str) -> usize {
    let mut count = 0;
    for med in meds.iter_mut().filter(|m| *m == from) {
        *med = to.to_string();
        count += 1;
    }
    count
}

fn remove_all(meds: &mut Vec<String>, name: &str) -> usize {
    let before = meds.len();
    meds.retain(|m| m != name);
    before - meds.len()
}
