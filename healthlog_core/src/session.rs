//! Journal session: one user's journal bound to a store.
//!
//! Mutations are optimistic. The in-memory [`Journal`] changes first, then
//! the affected entities are written (touched dates, then pattern, then
//! catalog). When a write fails the session reloads from the store; if the
//! reload fails too it falls back to the snapshot taken before the
//! mutation. Either way the original error is returned and the session
//! never holds state the store did not confirm.

use crate::audit::{AuditEvent, AuditKind, AuditSink};
use crate::codec::Bundle;
use crate::engine::{CatalogPolicy, Journal, Propagation};
use crate::pattern::StandardPattern;
use crate::store::{JournalStore, UserId};
use crate::types::{DailyRecord, TimeSlot, TimeSlotEntry};
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Entities a mutation needs written back
#[derive(Debug, Default)]
struct Writes {
    dates: BTreeSet<NaiveDate>,
    pattern: bool,
    catalog: bool,
}

impl Writes {
    fn day(date: NaiveDate) -> Self {
        Self {
            dates: BTreeSet::from([date]),
            ..Default::default()
        }
    }

    fn from_propagation(report: &Propagation) -> Self {
        Self {
            dates: report.touched_dates.clone(),
            pattern: report.pattern_changed(),
            catalog: report.catalog_changed,
        }
    }
}

pub struct JournalSession<S: JournalStore> {
    store: S,
    user: UserId,
    journal: Journal,
    audit: Option<Box<dyn AuditSink>>,
}

impl<S: JournalStore> JournalSession<S> {
    /// Load the user's bundle and start a session
    pub fn open(store: S, user: UserId, policy: CatalogPolicy) -> Result<Self> {
        let journal = store.load_all(&user)?.into_journal().with_policy(policy);
        tracing::debug!(
            "Opened session for {}: {} days, {} medications",
            user,
            journal.health_log.len(),
            journal.catalog.len()
        );
        Ok(Self {
            store,
            user,
            journal,
            audit: None,
        })
    }

    pub fn with_audit(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// End the session and hand the store back
    pub fn logout(mut self) -> Result<S> {
        self.store.logout(&self.user)?;
        Ok(self.store)
    }

    /// Replace a whole day. Entries with no data are dropped; the date
    /// itself is kept even when nothing remains.
    pub fn save_day(&mut self, date: NaiveDate, mut record: DailyRecord) -> Result<()> {
        for (_, entry) in record.iter() {
            self.check_entry(entry)?;
        }
        record.compact();
        let slots = record.len();

        self.commit("save_day", |journal| {
            journal.health_log.insert(date, record);
            Ok(((), Writes::day(date)))
        })?;

        tracing::info!("Saved {} with {} slots", date, slots);
        self.record(AuditKind::DaySaved { date, slots });
        Ok(())
    }

    /// Write one slot. An empty entry clears the slot.
    pub fn set_slot(&mut self, date: NaiveDate, slot: TimeSlot, entry: TimeSlotEntry) -> Result<()> {
        self.check_entry(&entry)?;

        let slots = self.commit("set_slot", |journal| {
            let day = journal.health_log.day_mut(date);
            if entry.is_empty() {
                day.clear(slot);
            } else {
                day.set(slot, entry);
            }
            Ok((day.len(), Writes::day(date)))
        })?;

        self.record(AuditKind::DaySaved { date, slots });
        Ok(())
    }

    /// Remove one slot's entry. Returns false when there was nothing to clear.
    pub fn clear_slot(&mut self, date: NaiveDate, slot: TimeSlot) -> Result<bool> {
        let present = self
            .journal
            .health_log
            .day(date)
            .is_some_and(|day| day.get(slot).is_some());
        if !present {
            tracing::debug!("Nothing recorded at {} {}", date, slot);
            return Ok(false);
        }

        let slots = self.commit("clear_slot", |journal| {
            let day = journal.health_log.day_mut(date);
            day.clear(slot);
            Ok((day.len(), Writes::day(date)))
        })?;

        self.record(AuditKind::DaySaved { date, slots });
        Ok(true)
    }

    /// Pre-fill a day from the standard pattern
    ///
    /// Returns the number of slots written.
    pub fn apply_pattern(&mut self, date: NaiveDate) -> Result<usize> {
        if self.journal.pattern.is_empty() {
            tracing::info!("Standard pattern is empty; nothing to apply to {}", date);
            return Ok(0);
        }

        let (written, slots) = self.commit("apply_pattern", |journal| {
            let day = journal.health_log.day_mut(date);
            let written = journal.pattern.apply_to(day);
            Ok(((written, day.len()), Writes::day(date)))
        })?;

        tracing::info!("Applied standard pattern to {} ({} slots)", date, written);
        self.record(AuditKind::DaySaved { date, slots });
        Ok(written)
    }

    /// Replace the standard pattern. Empty slots are dropped.
    pub fn save_pattern(&mut self, pattern: StandardPattern) -> Result<()> {
        for (_, meds) in pattern.iter() {
            self.check_known(meds)?;
        }
        let pattern = pattern.cleaned();
        let slots = pattern.len();

        self.commit("save_pattern", |journal| {
            journal.pattern = pattern;
            Ok((
                (),
                Writes {
                    pattern: true,
                    ..Default::default()
                },
            ))
        })?;

        tracing::info!("Saved standard pattern with {} slots", slots);
        self.record(AuditKind::PatternSaved { slots });
        Ok(())
    }

    pub fn add_medication(&mut self, name: &str) -> Result<bool> {
        let added = self.commit("add_medication", |journal| {
            let added = journal.add_medication(name)?;
            Ok((
                added,
                Writes {
                    catalog: added,
                    ..Default::default()
                },
            ))
        })?;

        if added {
            self.record(AuditKind::MedicationAdded {
                name: name.trim().to_string(),
            });
        }
        Ok(added)
    }

    pub fn rename_medication(&mut self, old_name: &str, new_name: &str) -> Result<Propagation> {
        let report = self.commit("rename_medication", |journal| {
            let report = journal.rename_medication(old_name, new_name)?;
            let writes = Writes::from_propagation(&report);
            Ok((report, writes))
        })?;

        if !report.is_noop() {
            self.record(AuditKind::MedicationRenamed {
                from: old_name.to_string(),
                to: new_name.trim().to_string(),
                references: report.references_rewritten,
                days: report.touched_dates.len(),
            });
        }
        Ok(report)
    }

    pub fn delete_medication(&mut self, name: &str) -> Result<Propagation> {
        let report = self.commit("delete_medication", |journal| {
            let report = journal.delete_medication(name)?;
            let writes = Writes::from_propagation(&report);
            Ok((report, writes))
        })?;

        self.record(AuditKind::MedicationDeleted {
            name: name.to_string(),
            references: report.references_rewritten,
            days: report.touched_dates.len(),
        });
        Ok(report)
    }

    pub fn export_bundle(&self) -> Bundle {
        Bundle::from_journal(&self.journal)
    }

    /// Overwrite everything with a validated bundle
    ///
    /// References missing from the bundle's own catalog are accepted with a
    /// warning unless `reject_dangling` is set.
    pub fn import_bundle(&mut self, mut bundle: Bundle, reject_dangling: bool) -> Result<()> {
        let errors = bundle.catalog.validate();
        if !errors.is_empty() {
            let reason = format!("medications: {}", errors.join("; "));
            self.record(AuditKind::ImportRejected {
                reason: reason.clone(),
            });
            return Err(Error::Validation(reason));
        }
        bundle.pattern = bundle.pattern.cleaned();

        let policy = self.journal.policy();
        let candidate = bundle.clone().into_journal().with_policy(policy);
        let dangling = candidate.dangling_references();
        if !dangling.is_empty() {
            let sample: Vec<String> = dangling
                .iter()
                .take(3)
                .map(|d| format!("'{}' at {}", d.name, d.location))
                .collect();
            if reject_dangling {
                let reason = format!(
                    "{} references to medications not in the list, e.g. {}",
                    dangling.len(),
                    sample.join(", ")
                );
                self.record(AuditKind::ImportRejected {
                    reason: reason.clone(),
                });
                return Err(Error::Validation(reason));
            }
            tracing::warn!(
                "Importing {} references to medications not in the list, e.g. {}",
                dangling.len(),
                sample.join(", ")
            );
        }

        let snapshot = self.journal.clone();
        if let Err(e) = self.store.replace_all(&self.user, &bundle) {
            if let Error::PartialImport {
                written,
                failed,
                reason,
            } = &e
            {
                self.record(AuditKind::PartialImport {
                    written: written.clone(),
                    failed: failed.clone(),
                    reason: reason.clone(),
                });
                self.recover("import", snapshot, &e);
                return Err(e);
            }
            self.recover("import", snapshot, &e);
            return Err(Error::persistence("import", e));
        }

        self.journal = candidate;
        tracing::info!(
            "Imported {} days, {} medications, {} pattern slots for {}",
            bundle.health_log.len(),
            bundle.catalog.len(),
            bundle.pattern.len(),
            self.user
        );
        self.record(AuditKind::Imported {
            days: bundle.health_log.len(),
            medications: bundle.catalog.len(),
            pattern_slots: bundle.pattern.len(),
        });
        Ok(())
    }

    /// Record an import that failed validation before reaching the session
    pub fn reject_import(&mut self, error: &Error) {
        tracing::warn!("Rejected import for {}: {}", self.user, error);
        self.record(AuditKind::ImportRejected {
            reason: error.to_string(),
        });
    }

    /// Apply `mutate` to the journal, then write what it reports as changed
    fn commit<T>(
        &mut self,
        operation: &str,
        mutate: impl FnOnce(&mut Journal) -> Result<(T, Writes)>,
    ) -> Result<T> {
        let snapshot = self.journal.clone();

        let (out, writes) = match mutate(&mut self.journal) {
            Ok(done) => done,
            Err(e) => {
                self.journal = snapshot;
                return Err(e);
            }
        };

        if let Err(e) = self.persist(&writes) {
            self.recover(operation, snapshot, &e);
            return Err(Error::persistence(operation, e));
        }
        Ok(out)
    }

    fn persist(&mut self, writes: &Writes) -> Result<()> {
        for date in &writes.dates {
            let record = self
                .journal
                .health_log
                .day(*date)
                .cloned()
                .unwrap_or_default();
            self.store.save_daily_record(&self.user, *date, &record)?;
        }
        if writes.pattern {
            self.store.save_pattern(&self.user, &self.journal.pattern)?;
        }
        if writes.catalog {
            self.store.save_catalog(&self.user, &self.journal.catalog)?;
        }
        Ok(())
    }

    fn recover(&mut self, operation: &str, snapshot: Journal, error: &Error) {
        let policy = self.journal.policy();
        let recovered_from = match self.store.load_all(&self.user) {
            Ok(bundle) => {
                self.journal = bundle.into_journal().with_policy(policy);
                "store"
            }
            Err(reload_error) => {
                tracing::warn!(
                    "Reload after failed {} also failed ({}); restoring snapshot",
                    operation,
                    reload_error
                );
                self.journal = snapshot;
                "snapshot"
            }
        };

        tracing::error!(
            "{} failed for {}: {}; state recovered from {}",
            operation,
            self.user,
            error,
            recovered_from
        );
        self.record(AuditKind::StoreFailure {
            operation: operation.to_string(),
            reason: error.to_string(),
            recovered_from: recovered_from.to_string(),
        });
    }

    fn check_entry(&self, entry: &TimeSlotEntry) -> Result<()> {
        entry.validate()?;
        self.check_known(&entry.medications)
    }

    fn check_known(&self, names: &[String]) -> Result<()> {
        match names.iter().find(|name| !self.journal.catalog.contains(name)) {
            Some(unknown) => Err(Error::Precondition(format!(
                "unknown medication '{}'; add it to the list first",
                unknown
            ))),
            None => Ok(()),
        }
    }

    fn record(&mut self, kind: AuditKind) {
        if let Some(sink) = self.audit.as_mut() {
            let event = AuditEvent::new(self.user.as_str(), kind);
            if let Err(e) = sink.append(&event) {
                tracing::warn!("Failed to append audit event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MedicationCatalog;
    use crate::store::{MemoryStore, ENTITY_HEALTH_DATA, ENTITY_MEDICATIONS, ENTITY_STANDARD_PATTERN};
    use crate::types::parse_date;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// MemoryStore with switchable failures
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: bool,
        fail_catalog: bool,
        fail_loads: bool,
        partial_import: bool,
    }

    fn io_failure(what: &str) -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::Other, what.to_string()))
    }

    impl JournalStore for FlakyStore {
        fn login(&mut self, username: &str, password: &str) -> Result<Option<UserId>> {
            self.inner.login(username, password)
        }

        fn logout(&mut self, user: &UserId) -> Result<()> {
            self.inner.logout(user)
        }

        fn load_all(&self, user: &UserId) -> Result<Bundle> {
            if self.fail_loads {
                return Err(io_failure("load"));
            }
            self.inner.load_all(user)
        }

        fn save_daily_record(
            &mut self,
            user: &UserId,
            date: NaiveDate,
            record: &DailyRecord,
        ) -> Result<()> {
            if self.fail_writes {
                return Err(io_failure("save day"));
            }
            self.inner.save_daily_record(user, date, record)
        }

        fn save_catalog(&mut self, user: &UserId, catalog: &MedicationCatalog) -> Result<()> {
            if self.fail_writes || self.fail_catalog {
                return Err(io_failure("save catalog"));
            }
            self.inner.save_catalog(user, catalog)
        }

        fn save_pattern(&mut self, user: &UserId, pattern: &StandardPattern) -> Result<()> {
            if self.fail_writes {
                return Err(io_failure("save pattern"));
            }
            self.inner.save_pattern(user, pattern)
        }

        fn replace_all(&mut self, user: &UserId, bundle: &Bundle) -> Result<()> {
            if self.partial_import {
                self.inner.save_catalog(user, &bundle.catalog)?;
                return Err(Error::PartialImport {
                    written: vec![ENTITY_MEDICATIONS.to_string()],
                    failed: vec![
                        ENTITY_STANDARD_PATTERN.to_string(),
                        ENTITY_HEALTH_DATA.to_string(),
                    ],
                    reason: "disk full".into(),
                });
            }
            if self.fail_writes {
                return Err(io_failure("replace all"));
            }
            self.inner.replace_all(user, bundle)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<AuditEvent>>>);

    impl AuditSink for RecordingSink {
        fn append(&mut self, event: &AuditEvent) -> Result<()> {
            self.0.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    impl RecordingSink {
        fn kinds(&self) -> Vec<AuditKind> {
            self.0.borrow().iter().map(|e| e.kind.clone()).collect()
        }
    }

    fn slot(label: &str) -> TimeSlot {
        TimeSlot::parse(label).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn meds(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn seeded_store() -> FlakyStore {
        let mut store = FlakyStore::default();
        let user = UserId::local();
        let mut bundle = Bundle {
            catalog: MedicationCatalog::from_names(["Paracetamol", "Ibuprofen"]).unwrap(),
            ..Default::default()
        };
        bundle.health_log.day_mut(date("2024-01-01")).set(
            slot("08:00"),
            TimeSlotEntry::new(Some(5.0), meds(&["Paracetamol", "Ibuprofen"]), "ok"),
        );
        bundle.health_log.day_mut(date("2024-01-02")).set(
            slot("12:30"),
            TimeSlotEntry::new(Some(3.0), meds(&["Ibuprofen"]), ""),
        );
        bundle.pattern.set(slot("08:00"), meds(&["Paracetamol"]));
        bundle
            .pattern
            .set(slot("20:00"), meds(&["Paracetamol", "Ibuprofen"]));
        store.inner.replace_all(&user, &bundle).unwrap();
        store
    }

    fn open(store: FlakyStore) -> (JournalSession<FlakyStore>, RecordingSink) {
        crate::logging::init_test();
        let sink = RecordingSink::default();
        let session = JournalSession::open(store, UserId::local(), CatalogPolicy::default())
            .unwrap()
            .with_audit(Box::new(sink.clone()));
        (session, sink)
    }

    fn stored(session: &JournalSession<FlakyStore>) -> Bundle {
        session.store().inner.load_all(session.user()).unwrap()
    }

    #[test]
    fn test_rename_writes_through_to_store() {
        let (mut session, sink) = open(seeded_store());

        let report = session
            .rename_medication("Paracetamol", "Acetaminophen")
            .unwrap();

        assert_eq!(report.touched_dates.len(), 1);
        assert_eq!(stored(&session), session.export_bundle());
        assert!(stored(&session).catalog.contains("Acetaminophen"));
        assert!(matches!(
            sink.kinds().as_slice(),
            [AuditKind::MedicationRenamed { references: 3, days: 1, .. }]
        ));
    }

    #[test]
    fn test_delete_writes_through_to_store() {
        let (mut session, _) = open(seeded_store());

        session.delete_medication("Paracetamol").unwrap();

        let bundle = stored(&session);
        assert_eq!(bundle.pattern.len(), 1);
        assert_eq!(bundle.health_log.reference_count("Paracetamol"), 0);
        assert_eq!(bundle, session.export_bundle());
    }

    #[test]
    fn test_write_failure_reloads_from_store() {
        let mut store = seeded_store();
        store.fail_writes = true;
        let (mut session, sink) = open(store);
        let before = session.journal().clone();

        let result = session.rename_medication("Paracetamol", "Acetaminophen");

        match result {
            Err(Error::Persistence { operation, .. }) => assert_eq!(operation, "rename_medication"),
            other => panic!("expected persistence error, got {:?}", other),
        }
        assert_eq!(session.journal(), &before);
        assert!(matches!(
            sink.kinds().as_slice(),
            [AuditKind::StoreFailure { recovered_from, .. }] if recovered_from == "store"
        ));
    }

    #[test]
    fn test_reload_shows_what_the_store_accepted() {
        let mut store = seeded_store();
        store.fail_catalog = true;
        let (mut session, _) = open(store);

        assert!(session
            .rename_medication("Paracetamol", "Acetaminophen")
            .is_err());

        // Records and pattern were written before the catalog failed
        assert_eq!(session.export_bundle(), stored(&session));
        assert!(session.journal().catalog.contains("Paracetamol"));
        assert_eq!(session.journal().health_log.reference_count("Acetaminophen"), 1);
    }

    #[test]
    fn test_reload_failure_restores_snapshot() {
        let (mut session, sink) = open(seeded_store());
        let before = session.journal().clone();
        {
            let store = &mut session.store;
            store.fail_writes = true;
            store.fail_loads = true;
        }

        assert!(session.delete_medication("Ibuprofen").is_err());

        assert_eq!(session.journal(), &before);
        assert!(matches!(
            sink.kinds().as_slice(),
            [AuditKind::StoreFailure { recovered_from, .. }] if recovered_from == "snapshot"
        ));
    }

    #[test]
    fn test_precondition_failure_writes_nothing() {
        let (mut session, sink) = open(seeded_store());
        let before = session.journal().clone();

        assert!(matches!(
            session.rename_medication("Aspirin", "X"),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            session.set_slot(
                date("2024-01-03"),
                slot("09:00"),
                TimeSlotEntry::new(None, meds(&["Aspirin"]), "")
            ),
            Err(Error::Precondition(_))
        ));

        assert_eq!(session.journal(), &before);
        assert_eq!(stored(&session), session.export_bundle());
        assert!(sink.kinds().is_empty());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let (mut session, sink) = open(seeded_store());
        let before = session.journal().clone();

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                session.set_slot(
                    date("2024-01-03"),
                    slot("09:00"),
                    TimeSlotEntry::new(Some(value), vec![], "")
                ),
                Err(Error::Validation(_))
            ));
        }

        let mut record = DailyRecord::new();
        record.set(slot("10:00"), TimeSlotEntry::new(Some(f64::NAN), vec![], "x"));
        assert!(matches!(
            session.save_day(date("2024-01-03"), record),
            Err(Error::Validation(_))
        ));

        assert_eq!(session.journal(), &before);
        assert_eq!(stored(&session), session.export_bundle());
        assert!(sink.kinds().is_empty());
    }

    #[test]
    fn test_save_day_drops_empty_entries() {
        let (mut session, _) = open(seeded_store());
        let mut record = DailyRecord::new();
        record.set(slot("08:00"), TimeSlotEntry::default());
        record.set(slot("09:00"), TimeSlotEntry::new(Some(2.5), vec![], ""));

        session.save_day(date("2024-02-01"), record).unwrap();

        let saved = stored(&session);
        let day = saved.health_log.day(date("2024-02-01")).unwrap();
        assert_eq!(day.len(), 1);
        assert!(day.get(slot("08:00")).is_none());
    }

    #[test]
    fn test_save_empty_day_keeps_date() {
        let (mut session, _) = open(seeded_store());
        session
            .save_day(date("2024-01-02"), DailyRecord::new())
            .unwrap();

        let saved = stored(&session);
        assert!(saved.health_log.day(date("2024-01-02")).unwrap().is_empty());
        assert_eq!(saved.health_log.len(), 2);
    }

    #[test]
    fn test_set_and_clear_slot() {
        let (mut session, _) = open(seeded_store());
        let day = date("2024-01-05");

        session
            .set_slot(day, slot("23:30"), TimeSlotEntry::new(Some(1.0), vec![], "late"))
            .unwrap();
        assert_eq!(stored(&session).health_log.day(day).unwrap().len(), 1);

        assert!(session.clear_slot(day, slot("23:30")).unwrap());
        assert!(!session.clear_slot(day, slot("23:30")).unwrap());
        assert!(stored(&session).health_log.day(day).unwrap().is_empty());
    }

    #[test]
    fn test_apply_pattern_keeps_values() {
        let (mut session, _) = open(seeded_store());
        let day = date("2024-01-01");

        let written = session.apply_pattern(day).unwrap();

        assert_eq!(written, 2);
        let saved = stored(&session);
        let entry = saved.health_log.day(day).unwrap().get(slot("08:00")).unwrap();
        assert_eq!(entry.medications, meds(&["Paracetamol"]));
        assert_eq!(entry.value, Some(5.0));
        assert_eq!(entry.comment, "ok");
    }

    #[test]
    fn test_save_pattern_drops_empty_slots() {
        let (mut session, _) = open(seeded_store());
        let pattern: StandardPattern =
            serde_json::from_str(r#"{"08:00":[],"21:00":["Ibuprofen"]}"#).unwrap();

        session.save_pattern(pattern).unwrap();

        let saved = stored(&session).pattern;
        assert_eq!(saved.len(), 1);
        assert!(saved.get(slot("08:00")).is_none());
    }

    #[test]
    fn test_add_existing_medication_writes_nothing() {
        let (mut session, sink) = open(seeded_store());
        assert!(!session.add_medication("Ibuprofen").unwrap());
        assert!(session.add_medication(" Aspirin ").unwrap());
        assert_eq!(
            sink.kinds(),
            vec![AuditKind::MedicationAdded {
                name: "Aspirin".into()
            }]
        );
        assert!(stored(&session).catalog.contains("Aspirin"));
    }

    #[test]
    fn test_import_of_export_is_identity() {
        let (mut source, _) = open(seeded_store());
        source.rename_medication("Ibuprofen", "Advil").unwrap();
        let bundle = source.export_bundle();

        let (mut target, _) = open(FlakyStore::default());
        target.import_bundle(bundle.clone(), false).unwrap();

        assert_eq!(target.export_bundle(), bundle);
        assert_eq!(stored(&target), bundle);
    }

    #[test]
    fn test_import_rejects_dangling_when_configured() {
        let (mut session, sink) = open(seeded_store());
        let before = session.export_bundle();
        let mut bundle = before.clone();
        bundle.catalog = MedicationCatalog::from_names(["Ibuprofen"]).unwrap();

        assert!(matches!(
            session.import_bundle(bundle.clone(), true),
            Err(Error::Validation(_))
        ));
        assert_eq!(session.export_bundle(), before);
        assert!(matches!(
            sink.kinds().as_slice(),
            [AuditKind::ImportRejected { .. }]
        ));

        // Accepted with a warning by default
        session.import_bundle(bundle.clone(), false).unwrap();
        assert_eq!(session.export_bundle(), bundle);
    }

    #[test]
    fn test_partial_import_is_reported_and_reloaded() {
        let mut store = seeded_store();
        store.partial_import = true;
        let (mut session, sink) = open(store);
        let bundle = Bundle {
            catalog: MedicationCatalog::from_names(["Only"]).unwrap(),
            ..Default::default()
        };

        match session.import_bundle(bundle, false) {
            Err(Error::PartialImport { written, failed, .. }) => {
                assert_eq!(written, vec![ENTITY_MEDICATIONS]);
                assert_eq!(failed.len(), 2);
            }
            other => panic!("expected partial import, got {:?}", other),
        }

        // The session mirrors the mixed state the store ended up with
        assert_eq!(session.export_bundle(), stored(&session));
        assert_eq!(session.journal().catalog.names(), &["Only"]);
        assert_eq!(session.journal().health_log.len(), 2);

        let kinds = sink.kinds();
        assert!(matches!(kinds[0], AuditKind::PartialImport { .. }));
        assert!(matches!(kinds[1], AuditKind::StoreFailure { .. }));
    }

    #[test]
    fn test_logout_returns_store() {
        let (session, _) = open(seeded_store());
        let store = session.logout().unwrap();
        assert_eq!(store.inner.load_all(&UserId::local()).unwrap().health_log.len(), 2);
    }
}
