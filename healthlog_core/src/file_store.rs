//! File-backed journal store.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/
//! ├── users.json                   # account registry
//! └── users/<user>/
//!     ├── health_data.json         # HealthLog
//!     ├── medications.json         # MedicationCatalog
//!     ├── standard_pattern.json    # StandardPattern
//!     └── journal.wal              # audit log (see audit.rs)
//! ```

use crate::catalog::MedicationCatalog;
use crate::codec::Bundle;
use crate::file_io::{read_json_locked, write_json_atomic};
use crate::pattern::StandardPattern;
use crate::store::{
    JournalStore, UserId, ENTITY_HEALTH_DATA, ENTITY_MEDICATIONS, ENTITY_STANDARD_PATTERN,
};
use crate::types::{DailyRecord, HealthLog};
use crate::users::UserRegistry;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub const HEALTH_DATA_FILE: &str = "health_data.json";
pub const MEDICATIONS_FILE: &str = "medications.json";
pub const STANDARD_PATTERN_FILE: &str = "standard_pattern.json";
pub const AUDIT_LOG_FILE: &str = "journal.wal";
pub const USERS_FILE: &str = "users.json";

/// Journal store writing one JSON file per entity per user
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    seed_catalog: MedicationCatalog,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            seed_catalog: MedicationCatalog::with_defaults(),
        }
    }

    pub fn with_seed_catalog(mut self, catalog: MedicationCatalog) -> Self {
        self.seed_catalog = catalog;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn user_dir(&self, user: &UserId) -> PathBuf {
        self.data_dir.join("users").join(user.as_str())
    }

    pub fn audit_log_path(&self, user: &UserId) -> PathBuf {
        self.user_dir(user).join(AUDIT_LOG_FILE)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    pub fn registry(&self) -> Result<UserRegistry> {
        UserRegistry::load(&self.registry_path())
    }

    fn load_health_log(&self, user: &UserId) -> Result<HealthLog> {
        let path = self.user_dir(user).join(HEALTH_DATA_FILE);
        Ok(read_json_locked(&path)?.unwrap_or_default())
    }
}

impl JournalStore for FileStore {
    fn login(&mut self, username: &str, password: &str) -> Result<Option<UserId>> {
        Ok(self.registry()?.verify(username, password))
    }

    fn logout(&mut self, user: &UserId) -> Result<()> {
        tracing::debug!("Logged out {}", user);
        Ok(())
    }

    fn load_all(&self, user: &UserId) -> Result<Bundle> {
        let dir = self.user_dir(user);

        let health_log = self.load_health_log(user)?;
        let catalog: MedicationCatalog = match read_json_locked(&dir.join(MEDICATIONS_FILE))? {
            Some(catalog) => catalog,
            None => {
                tracing::info!("No medication list for {}, using defaults", user);
                self.seed_catalog.clone()
            }
        };
        let pattern: StandardPattern =
            read_json_locked(&dir.join(STANDARD_PATTERN_FILE))?.unwrap_or_default();

        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(format!(
                "stored medication list for {} is invalid: {}",
                user,
                errors.join("; ")
            )));
        }

        tracing::debug!(
            "Loaded {} days for {} from {:?}",
            health_log.len(),
            user,
            dir
        );

        Ok(Bundle {
            health_log,
            catalog,
            pattern,
        })
    }

    fn save_daily_record(
        &mut self,
        user: &UserId,
        date: NaiveDate,
        record: &DailyRecord,
    ) -> Result<()> {
        let mut log = self.load_health_log(user)?;
        log.insert(date, record.clone());
        write_json_atomic(&self.user_dir(user).join(HEALTH_DATA_FILE), &log)
    }

    fn save_catalog(&mut self, user: &UserId, catalog: &MedicationCatalog) -> Result<()> {
        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors.join("; ")));
        }
        write_json_atomic(&self.user_dir(user).join(MEDICATIONS_FILE), catalog)
    }

    fn save_pattern(&mut self, user: &UserId, pattern: &StandardPattern) -> Result<()> {
        write_json_atomic(
            &self.user_dir(user).join(STANDARD_PATTERN_FILE),
            &pattern.cleaned(),
        )
    }

    /// Writes medications, then pattern, then health data. The three files
    /// cannot be swapped in one step, so a failure after the first write
    /// leaves a mixed state, reported as `PartialImport`.
    fn replace_all(&mut self, user: &UserId, bundle: &Bundle) -> Result<()> {
        let dir = self.user_dir(user);
        let order = [ENTITY_MEDICATIONS, ENTITY_STANDARD_PATTERN, ENTITY_HEALTH_DATA];

        let mut written = Vec::new();
        for (idx, entity) in order.iter().enumerate() {
            let result = match *entity {
                ENTITY_MEDICATIONS => {
                    write_json_atomic(&dir.join(MEDICATIONS_FILE), &bundle.catalog)
                }
                ENTITY_STANDARD_PATTERN => {
                    write_json_atomic(&dir.join(STANDARD_PATTERN_FILE), &bundle.pattern)
                }
                _ => write_json_atomic(&dir.join(HEALTH_DATA_FILE), &bundle.health_log),
            };

            if let Err(e) = result {
                if written.is_empty() {
                    return Err(e);
                }
                let failed: Vec<String> = order[idx..].iter().map(|name| name.to_string()).collect();
                tracing::error!(
                    "Import for {} stopped at {}: wrote {:?}, not written {:?}: {}",
                    user,
                    entity,
                    written,
                    failed,
                    e
                );
                return Err(Error::PartialImport {
                    written,
                    failed,
                    reason: e.to_string(),
                });
            }
            written.push(entity.to_string());
        }

        tracing::info!("Replaced all data for {} in {:?}", user, dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_date, TimeSlot, TimeSlotEntry};

    fn sample_bundle() -> Bundle {
        let mut bundle = Bundle::default();
        bundle.catalog = MedicationCatalog::from_names(["A", "B"]).unwrap();
        bundle
            .health_log
            .day_mut(parse_date("2024-03-01").unwrap())
            .set(
                TimeSlot::parse("10:30").unwrap(),
                TimeSlotEntry::new(Some(4.0), vec!["A".into()], "note"),
            );
        bundle
            .pattern
            .set(TimeSlot::parse("22:00").unwrap(), vec!["B".into()]);
        bundle
    }

    #[test]
    fn test_fresh_user_loads_seed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let bundle = store.load_all(&UserId::local()).unwrap();
        assert_eq!(bundle.catalog, MedicationCatalog::with_defaults());
        assert!(bundle.health_log.is_empty());
    }

    #[test]
    fn test_replace_all_then_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        let user = UserId::new("alice");

        store.replace_all(&user, &sample_bundle()).unwrap();

        assert!(store.user_dir(&user).join(HEALTH_DATA_FILE).exists());
        assert_eq!(store.load_all(&user).unwrap(), sample_bundle());
    }

    #[test]
    fn test_save_daily_record_upserts_single_date() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        let user = UserId::local();
        store.replace_all(&user, &sample_bundle()).unwrap();

        let other = parse_date("2024-03-02").unwrap();
        let mut day = DailyRecord::new();
        day.set(
            TimeSlot::parse("08:00").unwrap(),
            TimeSlotEntry::new(Some(9.0), vec![], ""),
        );
        store.save_daily_record(&user, other, &day).unwrap();

        let log = store.load_all(&user).unwrap().health_log;
        assert_eq!(log.len(), 2);
        assert_eq!(log.day(other), Some(&day));
    }

    #[test]
    fn test_save_catalog_rejects_duplicates() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        let bad = MedicationCatalog::from_names_unchecked(["A", "A"]);
        assert!(matches!(
            store.save_catalog(&UserId::local(), &bad),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_corrupted_health_data_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let user = UserId::local();
        std::fs::create_dir_all(store.user_dir(&user)).unwrap();
        std::fs::write(store.user_dir(&user).join(HEALTH_DATA_FILE), "{ nope").unwrap();

        assert!(store.load_all(&user).is_err());
    }

    #[test]
    fn test_replace_all_reports_partial_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        let user = UserId::local();

        // A directory where health_data.json should go makes the last write fail
        std::fs::create_dir_all(store.user_dir(&user).join(HEALTH_DATA_FILE)).unwrap();

        match store.replace_all(&user, &sample_bundle()) {
            Err(Error::PartialImport {
                written, failed, ..
            }) => {
                assert_eq!(written, vec![ENTITY_MEDICATIONS, ENTITY_STANDARD_PATTERN]);
                assert_eq!(failed, vec![ENTITY_HEALTH_DATA]);
            }
            other => panic!("expected partial import failure, got {:?}", other),
        }
    }

    #[test]
    fn test_login_uses_registry_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        store.registry().unwrap().add_user("alice", "pw").unwrap();

        assert_eq!(
            store.login("alice", "pw").unwrap(),
            Some(UserId::new("alice"))
        );
        assert!(store.login("alice", "nope").unwrap().is_none());
    }
}
