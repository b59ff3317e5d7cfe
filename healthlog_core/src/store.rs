//! Persistence port for journal data.
//!
//! Every call names the user explicitly. Each `save_*` is a single-entity
//! write; `replace_all` is the multi-entity write used by import and may
//! fail part way, which backends report as [`Error::PartialImport`].

use crate::catalog::MedicationCatalog;
use crate::codec::Bundle;
use crate::pattern::StandardPattern;
use crate::types::DailyRecord;
use crate::users::UserRegistry;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

/// Identifies whose data a store call touches
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    /// Implicit single user when no accounts are registered
    pub const LOCAL: &'static str = "local";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn local() -> Self {
        Self(Self::LOCAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity names used in partial-import reports
pub const ENTITY_HEALTH_DATA: &str = "healthData";
pub const ENTITY_MEDICATIONS: &str = "medications";
pub const ENTITY_STANDARD_PATTERN: &str = "standardPattern";

/// Storage backend for journal bundles
pub trait JournalStore {
    /// Check credentials. `Ok(None)` means they were rejected.
    fn login(&mut self, username: &str, password: &str) -> Result<Option<UserId>>;

    fn logout(&mut self, user: &UserId) -> Result<()>;

    /// Everything the user owns. Unknown users get an empty log, an empty
    /// pattern and the store's seed catalog.
    fn load_all(&self, user: &UserId) -> Result<Bundle>;

    /// Insert or replace one date's record
    fn save_daily_record(
        &mut self,
        user: &UserId,
        date: NaiveDate,
        record: &DailyRecord,
    ) -> Result<()>;

    fn save_catalog(&mut self, user: &UserId, catalog: &MedicationCatalog) -> Result<()>;

    fn save_pattern(&mut self, user: &UserId, pattern: &StandardPattern) -> Result<()>;

    /// Overwrite all three entities with the bundle's contents
    fn replace_all(&mut self, user: &UserId, bundle: &Bundle) -> Result<()>;
}

/// In-memory store, for tests and throwaway sessions
#[derive(Debug)]
pub struct MemoryStore {
    bundles: HashMap<UserId, Bundle>,
    registry: UserRegistry,
    seed_catalog: MedicationCatalog,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bundles: HashMap::new(),
            registry: UserRegistry::in_memory(),
            seed_catalog: MedicationCatalog::with_defaults(),
        }
    }

    pub fn with_seed_catalog(mut self, catalog: MedicationCatalog) -> Self {
        self.seed_catalog = catalog;
        self
    }

    pub fn registry_mut(&mut self) -> &mut UserRegistry {
        &mut self.registry
    }

    fn bundle_mut(&mut self, user: &UserId) -> &mut Bundle {
        let seed = &self.seed_catalog;
        self.bundles.entry(user.clone()).or_insert_with(|| Bundle {
            catalog: seed.clone(),
            ..Default::default()
        })
    }
}

impl JournalStore for MemoryStore {
    fn login(&mut self, username: &str, password: &str) -> Result<Option<UserId>> {
        Ok(self.registry.verify(username, password))
    }

    fn logout(&mut self, user: &UserId) -> Result<()> {
        tracing::debug!("Logged out {}", user);
        Ok(())
    }

    fn load_all(&self, user: &UserId) -> Result<Bundle> {
        Ok(self.bundles.get(user).cloned().unwrap_or_else(|| Bundle {
            catalog: self.seed_catalog.clone(),
            ..Default::default()
        }))
    }

    fn save_daily_record(
        &mut self,
        user: &UserId,
        date: NaiveDate,
        record: &DailyRecord,
    ) -> Result<()> {
        self.bundle_mut(user)
            .health_log
            .insert(date, record.clone());
        Ok(())
    }

    fn save_catalog(&mut self, user: &UserId, catalog: &MedicationCatalog) -> Result<()> {
        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors.join("; ")));
        }
        self.bundle_mut(user).catalog = catalog.clone();
        Ok(())
    }

    fn save_pattern(&mut self, user: &UserId, pattern: &StandardPattern) -> Result<()> {
        self.bundle_mut(user).pattern = pattern.cleaned();
        Ok(())
    }

    fn replace_all(&mut self, user: &UserId, bundle: &Bundle) -> Result<()> {
        self.bundles.insert(user.clone(), bundle.clone());
        Ok(())
    }
}
