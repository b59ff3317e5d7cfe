//! Medication catalog: the authoritative list of medication names.
//!
//! Display order is insertion order (optionally kept sorted after each
//! mutation). Names are unique under exact string comparison.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Seed list for a fresh profile
static DEFAULT_MEDICATIONS: Lazy<Vec<String>> =
    Lazy::new(|| vec!["Paracetamol 1g".into(), "Ibuprofeno 600mg".into()]);

/// Names a brand-new profile starts with
pub fn default_medications() -> &'static [String] {
    &DEFAULT_MEDICATIONS
}

/// Ordered, duplicate-free list of medication names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationCatalog {
    names: Vec<String>,
}

impl MedicationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list, rejecting blank or duplicate names
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let catalog = Self::from_names_unchecked(names);
        let errors = catalog.validate();
        if errors.is_empty() {
            Ok(catalog)
        } else {
            Err(Error::Validation(errors.join("; ")))
        }
    }

    pub(crate) fn from_names_unchecked<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Catalog seeded with the built-in defaults
    pub fn with_defaults() -> Self {
        Self::from_names_unchecked(default_medications().iter().cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Append `name` unless already present. Returns whether it was inserted.
    pub(crate) fn insert(&mut self, name: String) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// Replace the name at `index`, keeping its position
    pub(crate) fn replace_at(&mut self, index: usize, name: String) {
        self.names[index] = name;
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != name);
        self.names.len() != before
    }

    pub(crate) fn sort(&mut self) {
        self.names.sort();
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (idx, name) in self.names.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(format!("Medication at position {} has empty name", idx));
            }
            if !seen.insert(name.as_str()) {
                errors.push(format!("Medication '{}' is listed more than once", name));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_loads() {
        let catalog = MedicationCatalog::with_defaults();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("Paracetamol 1g"));
    }

    #[test]
    fn test_default_catalog_validates() {
        let catalog = MedicationCatalog::with_defaults();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut catalog = MedicationCatalog::new();
        assert!(catalog.insert("Ibuprofen".into()));
        assert!(!catalog.insert("Ibuprofen".into()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_contains_is_case_sensitive() {
        let catalog = MedicationCatalog::from_names(["Ibuprofen"]).unwrap();
        assert!(!catalog.contains("ibuprofen"));
    }

    #[test]
    fn test_from_names_rejects_duplicates() {
        let result = MedicationCatalog::from_names(["A", "B", "A"]);
        match result {
            Err(Error::Validation(msg)) => assert!(msg.contains("'A'")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_flags_blank_names() {
        let catalog = MedicationCatalog::from_names_unchecked(["A", "  "]);
        let errors = catalog.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("position 1"));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let catalog = MedicationCatalog::from_names(["B", "A"]).unwrap();
        assert_eq!(serde_json::to_string(&catalog).unwrap(), r#"["B","A"]"#);
    }
}
