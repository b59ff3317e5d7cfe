//! Configuration file support for healthlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/healthlog/config.toml`.

use crate::catalog::{default_medications, MedicationCatalog};
use crate::engine::CatalogPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Medication catalog configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_sort_after_mutation")]
    pub sort_after_mutation: bool,

    /// Seed list for profiles that have never saved a catalog
    #[serde(default = "default_medication_list")]
    pub default_medications: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sort_after_mutation: default_sort_after_mutation(),
            default_medications: default_medication_list(),
        }
    }
}

/// Import validation configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ImportConfig {
    /// Refuse bundles whose records name medications missing from
    /// their own catalog
    #[serde(default)]
    pub reject_dangling_references: bool,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local/share")
    });
    base.join("healthlog")
}

fn default_sort_after_mutation() -> bool {
    true
}

fn default_medication_list() -> Vec<String> {
    default_medications().to_vec()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.seed_catalog()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
        base.join("healthlog").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn catalog_policy(&self) -> CatalogPolicy {
        CatalogPolicy {
            sort_after_mutation: self.catalog.sort_after_mutation,
        }
    }

    /// The configured seed list as a validated catalog
    pub fn seed_catalog(&self) -> Result<MedicationCatalog> {
        MedicationCatalog::from_names(self.catalog.default_medications.iter().cloned())
            .map_err(|e| Error::Config(format!("catalog.default_medications: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.catalog.sort_after_mutation);
        assert_eq!(config.catalog.default_medications.len(), 2);
        assert!(!config.import.reject_dangling_references);
        assert!(config.data.data_dir.ends_with("healthlog"));
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.catalog.sort_after_mutation = false;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert!(!parsed.catalog.sort_after_mutation);
        assert_eq!(
            config.catalog.default_medications,
            parsed.catalog.default_medications
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[import]
reject_dangling_references = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.import.reject_dangling_references);
        assert!(config.catalog.sort_after_mutation); // default
        assert_eq!(config.catalog_policy(), CatalogPolicy::default());
    }

    #[test]
    fn test_duplicate_seed_medications_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[catalog]\ndefault_medications = [\"A\", \"A\"]\n",
        )
        .unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
