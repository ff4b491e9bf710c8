//! Scan options and application configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AssuranceError, Result};
use crate::trash::DeletedItems;

/// Short application name, used for the default deleted items location
pub const APPLICATION_SHORT_NAME: &str = "Assurance";

/// Worker count used when the configured value is missing or out of range
pub const DEFAULT_NUMBER_OF_THREADS: usize = 4;
pub const MIN_NUMBER_OF_THREADS: usize = 2;
pub const MAX_NUMBER_OF_THREADS: usize = 32;

const DEFAULT_IGNORED_FILE_NAMES: &str = ".DS_Store, Thumbs.db, desktop.ini";

/// Hash algorithms supported for content comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 hash
    Sha256,
    /// Blake3 hash (faster)
    #[default]
    Blake3,
}

/// Options supplied by the host application for every scan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Comma-separated file names skipped during comparison
    pub ignored_file_names: String,
    /// Comma-separated file extensions skipped during comparison
    pub ignored_file_extensions: String,
    /// Number of worker threads, valid range 2..=32
    pub number_of_threads: usize,
    /// Compare last-access and last-modified times when the scan has no definition
    pub include_non_creation_timestamps: bool,
    /// Compare POSIX, owner and ACL attributes when the scan has no definition
    pub include_advanced_attributes: bool,
    /// Evaluate every attribute category and always hash, instead of stopping at the first mismatch
    pub deep_scan: bool,
    /// Content hash algorithm
    pub hash_algorithm: HashAlgorithm,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignored_file_names: DEFAULT_IGNORED_FILE_NAMES.to_string(),
            ignored_file_extensions: String::new(),
            number_of_threads: DEFAULT_NUMBER_OF_THREADS,
            include_non_creation_timestamps: false,
            include_advanced_attributes: false,
            deep_scan: false,
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

impl ScanOptions {
    /// Ignored file names, lower-cased
    pub fn ignored_names(&self) -> Vec<String> {
        split_list(&self.ignored_file_names, false)
    }

    /// Ignored extensions as bare, lower-cased extensions (`*.TMP` becomes `tmp`)
    pub fn ignored_extensions(&self) -> Vec<String> {
        split_list(&self.ignored_file_extensions, true)
    }

    /// Validated worker count
    pub fn worker_threads(&self) -> usize {
        if (MIN_NUMBER_OF_THREADS..=MAX_NUMBER_OF_THREADS).contains(&self.number_of_threads) {
            self.number_of_threads
        } else {
            tracing::warn!(
                "Configured number of threads {} is outside {}..={}, using {}",
                self.number_of_threads,
                MIN_NUMBER_OF_THREADS,
                MAX_NUMBER_OF_THREADS,
                DEFAULT_NUMBER_OF_THREADS
            );
            DEFAULT_NUMBER_OF_THREADS
        }
    }
}

fn split_list(value: &str, strip_extension_patterns: bool) -> Vec<String> {
    value
        .split(',')
        .map(|token| {
            let token = if strip_extension_patterns {
                token.replace("*.", "").replace('*', "").replace('.', "")
            } else {
                token.to_string()
            };
            token.trim().to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Application-wide configuration handed to the core by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationConfiguration {
    #[serde(default)]
    pub options: ScanOptions,
    /// Overrides `<home>/.assurance`
    #[serde(default)]
    pub deleted_items_location: Option<PathBuf>,
}

impl ApplicationConfiguration {
    /// Parse a configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            AssuranceError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Deleted items location for this configuration
    pub fn deleted_items(&self) -> Result<DeletedItems> {
        match &self.deleted_items_location {
            Some(root) => Ok(DeletedItems::new(root.clone())),
            None => DeletedItems::application_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert_eq!(options.ignored_names(), vec![".ds_store", "thumbs.db", "desktop.ini"]);
        assert!(options.ignored_extensions().is_empty());
        assert_eq!(options.worker_threads(), 4);
        assert_eq!(options.hash_algorithm, HashAlgorithm::Blake3);
    }

    #[test]
    fn test_extension_normalization() {
        let options = ScanOptions {
            ignored_file_extensions: "*.TMP, .Log,bak , *".to_string(),
            ..Default::default()
        };
        assert_eq!(options.ignored_extensions(), vec!["tmp", "log", "bak"]);
    }

    #[test]
    fn test_thread_bounds() {
        let mut options = ScanOptions::default();
        options.number_of_threads = 2;
        assert_eq!(options.worker_threads(), 2);
        options.number_of_threads = 32;
        assert_eq!(options.worker_threads(), 32);
        options.number_of_threads = 1;
        assert_eq!(options.worker_threads(), DEFAULT_NUMBER_OF_THREADS);
        options.number_of_threads = 33;
        assert_eq!(options.worker_threads(), DEFAULT_NUMBER_OF_THREADS);
    }

    #[test]
    fn test_configuration_from_yaml() {
        let yaml = r#"
options:
  ignored_file_extensions: "tmp"
  number_of_threads: 8
  deep_scan: true
  hash_algorithm: sha256
deleted_items_location: /tmp/trash
"#;
        let config = ApplicationConfiguration::from_yaml_str(yaml).unwrap();
        assert_eq!(config.options.worker_threads(), 8);
        assert!(config.options.deep_scan);
        assert_eq!(config.options.hash_algorithm, HashAlgorithm::Sha256);
        // Unspecified fields keep their defaults
        assert_eq!(config.options.ignored_names().len(), 3);
        assert_eq!(
            config.deleted_items().unwrap().root(),
            Path::new("/tmp/trash")
        );
    }
}
