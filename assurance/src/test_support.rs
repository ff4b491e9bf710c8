//! Shared fixtures for the engine and merge tests

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

use crate::model::{ComparisonReason, ComparisonResolution, ComparisonResult};
use crate::trash::DeletedItems;

static TRACING: Once = Once::new();

/// Install a test subscriber once per process; honours `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A temporary source tree, target tree and deleted items root
pub struct TestTrees {
    _temp_dir: TempDir,
    pub source: PathBuf,
    pub target: PathBuf,
    pub trash: PathBuf,
}

impl TestTrees {
    pub fn new() -> Self {
        init_tracing();
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        let trash = temp_dir.path().join("trash");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        Self {
            _temp_dir: temp_dir,
            source,
            target,
            trash,
        }
    }

    pub fn deleted_items(&self) -> DeletedItems {
        DeletedItems::new(&self.trash)
    }

    /// Write the same file on both sides
    pub fn write_both(&self, relative: &str, contents: &str) {
        write_file(&self.source.join(relative), contents);
        write_file(&self.target.join(relative), contents);
    }

    pub fn write_source(&self, relative: &str, contents: &str) {
        write_file(&self.source.join(relative), contents);
    }

    pub fn write_target(&self, relative: &str, contents: &str) {
        write_file(&self.target.join(relative), contents);
    }

    pub fn read_source(&self, relative: &str) -> String {
        fs::read_to_string(self.source.join(relative)).unwrap()
    }

    pub fn read_target(&self, relative: &str) -> String {
        fs::read_to_string(self.target.join(relative)).unwrap()
    }

    /// Results as a sorted set of (path relative to its mapping root, reason)
    pub fn summarize(&self, results: &[ComparisonResult]) -> BTreeSet<(String, ComparisonReason)> {
        results
            .iter()
            .map(|result| {
                let path = result
                    .source
                    .path()
                    .and_then(|p| p.strip_prefix(&self.source).ok())
                    .or_else(|| result.target.path().and_then(|p| p.strip_prefix(&self.target).ok()))
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                (path, result.reason)
            })
            .collect()
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

pub fn resolutions(results: &[ComparisonResult]) -> Vec<ComparisonResolution> {
    results.iter().map(|result| result.resolution).collect()
}
