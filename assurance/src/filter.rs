//! Ignore lists and exclusions applied while walking mapped trees

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::ScanOptions;
use crate::model::FileReference;

/// Global ignore lists: file names and extensions, matched case-insensitively
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    names: HashSet<String>,
    extensions: HashSet<String>,
}

impl IgnoreFilter {
    /// Build from already normalised (lower-cased) names and extensions
    pub fn new(
        names: impl IntoIterator<Item = String>,
        extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            names: names.into_iter().collect(),
            extensions: extensions.into_iter().collect(),
        }
    }

    pub fn from_options(options: &ScanOptions) -> Self {
        Self::new(options.ignored_names(), options.ignored_extensions())
    }

    /// Whether the final component of `path` is an ignored name or has an ignored extension
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        if self.names.contains(&name) {
            return true;
        }

        path.extension()
            .map(|extension| self.extensions.contains(&extension.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }
}

/// Paths excluded from a mapping. Matching is by path identity; descendants are never
/// reached because the walk stops at the excluded entry.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    paths: HashSet<PathBuf>,
}

impl ExclusionSet {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn from_references(references: &[FileReference]) -> Self {
        Self::new(references.iter().filter_map(|reference| reference.path.clone()))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

/// Ignore lists plus exclusions, checked on both sides of a pair
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    ignore: IgnoreFilter,
    exclusions: ExclusionSet,
}

impl PathFilter {
    pub fn new(ignore: IgnoreFilter, exclusions: ExclusionSet) -> Self {
        Self { ignore, exclusions }
    }

    /// Whether a source/target pair is bypassed entirely. Null sides never match.
    pub fn should_skip(&self, source: Option<&Path>, target: Option<&Path>) -> bool {
        [source, target]
            .into_iter()
            .flatten()
            .any(|path| self.ignore.is_ignored(path) || self.exclusions.contains(path))
    }
}
