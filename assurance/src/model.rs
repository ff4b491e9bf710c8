//! Comparison results and the file references they point at

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::attributes::{ContentHasher, FileAttributes};

/// Longest resolution error message kept on a result
pub const MAX_RESOLUTION_ERROR_LEN: usize = 255;

/// A path plus the attributes captured for it. A `None` path is a null reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: Option<PathBuf>,
    pub attributes: Option<FileAttributes>,
}

impl FileReference {
    /// Reference without captured attributes
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            attributes: None,
        }
    }

    /// The null reference
    pub fn null() -> Self {
        Self::default()
    }

    /// Reference with attributes captured now
    pub fn capture(path: impl Into<PathBuf>, hasher: Option<&ContentHasher>) -> Self {
        let path = path.into();
        let attributes = FileAttributes::capture(&path, hasher);
        Self {
            path: Some(path),
            attributes: Some(attributes),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.path.is_none()
    }

    /// Whether the referenced path is present on disk. Links count even when dangling.
    pub fn exists(&self) -> bool {
        self.path
            .as_deref()
            .map(|p| p.symlink_metadata().is_ok())
            .unwrap_or(false)
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "<null>"),
        }
    }
}

/// Why a source/target pair was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonReason {
    CompareFailed,
    FileDirectoryMismatch,
    FileNull,
    SourceDoesNotExist,
    TargetDoesNotExist,
    SymbolicLinkMismatch,
    Undetermined,
}

impl ComparisonReason {
    pub const ALL: [ComparisonReason; 7] = [
        Self::CompareFailed,
        Self::FileDirectoryMismatch,
        Self::FileNull,
        Self::SourceDoesNotExist,
        Self::TargetDoesNotExist,
        Self::SymbolicLinkMismatch,
        Self::Undetermined,
    ];
}

impl fmt::Display for ComparisonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CompareFailed => "Compare failed",
            Self::FileDirectoryMismatch => "File/directory mismatch",
            Self::FileNull => "File is null",
            Self::SourceDoesNotExist => "Source does not exist",
            Self::TargetDoesNotExist => "Target does not exist",
            Self::SymbolicLinkMismatch => "Symbolic link mismatch",
            Self::Undetermined => "Undetermined",
        };
        f.write_str(text)
    }
}

/// What the merge engine did about a result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonResolution {
    #[default]
    Unresolved,
    ReplaceSource,
    ReplaceTarget,
    DeleteSource,
    DeleteTarget,
    ProcessingErrorEncountered,
}

impl ComparisonResolution {
    pub const ALL: [ComparisonResolution; 6] = [
        Self::Unresolved,
        Self::ReplaceSource,
        Self::ReplaceTarget,
        Self::DeleteSource,
        Self::DeleteTarget,
        Self::ProcessingErrorEncountered,
    ];

    /// Deletions can be undone through the deleted items location
    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::DeleteSource | Self::DeleteTarget)
    }
}

impl fmt::Display for ComparisonResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unresolved => "Unresolved",
            Self::ReplaceSource => "Replaced source",
            Self::ReplaceTarget => "Replaced target",
            Self::DeleteSource => "Deleted source",
            Self::DeleteTarget => "Deleted target",
            Self::ProcessingErrorEncountered => "Processing error encountered",
        };
        f.write_str(text)
    }
}

/// One detected difference between a source path and a target path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub id: Uuid,
    pub source: FileReference,
    pub target: FileReference,
    pub reason: ComparisonReason,
    pub resolution: ComparisonResolution,
    pub resolution_error: Option<String>,
    /// Deleted items folder of the owning scan, set when the scan adopts the result
    pub deleted_items_folder: Option<String>,
}

impl ComparisonResult {
    pub fn new(source: FileReference, target: FileReference, reason: ComparisonReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            reason,
            resolution: ComparisonResolution::Unresolved,
            resolution_error: None,
            deleted_items_folder: None,
        }
    }

    /// Record a per-item failure
    pub fn set_processing_error(&mut self, message: impl Into<String>) {
        self.resolution = ComparisonResolution::ProcessingErrorEncountered;
        self.set_resolution_error(message);
    }

    /// Store an error message, truncated to [`MAX_RESOLUTION_ERROR_LEN`] characters
    pub fn set_resolution_error(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        if let Some((index, _)) = message.char_indices().nth(MAX_RESOLUTION_ERROR_LEN) {
            message.truncate(index);
        }
        self.resolution_error = Some(message);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != ComparisonResolution::Unresolved
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <-> {}: {} ({})",
            self.source, self.target, self.reason, self.resolution
        )
    }
}
