//! Error types for the assurance library

use std::path::PathBuf;

/// Result type alias for assurance operations
pub type Result<T> = std::result::Result<T, AssuranceError>;

/// Error type for scan, merge and restore operations
#[derive(Debug, thiserror::Error)]
pub enum AssuranceError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A merge needed a file reference that is absent
    #[error("Null file reference: {0}")]
    NullFileReference(String),

    /// The scan definition or one of its mappings is malformed
    #[error("Incomplete scan definition: {0}")]
    IncompleteScanDefinition(String),

    /// Hash computation errors
    #[error("Hash computation error for '{path}': {message}")]
    Hash { path: PathBuf, message: String },

    /// File copying errors
    #[error("File copy error: {message}")]
    FileCopy { message: String },

    /// Errors moving an item into or out of the deleted items location
    #[error("File move error: {message}")]
    FileMove { message: String },

    /// Worker pool construction errors
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AssuranceError {
    /// Create a new null file reference error
    pub fn null_reference(message: impl Into<String>) -> Self {
        Self::NullFileReference(message.into())
    }

    /// Create a new incomplete scan definition error
    pub fn incomplete_definition(message: impl Into<String>) -> Self {
        Self::IncompleteScanDefinition(message.into())
    }

    /// Create a new hash error
    pub fn hash_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(
        source: impl AsRef<std::path::Path>,
        dest: impl AsRef<std::path::Path>,
        message: impl Into<String>,
    ) -> Self {
        let full_message = format!(
            "File copy error from '{}' to '{}': {}",
            source.as_ref().display(),
            dest.as_ref().display(),
            message.into()
        );
        Self::FileCopy {
            message: full_message,
        }
    }

    /// Create a new file move error
    pub fn move_error(
        source: impl AsRef<std::path::Path>,
        dest: impl AsRef<std::path::Path>,
        message: impl Into<String>,
    ) -> Self {
        let full_message = format!(
            "Could not move '{}' to '{}': {}",
            source.as_ref().display(),
            dest.as_ref().display(),
            message.into()
        );
        Self::FileMove {
            message: full_message,
        }
    }

    /// Whether this error is structural and must abort the whole operation
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NullFileReference(_) | Self::IncompleteScanDefinition(_)
        )
    }
}
