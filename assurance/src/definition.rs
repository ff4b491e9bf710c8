//! Scan definitions: which source/target pairs to compare and how to merge them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{AssuranceError, Result};
use crate::model::FileReference;

/// Which side wins when a difference is merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategyKind {
    /// Source is authoritative
    #[default]
    Source,
    /// Target is authoritative
    Target,
    /// Copy whichever side exists, never delete
    Both,
}

impl fmt::Display for MergeStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("Source"),
            Self::Target => f.write_str("Target"),
            Self::Both => f.write_str("Both"),
        }
    }
}

/// One source/target pair, with the paths excluded beneath it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMappingDefinition {
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
    #[serde(default)]
    pub exclusions: Vec<FileReference>,
}

impl ScanMappingDefinition {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
            exclusions: Vec::new(),
        }
    }

    /// Builder-style exclusion
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclusions.push(FileReference::new(path));
        self
    }

    pub fn exclusion_paths(&self) -> Vec<PathBuf> {
        self.exclusions
            .iter()
            .filter_map(|exclusion| exclusion.path.clone())
            .collect()
    }
}

/// A named scan: its mappings, merge strategy and comparison flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub merge_strategy: MergeStrategyKind,
    #[serde(default)]
    pub auto_resolve_conflicts: bool,
    #[serde(default)]
    pub include_non_creation_timestamps: bool,
    #[serde(default)]
    pub include_advanced_attributes: bool,
    #[serde(default)]
    pub mappings: Vec<ScanMappingDefinition>,
}

impl ScanDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            merge_strategy: MergeStrategyKind::default(),
            auto_resolve_conflicts: false,
            include_non_creation_timestamps: false,
            include_advanced_attributes: false,
            mappings: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: ScanMappingDefinition) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_strategy(mut self, strategy: MergeStrategyKind) -> Self {
        self.merge_strategy = strategy;
        self
    }

    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve_conflicts = auto_resolve;
        self
    }

    /// Check that there is at least one mapping and that every mapping names both paths
    pub fn validate(&self) -> Result<()> {
        if self.mappings.is_empty() {
            return Err(AssuranceError::incomplete_definition(format!(
                "Scan definition '{}' has no mappings",
                self.name
            )));
        }

        for (index, mapping) in self.mappings.iter().enumerate() {
            if mapping.source.is_none() || mapping.target.is_none() {
                return Err(AssuranceError::incomplete_definition(format!(
                    "Mapping {} of scan definition '{}' is missing a {} path",
                    index,
                    self.name,
                    if mapping.source.is_none() { "source" } else { "target" }
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for ScanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let definition = ScanDefinition::new("photos");
        assert_eq!(definition.merge_strategy, MergeStrategyKind::Source);
        assert!(!definition.auto_resolve_conflicts);
        assert!(!definition.include_non_creation_timestamps);
        assert!(!definition.include_advanced_attributes);
    }

    #[test]
    fn test_validate() {
        let definition = ScanDefinition::new("empty");
        assert!(matches!(
            definition.validate(),
            Err(AssuranceError::IncompleteScanDefinition(_))
        ));

        let mut missing_target = ScanMappingDefinition::new("/a", "/b");
        missing_target.target = None;
        let definition = ScanDefinition::new("partial").with_mapping(missing_target);
        let err = definition.validate().unwrap_err();
        assert!(err.to_string().contains("missing a target path"));

        let definition = ScanDefinition::new("ok").with_mapping(ScanMappingDefinition::new("/a", "/b"));
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_definition_from_yaml() {
        let yaml = r#"
name: backup
merge_strategy: TARGET
mappings:
  - source: /data/a
    target: /data/b
    exclusions:
      - path: /data/a/cache
"#;
        let definition: ScanDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(definition.merge_strategy, MergeStrategyKind::Target);
        assert_eq!(definition.mappings[0].exclusion_paths(), vec![PathBuf::from("/data/a/cache")]);
    }
}
