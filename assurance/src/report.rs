//! Serialisable snapshot of a scan, used to persist results between runs

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::definition::ScanDefinition;
use crate::error::Result;
use crate::model::ComparisonResult;
use crate::scan::Scan;

/// Everything needed to rebuild a [`Scan`], including each result's deleted items folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: Uuid,
    pub definition: Option<ScanDefinition>,
    pub started: DateTime<Local>,
    pub completed: Option<DateTime<Local>>,
    pub results: Vec<ComparisonResult>,
}

impl ScanReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        tracing::info!("Wrote scan report to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Scan {
    pub fn to_report(&self) -> ScanReport {
        ScanReport {
            id: self.id(),
            definition: self.definition().cloned(),
            started: self.started(),
            completed: self.completed(),
            results: self.results(),
        }
    }

    /// Rebuild a scan. Results keep the deleted items folder they were stamped with.
    pub fn from_report(report: ScanReport) -> Self {
        Scan::restore(
            report.id,
            report.definition,
            report.started,
            report.completed,
            report.results,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use crate::definition::ScanMappingDefinition;
    use crate::model::{ComparisonReason, FileReference};

    #[test]
    fn test_report_preserves_scan() {
        let definition = ScanDefinition::new("docs").with_mapping(ScanMappingDefinition::new("/a", "/b"));
        let scan = Scan::new(Some(definition));
        scan.add_result(ComparisonResult::new(
            FileReference::new("/a/x"),
            FileReference::new("/b/x"),
            ComparisonReason::TargetDoesNotExist,
        ));
        scan.mark_completed();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("scan.json");
        scan.to_report().save(&path).unwrap();

        let restored = Scan::from_report(ScanReport::load(&path).unwrap());
        assert_eq!(restored.id(), scan.id());
        assert_eq!(restored.description(), scan.description());
        assert_eq!(restored.results(), scan.results());
        assert_eq!(
            restored.results()[0].deleted_items_folder,
            Some(scan.deleted_items_folder_name())
        );
    }

    #[test]
    fn test_load_missing_report() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ScanReport::load(&temp_dir.path().join("missing.json")).is_err());
    }
}
