//! Statistics over the results of a scan

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::{ComparisonReason, ComparisonResolution, ComparisonResult};
use crate::scan::Scan;

/// Result counts of one scan, by reason and by resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub description: String,
    pub total: usize,
    pub by_reason: HashMap<ComparisonReason, usize>,
    pub by_resolution: HashMap<ComparisonResolution, usize>,
    /// Results carrying an error message
    pub errors: usize,
    pub processing_seconds: i64,
}

impl ScanSummary {
    pub fn from_scan(scan: &Scan) -> Self {
        let results = scan.results();
        Self::from_results(
            scan.id(),
            scan.description(),
            &results,
            scan.processing_time().num_seconds(),
        )
    }

    pub fn from_results(
        scan_id: Uuid,
        description: String,
        results: &[ComparisonResult],
        processing_seconds: i64,
    ) -> Self {
        let mut by_reason = HashMap::new();
        let mut by_resolution = HashMap::new();
        let mut errors = 0;

        for result in results {
            *by_reason.entry(result.reason).or_insert(0) += 1;
            *by_resolution.entry(result.resolution).or_insert(0) += 1;
            if result.resolution_error.is_some() {
                errors += 1;
            }
        }

        Self {
            scan_id,
            description,
            total: results.len(),
            by_reason,
            by_resolution,
            errors,
            processing_seconds,
        }
    }

    pub fn reason_count(&self, reason: ComparisonReason) -> usize {
        self.by_reason.get(&reason).copied().unwrap_or(0)
    }

    pub fn resolution_count(&self, resolution: ComparisonResolution) -> usize {
        self.by_resolution.get(&resolution).copied().unwrap_or(0)
    }

    pub fn unresolved(&self) -> usize {
        self.resolution_count(ComparisonResolution::Unresolved)
    }

    /// True when nothing differs
    pub fn is_clean(&self) -> bool {
        self.total == 0
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        let reasons: Vec<String> = ComparisonReason::ALL
            .iter()
            .filter(|reason| self.reason_count(**reason) > 0)
            .map(|reason| format!("{}: {}", reason, self.reason_count(*reason)))
            .collect();

        format!(
            "{}: {} differences ({}), {} unresolved, {} replaced, {} deleted, {} errors",
            self.description,
            self.total,
            if reasons.is_empty() { "none".to_string() } else { reasons.join(", ") },
            self.unresolved(),
            self.resolution_count(ComparisonResolution::ReplaceSource)
                + self.resolution_count(ComparisonResolution::ReplaceTarget),
            self.resolution_count(ComparisonResolution::DeleteSource)
                + self.resolution_count(ComparisonResolution::DeleteTarget),
            self.errors
        )
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileReference;

    fn result(reason: ComparisonReason, resolution: ComparisonResolution) -> ComparisonResult {
        let mut result = ComparisonResult::new(FileReference::new("/s"), FileReference::new("/t"), reason);
        result.resolution = resolution;
        result
    }

    #[test]
    fn test_counts() {
        let mut failed = result(ComparisonReason::Undetermined, ComparisonResolution::Unresolved);
        failed.set_processing_error("read error");

        let results = vec![
            result(ComparisonReason::CompareFailed, ComparisonResolution::ReplaceTarget),
            result(ComparisonReason::CompareFailed, ComparisonResolution::Unresolved),
            result(ComparisonReason::TargetDoesNotExist, ComparisonResolution::DeleteSource),
            failed,
        ];
        let summary = ScanSummary::from_results(Uuid::new_v4(), "docs".into(), &results, 3);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.reason_count(ComparisonReason::CompareFailed), 2);
        assert_eq!(summary.reason_count(ComparisonReason::FileNull), 0);
        assert_eq!(summary.unresolved(), 1);
        assert_eq!(summary.resolution_count(ComparisonResolution::ProcessingErrorEncountered), 1);
        assert_eq!(summary.errors, 1);
        assert!(!summary.is_clean());
        assert_eq!(
            summary.summary(),
            "docs: 4 differences (Compare failed: 2, Target does not exist: 1, Undetermined: 1), \
             1 unresolved, 1 replaced, 1 deleted, 1 errors"
        );
    }

    #[test]
    fn test_empty_scan() {
        let scan = Scan::new(None);
        let summary = ScanSummary::from_scan(&scan);
        assert!(summary.is_clean());
        assert_eq!(summary.summary(), "<anonymous scan>: 0 differences (none), 0 unresolved, 0 replaced, 0 deleted, 0 errors");
        assert!(summary.to_json().unwrap().contains("\"total\": 0"));
    }
}
