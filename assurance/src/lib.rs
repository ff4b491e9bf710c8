//! Assurance Library
//!
//! Compares mapped source/target directory trees and reconciles the differences:
//! - Attribute snapshots with quick and comprehensive comparison policies
//! - Concurrent recursive tree comparison on a bounded worker pool
//! - Source, target and bidirectional merge strategies
//! - Reversible deletion through a per-scan deleted items location
//! - Progress reporting, summaries and persisted scan reports

pub mod attributes;
pub mod comparator;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod filter;
pub mod merge;
pub mod model;
pub mod pool;
pub mod progress;
pub mod report;
pub mod scan;
pub mod summary;
pub mod trash;

// Re-export main types and functions
pub use attributes::{ContentHasher, FileAttributes};
pub use comparator::{AttributeComparator, ComparisonFlags, ComparisonPolicy, FileComparator};
pub use config::{ApplicationConfiguration, HashAlgorithm, ScanOptions};
pub use definition::{MergeStrategyKind, ScanDefinition, ScanMappingDefinition};
pub use engine::ComparisonEngine;
pub use error::{AssuranceError, Result};
pub use filter::{ExclusionSet, IgnoreFilter, PathFilter};
pub use merge::{BidirectionalMerge, MergeEngine, MergeStrategy, SourceMerge, TargetMerge};
pub use model::{ComparisonReason, ComparisonResolution, ComparisonResult, FileReference};
pub use pool::{TaskGroup, WorkerPool};
pub use progress::{ProgressChannel, ProgressEvent, ProgressReporter};
pub use report::ScanReport;
pub use scan::Scan;
pub use summary::ScanSummary;
pub use trash::DeletedItems;

use std::sync::Arc;

/// Run a scan on a pool sized from `options`
pub fn scan(
    definition: ScanDefinition,
    options: ScanOptions,
    monitor: Option<&ProgressReporter>,
) -> Result<Arc<Scan>> {
    let pool = WorkerPool::from_options(&options)?;
    ComparisonEngine::new(options).perform_scan(definition, &pool, monitor)
}

/// Merge every eligible result of `scan` with the strategy of its definition
pub fn merge(
    scan: &Scan,
    options: &ScanOptions,
    deleted_items: DeletedItems,
    monitor: Option<&ProgressReporter>,
) -> Result<usize> {
    let pool = WorkerPool::from_options(options)?;
    MergeEngine::for_scan(scan, deleted_items).merge_scan(scan, &pool, monitor)
}

#[cfg(test)]
mod test_support;
