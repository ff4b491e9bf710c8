//! Merge engine: resolves comparison results by copying or trashing files

mod bidirectional;
mod source;
mod target;

pub use bidirectional::BidirectionalMerge;
pub use source::SourceMerge;
pub use target::TargetMerge;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::definition::{MergeStrategyKind, ScanDefinition};
use crate::error::{AssuranceError, Result};
use crate::model::{ComparisonResolution, ComparisonResult};
use crate::pool::WorkerPool;
use crate::progress::ProgressReporter;
use crate::scan::Scan;
use crate::trash::{copy_path, move_path, DeletedItems};

const MISSING_DELETED_ITEM: &str = "Item to restore does not exist.";

/// How a single unresolved result is merged
pub trait MergeStrategy: Send + Sync {
    fn kind(&self) -> MergeStrategyKind;

    /// Resolve `result`. Per-item I/O failures are recorded on the result; only structural
    /// problems (a missing file reference) are returned as errors.
    fn merge_result(
        &self,
        result: &mut ComparisonResult,
        deleted_items: &DeletedItems,
        monitor: Option<&ProgressReporter>,
    ) -> Result<()>;
}

/// Applies a merge strategy to results, one at a time or a whole scan on a pool
#[derive(Clone)]
pub struct MergeEngine {
    strategy: Arc<dyn MergeStrategy>,
    deleted_items: Arc<DeletedItems>,
}

impl MergeEngine {
    pub fn new(strategy: Arc<dyn MergeStrategy>, deleted_items: DeletedItems) -> Self {
        Self {
            strategy,
            deleted_items: Arc::new(deleted_items),
        }
    }

    /// Engine for one of the built-in strategies
    pub fn for_strategy(kind: MergeStrategyKind, deleted_items: DeletedItems) -> Self {
        let strategy: Arc<dyn MergeStrategy> = match kind {
            MergeStrategyKind::Source => Arc::new(SourceMerge),
            MergeStrategyKind::Target => Arc::new(TargetMerge),
            MergeStrategyKind::Both => Arc::new(BidirectionalMerge),
        };
        Self::new(strategy, deleted_items)
    }

    /// Engine for the strategy named by the scan's definition
    pub fn for_scan(scan: &Scan, deleted_items: DeletedItems) -> Self {
        let kind = scan
            .definition()
            .map(|definition| definition.merge_strategy)
            .unwrap_or_default();
        Self::for_strategy(kind, deleted_items)
    }

    pub fn strategy_kind(&self) -> MergeStrategyKind {
        self.strategy.kind()
    }

    pub fn deleted_items(&self) -> &DeletedItems {
        &self.deleted_items
    }

    /// Whether `merge_scan` picks up this result
    pub fn should_merge(
        &self,
        definition: Option<&ScanDefinition>,
        result: &ComparisonResult,
    ) -> bool {
        if result.is_resolved() {
            return false;
        }

        let Some(definition) = definition else {
            return true;
        };
        if definition.auto_resolve_conflicts {
            return true;
        }

        let source_exists = result.source.exists();
        let target_exists = result.target.exists();
        let source_present = !result.source.is_null();
        let target_present = !result.target.is_null();

        if source_exists && target_exists {
            return false;
        }
        // Never delete the surviving side without auto-resolve
        if source_exists && target_present && !target_exists
            && definition.merge_strategy == MergeStrategyKind::Target
        {
            return false;
        }
        if target_exists && source_present && !source_exists
            && definition.merge_strategy == MergeStrategyKind::Source
        {
            return false;
        }

        true
    }

    /// Merge one result. Results that are already resolved are left alone.
    pub fn merge_result(
        &self,
        result: &mut ComparisonResult,
        monitor: Option<&ProgressReporter>,
    ) -> Result<()> {
        if result.is_resolved() {
            debug!("{} is already resolved", result);
            return Ok(());
        }
        self.strategy.merge_result(result, &self.deleted_items, monitor)
    }

    /// Merge every eligible result of `scan` on the pool and wait for completion.
    ///
    /// A failure on one result, including a missing file reference, is recorded on that
    /// result and never stops its siblings. Returns the number of results handed to the
    /// strategy.
    pub fn merge_scan(
        &self,
        scan: &Scan,
        pool: &WorkerPool,
        monitor: Option<&ProgressReporter>,
    ) -> Result<usize> {
        let selected: Vec<(usize, ComparisonResult)> = scan
            .results_mut()
            .iter()
            .enumerate()
            .filter(|(_, result)| self.should_merge(scan.definition(), result))
            .map(|(index, result)| (index, result.clone()))
            .collect();

        let count = selected.len();
        info!("Merging {} results with the {} strategy", count, self.strategy_kind());

        let merged = Arc::new(Mutex::new(Vec::with_capacity(count)));
        for (index, mut result) in selected {
            let engine = self.clone();
            let merged = Arc::clone(&merged);
            let monitor = monitor.cloned();
            pool.spawn(move || {
                if let Err(e) = engine.merge_result(&mut result, monitor.as_ref()) {
                    error!("Could not merge {}: {}", result, e);
                    result.set_processing_error(e.to_string());
                }
                merged.lock().push((index, result));
            });
        }
        pool.wait();

        let merged = std::mem::take(&mut *merged.lock());
        let mut results = scan.results_mut();
        for (index, result) in merged {
            if let Some(slot) = results.get_mut(index) {
                *slot = result;
            }
        }

        Ok(count)
    }

    /// Move a deleted item back from the deleted items location.
    ///
    /// Only DELETE_SOURCE and DELETE_TARGET results are touched. On success the result is
    /// UNRESOLVED again; if the move back fails it stays deleted so the restore can be retried.
    pub fn restore_deleted_item(
        &self,
        result: &mut ComparisonResult,
        monitor: Option<&ProgressReporter>,
    ) {
        let path = match result.resolution {
            ComparisonResolution::DeleteSource => result.source.path.clone(),
            ComparisonResolution::DeleteTarget => result.target.path.clone(),
            _ => return,
        };
        let Some(path) = path else {
            return;
        };

        if let Some(monitor) = monitor {
            monitor.restoring(&path);
        }

        let deleted_item = self.deleted_items.location_for(result, &path);
        if deleted_item.symlink_metadata().is_err() {
            warn!("{} ({})", MISSING_DELETED_ITEM, deleted_item.display());
            result.set_processing_error(MISSING_DELETED_ITEM);
            return;
        }

        match move_path(&deleted_item, &path) {
            Ok(()) => {
                info!("Restored {}", path.display());
                result.resolution = ComparisonResolution::Unresolved;
                result.resolution_error = None;
            }
            Err(e) => {
                warn!(
                    "Could not move item from deleted items location {}: {}",
                    deleted_item.display(),
                    e
                );
                result.set_resolution_error(e.to_string());
            }
        }
    }
}

/// Both paths of a result, or `NullFileReference`
fn required_paths(result: &ComparisonResult) -> Result<(PathBuf, PathBuf)> {
    match (&result.source.path, &result.target.path) {
        (Some(source), Some(target)) => Ok((source.clone(), target.clone())),
        _ => Err(AssuranceError::null_reference("The source or target file is null.")),
    }
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Copy `from` over `to`, recording `resolution` or the failure
fn replace(
    result: &mut ComparisonResult,
    from: &Path,
    to: &Path,
    resolution: ComparisonResolution,
) {
    match copy_path(from, to) {
        Ok(()) => {
            info!("Replaced {} with {}", to.display(), from.display());
            result.resolution = resolution;
        }
        Err(e) => {
            error!("An error occurred replacing {} with {}: {}", to.display(), from.display(), e);
            result.set_processing_error(e.to_string());
        }
    }
}

/// Move `path` into the deleted items location, recording `resolution` or the failure
fn delete_to_trash(
    result: &mut ComparisonResult,
    path: &Path,
    deleted_items: &DeletedItems,
    resolution: ComparisonResolution,
) {
    let location = deleted_items.location_for(result, path);
    match move_path(path, &location) {
        Ok(()) => {
            info!("Moved {} to {}", path.display(), location.display());
            result.resolution = resolution;
        }
        Err(e) => {
            warn!("Could not move item to deleted items location {}: {}", path.display(), e);
            result.set_processing_error(e.to_string());
        }
    }
}
