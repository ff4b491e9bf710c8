use super::{exists, replace, required_paths, MergeStrategy};
use crate::definition::MergeStrategyKind;
use crate::error::Result;
use crate::model::{ComparisonResolution, ComparisonResult};
use crate::progress::ProgressReporter;
use crate::trash::DeletedItems;

/// Copies whichever side exists onto the other. Never deletes; when both sides exist the
/// source wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct BidirectionalMerge;

impl MergeStrategy for BidirectionalMerge {
    fn kind(&self) -> MergeStrategyKind {
        MergeStrategyKind::Both
    }

    fn merge_result(
        &self,
        result: &mut ComparisonResult,
        _deleted_items: &DeletedItems,
        monitor: Option<&ProgressReporter>,
    ) -> Result<()> {
        let (source, target) = required_paths(result)?;

        if exists(&source) {
            if let Some(monitor) = monitor {
                monitor.merging(&source, &target);
            }
            replace(result, &source, &target, ComparisonResolution::ReplaceTarget);
        } else if exists(&target) {
            if let Some(monitor) = monitor {
                monitor.merging(&target, &source);
            }
            replace(result, &target, &source, ComparisonResolution::ReplaceSource);
        }
        Ok(())
    }
}
