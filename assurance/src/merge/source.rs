use super::{delete_to_trash, exists, replace, required_paths, MergeStrategy};
use crate::definition::MergeStrategyKind;
use crate::error::Result;
use crate::model::{ComparisonResolution, ComparisonResult};
use crate::progress::ProgressReporter;
use crate::trash::DeletedItems;

/// Source is authoritative: copy it over the target, or trash a target it lacks
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceMerge;

impl MergeStrategy for SourceMerge {
    fn kind(&self) -> MergeStrategyKind {
        MergeStrategyKind::Source
    }

    fn merge_result(
        &self,
        result: &mut ComparisonResult,
        deleted_items: &DeletedItems,
        monitor: Option<&ProgressReporter>,
    ) -> Result<()> {
        let (source, target) = required_paths(result)?;
        if let Some(monitor) = monitor {
            monitor.merging(&source, &target);
        }

        if exists(&source) {
            replace(result, &source, &target, ComparisonResolution::ReplaceTarget);
        } else if exists(&target) {
            delete_to_trash(result, &target, deleted_items, ComparisonResolution::DeleteTarget);
        }
        Ok(())
    }
}
