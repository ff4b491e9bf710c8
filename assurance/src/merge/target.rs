use super::{delete_to_trash, exists, replace, required_paths, MergeStrategy};
use crate::definition::MergeStrategyKind;
use crate::error::Result;
use crate::model::{ComparisonResolution, ComparisonResult};
use crate::progress::ProgressReporter;
use crate::trash::DeletedItems;

/// Target is authoritative: copy it over the source, or trash a source it lacks
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetMerge;

impl MergeStrategy for TargetMerge {
    fn kind(&self) -> MergeStrategyKind {
        MergeStrategyKind::Target
    }

    fn merge_result(
        &self,
        result: &mut ComparisonResult,
        deleted_items: &DeletedItems,
        monitor: Option<&ProgressReporter>,
    ) -> Result<()> {
        let (source, target) = required_paths(result)?;
        if let Some(monitor) = monitor {
            monitor.merging(&target, &source);
        }

        if exists(&target) {
            replace(result, &target, &source, ComparisonResolution::ReplaceSource);
        } else if exists(&source) {
            delete_to_trash(result, &source, deleted_items, ComparisonResolution::DeleteSource);
        }
        Ok(())
    }
}
