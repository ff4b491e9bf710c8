//! Concurrent recursive comparison of mapped source/target trees

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::comparator::{ComparisonFlags, FileComparator};
use crate::config::ScanOptions;
use crate::definition::ScanDefinition;
use crate::error::Result;
use crate::filter::{ExclusionSet, IgnoreFilter, PathFilter};
use crate::model::{ComparisonReason, ComparisonResult, FileReference};
use crate::pool::{TaskGroup, WorkerPool};
use crate::progress::ProgressReporter;
use crate::scan::Scan;

/// Walks mapped trees and records every difference into a [`Scan`]
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    options: ScanOptions,
    comparator: FileComparator,
    ignore: IgnoreFilter,
}

/// State shared by every task of one mapping
struct MappingContext {
    scan: Arc<Scan>,
    filter: PathFilter,
    comparator: FileComparator,
    flags: ComparisonFlags,
    tasks: TaskGroup,
    monitor: Option<ProgressReporter>,
}

impl ComparisonEngine {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            comparator: FileComparator::from_options(&options),
            ignore: IgnoreFilter::from_options(&options),
            options,
        }
    }

    /// Schedule the comparison of one source/target pair. Returns once the work is queued;
    /// wait on the pool for it to finish.
    pub fn determine_differences(
        &self,
        source: Option<&Path>,
        target: Option<&Path>,
        scan: &Arc<Scan>,
        pool: &WorkerPool,
        exclusions: &[FileReference],
        monitor: Option<&ProgressReporter>,
    ) {
        let context = Arc::new(MappingContext {
            scan: Arc::clone(scan),
            filter: PathFilter::new(self.ignore.clone(), ExclusionSet::from_references(exclusions)),
            comparator: self.comparator,
            flags: self.flags_for(scan),
            tasks: pool.tasks().clone(),
            monitor: monitor.cloned(),
        });

        let source = source.map(Path::to_path_buf);
        let target = target.map(Path::to_path_buf);
        let task_context = Arc::clone(&context);
        context
            .tasks
            .spawn(move || compare_pair(&task_context, source.as_deref(), target.as_deref()));
    }

    /// Validate the definition, compare every mapping and wait for the results
    pub fn perform_scan(
        &self,
        definition: ScanDefinition,
        pool: &WorkerPool,
        monitor: Option<&ProgressReporter>,
    ) -> Result<Arc<Scan>> {
        definition.validate()?;

        let mappings = definition.mappings.clone();
        let name = definition.name.clone();
        let scan = Arc::new(Scan::new(Some(definition)));
        info!("Starting scan '{}' with {} mappings", name, mappings.len());
        if let Some(monitor) = monitor {
            monitor.scan_started(scan.id(), &name);
        }

        for mapping in &mappings {
            self.determine_differences(
                mapping.source.as_deref(),
                mapping.target.as_deref(),
                &scan,
                pool,
                &mapping.exclusions,
                monitor,
            );
        }

        self.finish(&scan, pool, monitor);
        Ok(scan)
    }

    /// Compare a single pair outside of any scan definition
    pub fn perform_mapping_scan(
        &self,
        source: &Path,
        target: &Path,
        pool: &WorkerPool,
        exclusions: &[FileReference],
        monitor: Option<&ProgressReporter>,
    ) -> Arc<Scan> {
        let scan = Arc::new(Scan::new(None));
        info!("Starting scan of {} against {}", source.display(), target.display());
        self.determine_differences(Some(source), Some(target), &scan, pool, exclusions, monitor);
        self.finish(&scan, pool, monitor);
        scan
    }

    fn finish(&self, scan: &Arc<Scan>, pool: &WorkerPool, monitor: Option<&ProgressReporter>) {
        pool.wait();
        scan.mark_completed();

        let results = scan.result_count();
        info!("Scan completed: {} differences, {}", results, scan.description());
        if let Some(monitor) = monitor {
            monitor.scan_completed(scan.id(), results);
        }
    }

    /// Definition flags win; options apply to scans without a definition
    fn flags_for(&self, scan: &Scan) -> ComparisonFlags {
        match scan.definition() {
            Some(definition) => ComparisonFlags {
                include_timestamps: definition.include_non_creation_timestamps,
                include_advanced: definition.include_advanced_attributes,
            },
            None => ComparisonFlags {
                include_timestamps: self.options.include_non_creation_timestamps,
                include_advanced: self.options.include_advanced_attributes,
            },
        }
    }
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

fn is_dir(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_dir()).unwrap_or(false)
}

fn compare_pair(context: &Arc<MappingContext>, source: Option<&Path>, target: Option<&Path>) {
    if let Some(monitor) = &context.monitor {
        monitor.comparing(source, target);
    }

    let (source, target) = match (source, target) {
        (None, None) => {
            debug!("Source and target are both null");
            return;
        }
        _ if context.filter.should_skip(source, target) => {
            debug!("Skipping ignored or excluded pair");
            return;
        }
        (Some(source), Some(target)) => (source, target),
        _ => {
            record(context, source, target, ComparisonReason::FileNull);
            return;
        }
    };

    match (exists(source), exists(target)) {
        (false, false) => {
            debug!("Neither {} nor {} exists", source.display(), target.display());
            return;
        }
        (true, false) => {
            record(context, Some(source), Some(target), ComparisonReason::TargetDoesNotExist);
            return;
        }
        (false, true) => {
            record(context, Some(source), Some(target), ComparisonReason::SourceDoesNotExist);
            return;
        }
        (true, true) => {}
    }

    let source_is_dir = is_dir(source);
    if source_is_dir != is_dir(target) {
        record(context, Some(source), Some(target), ComparisonReason::FileDirectoryMismatch);
        return;
    }

    match (is_symlink(source), is_symlink(target)) {
        (true, true) => compare_links(context, source, target),
        (true, false) | (false, true) => {
            record(context, Some(source), Some(target), ComparisonReason::SymbolicLinkMismatch)
        }
        (false, false) if source_is_dir => compare_directories(context, source, target),
        (false, false) => compare_files(context, source, target),
    }
}

fn compare_links(context: &Arc<MappingContext>, source: &Path, target: &Path) {
    match (fs::read_link(source), fs::read_link(target)) {
        (Ok(source_link), Ok(target_link)) => {
            if source_link != target_link {
                record(context, Some(source), Some(target), ComparisonReason::CompareFailed);
            }
        }
        (Err(e), _) | (_, Err(e)) => record_error(context, source, target, e.to_string()),
    }
}

fn compare_files(context: &Arc<MappingContext>, source: &Path, target: &Path) {
    match context.comparator.compare(source, target, context.flags) {
        Ok(true) => debug!("{} is identical to {}", source.display(), target.display()),
        Ok(false) => record(context, Some(source), Some(target), ComparisonReason::CompareFailed),
        Err(e) => {
            error!("Error comparing {} to {}: {}", source.display(), target.display(), e);
            record_error(context, source, target, e.to_string());
        }
    }
}

fn compare_directories(context: &Arc<MappingContext>, source: &Path, target: &Path) {
    let source_children = match child_names(source) {
        Ok(children) => children,
        Err(e) => {
            error!("Could not list {}: {}", source.display(), e);
            record_error(context, source, target, e.to_string());
            return;
        }
    };

    for name in source_children {
        let source_child = source.join(&name);
        let target_child = target.join(&name);
        if context.filter.should_skip(Some(source_child.as_path()), Some(target_child.as_path())) {
            continue;
        }

        if exists(&target_child) {
            let task_context = Arc::clone(context);
            context.tasks.spawn(move || {
                compare_pair(
                    &task_context,
                    Some(source_child.as_path()),
                    Some(target_child.as_path()),
                )
            });
        } else {
            record(
                context,
                Some(source_child.as_path()),
                Some(target_child.as_path()),
                ComparisonReason::TargetDoesNotExist,
            );
        }
    }

    let target_children = match child_names(target) {
        Ok(children) => children,
        Err(e) => {
            error!("Could not list {}: {}", target.display(), e);
            record_error(context, source, target, e.to_string());
            return;
        }
    };

    for name in target_children {
        let source_child = source.join(&name);
        let target_child = target.join(&name);
        if context.filter.should_skip(Some(source_child.as_path()), Some(target_child.as_path())) {
            continue;
        }

        if !exists(&source_child) {
            record(
                context,
                Some(source_child.as_path()),
                Some(target_child.as_path()),
                ComparisonReason::SourceDoesNotExist,
            );
        }
    }
}

fn child_names(dir: &Path) -> std::io::Result<Vec<std::ffi::OsString>> {
    fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.file_name()))
        .collect()
}

fn reference(context: &MappingContext, path: Option<&Path>) -> FileReference {
    match path {
        Some(path) => FileReference::capture(path, Some(context.comparator.hasher())),
        None => FileReference::null(),
    }
}

fn record(
    context: &MappingContext,
    source: Option<&Path>,
    target: Option<&Path>,
    reason: ComparisonReason,
) {
    info!(
        "{} does not match {}: {}",
        display_path(source),
        display_path(target),
        reason
    );
    if let Some(monitor) = &context.monitor {
        monitor.difference_found(source, target, reason);
    }

    let result = ComparisonResult::new(
        reference(context, source),
        reference(context, target),
        reason,
    );
    context.scan.add_result(result);
}

fn record_error(context: &MappingContext, source: &Path, target: &Path, message: String) {
    let mut result = ComparisonResult::new(
        FileReference::new(source),
        FileReference::new(target),
        ComparisonReason::Undetermined,
    );
    result.set_processing_error(message);
    context.scan.add_result(result);
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<null>".to_string())
}
