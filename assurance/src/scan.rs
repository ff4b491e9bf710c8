//! A single comparison run and the results it collected

use chrono::{DateTime, Duration, Local};
use parking_lot::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::definition::ScanDefinition;
use crate::model::ComparisonResult;

const ANONYMOUS_SCAN_FOLDER: &str = "anonymous_scan";
const ANONYMOUS_SCAN_DESCRIPTION: &str = "<anonymous scan>";

/// One comparison run over every mapping of a definition.
///
/// Results are appended concurrently by comparison tasks, so the collection sits behind a
/// mutex and the scan itself is shared as `Arc<Scan>`.
#[derive(Debug)]
pub struct Scan {
    id: Uuid,
    definition: Option<ScanDefinition>,
    started: DateTime<Local>,
    completed: Mutex<Option<DateTime<Local>>>,
    results: Mutex<Vec<ComparisonResult>>,
}

impl Scan {
    pub fn new(definition: Option<ScanDefinition>) -> Self {
        Self::restore(Uuid::new_v4(), definition, Local::now(), None, Vec::new())
    }

    /// Rebuild a scan from persisted parts
    pub(crate) fn restore(
        id: Uuid,
        definition: Option<ScanDefinition>,
        started: DateTime<Local>,
        completed: Option<DateTime<Local>>,
        results: Vec<ComparisonResult>,
    ) -> Self {
        Self {
            id,
            definition,
            started,
            completed: Mutex::new(completed),
            results: Mutex::new(results),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition(&self) -> Option<&ScanDefinition> {
        self.definition.as_ref()
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn completed(&self) -> Option<DateTime<Local>> {
        *self.completed.lock()
    }

    pub fn mark_completed(&self) {
        *self.completed.lock() = Some(Local::now());
    }

    /// Adopt a result, stamping it with this scan's deleted items folder
    pub fn add_result(&self, mut result: ComparisonResult) {
        result.deleted_items_folder = Some(self.deleted_items_folder_name());
        self.results.lock().push(result);
    }

    /// Snapshot of the current results
    pub fn results(&self) -> Vec<ComparisonResult> {
        self.results.lock().clone()
    }

    /// Exclusive access to the results, used by the merge engine
    pub fn results_mut(&self) -> MutexGuard<'_, Vec<ComparisonResult>> {
        self.results.lock()
    }

    pub fn result_count(&self) -> usize {
        self.results.lock().len()
    }

    /// `<definition name or anonymous_scan>_<MM_dd_yyyy_HH_mm_ss>`
    pub fn deleted_items_folder_name(&self) -> String {
        let name = self
            .definition
            .as_ref()
            .map(|definition| definition.name.as_str())
            .unwrap_or(ANONYMOUS_SCAN_FOLDER);
        format!("{}_{}", name, self.started.format("%m_%d_%Y_%H_%M_%S"))
    }

    /// Elapsed time between start and completion, zero while running
    pub fn processing_time(&self) -> Duration {
        self.completed()
            .map(|completed| completed - self.started)
            .unwrap_or_else(Duration::zero)
    }

    /// `<name> - <MM/dd/yyyy hh:mm:ss>, Time: <N> days, HH:MM:SS`
    pub fn description(&self) -> String {
        match &self.definition {
            Some(definition) => format!(
                "{} - {}, Time: {}",
                definition.name,
                self.started.format("%m/%d/%Y %I:%M:%S"),
                format_processing_time(self.processing_time())
            ),
            None => ANONYMOUS_SCAN_DESCRIPTION.to_string(),
        }
    }
}

/// `<N> days, HH:MM:SS`
pub fn format_processing_time(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    format!(
        "{} days, {:02}:{:02}:{:02}",
        seconds / 86_400,
        (seconds / 3_600) % 24,
        (seconds / 60) % 60,
        seconds % 60
    )
}
