//! Progress reporting for scans, merges and restores

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::model::ComparisonReason;

/// Progress event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// Scan of a definition started
    ScanStarted { scan_id: Uuid, name: String },
    /// A source/target pair is being compared
    Comparing { source: String, target: String },
    /// A difference was recorded
    DifferenceFound {
        source: String,
        target: String,
        reason: ComparisonReason,
    },
    /// Scan finished
    ScanCompleted { scan_id: Uuid, results: usize },
    /// A result is being merged
    Merging { from: String, to: String },
    /// A deleted item is being restored
    Restoring { path: String },
    /// Free-form message
    Info { message: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::ScanStarted { name, .. } => write!(f, "Scanning {}", name),
            ProgressEvent::Comparing { source, target } => {
                write!(f, "Comparing {} to {}", source, target)
            }
            ProgressEvent::DifferenceFound { source, target, reason } => {
                write!(f, "{} does not match {}: {}", source, target, reason)
            }
            ProgressEvent::ScanCompleted { results, .. } => {
                write!(f, "Scan completed with {} results", results)
            }
            ProgressEvent::Merging { from, to } => write!(f, "Merging {} to {}", from, to),
            ProgressEvent::Restoring { path } => write!(f, "Restoring {}", path),
            ProgressEvent::Info { message } => f.write_str(message),
        }
    }
}

/// Progress channel for receiving progress updates
pub struct ProgressChannel {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressChannel {
    /// Create a new progress channel
    pub fn new() -> (ProgressReporter, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ProgressReporter { sender }, Self { receiver })
    }

    /// Receive the next progress event
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// All events queued so far
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Progress reporter for sending progress updates. Sending never blocks and never fails:
/// events published after the channel is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn publish(&self, event: ProgressEvent) {
        tracing::debug!("{}", event);
        let _ = self.sender.send(event);
    }

    pub fn scan_started(&self, scan_id: Uuid, name: impl Into<String>) {
        self.publish(ProgressEvent::ScanStarted {
            scan_id,
            name: name.into(),
        });
    }

    pub fn comparing(&self, source: Option<&Path>, target: Option<&Path>) {
        self.publish(ProgressEvent::Comparing {
            source: display(source),
            target: display(target),
        });
    }

    pub fn difference_found(
        &self,
        source: Option<&Path>,
        target: Option<&Path>,
        reason: ComparisonReason,
    ) {
        self.publish(ProgressEvent::DifferenceFound {
            source: display(source),
            target: display(target),
            reason,
        });
    }

    pub fn scan_completed(&self, scan_id: Uuid, results: usize) {
        self.publish(ProgressEvent::ScanCompleted { scan_id, results });
    }

    pub fn merging(&self, from: &Path, to: &Path) {
        self.publish(ProgressEvent::Merging {
            from: from.display().to_string(),
            to: to.display().to_string(),
        });
    }

    pub fn restoring(&self, path: &Path) {
        self.publish(ProgressEvent::Restoring {
            path: path.display().to_string(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(ProgressEvent::Info {
            message: message.into(),
        });
    }
}

fn display(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<null>".to_string())
}
