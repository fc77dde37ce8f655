//! Run report: per-operation state, executed steps and produced artifacts.

use crate::config::RunContext;
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Lifecycle of one operation within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Planned, not reached yet
    NotStarted,
    /// Steps executing
    Running,
    /// All steps succeeded
    Completed,
    /// Artifact was up to date
    Skipped,
    /// A step failed; the run stopped here
    Failed,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OperationStatus::NotStarted => "not started",
            OperationStatus::Running => "running",
            OperationStatus::Completed => "completed",
            OperationStatus::Skipped => "up to date",
            OperationStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One step as executed (or planned, in a dry run)
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Command line or filesystem action
    pub description: String,
    /// Exit status for external commands
    pub exit_code: Option<i32>,
    /// Error message when the step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State of one planned operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    /// Operation name
    pub name: String,
    /// Current status
    pub status: OperationStatus,
    /// Steps in execution order
    pub steps: Vec<StepRecord>,
}

/// A file left behind by the run
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    /// Producing operation
    pub operation: String,
    /// Root-relative path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA-256 of the contents, hex encoded
    pub sha256: String,
}

/// Everything that happened during one invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Working-tree root
    pub root: PathBuf,
    /// Requested operations
    pub targets: Vec<String>,
    /// Whether steps were only planned
    pub dry_run: bool,
    /// Invocation start, fixed at load time
    pub started_at: DateTime<Local>,
    /// When the run ended
    pub finished_at: Option<DateTime<Local>>,
    /// Planned operations in execution order
    pub operations: Vec<OperationRecord>,
    /// Produced files
    pub artifacts: Vec<ArtifactRecord>,
}

impl RunReport {
    /// Empty report for a run over `targets`
    pub fn new(context: &RunContext, targets: &[String], dry_run: bool) -> Self {
        Self {
            root: context.root.clone(),
            targets: targets.to_vec(),
            dry_run,
            started_at: context.started_at,
            finished_at: None,
            operations: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Register the plan; every operation starts as not started
    pub fn plan<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.operations = names
            .into_iter()
            .map(|name| OperationRecord {
                name: name.to_string(),
                status: OperationStatus::NotStarted,
                steps: Vec::new(),
            })
            .collect();
    }

    fn record_mut(&mut self, name: &str) -> Option<&mut OperationRecord> {
        self.operations.iter_mut().find(|record| record.name == name)
    }

    /// Look up an operation's record
    pub fn record(&self, name: &str) -> Option<&OperationRecord> {
        self.operations.iter().find(|record| record.name == name)
    }

    /// Status of an operation, if planned
    pub fn status(&self, name: &str) -> Option<OperationStatus> {
        self.record(name).map(|record| record.status)
    }

    /// Move an operation to `status`
    pub fn set_status(&mut self, name: &str, status: OperationStatus) {
        if let Some(record) = self.record_mut(name) {
            log::debug!("{}: {} -> {}", name, record.status, status);
            record.status = status;
        }
    }

    /// Append a step record
    pub fn record_step(&mut self, name: &str, step: StepRecord) {
        if let Some(record) = self.record_mut(name) {
            record.steps.push(step);
        }
    }

    /// Hash and record a produced file
    pub fn record_artifact(&mut self, operation: &str, relative: &Path) -> Result<()> {
        let full = self.root.join(relative);
        let mut file = std::fs::File::open(&full)?;
        let mut hasher = Sha256::new();
        let size = std::io::copy(&mut file, &mut hasher)?;
        let sha256 = hex::encode(hasher.finalize());

        self.artifacts.retain(|artifact| artifact.path != relative);
        self.artifacts.push(ArtifactRecord {
            operation: operation.to_string(),
            path: relative.to_path_buf(),
            size,
            sha256,
        });
        Ok(())
    }

    /// Mark the run as ended
    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    /// Number of operations with a given status
    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations
            .iter()
            .filter(|record| record.status == status)
            .count()
    }

    /// First failed operation
    pub fn failed_operation(&self) -> Option<&str> {
        self.operations
            .iter()
            .find(|record| record.status == OperationStatus::Failed)
            .map(|record| record.name.as_str())
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} operations: {} completed, {} up to date, {} failed, {} not started",
            self.operations.len(),
            self.count(OperationStatus::Completed),
            self.count(OperationStatus::Skipped),
            self.count(OperationStatus::Failed),
            self.count(OperationStatus::NotStarted),
        )
    }
}
