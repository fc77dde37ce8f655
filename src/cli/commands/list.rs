//! `--list`: declared operations with prerequisites and descriptions.

use super::LoadedProject;
use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use crate::graph::{ArtifactLocation, Operation};
use serde::Serialize;

/// Listing entry for one operation
#[derive(Debug, Serialize)]
struct OperationSummary<'a> {
    name: &'a str,
    description: &'a str,
    prerequisites: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<&'a ArtifactLocation>,
    steps: Vec<String>,
}

impl<'a> From<&'a Operation> for OperationSummary<'a> {
    fn from(operation: &'a Operation) -> Self {
        Self {
            name: &operation.name,
            description: &operation.description,
            prerequisites: &operation.prerequisites,
            artifact: operation.artifact_location(),
            steps: operation.steps.iter().map(|step| step.describe()).collect(),
        }
    }
}

pub(super) fn execute_list(loaded: &LoadedProject, config: &RuntimeConfig) -> Result<()> {
    let summaries: Vec<OperationSummary<'_>> =
        loaded.graph.operations().map(OperationSummary::from).collect();

    if config.is_json() {
        let json = serde_json::to_string_pretty(&summaries).map_err(ReleaseError::Json)?;
        println!("{}", json);
        return Ok(());
    }

    let _ = config.output().section(&format!(
        "{} {}",
        loaded.project.name,
        loaded.project.version.as_deref().unwrap_or("")
    ));
    let width = summaries.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for (position, summary) in summaries.iter().enumerate() {
        let marker = if position == 0 { " (default)" } else { "" };
        config.println(&format!(
            "{:width$}  {}{}",
            summary.name,
            summary.description,
            marker,
            width = width
        ));
        if !summary.prerequisites.is_empty() {
            config.indent(&format!("requires: {}", summary.prerequisites.join(", ")));
        }
        if let Some(artifact) = summary.artifact {
            config.indent(&format!("artifact: {}", artifact));
        }
        if config.is_verbose() {
            let dependents = loaded.graph.dependents(summary.name);
            if !dependents.is_empty() {
                config.indent(&format!("needed by: {}", dependents.join(", ")));
            }
            for step in &summary.steps {
                config.indent(&format!("$ {}", step));
            }
        }
    }
    Ok(())
}
