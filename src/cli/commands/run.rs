//! Running and previewing operations.

use super::{LoadedProject, report_error};
use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use crate::orchestrator::{OperationStatus, Orchestrator, RunReport};
use crate::process::SystemRunner;

/// Run `targets` and their prerequisites; returns the exit code
pub(super) async fn execute_run(
    loaded: &LoadedProject,
    targets: &[String],
    config: &RuntimeConfig,
) -> Result<i32> {
    let runner = if config.is_json() {
        SystemRunner::new().with_stdout_to_stderr()
    } else {
        SystemRunner::new()
    };
    let orchestrator = Orchestrator::new(&loaded.graph, runner, loaded.context.clone());
    let mut report = orchestrator.new_report(targets, false);

    config.verbose_println(&format!(
        "Running {} in {}",
        targets.join(" "),
        loaded.context.root.display()
    ));
    let result = orchestrator
        .run(targets, &mut report, config.output())
        .await;

    if config.is_json() {
        print_json(&report)?;
    }

    match result {
        Ok(()) => {
            for artifact in &report.artifacts {
                config.verbose_println(&format!(
                    "{} ({} bytes, sha256 {})",
                    artifact.path.display(),
                    artifact.size,
                    artifact.sha256
                ));
            }
            config.success_println(&report.summary());
            Ok(0)
        }
        Err(error) => {
            if let Some(name) = report.failed_operation() {
                config.error_println(&format!("Operation '{}' failed", name));
            }
            report_error(config, &error);
            if !config.is_json() && report.count(OperationStatus::NotStarted) > 0 {
                config.warning_println(&report.summary());
            }
            Ok(error.exit_code())
        }
    }
}

/// Print the plan for `targets` without executing anything
pub(super) fn execute_preview(
    loaded: &LoadedProject,
    targets: &[String],
    config: &RuntimeConfig,
) -> Result<()> {
    let orchestrator = Orchestrator::new(&loaded.graph, SystemRunner::new(), loaded.context.clone());
    let report = orchestrator.preview(targets)?;

    if config.is_json() {
        return print_json(&report);
    }

    let _ = config.output().section(&format!("Plan for {}", targets.join(" ")));
    for record in &report.operations {
        match record.status {
            OperationStatus::Skipped => config.println(&format!("{} (up to date)", record.name)),
            _ if record.steps.is_empty() => config.println(&record.name),
            _ => {
                config.println(&format!("{}:", record.name));
                for step in &record.steps {
                    config.indent(&step.description);
                }
            }
        }
    }
    Ok(())
}

fn print_json(report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(ReleaseError::Json)?;
    println!("{}", json);
    Ok(())
}
