//! Sequential execution of an operation plan.
//!
//! The orchestrator resolves the requested targets into a plan (prerequisites
//! first, each operation once), skips artifact operations that are up to date,
//! and runs every other operation's steps in order. The first failing step
//! stops the run; nothing is rolled back.

mod freshness;
mod report;

pub use freshness::is_up_to_date;
pub use report::{ArtifactRecord, OperationRecord, OperationStatus, RunReport, StepRecord};

use crate::config::RunContext;
use crate::error::{CommandError, ReleaseError, Result};
use crate::graph::{Operation, OperationGraph, Step};
use crate::process::{CommandOutput, CommandRunner};
use std::collections::HashSet;
use std::path::PathBuf;

/// Receives progress notifications while a run executes
pub trait RunObserver {
    /// Operation is about to execute its steps
    fn operation_started(&self, _operation: &Operation) {}

    /// Operation was skipped because its artifact is up to date
    fn operation_skipped(&self, _operation: &Operation) {}

    /// A step is about to run
    fn step_started(&self, _operation: &Operation, _description: &str) {}

    /// Operation finished with `status`
    fn operation_finished(&self, _operation: &Operation, _status: OperationStatus) {}
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// What a successful step left behind
#[derive(Debug, Default)]
struct StepOutcome {
    output: Option<CommandOutput>,
    produced: Option<PathBuf>,
}

/// Runs plans from one operation graph
pub struct Orchestrator<'g, R> {
    graph: &'g OperationGraph,
    runner: R,
    context: RunContext,
}

impl<'g, R: CommandRunner> Orchestrator<'g, R> {
    /// Create an orchestrator over a validated graph
    pub fn new(graph: &'g OperationGraph, runner: R, context: RunContext) -> Self {
        Self {
            graph,
            runner,
            context,
        }
    }

    /// The command runner
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Fresh report for `targets`
    pub fn new_report(&self, targets: &[String], dry_run: bool) -> RunReport {
        RunReport::new(&self.context, targets, dry_run)
    }

    /// Plan the run without executing anything
    ///
    /// Operations that would be skipped are marked as such; every operation
    /// that would run lists its steps with no exit status. Once a planned
    /// operation removes files, no later artifact counts as up to date.
    pub fn preview(&self, targets: &[String]) -> Result<RunReport> {
        let plan = self.graph.plan(targets)?;
        let mut report = self.new_report(targets, true);
        report.plan(plan.iter().map(|op| op.name.as_str()));

        let mut would_execute: HashSet<&str> = HashSet::new();
        let mut removal_planned = false;
        for operation in plan {
            if !removal_planned
                && is_up_to_date(self.graph, operation, &self.context.root, &would_execute)?
            {
                report.set_status(&operation.name, OperationStatus::Skipped);
                continue;
            }
            removal_planned |= operation
                .steps
                .iter()
                .any(|step| matches!(step, Step::Remove(_)));
            for step in &operation.steps {
                report.record_step(
                    &operation.name,
                    StepRecord {
                        description: step.describe(),
                        exit_code: None,
                        error: None,
                    },
                );
            }
            if !operation.is_grouping() {
                would_execute.insert(operation.name.as_str());
            }
        }

        report.finish();
        Ok(report)
    }

    /// Execute `targets`, recording progress in `report`
    ///
    /// Unknown targets fail before anything runs. On a step failure the
    /// failing operation is marked failed, later operations stay not started,
    /// and the step's error is returned.
    pub async fn run(
        &self,
        targets: &[String],
        report: &mut RunReport,
        observer: &dyn RunObserver,
    ) -> Result<()> {
        let plan = self.graph.plan(targets)?;
        report.plan(plan.iter().map(|op| op.name.as_str()));
        log::info!(
            "Plan for {:?}: {:?}",
            targets,
            plan.iter().map(|op| op.name.as_str()).collect::<Vec<_>>()
        );

        let mut executed: HashSet<&str> = HashSet::new();
        for operation in plan {
            if is_up_to_date(self.graph, operation, &self.context.root, &executed)? {
                log::info!("{} is up to date", operation.name);
                report.set_status(&operation.name, OperationStatus::Skipped);
                observer.operation_skipped(operation);
                continue;
            }

            report.set_status(&operation.name, OperationStatus::Running);
            observer.operation_started(operation);

            if let Err(error) = self.run_operation(operation, report, observer).await {
                log::error!("{} failed: {}", operation.name, error);
                report.set_status(&operation.name, OperationStatus::Failed);
                observer.operation_finished(operation, OperationStatus::Failed);
                report.finish();
                return Err(error);
            }

            if !operation.is_grouping() {
                executed.insert(operation.name.as_str());
            }
            report.set_status(&operation.name, OperationStatus::Completed);
            observer.operation_finished(operation, OperationStatus::Completed);
        }

        report.finish();
        Ok(())
    }

    async fn run_operation(
        &self,
        operation: &Operation,
        report: &mut RunReport,
        observer: &dyn RunObserver,
    ) -> Result<()> {
        for step in &operation.steps {
            let description = step.describe();
            observer.step_started(operation, &description);
            log::info!("{}: {}", operation.name, description);

            match self.execute_step(step).await {
                Ok(outcome) => {
                    report.record_step(
                        &operation.name,
                        StepRecord {
                            description,
                            exit_code: outcome.output.as_ref().and_then(|o| o.code),
                            error: None,
                        },
                    );
                    if let Some(path) = outcome.produced {
                        report.record_artifact(&operation.name, &path)?;
                    }
                }
                Err(error) => {
                    let exit_code = match &error {
                        ReleaseError::Command(CommandError::NonZeroExit { .. })
                        | ReleaseError::Command(CommandError::Terminated { .. }) => {
                            Some(error.exit_code())
                        }
                        _ => None,
                    };
                    report.record_step(
                        &operation.name,
                        StepRecord {
                            description,
                            exit_code,
                            error: Some(error.to_string()),
                        },
                    );
                    return Err(error);
                }
            }
        }

        if let Some(location) = operation.artifact_location() {
            let Some(artifact) = location.resolve(&self.context.root)? else {
                return Err(CommandError::MissingArtifact {
                    operation: operation.name.clone(),
                    artifact: location.to_string(),
                }
                .into());
            };
            if artifact.is_file() {
                let relative = artifact
                    .strip_prefix(&self.context.root)
                    .map(|p| p.to_path_buf())
                    .unwrap_or(artifact.clone());
                report.record_artifact(&operation.name, &relative)?;
            }
        }

        Ok(())
    }

    async fn execute_step(&self, step: &Step) -> Result<StepOutcome> {
        let root = &self.context.root;
        match step {
            Step::Command(command) => {
                let output = self.runner.run(root, command).await?.ensure_success()?;
                Ok(StepOutcome {
                    output: Some(output),
                    produced: None,
                })
            }
            Step::Pipeline { stages, output } => {
                let result = self
                    .runner
                    .pipe(root, stages, &root.join(output))
                    .await?
                    .ensure_success()?;
                Ok(StepOutcome {
                    output: Some(result),
                    produced: Some(output.clone()),
                })
            }
            Step::CreateDir(path) => {
                let full = root.join(path);
                std::fs::create_dir_all(&full).map_err(|source| CommandError::Filesystem {
                    context: "creating directory",
                    path: full.clone(),
                    source,
                })?;
                Ok(StepOutcome::default())
            }
            Step::Remove(targets) => {
                let removed = targets.remove(root)?;
                log::info!("Removed {} paths", removed.len());
                Ok(StepOutcome::default())
            }
            Step::Tarball(spec) => {
                let (output, produced) = spec.execute(&self.runner, &self.context).await?;
                Ok(StepOutcome {
                    output: Some(output),
                    produced: Some(produced),
                })
            }
        }
    }
}
