//! Builtin release operations and their configuration overrides.
//!
//! | Operation | Prerequisites | Effect |
//! |-----------|---------------|--------|
//! | `check`   | -             | placeholder for validation |
//! | `clean`   | `check`       | remove output, packaging metadata and caches |
//! | `output`  | `check`       | create the output directory |
//! | `test`    | `output`      | run the self-test command |
//! | `tarball` | `output`      | export a dated, compressed source archive |
//! | `wheel`   | `output`      | build a wheel into the output directory |
//! | `dist`    | `wheel`       | grouping |

mod clean;
mod tarball;

pub use clean::CleanTargets;
pub use tarball::{TarballSpec, revision_descriptor};

use crate::config::{OperationConfig, ProjectMetadata, ReleaseConfig};
use crate::error::{ConfigError, Result};
use crate::graph::{ArtifactLocation, Operation, OperationGraph, OperationKind, Step};
use crate::process::CommandSpec;
use std::path::PathBuf;

/// The standard operation set, in declaration order
pub fn standard_operations(config: &ReleaseConfig, project: &ProjectMetadata) -> Result<Vec<Operation>> {
    let invalid = |field: &str| ConfigError::InvalidConfig {
        path: PathBuf::from(crate::config::CONFIG_FILE_NAME),
        reason: format!("{field} must not be empty"),
    };
    let test_command = CommandSpec::from_argv(&config.test_command).ok_or_else(|| invalid("test_command"))?;
    let wheel_command =
        CommandSpec::from_argv(&config.wheel_command()).ok_or_else(|| invalid("wheel_command"))?;
    let compressor = CommandSpec::from_argv(&config.compressor).ok_or_else(|| invalid("compressor"))?;

    Ok(vec![
        Operation::phony("check").describe("Validation hook (no-op)"),
        Operation::phony("clean")
            .describe("Remove output, packaging metadata and Python caches")
            .requires("check")
            .step(Step::Remove(CleanTargets::standard(
                &config.output_dir,
                &config.clean_patterns,
            ))),
        Operation::artifact("output", ArtifactLocation::Path(config.output_dir.clone()))
            .describe("Create the output directory")
            .requires("check")
            .step(Step::CreateDir(config.output_dir.clone())),
        Operation::phony("test")
            .describe("Run the package self-tests")
            .requires("output")
            .step(Step::Command(test_command)),
        Operation::phony("tarball")
            .describe("Export a compressed source archive of HEAD")
            .requires("output")
            .step(Step::Tarball(TarballSpec {
                project: project.name.clone(),
                output_dir: config.output_dir.clone(),
                compressor,
                extension: config.tarball_extension.clone(),
            })),
        Operation::artifact(
            "wheel",
            ArtifactLocation::Pattern(project.wheel_pattern(&config.output_dir)),
        )
        .describe("Build a wheel into the output directory")
        .requires("output")
        .step(Step::Command(wheel_command)),
        Operation::phony("dist")
            .describe("Build every distributable")
            .requires("wheel"),
    ])
}

/// Apply `[operations.*]` tables: builtins are modified in place, unknown
/// names become new operations appended in name order
pub fn apply_overrides(
    mut operations: Vec<Operation>,
    overrides: &std::collections::BTreeMap<String, OperationConfig>,
) -> Result<Vec<Operation>> {
    for (name, table) in overrides {
        match operations.iter_mut().find(|op| &op.name == name) {
            Some(existing) => {
                log::debug!("Overriding builtin operation '{}'", name);
                override_operation(existing, table);
            }
            None => {
                if table.commands.as_ref().is_none_or(Vec::is_empty)
                    && table.prerequisites.as_ref().is_none_or(Vec::is_empty)
                {
                    return Err(ConfigError::EmptyOperation {
                        operation: name.clone(),
                    }
                    .into());
                }
                log::debug!("Declaring operation '{}' from configuration", name);
                let mut operation = Operation::phony(name.clone());
                override_operation(&mut operation, table);
                operations.push(operation);
            }
        }
    }
    Ok(operations)
}

fn override_operation(operation: &mut Operation, table: &OperationConfig) {
    if let Some(prerequisites) = &table.prerequisites {
        operation.prerequisites = prerequisites.clone();
    }
    if let Some(commands) = &table.commands {
        operation.steps = commands
            .iter()
            .map(|script| Step::Command(CommandSpec::shell(script.clone())))
            .collect();
    }
    if let Some(description) = &table.description {
        operation.description = description.clone();
    }
    if let Some(artifact) = &table.artifact {
        let location = if artifact.contains(['*', '?', '[']) {
            ArtifactLocation::Pattern(artifact.clone())
        } else {
            ArtifactLocation::Path(PathBuf::from(artifact))
        };
        operation.kind = OperationKind::Artifact(location);
    }
}

/// Build the validated graph for a project
pub fn build_graph(config: &ReleaseConfig, project: &ProjectMetadata) -> Result<OperationGraph> {
    let operations = apply_overrides(standard_operations(config, project)?, &config.operations)?;
    OperationGraph::new(operations)
}
