//! Command execution: load the project, then list, preview or run operations.

mod list;
mod run;

use crate::cli::{Args, RuntimeConfig};
use crate::config::{ProjectMetadata, ReleaseConfig, RunContext};
use crate::error::{ReleaseError, Result};
use crate::graph::OperationGraph;
use crate::operations::build_graph;
use path_absolutize::Absolutize;

use list::execute_list;
use run::{execute_preview, execute_run};

/// Everything loaded before the first step runs
#[derive(Debug)]
pub struct LoadedProject {
    /// Root, timestamp
    pub context: RunContext,
    /// Parsed `release.toml` or defaults
    pub config: ReleaseConfig,
    /// Project name and version
    pub project: ProjectMetadata,
    /// Validated operation graph
    pub graph: OperationGraph,
}

impl LoadedProject {
    /// Resolve the root and build the graph; fails on any configuration error
    pub fn load(args: &Args) -> Result<Self> {
        let root = args
            .directory
            .absolutize()
            .map_err(ReleaseError::Io)?
            .to_path_buf();
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("working tree {} is not a directory", root.display()),
            )
            .into());
        }

        // Fixed once so every dated artifact of this run shares it
        let context = RunContext::new(&root);
        let config = ReleaseConfig::load(&root, args.config.as_deref())?;
        let project = ProjectMetadata::discover(&root, &config)?;
        let graph = build_graph(&config, &project)?;
        log::debug!(
            "Loaded {} operations for {} ({})",
            graph.len(),
            project.name,
            project.version.as_deref().unwrap_or("unknown version")
        );

        Ok(Self {
            context,
            config,
            project,
            graph,
        })
    }

    /// Requested operations, or the default operation when none were named
    pub fn targets(&self, requested: &[String]) -> Vec<String> {
        if !requested.is_empty() {
            return requested.to_vec();
        }
        self.graph
            .default_operation()
            .map(|op| vec![op.name.clone()])
            .unwrap_or_default()
    }
}

/// Execute the command described by `args`, returning the process exit code
///
/// Loading errors propagate; errors raised while running are reported here
/// and turned into the exit code of the failing command.
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);
    let loaded = LoadedProject::load(&args)?;

    if args.list {
        execute_list(&loaded, &config)?;
        return Ok(0);
    }

    let targets = loaded.targets(&args.operations);
    if args.dry_run {
        execute_preview(&loaded, &targets, &config)?;
        return Ok(0);
    }

    execute_run(&loaded, &targets, &config).await
}

/// Print an error with its recovery suggestions
pub(crate) fn report_error(config: &RuntimeConfig, error: &ReleaseError) {
    config.error_println(&error.to_string());

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() && !config.is_json() {
        config.println("\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            config.indent(&format!("• {}", suggestion));
        }
    }
}
