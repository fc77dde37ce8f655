//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

/// Release orchestrator for a small Python package
#[derive(Parser, Debug, Clone)]
#[command(
    name = "wsgi_release",
    version,
    about = "Run release operations for a Python package",
    long_about = "Run release operations (clean, test, tarball, wheel, dist) and their \
prerequisites in dependency order. Each operation runs at most once per invocation; \
artifact operations are skipped when their output is up to date.

Usage:
  wsgi_release                 run the default operation (check)
  wsgi_release clean dist      remove build output, then build the wheel
  wsgi_release tarball         export a dated source tarball of HEAD
  wsgi_release --list          list declared operations"
)]
pub struct Args {
    /// Operations to run, in order; defaults to the first declared operation
    #[arg(value_name = "OPERATION")]
    pub operations: Vec<String>,

    /// Working-tree root
    #[arg(short = 'C', long = "directory", value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,

    /// Configuration file (default: <DIR>/release.toml when present)
    #[arg(short, long, value_name = "FILE", env = "WSGI_RELEASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the plan and steps without executing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// List declared operations and exit
    #[arg(short, long)]
    pub list: bool,

    /// Emit the report, plan or listing as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Show every executed step
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.list && !self.operations.is_empty() {
            return Err("--list does not take operation names".to_string());
        }
        if self.list && self.dry_run {
            return Err("--list and --dry-run cannot be combined".to_string());
        }
        if let Some(name) = self.operations.iter().find(|name| name.trim().is_empty()) {
            return Err(format!("Invalid operation name '{name}'"));
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    json: bool,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool, quiet: bool, json: bool) -> Self {
        Self {
            // JSON owns stdout, so human output is silenced
            output: super::OutputManager::new(verbose, quiet || json),
            json,
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Whether machine-readable output was requested
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print message only in verbose mode
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet, args.json)
    }
}
