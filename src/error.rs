//! Error types for wsgi_release operations.
//!
//! This module defines all error types with actionable error messages and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wsgi_release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all wsgi_release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Operation graph or configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Step execution errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// External tool errors (git, packaging tool, compressor)
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid glob pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Configuration errors, always raised before any step runs
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Requested operation is not declared
    #[error("Unknown operation '{name}'")]
    UnknownOperation {
        /// Requested name
        name: String,
    },

    /// A prerequisite names an operation that does not exist
    #[error("Operation '{operation}' requires undeclared operation '{prerequisite}'")]
    UnresolvedPrerequisite {
        /// Operation declaring the prerequisite
        operation: String,
        /// Name that failed to resolve
        prerequisite: String,
    },

    /// Two operations share a name
    #[error("Operation '{name}' is declared more than once")]
    DuplicateOperation {
        /// Duplicated name
        name: String,
    },

    /// Prerequisite cycle
    #[error("Circular prerequisites detected between operations: {operations:?}")]
    CircularDependency {
        /// Operation names involved in the cycle
        operations: Vec<String>,
    },

    /// Configuration file could not be used
    #[error("Invalid configuration in {path}: {reason}")]
    InvalidConfig {
        /// Path to the configuration file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// An operation was declared with nothing to do and nothing to wait for
    #[error("Operation '{operation}' declares neither commands nor prerequisites")]
    EmptyOperation {
        /// Operation name
        operation: String,
    },
}

/// Errors raised while executing an operation's steps
#[derive(Error, Debug)]
pub enum CommandError {
    /// Process could not be started
    #[error("Failed to run command {command}: {source}")]
    SpawnFailed {
        /// Command line that failed to start
        command: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Process exited with a non-zero status
    #[error("Command `{command}` exited with status {code}{}", format_stderr(.stderr))]
    NonZeroExit {
        /// Command line
        command: String,
        /// Exit status
        code: i32,
        /// Captured standard error, empty when not captured
        stderr: String,
    },

    /// Process was killed before it could exit
    #[error("Command `{command}` was terminated by a signal")]
    Terminated {
        /// Command line
        command: String,
        /// Signal number when known
        signal: Option<i32>,
    },

    /// Artifact operation finished without producing its artifact
    #[error("Operation '{operation}' completed but its artifact {artifact} does not exist")]
    MissingArtifact {
        /// Operation name
        operation: String,
        /// Expected artifact path or pattern
        artifact: String,
    },

    /// Filesystem step failed
    #[error("{context} {path}: {source}")]
    Filesystem {
        /// Context describing the operation (e.g., "creating directory")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// External collaborator errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// Required program is not on PATH
    #[error("Required tool '{tool}' was not found in PATH")]
    NotFound {
        /// Program name
        tool: String,
    },

    /// Git could not describe the current revision
    #[error("Git {operation} failed: {reason}")]
    Git {
        /// Git subcommand that failed
        operation: String,
        /// Reason for the error
        reason: String,
    },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Config(ConfigError::UnknownOperation { .. }) => vec![
                "List declared operations: wsgi_release --list".to_string(),
            ],
            ReleaseError::Config(ConfigError::CircularDependency { operations }) => vec![
                format!(
                    "Review prerequisites between operations: {}",
                    operations.join(", ")
                ),
                "Remove the cycle from the [operations] tables in release.toml".to_string(),
            ],
            ReleaseError::Config(ConfigError::UnresolvedPrerequisite { prerequisite, .. }) => {
                vec![format!(
                    "Declare '{prerequisite}' under [operations.{prerequisite}] or remove the reference"
                )]
            }
            ReleaseError::Tool(ToolError::NotFound { tool }) => vec![
                format!("Install '{tool}' or add it to PATH"),
                "Point release.toml at a different program".to_string(),
            ],
            ReleaseError::Tool(ToolError::Git { .. }) => vec![
                "Tarballs need a checked-out branch with at least one commit".to_string(),
                "Check out a branch: git switch <branch>".to_string(),
            ],
            ReleaseError::Command(CommandError::MissingArtifact { .. }) => vec![
                "Check that __version__ matches the version the packaging tool built".to_string(),
                "Set `artifact` under [operations.<name>] in release.toml".to_string(),
            ],
            ReleaseError::Command(CommandError::NonZeroExit { .. }) => vec![
                "Re-run with --verbose to see every executed step".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Process exit code to surface for this error
    ///
    /// A failing command's own status is passed through unchanged.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReleaseError::Command(CommandError::NonZeroExit { code, .. }) => *code,
            ReleaseError::Command(CommandError::Terminated {
                signal: Some(signal),
                ..
            }) => 128 + signal,
            _ => 1,
        }
    }

    /// Whether this error was raised before any step could run
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ReleaseError::Config(_) | ReleaseError::Toml(_) | ReleaseError::Pattern(_)
        )
    }
}

impl From<walkdir::Error> for ReleaseError {
    fn from(error: walkdir::Error) -> Self {
        ReleaseError::Io(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_passes_command_status_through() {
        let error = ReleaseError::Command(CommandError::NonZeroExit {
            command: "python3 -m unittest discover".to_string(),
            code: 3,
            stderr: String::new(),
        });
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_for_signal() {
        let error = ReleaseError::Command(CommandError::Terminated {
            command: "xz -c".to_string(),
            signal: Some(9),
        });
        assert_eq!(error.exit_code(), 137);
    }

    #[test]
    fn test_config_errors_exit_with_one() {
        let error = ReleaseError::Config(ConfigError::UnknownOperation {
            name: "deploy".to_string(),
        });
        assert_eq!(error.exit_code(), 1);
        assert!(error.is_configuration_error());
    }

    #[test]
    fn test_non_zero_exit_message_includes_stderr() {
        let error = CommandError::NonZeroExit {
            command: "git describe".to_string(),
            code: 128,
            stderr: "fatal: No names found\n".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Command `git describe` exited with status 128:\nfatal: No names found"
        );
    }
}
