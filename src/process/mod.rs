//! External command invocation.
//!
//! Every side effect that leaves the process goes through [`CommandRunner`],
//! which returns a structured [`CommandOutput`] instead of acting on the exit
//! status itself. The orchestrator decides what a non-zero status means.

mod system;

pub use system::SystemRunner;

use crate::error::{CommandError, Result};
use serde::Serialize;
use std::future::Future;
use std::path::Path;

/// Shell options exported to shell steps so a failure anywhere in a
/// pipeline aborts the script.
pub const STRICT_SHELLOPTS: &str = "errexit:pipefail";

/// A single external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, passed without shell interpretation
    pub args: Vec<String>,
    /// Extra environment variables
    pub envs: Vec<(String, String)>,
    /// Capture stdout/stderr instead of inheriting the terminal
    pub capture: bool,
}

impl CommandSpec {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            capture: false,
        }
    }

    /// Build a command from an argv-style list; `None` when the list is empty
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref().to_string())))
    }

    /// Run `script` through `bash -c` with strict shell options
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash")
            .arg("-c")
            .arg(script)
            .env("SHELLOPTS", STRICT_SHELLOPTS)
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Capture output rather than streaming it to the terminal
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Human-readable command line
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

fn quote_word(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Structured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Command line that produced this output
    pub command: String,
    /// Exit status, `None` when killed by a signal
    pub code: Option<i32>,
    /// Terminating signal, when known
    pub signal: Option<i32>,
    /// Captured stdout (empty when inherited)
    #[serde(skip)]
    pub stdout: String,
    /// Captured stderr (empty when inherited)
    #[serde(skip)]
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited successfully
    pub fn success(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            code: Some(0),
            ..Default::default()
        }
    }

    /// Whether the command exited with status zero
    pub fn succeeded(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a failed status into the matching [`CommandError`]
    pub fn ensure_success(self) -> Result<Self> {
        match self.code {
            Some(0) => Ok(self),
            Some(code) => Err(CommandError::NonZeroExit {
                command: self.command,
                code,
                stderr: self.stderr,
            }
            .into()),
            None => Err(CommandError::Terminated {
                command: self.command,
                signal: self.signal,
            }
            .into()),
        }
    }

    /// Trimmed stdout, for commands whose output is a single value
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Executes external commands
pub trait CommandRunner {
    /// Run one command in `cwd` and wait for it
    fn run(&self, cwd: &Path, command: &CommandSpec) -> impl Future<Output = Result<CommandOutput>>;

    /// Run `stages` connected stdout-to-stdin, writing the last stage's
    /// stdout to `sink`
    ///
    /// The returned output carries the rightmost non-zero stage status, so
    /// any failing stage fails the whole pipeline.
    fn pipe(
        &self,
        cwd: &Path,
        stages: &[CommandSpec],
        sink: &Path,
    ) -> impl Future<Output = Result<CommandOutput>>;
}

/// Display a pipeline as a shell would
pub fn display_pipeline(stages: &[CommandSpec], sink: &Path) -> String {
    let chain = stages
        .iter()
        .map(CommandSpec::display)
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{chain} > {}", sink.display())
}
