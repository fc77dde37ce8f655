//! [`CommandRunner`] backed by real child processes.

use super::{CommandOutput, CommandRunner, CommandSpec, display_pipeline};
use crate::error::{CommandError, Result, ToolError};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Runs commands with `tokio::process`, one at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    stdout_to_stderr: bool,
}

impl SystemRunner {
    /// Create a runner whose children inherit the terminal
    pub fn new() -> Self {
        Self::default()
    }

    /// Send uncaptured child stdout to our stderr, keeping stdout for
    /// machine-readable output
    pub fn with_stdout_to_stderr(mut self) -> Self {
        self.stdout_to_stderr = true;
        self
    }

    /// Resolve the program on PATH and prepare the child process
    fn prepare(cwd: &Path, spec: &CommandSpec) -> Result<Command> {
        let program = which::which_in(&spec.program, std::env::var_os("PATH"), cwd).map_err(
            |e| {
                log::debug!("Lookup of '{}' failed: {}", spec.program, e);
                ToolError::NotFound {
                    tool: spec.program.clone(),
                }
            },
        )?;

        let mut command = Command::new(program);
        command.args(&spec.args).current_dir(cwd).kill_on_drop(true);
        for (key, value) in &spec.envs {
            command.env(key, value);
        }
        Ok(command)
    }
}

fn status_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal())
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<CommandOutput> {
        let display = spec.display();
        log::debug!("Running `{}` in {}", display, cwd.display());

        let mut command = Self::prepare(cwd, spec)?;
        let spawn_failed = |source| CommandError::SpawnFailed {
            command: display.clone(),
            source,
        };

        let (status, stdout, stderr) = if spec.capture {
            command.stdin(Stdio::null());
            let output = command.output().await.map_err(spawn_failed)?;
            (
                output.status,
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )
        } else {
            if self.stdout_to_stderr {
                command.stdout(Stdio::from(std::io::stderr()));
            }
            let status = command.status().await.map_err(spawn_failed)?;
            (status, String::new(), String::new())
        };

        let (code, signal) = status_parts(status);
        log::debug!("`{}` finished with {:?}", display, code);

        Ok(CommandOutput {
            command: display,
            code,
            signal,
            stdout,
            stderr,
        })
    }

    async fn pipe(&self, cwd: &Path, stages: &[CommandSpec], sink: &Path) -> Result<CommandOutput> {
        let display = display_pipeline(stages, sink);
        log::debug!("Running `{}` in {}", display, cwd.display());

        let Some(last) = stages.len().checked_sub(1) else {
            return Err(anyhow::anyhow!("pipeline into {} has no stages", sink.display()).into());
        };

        // Resolve every program before anything is spawned or written.
        let commands = stages
            .iter()
            .map(|spec| Self::prepare(cwd, spec))
            .collect::<Result<Vec<_>>>()?;

        let sink_file = std::fs::File::create(sink).map_err(|source| CommandError::Filesystem {
            context: "creating",
            path: sink.to_path_buf(),
            source,
        })?;

        let mut children = Vec::with_capacity(stages.len());
        let mut upstream: Option<Stdio> = None;

        for (index, (mut command, spec)) in commands.into_iter().zip(stages).enumerate() {
            let stage = spec.display();
            let spawn_failed = |source| CommandError::SpawnFailed {
                command: stage.clone(),
                source,
            };

            command.stdin(upstream.take().unwrap_or_else(Stdio::null));
            command.stderr(Stdio::piped());
            if index == last {
                let file = sink_file.try_clone().map_err(|source| CommandError::Filesystem {
                    context: "writing",
                    path: sink.to_path_buf(),
                    source,
                })?;
                command.stdout(Stdio::from(file));
            } else {
                command.stdout(Stdio::piped());
            }

            let mut child = command.spawn().map_err(spawn_failed)?;
            if index != last {
                let stdout = child.stdout.take().ok_or_else(|| {
                    spawn_failed(std::io::Error::other("stdout was not captured"))
                })?;
                let stdio: Stdio = stdout.try_into().map_err(spawn_failed)?;
                upstream = Some(stdio);
            }
            children.push((stage, child));
        }
        drop(sink_file);

        let mut result = CommandOutput::success(display);
        for (stage, child) in children {
            let output = child
                .wait_with_output()
                .await
                .map_err(|source| CommandError::SpawnFailed {
                    command: stage.clone(),
                    source,
                })?;
            let (code, signal) = status_parts(output.status);
            log::debug!("Pipeline stage `{}` finished with {:?}", stage, code);

            // Rightmost failing stage decides, as with `pipefail`
            if code != Some(0) {
                result.code = code;
                result.signal = signal;
                result.stderr = format!("{}: {}", stage, String::from_utf8_lossy(&output.stderr));
            }
        }

        Ok(result)
    }
}
