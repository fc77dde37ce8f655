//! Source tarball naming and export.
//!
//! The archive is `git archive` of `HEAD` piped through the configured
//! compressor, named `<project>-<YYYYMMDD>-<branch>-<describe>.<ext>`.

use crate::config::RunContext;
use crate::error::{Result, ToolError};
use crate::process::{CommandOutput, CommandRunner, CommandSpec, display_pipeline};
use std::path::{Path, PathBuf};

/// Everything needed to produce a tarball
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballSpec {
    /// Project name prefix
    pub project: String,
    /// Root-relative destination directory
    pub output_dir: PathBuf,
    /// Compressor reading tar on stdin and writing to stdout
    pub compressor: CommandSpec,
    /// File extension without the leading dot
    pub extension: String,
}

impl TarballSpec {
    /// Shell-like summary with the name left symbolic
    pub fn describe(&self) -> String {
        let name = format!("{}-<YYYYMMDD>-<revision>", self.project);
        display_pipeline(
            &self.stages(&name),
            &self.output_dir.join(format!("{name}.{}", self.extension)),
        )
    }

    /// Export stages for an archive called `name`
    fn stages(&self, name: &str) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("git").args([
                "archive".to_string(),
                "--format=tar".to_string(),
                format!("--prefix={name}/"),
                "HEAD".to_string(),
            ]),
            self.compressor.clone(),
        ]
    }

    /// Archive base name for a date stamp and revision descriptor
    pub fn archive_name(&self, date_stamp: &str, descriptor: &str) -> String {
        format!("{}-{}-{}", self.project, date_stamp, descriptor)
    }

    /// Compute the name and write the archive; returns the pipeline output and
    /// the root-relative archive path
    pub async fn execute<R: CommandRunner>(
        &self,
        runner: &R,
        context: &RunContext,
    ) -> Result<(CommandOutput, PathBuf)> {
        let descriptor = revision_descriptor(runner, &context.root).await?;
        let name = self.archive_name(&context.date_stamp(), &descriptor);
        let relative = self.output_dir.join(format!("{name}.{}", self.extension));
        log::info!("Writing tarball {}", relative.display());

        let output = runner
            .pipe(&context.root, &self.stages(&name), &context.root.join(&relative))
            .await?
            .ensure_success()?;
        Ok((output, relative))
    }
}

/// `<branch>-<describe>` for the checked-out revision
///
/// Fails when HEAD is detached or the repository has no commits.
pub async fn revision_descriptor<R: CommandRunner>(runner: &R, root: &Path) -> Result<String> {
    let branch = git_value(runner, root, "symbolic-ref", &["symbolic-ref", "--short", "HEAD"]).await?;
    let describe = git_value(
        runner,
        root,
        "describe",
        &["describe", "--always", "--dirty"],
    )
    .await?;
    Ok(format!("{}-{}", branch.replace('/', "-"), describe))
}

async fn git_value<R: CommandRunner>(
    runner: &R,
    root: &Path,
    operation: &str,
    args: &[&str],
) -> Result<String> {
    let spec = CommandSpec::new("git").args(args.iter().copied()).captured();
    let output = runner.run(root, &spec).await?;
    if !output.succeeded() {
        return Err(ToolError::Git {
            operation: operation.to_string(),
            reason: match output.stderr.trim() {
                "" => format!("exited with {:?}", output.code),
                stderr => stderr.to_string(),
            },
        }
        .into());
    }

    let value = output.stdout_trimmed();
    if value.is_empty() {
        return Err(ToolError::Git {
            operation: operation.to_string(),
            reason: "produced no output".to_string(),
        }
        .into());
    }
    Ok(value.to_string())
}
