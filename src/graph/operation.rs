//! Operation and step definitions.

use crate::operations::{CleanTargets, TarballSpec};
use crate::process::{CommandSpec, display_pipeline};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A named unit of work with ordered prerequisites and steps
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique name
    pub name: String,
    /// One-line description for listings
    pub description: String,
    /// Prerequisite names, in declaration order
    pub prerequisites: Vec<String>,
    /// Steps executed in order; empty for grouping nodes
    pub steps: Vec<Step>,
    /// Whether an existing artifact satisfies the operation
    pub kind: OperationKind,
}

/// Phony operations always run; artifact operations run only when stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// No artifact, always eligible to run
    Phony,
    /// Satisfied by an up-to-date artifact
    Artifact(ArtifactLocation),
}

/// Where an operation's artifact lives, relative to the working tree root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactLocation {
    /// Fixed path (file or directory)
    Path(PathBuf),
    /// Glob pattern for tool-named files; the newest match counts
    Pattern(String),
}

impl std::fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactLocation::Path(path) => write!(f, "{}", path.display()),
            ArtifactLocation::Pattern(pattern) => f.write_str(pattern),
        }
    }
}

/// A single side effect
#[derive(Debug, Clone)]
pub enum Step {
    /// External program
    Command(CommandSpec),
    /// Commands chained stdout-to-stdin, last stdout written to `output`
    Pipeline {
        /// Stages in order
        stages: Vec<CommandSpec>,
        /// Destination file, relative to the root
        output: PathBuf,
    },
    /// Ensure a directory exists
    CreateDir(PathBuf),
    /// Delete paths and cache artifacts, tolerating absence
    Remove(CleanTargets),
    /// Name and export a source tarball
    Tarball(TarballSpec),
}

impl Step {
    /// Human-readable description used in dry runs and reports
    pub fn describe(&self) -> String {
        match self {
            Step::Command(command) => command.display(),
            Step::Pipeline { stages, output } => display_pipeline(stages, output),
            Step::CreateDir(path) => format!("mkdir -p {}", path.display()),
            Step::Remove(targets) => targets.describe(),
            Step::Tarball(spec) => spec.describe(),
        }
    }
}

impl Operation {
    /// Start a phony operation
    pub fn phony(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            prerequisites: Vec::new(),
            steps: Vec::new(),
            kind: OperationKind::Phony,
        }
    }

    /// Start an operation satisfied by `artifact`
    pub fn artifact(name: impl Into<String>, artifact: ArtifactLocation) -> Self {
        Self {
            kind: OperationKind::Artifact(artifact),
            ..Self::phony(name)
        }
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a prerequisite
    pub fn requires(mut self, prerequisite: impl Into<String>) -> Self {
        self.prerequisites.push(prerequisite.into());
        self
    }

    /// Append a step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Artifact location, when this is an artifact operation
    pub fn artifact_location(&self) -> Option<&ArtifactLocation> {
        match &self.kind {
            OperationKind::Phony => None,
            OperationKind::Artifact(location) => Some(location),
        }
    }

    /// Whether the operation only groups its prerequisites
    pub fn is_grouping(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ArtifactLocation {
    /// Resolve against the root to the newest existing path, if any
    pub fn resolve(&self, root: &Path) -> crate::error::Result<Option<PathBuf>> {
        match self {
            ArtifactLocation::Path(path) => {
                let full = root.join(path);
                Ok(full.exists().then_some(full))
            }
            ArtifactLocation::Pattern(pattern) => {
                let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
                for entry in glob::glob(&rooted_glob(root, pattern))? {
                    let Ok(path) = entry else { continue };
                    let Ok(modified) = path.metadata().and_then(|m| m.modified()) else {
                        continue;
                    };
                    if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
                        newest = Some((modified, path));
                    }
                }
                Ok(newest.map(|(_, path)| path))
            }
        }
    }
}

/// Glob matching `pattern` below `root`; the root itself is matched literally
pub(crate) fn rooted_glob(root: &Path, pattern: &str) -> String {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    Path::new(&escaped).join(pattern).to_string_lossy().into_owned()
}
