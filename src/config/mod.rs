//! Release configuration.
//!
//! Settings come from an optional `release.toml` at the working-tree root.
//! Every field has a default matching the standard layout of the package, so
//! the file is only needed to change commands or re-wire operations.

mod project;

pub use project::ProjectMetadata;

use crate::error::{ConfigError, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Name of the configuration file looked up at the root
pub const CONFIG_FILE_NAME: &str = "release.toml";

/// Settings loaded from `release.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Project name used for tarball names and the wheel artifact pattern
    pub project: Option<String>,
    /// Python file defining `__version__`
    pub version_file: Option<PathBuf>,
    /// Directory receiving tarballs and wheels
    pub output_dir: PathBuf,
    /// Self-test command
    pub test_command: Vec<String>,
    /// Wheel build command; defaults to pip writing into `output_dir`
    pub wheel_command: Option<Vec<String>>,
    /// Compressor reading a tar stream on stdin
    pub compressor: Vec<String>,
    /// Tarball file extension, without the leading dot
    pub tarball_extension: String,
    /// Extra root-relative paths or globs removed by `clean`
    pub clean_patterns: Vec<String>,
    /// Overrides for builtin operations and extra operations
    pub operations: BTreeMap<String, OperationConfig>,
}

/// One `[operations.<name>]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationConfig {
    /// Replaces the prerequisite list
    pub prerequisites: Option<Vec<String>>,
    /// Shell commands replacing the operation's steps
    pub commands: Option<Vec<String>>,
    /// Listing description
    pub description: Option<String>,
    /// Root-relative artifact path or glob; makes the operation skippable
    pub artifact: Option<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            project: None,
            version_file: None,
            output_dir: PathBuf::from("output"),
            test_command: vec![
                "python3".to_string(),
                "-m".to_string(),
                "unittest".to_string(),
                "discover".to_string(),
            ],
            wheel_command: None,
            compressor: vec!["xz".to_string(), "-c".to_string()],
            tarball_extension: "tar.xz".to_string(),
            clean_patterns: Vec::new(),
            operations: BTreeMap::new(),
        }
    }
}

impl ReleaseConfig {
    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, `<root>/release.toml` is
    /// read when present and defaults are used otherwise.
    pub fn load(root: &Path, path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) if path.is_absolute() => (path.to_path_buf(), true),
            Some(path) => (root.join(path), true),
            None => (root.join(CONFIG_FILE_NAME), false),
        };

        if !path.exists() {
            if required {
                return Err(ConfigError::InvalidConfig {
                    path,
                    reason: "file does not exist".to_string(),
                }
                .into());
            }
            log::debug!("No {} at {}, using defaults", CONFIG_FILE_NAME, path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::parse(&content).map_err(|e| ConfigError::InvalidConfig {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        config.validate(&path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: &str| ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.test_command.is_empty() {
            return Err(invalid("test_command must not be empty").into());
        }
        if self.compressor.is_empty() {
            return Err(invalid("compressor must not be empty").into());
        }
        if self.wheel_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(invalid("wheel_command must not be empty").into());
        }
        if self.output_dir.as_os_str().is_empty() || !stays_below_root(&self.output_dir) {
            return Err(invalid("output_dir must be a relative path inside the working tree").into());
        }
        if let Some(pattern) = self
            .clean_patterns
            .iter()
            .find(|pattern| pattern.is_empty() || !stays_below_root(Path::new(pattern)))
        {
            return Err(invalid(&format!(
                "clean pattern '{pattern}' must be a relative path inside the working tree"
            ))
            .into());
        }
        Ok(())
    }

    /// Wheel build command, defaulting to pip writing into the output directory
    pub fn wheel_command(&self) -> Vec<String> {
        self.wheel_command.clone().unwrap_or_else(|| {
            vec![
                "python3".to_string(),
                "-m".to_string(),
                "pip".to_string(),
                "wheel".to_string(),
                "--no-deps".to_string(),
                "--wheel-dir".to_string(),
                self.output_dir.display().to_string(),
                ".".to_string(),
            ]
        })
    }
}

/// Relative, without `..`, and naming something other than the root itself
fn stays_below_root(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    named
}

/// Per-invocation context fixed at load time
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Working-tree root; every step runs here
    pub root: PathBuf,
    /// Start of the invocation, used for dated artifact names
    pub started_at: DateTime<Local>,
}

impl RunContext {
    /// Context starting now
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::at(root, Local::now())
    }

    /// Context with a fixed start time
    pub fn at(root: impl Into<PathBuf>, started_at: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            started_at,
        }
    }

    /// `YYYYMMDD` stamp of the start time
    pub fn date_stamp(&self) -> String {
        self.started_at.format("%Y%m%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ReleaseConfig::load(dir.path(), None).expect("load");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.compressor, vec!["xz", "-c"]);
        assert_eq!(
            config.wheel_command(),
            vec!["python3", "-m", "pip", "wheel", "--no-deps", "--wheel-dir", "output", "."]
        );
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ReleaseConfig::load(dir.path(), Some(Path::new("missing.toml"))).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_parse_operation_tables() {
        let config = ReleaseConfig::parse(
            r#"
            project = "mrbaviirc.wsgi"
            clean_patterns = ["dist"]

            [operations.test]
            prerequisites = ["check"]

            [operations.lint]
            prerequisites = ["check"]
            commands = ["flake8 mrbaviirc"]
            artifact = "output/lint.txt"
            "#,
        )
        .expect("parse");

        assert_eq!(config.project.as_deref(), Some("mrbaviirc.wsgi"));
        assert_eq!(
            config.operations["test"].prerequisites.as_deref(),
            Some(&["check".to_string()][..])
        );
        assert_eq!(
            config.operations["lint"].artifact.as_deref(),
            Some("output/lint.txt")
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ReleaseConfig::parse("outptu_dir = \"out\"").is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "compressor = []\n").expect("write");
        let err = ReleaseConfig::load(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("compressor must not be empty"));
    }

    #[test]
    fn test_output_dir_outside_root_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        for value in ["../precious", "output/../../x", "/tmp/output", "."] {
            std::fs::write(
                dir.path().join(CONFIG_FILE_NAME),
                format!("output_dir = \"{value}\"\n"),
            )
            .expect("write");
            let err = ReleaseConfig::load(dir.path(), None).unwrap_err();
            assert!(err.is_configuration_error(), "{value} accepted");
            assert!(err.to_string().contains("output_dir"));
        }
    }

    #[test]
    fn test_clean_patterns_outside_root_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        for value in ["../sibling", "dist/../../*", "/var/tmp/*", ""] {
            std::fs::write(
                dir.path().join(CONFIG_FILE_NAME),
                format!("clean_patterns = [\"dist\", \"{value}\"]\n"),
            )
            .expect("write");
            let err = ReleaseConfig::load(dir.path(), None).unwrap_err();
            assert!(err.to_string().contains("clean pattern"), "{value} accepted");
        }

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "output_dir = \"./build/out\"\nclean_patterns = [\"dist\", \"*.egg\"]\n",
        )
        .expect("write");
        assert!(ReleaseConfig::load(dir.path(), None).is_ok());
    }

    #[test]
    fn test_date_stamp() {
        let started = Local
            .with_ymd_and_hms(2024, 3, 9, 12, 0, 0)
            .single()
            .expect("valid date");
        let context = RunContext::at("/tmp/project", started);
        assert_eq!(context.date_stamp(), "20240309");
    }
}
