//! Project name and version discovery.

use super::ReleaseConfig;
use crate::error::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^__version__\s*=\s*["']([^"']+)["']"#).expect("version regex is valid")
});

static DIST_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("dist name regex is valid"));

/// Directories never searched for a version file
const SKIPPED_DIRS: &[&str] = &[".git", "build", "output", "dist", "venv", ".venv", ".tox"];

/// Name and version of the package being released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMetadata {
    /// Project name (e.g., "mrbaviirc.wsgi")
    pub name: String,
    /// Version from the version file, when found
    pub version: Option<String>,
    /// Version file that was read
    pub version_file: Option<PathBuf>,
}

impl ProjectMetadata {
    /// Discover metadata from configuration and the working tree
    ///
    /// The version file is taken from configuration or else found by looking
    /// for `_version.py` inside the package directories. The name is taken
    /// from configuration, else derived from the version file's package path,
    /// else the root directory's name.
    pub fn discover(root: &Path, config: &ReleaseConfig) -> Result<Self> {
        let version_file = match &config.version_file {
            Some(path) => Some(path.clone()),
            None => Self::find_version_file(root),
        };

        let version = match &version_file {
            Some(path) => Self::read_version(&root.join(path))?,
            None => None,
        };
        if version.is_none() {
            log::warn!("No __version__ found; wheel freshness will match any version");
        }

        let name = config
            .project
            .clone()
            .or_else(|| version_file.as_deref().and_then(Self::package_name))
            .or_else(|| {
                root.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "project".to_string());

        Ok(Self {
            name,
            version,
            version_file,
        })
    }

    /// Find `*/**/_version.py` below the root, shallowest first
    fn find_version_file(root: &Path) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .min_depth(2)
            .max_depth(4)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name) || name.ends_with(".egg-info")))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == "_version.py")
            .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
            .collect();

        candidates.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });
        candidates.into_iter().next()
    }

    /// Read `__version__` from a Python file
    fn read_version(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            log::warn!("Version file {} does not exist", path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(VERSION_RE
            .captures(&content)
            .map(|caps| caps[1].to_string()))
    }

    /// Dotted package name from a relative version file path
    /// (`mrbaviirc/wsgi/_version.py` becomes `mrbaviirc.wsgi`)
    fn package_name(version_file: &Path) -> Option<String> {
        let parts: Vec<String> = version_file
            .parent()?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("."))
    }

    /// Wheel distribution name: runs of `-`, `_` and `.` become `_`, lowercased
    pub fn dist_name(&self) -> String {
        DIST_NAME_RE
            .replace_all(&self.name, "_")
            .to_lowercase()
    }

    /// Glob matching the wheel built for this version, relative to the root
    pub fn wheel_pattern(&self, output_dir: &Path) -> String {
        let version = self.version.as_deref().unwrap_or("*");
        output_dir
            .join(format!("{}-{}-*.whl", self.dist_name(), version))
            .display()
            .to_string()
    }
}
