//! Removal of generated output and Python cache artifacts.

use crate::error::{CommandError, Result};
use crate::graph::rooted_glob;
use glob::Pattern;
use std::path::{Path, PathBuf};

/// Directory names never descended into by the cache sweep
const PROTECTED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// What `clean` deletes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanTargets {
    /// Root-relative paths or globs removed outright
    pub paths: Vec<String>,
    /// Directory names removed wherever they appear below the root
    pub cache_dirs: Vec<String>,
    /// File name globs removed wherever they appear below the root
    pub cache_files: Vec<String>,
}

impl CleanTargets {
    /// Standard targets for a setuptools project writing into `output_dir`
    pub fn standard(output_dir: &Path, extra: &[String]) -> Self {
        let mut paths = vec![
            output_dir.display().to_string(),
            "*.egg-info".to_string(),
            "build".to_string(),
        ];
        paths.extend(extra.iter().cloned());
        Self {
            paths,
            cache_dirs: vec!["__pycache__".to_string()],
            cache_files: vec!["*.pyc".to_string(), "*.pyo".to_string()],
        }
    }

    /// Shell-like summary
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("rm -rf {}", self.paths.join(" "))];
        if !self.cache_dirs.is_empty() || !self.cache_files.is_empty() {
            let names: Vec<&str> = self
                .cache_dirs
                .iter()
                .chain(&self.cache_files)
                .map(String::as_str)
                .collect();
            parts.push(format!("find . -name {{{}}} -delete", names.join(",")));
        }
        parts.join(" && ")
    }

    /// Delete everything below `root`; returns the removed paths
    pub fn remove(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();

        for pattern in &self.paths {
            for entry in glob::glob(&rooted_glob(root, pattern))? {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        log::warn!("Skipping unreadable path during clean: {}", e);
                        continue;
                    }
                };
                if remove_path(&path)? {
                    removed.push(path);
                }
            }
        }

        let dir_patterns = compile(&self.cache_dirs)?;
        let file_patterns = compile(&self.cache_files)?;
        if dir_patterns.is_empty() && file_patterns.is_empty() {
            return Ok(removed);
        }

        let mut walker = walkdir::WalkDir::new(root).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                // Already gone or unreadable; absence is not an error here.
                Err(e) if e.io_error().is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound) => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let name = entry.file_name().to_string_lossy();

            if entry.file_type().is_dir() {
                if PROTECTED_DIRS.contains(&&*name) {
                    walker.skip_current_dir();
                } else if dir_patterns.iter().any(|p| p.matches(&name)) {
                    walker.skip_current_dir();
                    if remove_path(entry.path())? {
                        removed.push(entry.path().to_path_buf());
                    }
                }
            } else if file_patterns.iter().any(|p| p.matches(&name))
                && remove_path(entry.path())?
            {
                removed.push(entry.path().to_path_buf());
            }
        }

        Ok(removed)
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(Into::into))
        .collect()
}

/// Remove a file, symlink or directory tree; `false` when it was already gone
fn remove_path(path: &Path) -> Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(CommandError::Filesystem {
                context: "inspecting",
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => {
            log::debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CommandError::Filesystem {
            context: "removing",
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}
