//! Shared fixtures: a scripted command runner and a sample project.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use wsgi_release::error::Result;
use wsgi_release::process::{CommandOutput, CommandRunner, CommandSpec, display_pipeline};
use wsgi_release::{ProjectMetadata, ReleaseConfig};

/// Wheel file the scripted packaging tool writes
pub const WHEEL_FILE: &str = "output/mrbaviirc_wsgi-0.3.1-py3-none-any.whl";

/// Runner that records command lines instead of spawning processes
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    exit_codes: HashMap<String, i32>,
    stdout: HashMap<String, String>,
    creates: Vec<(String, PathBuf)>,
}

impl ScriptedRunner {
    /// Runner answering git queries for branch `feature/render` at a tag
    pub fn new() -> Self {
        Self::default()
            .with_stdout("git symbolic-ref --short HEAD", "feature/render\n")
            .with_stdout("git describe --always --dirty", "v0.3.1-2-gabc1234\n")
    }

    /// Answer `command` with `stdout`
    pub fn with_stdout(mut self, command: &str, stdout: &str) -> Self {
        self.stdout.insert(command.to_string(), stdout.to_string());
        self
    }

    /// Make commands starting with `prefix` exit with `code`
    pub fn failing(mut self, prefix: &str, code: i32) -> Self {
        self.exit_codes.insert(prefix.to_string(), code);
        self
    }

    /// Make commands starting with `prefix` create `file` below the root
    pub fn creating(mut self, prefix: &str, file: impl Into<PathBuf>) -> Self {
        self.creates.push((prefix.to_string(), file.into()));
        self
    }

    /// Packaging tool that writes [`WHEEL_FILE`]
    pub fn building_wheel(self) -> Self {
        self.creating("python3 -m pip wheel", WHEEL_FILE)
    }

    /// Every command line seen so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Number of recorded commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn exit_code(&self, line: &str) -> i32 {
        self.exit_codes
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0)
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, cwd: &Path, command: &CommandSpec) -> Result<CommandOutput> {
        let line = command.display();
        self.calls.lock().expect("calls lock").push(line.clone());

        let code = self.exit_code(&line);
        if code == 0 {
            for (prefix, file) in &self.creates {
                if line.starts_with(prefix.as_str()) {
                    let path = cwd.join(file);
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, line.as_bytes())?;
                }
            }
        }

        Ok(CommandOutput {
            command: line.clone(),
            code: Some(code),
            signal: None,
            stdout: self.stdout.get(&line).cloned().unwrap_or_default(),
            stderr: String::new(),
        })
    }

    async fn pipe(&self, cwd: &Path, stages: &[CommandSpec], sink: &Path) -> Result<CommandOutput> {
        let relative = sink.strip_prefix(cwd).unwrap_or(sink);
        let line = display_pipeline(stages, relative);
        self.calls.lock().expect("calls lock").push(line.clone());

        let code = self.exit_code(&line);
        std::fs::write(sink, line.as_bytes())?;
        Ok(CommandOutput {
            command: line,
            code: Some(code),
            ..Default::default()
        })
    }
}

/// Metadata of the sample package
pub fn project() -> ProjectMetadata {
    ProjectMetadata {
        name: "mrbaviirc.wsgi".to_string(),
        version: Some("0.3.1".to_string()),
        version_file: Some(PathBuf::from("mrbaviirc/wsgi/_version.py")),
    }
}

/// Default configuration
pub fn config() -> ReleaseConfig {
    ReleaseConfig::default()
}

/// Lay out a minimal package below `root`
pub fn write_package(root: &Path) {
    let package = root.join("mrbaviirc/wsgi");
    std::fs::create_dir_all(&package).expect("package dir");
    std::fs::write(root.join("mrbaviirc/__init__.py"), "").expect("init");
    std::fs::write(package.join("__init__.py"), "").expect("init");
    std::fs::write(package.join("_version.py"), "__version__ = \"0.3.1\"\n").expect("version");
    std::fs::write(root.join("setup.py"), "from setuptools import setup\nsetup()\n").expect("setup");
}

/// Names of `targets`
pub fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
