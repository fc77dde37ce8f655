//! Timestamp checks for artifact operations.

use crate::error::Result;
use crate::graph::{Operation, OperationGraph};
use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

/// Whether `operation` can be skipped
///
/// Only artifact operations are ever skipped. The artifact must exist, no
/// prerequisite may have executed a step during this run, and no
/// prerequisite file artifact may be newer. Directory artifacts only gate on
/// existence, since adding files to a directory bumps its mtime.
pub fn is_up_to_date(
    graph: &OperationGraph,
    operation: &Operation,
    root: &Path,
    executed: &HashSet<&str>,
) -> Result<bool> {
    let Some(location) = operation.artifact_location() else {
        return Ok(false);
    };
    let Some(artifact) = location.resolve(root)? else {
        log::debug!("{}: artifact {} missing", operation.name, location);
        return Ok(false);
    };
    let artifact_time = modified(&artifact)?;

    for name in &operation.prerequisites {
        if executed.contains(name.as_str()) {
            log::debug!("{}: prerequisite '{}' ran this invocation", operation.name, name);
            return Ok(false);
        }

        let Some(prerequisite) = graph.get(name) else {
            continue;
        };
        let Some(prerequisite_location) = prerequisite.artifact_location() else {
            continue;
        };
        let Some(prerequisite_artifact) = prerequisite_location.resolve(root)? else {
            return Ok(false);
        };
        if prerequisite_artifact.is_dir() {
            continue;
        }
        if modified(&prerequisite_artifact)? > artifact_time {
            log::debug!(
                "{}: {} is newer than {}",
                operation.name,
                prerequisite_artifact.display(),
                artifact.display()
            );
            return Ok(false);
        }
    }

    Ok(true)
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ArtifactLocation;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;
    use std::path::PathBuf;

    fn graph() -> OperationGraph {
        OperationGraph::new(vec![
            Operation::phony("check"),
            Operation::artifact("output", ArtifactLocation::Path(PathBuf::from("output")))
                .requires("check"),
            Operation::artifact("sdist", ArtifactLocation::Path(PathBuf::from("output/pkg.tar")))
                .requires("output"),
            Operation::artifact("sums", ArtifactLocation::Path(PathBuf::from("output/SUMS")))
                .requires("sdist"),
        ])
        .expect("graph")
    }

    #[test]
    fn test_phony_never_up_to_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let graph = graph();
        let check = graph.get("check").expect("check");
        assert!(!is_up_to_date(&graph, check, dir.path(), &HashSet::new()).expect("fresh"));
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let graph = graph();
        let output = graph.get("output").expect("output");
        assert!(!is_up_to_date(&graph, output, dir.path(), &HashSet::new()).expect("fresh"));

        fs::create_dir(dir.path().join("output")).expect("mkdir");
        assert!(is_up_to_date(&graph, output, dir.path(), &HashSet::new()).expect("fresh"));
    }

    #[test]
    fn test_directory_prerequisite_counts_by_existence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("output");
        fs::create_dir(&out).expect("mkdir");
        fs::write(out.join("pkg.tar"), b"tar").expect("write");
        set_file_mtime(out.join("pkg.tar"), FileTime::from_unix_time(1_000, 0)).expect("mtime");
        set_file_mtime(&out, FileTime::from_unix_time(5_000, 0)).expect("mtime");

        let graph = graph();
        let sdist = graph.get("sdist").expect("sdist");
        assert!(is_up_to_date(&graph, sdist, dir.path(), &HashSet::new()).expect("fresh"));
    }

    #[test]
    fn test_newer_file_prerequisite_makes_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("output");
        fs::create_dir(&out).expect("mkdir");
        fs::write(out.join("pkg.tar"), b"tar").expect("write");
        fs::write(out.join("SUMS"), b"sums").expect("write");
        set_file_mtime(out.join("SUMS"), FileTime::from_unix_time(1_000, 0)).expect("mtime");
        set_file_mtime(out.join("pkg.tar"), FileTime::from_unix_time(2_000, 0)).expect("mtime");

        let graph = graph();
        let sums = graph.get("sums").expect("sums");
        assert!(!is_up_to_date(&graph, sums, dir.path(), &HashSet::new()).expect("fresh"));

        set_file_mtime(out.join("SUMS"), FileTime::from_unix_time(3_000, 0)).expect("mtime");
        assert!(is_up_to_date(&graph, sums, dir.path(), &HashSet::new()).expect("fresh"));
    }

    #[test]
    fn test_executed_prerequisite_makes_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("output");
        fs::create_dir(&out).expect("mkdir");
        fs::write(out.join("pkg.tar"), b"tar").expect("write");

        let graph = graph();
        let sdist = graph.get("sdist").expect("sdist");
        let executed: HashSet<&str> = ["output"].into_iter().collect();
        assert!(!is_up_to_date(&graph, sdist, dir.path(), &executed).expect("fresh"));
    }
}
