mod common;

use chrono::{Local, TimeZone};
use common::{ScriptedRunner, WHEEL_FILE, config, project, targets};
use filetime::{FileTime, set_file_mtime};
use std::path::{Path, PathBuf};
use wsgi_release::error::{CommandError, ConfigError, ReleaseError, ToolError};
use wsgi_release::orchestrator::{OperationStatus, SilentObserver};
use wsgi_release::{Orchestrator, RunContext, build_graph};

fn frozen_context(root: &Path) -> RunContext {
    let started = Local
        .with_ymd_and_hms(2024, 3, 9, 18, 30, 0)
        .single()
        .expect("valid date");
    RunContext::at(root, started)
}

#[tokio::test]
async fn test_shared_prerequisites_run_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let runner = ScriptedRunner::new().building_wheel();
    let orchestrator = Orchestrator::new(&graph, runner, frozen_context(dir.path()));

    let requested = targets(&["test", "tarball", "dist"]);
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("run");

    let order: Vec<&str> = report.operations.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["check", "output", "test", "tarball", "wheel", "dist"]);
    assert!(report
        .operations
        .iter()
        .all(|r| r.status == OperationStatus::Completed));

    let runner = orchestrator.runner();
    assert_eq!(runner.count("python3 -m unittest discover"), 1);
    assert_eq!(runner.count("git archive"), 1);
    assert_eq!(runner.count("python3 -m pip wheel"), 1);
    assert!(dir.path().join("output").is_dir());
}

#[tokio::test]
async fn test_wheel_skipped_when_up_to_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("output")).expect("mkdir");
    std::fs::write(dir.path().join(WHEEL_FILE), b"wheel").expect("wheel");
    set_file_mtime(dir.path().join("output"), FileTime::from_unix_time(9_000, 0)).expect("mtime");
    set_file_mtime(dir.path().join(WHEEL_FILE), FileTime::from_unix_time(1_000, 0)).expect("mtime");

    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(&graph, ScriptedRunner::new(), frozen_context(dir.path()));

    let requested = targets(&["dist"]);
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("run");

    assert_eq!(report.status("output"), Some(OperationStatus::Skipped));
    assert_eq!(report.status("wheel"), Some(OperationStatus::Skipped));
    assert_eq!(report.status("dist"), Some(OperationStatus::Completed));
    assert!(orchestrator.runner().calls().is_empty());
}

#[tokio::test]
async fn test_dist_leaves_wheel_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let runner = ScriptedRunner::new().building_wheel();
    let orchestrator = Orchestrator::new(&graph, runner, frozen_context(dir.path()));

    let requested = targets(&["dist"]);
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("run");

    assert!(dir.path().join(WHEEL_FILE).is_file());
    let artifact = report
        .artifacts
        .iter()
        .find(|a| a.operation == "wheel")
        .expect("wheel artifact recorded");
    assert_eq!(artifact.path, PathBuf::from(WHEEL_FILE));
    assert_eq!(artifact.sha256.len(), 64);
}

#[tokio::test]
async fn test_wheel_without_artifact_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(&graph, ScriptedRunner::new(), frozen_context(dir.path()));

    let requested = targets(&["dist"]);
    let mut report = orchestrator.new_report(&requested, false);
    let err = orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Command(CommandError::MissingArtifact { ref operation, .. }) if operation == "wheel"
    ));
    assert_eq!(report.status("wheel"), Some(OperationStatus::Failed));
    assert_eq!(report.status("dist"), Some(OperationStatus::NotStarted));
}

#[tokio::test]
async fn test_tarball_name_is_stable_for_frozen_clock() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(&graph, ScriptedRunner::new(), frozen_context(dir.path()));

    let requested = targets(&["tarball"]);
    let mut first = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut first, &SilentObserver)
        .await
        .expect("first run");
    let mut second = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut second, &SilentObserver)
        .await
        .expect("second run");

    let expected = PathBuf::from("output/mrbaviirc.wsgi-20240309-feature-render-v0.3.1-2-gabc1234.tar.xz");
    assert_eq!(first.artifacts[0].path, expected);
    assert_eq!(second.artifacts[0].path, expected);
    assert_eq!(orchestrator.runner().count("git archive"), 2);

    let calls = orchestrator.runner().calls();
    assert!(calls.contains(
        &"git archive --format=tar --prefix=mrbaviirc.wsgi-20240309-feature-render-v0.3.1-2-gabc1234/ HEAD | xz -c > output/mrbaviirc.wsgi-20240309-feature-render-v0.3.1-2-gabc1234.tar.xz"
            .to_string()
    ));
}

#[tokio::test]
async fn test_detached_head_aborts_tarball() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let runner = ScriptedRunner::new().failing("git symbolic-ref", 128);
    let orchestrator = Orchestrator::new(&graph, runner, frozen_context(dir.path()));

    let requested = targets(&["tarball"]);
    let mut report = orchestrator.new_report(&requested, false);
    let err = orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::Tool(ToolError::Git { .. })));
    assert_eq!(orchestrator.runner().count("git archive"), 0);
    assert_eq!(report.status("tarball"), Some(OperationStatus::Failed));
}

#[tokio::test]
async fn test_failure_stops_later_operations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let runner = ScriptedRunner::new()
        .building_wheel()
        .failing("python3 -m unittest", 3);
    let orchestrator = Orchestrator::new(&graph, runner, frozen_context(dir.path()));

    let requested = targets(&["test", "dist"]);
    let mut report = orchestrator.new_report(&requested, false);
    let err = orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    let failed = report
        .operations
        .iter()
        .find(|record| record.name == "test")
        .expect("test record");
    assert_eq!(failed.steps.last().and_then(|step| step.exit_code), Some(3));
    assert_eq!(report.failed_operation(), Some("test"));
    assert_eq!(report.status("wheel"), Some(OperationStatus::NotStarted));
    assert_eq!(report.status("dist"), Some(OperationStatus::NotStarted));
    assert_eq!(orchestrator.runner().count("python3 -m pip wheel"), 0);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_unknown_operation_runs_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(&graph, ScriptedRunner::new(), frozen_context(dir.path()));

    let requested = targets(&["output", "deploy"]);
    let mut report = orchestrator.new_report(&requested, false);
    let err = orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Config(ConfigError::UnknownOperation { ref name }) if name == "deploy"
    ));
    assert!(!dir.path().join("output").exists());
    assert!(orchestrator.runner().calls().is_empty());
}

#[tokio::test]
async fn test_clean_then_output_leaves_empty_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    common::write_package(dir.path());
    let root = dir.path();
    std::fs::create_dir_all(root.join("output")).expect("mkdir");
    std::fs::write(root.join("output/old.tar.xz"), b"old").expect("write");
    std::fs::create_dir_all(root.join("mrbaviirc/wsgi/__pycache__")).expect("mkdir");
    std::fs::write(root.join("mrbaviirc/wsgi/__pycache__/x.pyc"), b"").expect("write");
    std::fs::write(root.join("mrbaviirc/stale.pyo"), b"").expect("write");
    std::fs::create_dir_all(root.join("mrbaviirc.wsgi.egg-info")).expect("mkdir");

    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(&graph, ScriptedRunner::new(), frozen_context(root));

    let requested = targets(&["clean", "output"]);
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("run");

    let entries: Vec<_> = std::fs::read_dir(root.join("output")).expect("read_dir").collect();
    assert!(entries.is_empty());
    assert!(!root.join("mrbaviirc/wsgi/__pycache__").exists());
    assert!(!root.join("mrbaviirc/stale.pyo").exists());
    assert!(!root.join("mrbaviirc.wsgi.egg-info").exists());
    assert!(root.join("mrbaviirc/wsgi/_version.py").exists());
    assert_eq!(report.status("output"), Some(OperationStatus::Completed));
}

#[tokio::test]
async fn test_custom_operation_reruns_after_prerequisite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config();
    config.operations = wsgi_release::ReleaseConfig::parse(
        r#"
        [operations.checksums]
        prerequisites = ["wheel"]
        commands = ["sha256sum output/*.whl > output/SHA256SUMS"]
        artifact = "output/SHA256SUMS"
        "#,
    )
    .expect("parse")
    .operations;

    let graph = build_graph(&config, &project()).expect("graph");
    let runner = ScriptedRunner::new()
        .building_wheel()
        .creating("bash -c", "output/SHA256SUMS");
    let orchestrator = Orchestrator::new(&graph, runner, frozen_context(dir.path()));

    let requested = targets(&["checksums"]);
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("first run");
    assert_eq!(orchestrator.runner().count("bash -c"), 1);

    // Everything is now fresh
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("second run");
    assert_eq!(report.status("checksums"), Some(OperationStatus::Skipped));
    assert_eq!(orchestrator.runner().count("bash -c"), 1);

    // A newer wheel makes the checksums stale
    set_file_mtime(
        dir.path().join("output/SHA256SUMS"),
        FileTime::from_unix_time(1_000, 0),
    )
    .expect("mtime");
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("third run");
    assert_eq!(report.status("wheel"), Some(OperationStatus::Skipped));
    assert_eq!(report.status("checksums"), Some(OperationStatus::Completed));
    assert_eq!(orchestrator.runner().count("bash -c"), 2);
}

#[tokio::test]
async fn test_preview_executes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(&graph, ScriptedRunner::new(), frozen_context(dir.path()));

    let report = orchestrator.preview(&targets(&["clean", "dist"])).expect("preview");
    assert!(report.dry_run);
    let order: Vec<&str> = report.operations.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["check", "clean", "output", "wheel", "dist"]);

    let wheel = report.record("wheel").expect("wheel");
    assert_eq!(
        wheel.steps[0].description,
        "python3 -m pip wheel --no-deps --wheel-dir output ."
    );
    assert!(wheel.steps[0].exit_code.is_none());
    assert!(!dir.path().join("output").exists());
    assert!(orchestrator.runner().calls().is_empty());
}

#[tokio::test]
async fn test_preview_after_clean_matches_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("output")).expect("mkdir");
    std::fs::write(dir.path().join(WHEEL_FILE), b"wheel").expect("wheel");

    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(
        &graph,
        ScriptedRunner::new().building_wheel(),
        frozen_context(dir.path()),
    );
    let requested = targets(&["clean", "dist"]);

    let preview = orchestrator.preview(&requested).expect("preview");
    assert_eq!(preview.status("output"), Some(OperationStatus::NotStarted));
    assert_eq!(preview.status("wheel"), Some(OperationStatus::NotStarted));
    assert_eq!(preview.record("wheel").map(|r| r.steps.len()), Some(1));

    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("run");
    assert_eq!(report.status("output"), Some(OperationStatus::Completed));
    assert_eq!(report.status("wheel"), Some(OperationStatus::Completed));
}

#[tokio::test]
async fn test_dist_under_root_with_glob_characters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("proj[1]");
    std::fs::create_dir_all(root.join("output")).expect("mkdir");
    std::fs::write(root.join("output/old.tar.xz"), b"old").expect("write");

    let graph = build_graph(&config(), &project()).expect("graph");
    let orchestrator = Orchestrator::new(
        &graph,
        ScriptedRunner::new().building_wheel(),
        frozen_context(&root),
    );

    let requested = targets(&["clean", "dist"]);
    let mut report = orchestrator.new_report(&requested, false);
    orchestrator
        .run(&requested, &mut report, &SilentObserver)
        .await
        .expect("run");

    assert!(!root.join("output/old.tar.xz").exists());
    assert!(root.join(WHEEL_FILE).is_file());
    assert_eq!(report.status("wheel"), Some(OperationStatus::Completed));
}
