//! Directory scans over a mock deployment tree.
//!
//! Layout mirrors a typical per-environment config repo:
//! envA/settings.yml, envB/nested/settings.yml, other/settings.yml

use repex::config::{run, PathSpec, RunOptions, Variables};
use repex::resolve;
use std::fs;
use tempfile::TempDir;

fn setup_mock_deployment() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::create_dir_all(dir.path().join("envA")).unwrap();
    fs::create_dir_all(dir.path().join("envB/nested")).unwrap();
    fs::create_dir_all(dir.path().join("other")).unwrap();
    // A file (not a directory) whose name also matches the directory regex.
    fs::write(dir.path().join("env.txt"), "settings.yml\n").unwrap();

    let settings = "tag: {{ .unrendered }}\nimage: registry/app:1.4.0\nlog_level: debug\n";
    fs::write(dir.path().join("envA/settings.yml"), settings).unwrap();
    fs::write(dir.path().join("envB/nested/settings.yml"), settings).unwrap();
    fs::write(dir.path().join("envB/nested/notes.md"), "image: registry/app:1.4.0\n").unwrap();
    fs::write(dir.path().join("other/settings.yml"), settings).unwrap();

    dir
}

fn scan_spec(dir: &TempDir) -> PathSpec {
    PathSpec::new(
        "/env",
        r"registry/app:\d+\.\d+\.\d+",
        "registry/app:{{ .release }}",
    )
    .scanning(dir.path().to_string_lossy(), "settings.yml")
}

#[test]
fn test_resolves_only_matching_directories_in_order() {
    let dir = setup_mock_deployment();

    let files = resolve(&scan_spec(&dir)).unwrap();

    assert_eq!(
        files,
        vec![
            dir.path().join("envA/settings.yml"),
            dir.path().join("envB/nested/settings.yml"),
        ]
    );
}

#[test]
fn test_rewrites_each_resolved_file_independently() {
    let dir = setup_mock_deployment();
    let specs = vec![scan_spec(&dir)];
    let variables: Variables = [("release", "1.5.0")].into_iter().collect();

    let outcomes = run(&specs, &variables, &RunOptions::default()).unwrap();

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_eq!(outcome.source, outcome.destination);
        assert_eq!(outcome.lines_changed, 1);
        let content = fs::read_to_string(&outcome.source).unwrap();
        assert!(content.contains("image: registry/app:1.5.0\n"));
        // Tokens already present in the file are plain text, not variables.
        assert!(content.contains("tag: {{ .unrendered }}\n"));
        assert_eq!(content.lines().count(), 3);
    }

    assert_eq!(
        fs::read_to_string(dir.path().join("other/settings.yml")).unwrap(),
        "tag: {{ .unrendered }}\nimage: registry/app:1.4.0\nlog_level: debug\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("envB/nested/notes.md")).unwrap(),
        "image: registry/app:1.4.0\n"
    );
}

#[test]
fn test_second_run_fails_validation_once_pattern_is_gone() {
    let dir = setup_mock_deployment();
    let specs = vec![PathSpec::new("/env", "log_level: debug", "log_level: info")
        .scanning(dir.path().to_string_lossy(), "settings.yml")];

    run(&specs, &Variables::new(), &RunOptions::default()).unwrap();
    let err = run(&specs, &Variables::new(), &RunOptions::default()).unwrap_err();

    assert!(err.to_string().contains("log_level: debug"));
    assert!(fs::read_to_string(dir.path().join("envA/settings.yml"))
        .unwrap()
        .contains("log_level: info"));
}
