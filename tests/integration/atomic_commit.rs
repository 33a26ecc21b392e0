//! Commit behaviour of the rewrite: temp file in the destination directory,
//! renamed into place only once fully written.

use repex::config::{run, PathSpec, RunOptions, Variables};
use repex::substitute::{SubstituteError, Substitution};
use std::fs;
use tempfile::TempDir;

fn entries(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_interrupted_rewrite_keeps_old_content() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("data.txt");
    // Valid lines first, then bytes that abort the stream part-way through.
    let mut original = "alpha\nbeta\n".repeat(100).into_bytes();
    original.extend_from_slice(b"\xc3\x28\n");
    fs::write(&target, &original).unwrap();

    let sub = Substitution::new("alpha", "ALPHA", &Variables::new()).unwrap();
    let err = sub.apply(&target, None).unwrap_err();

    assert!(matches!(err, SubstituteError::Read { .. }));
    assert_eq!(fs::read(&target).unwrap(), original);
    assert_eq!(entries(&dir), vec!["data.txt".to_string()]);
}

#[test]
fn test_stale_temp_file_does_not_affect_commit() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("data.txt");
    fs::write(&target, "old\n").unwrap();
    // Leftover from a process killed before it could rename.
    fs::write(dir.path().join("data.txt.tmp"), "half-writ").unwrap();

    let specs = vec![PathSpec::new(target.to_string_lossy(), "old", "new")];
    run(&specs, &Variables::new(), &RunOptions::default()).unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("data.txt.tmp")).unwrap(),
        "half-writ"
    );
}

#[test]
fn test_to_file_writes_alongside_destination() {
    let src_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let source = src_dir.path().join("template.conf");
    let output = out_dir.path().join("rendered.conf");
    fs::write(&source, "listen {{ .port }}\nlisten 80\n").unwrap();

    let specs = vec![PathSpec::new(source.to_string_lossy(), r"listen \d+", "listen {{ .port }}")
        .to_file(output.to_string_lossy())];
    let variables: Variables = [("port", "8443")].into_iter().collect();

    let outcomes = run(&specs, &variables, &RunOptions::default()).unwrap();

    assert_eq!(outcomes[0].destination, output);
    assert_eq!(
        fs::read_to_string(&source).unwrap(),
        "listen {{ .port }}\nlisten 80\n"
    );
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "listen {{ .port }}\nlisten 8443\n"
    );
    assert_eq!(entries(&src_dir), vec!["template.conf".to_string()]);
    assert_eq!(entries(&out_dir), vec!["rendered.conf".to_string()]);
}

#[test]
fn test_overwrites_existing_to_file() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&source, "value=1\n").unwrap();
    fs::write(&output, "stale contents that are longer\n").unwrap();

    let specs = vec![PathSpec::new(source.to_string_lossy(), "value=1", "value=2")
        .to_file(output.to_string_lossy())];
    run(&specs, &Variables::new(), &RunOptions::default()).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "value=2\n");
}
