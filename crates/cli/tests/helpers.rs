use std::fs;
use std::path::Path;

use apiport::{canonicalize_or_current, infer_project_name, submission_id};
use apiport_core::TargetPlatform;
use tempfile::tempdir;

fn targets(names: &[&str]) -> Vec<TargetPlatform> {
    names.iter().map(|n| TargetPlatform::new(n).expect("target")).collect()
}

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current(".").expect("canonicalize").canonicalize().expect("canon");
    let expected = tmp.path().canonicalize().expect("canon tmp");
    std::env::set_current_dir(original).expect("restore cwd");

    assert_eq!(result, expected);
}

#[test]
fn canonicalize_or_current_joins_missing_path_onto_cwd() {
    let result = canonicalize_or_current("does-not-exist-yet").expect("canonicalize");
    assert!(result.is_absolute());
    assert!(result.ends_with("does-not-exist-yet"));
}

#[test]
fn infer_project_name_uses_last_path_component() {
    assert_eq!(infer_project_name(Path::new("/tmp/portability-run")), "portability-run");
    assert_eq!(infer_project_name(Path::new("/")), "unnamed-project");
}

#[test]
fn submission_id_ignores_target_order_and_duplicates() {
    let dir = tempdir().expect("tempdir");
    let module = dir.path().join("App.exe");
    fs::write(&module, b"module bytes").expect("write");
    let modules = vec![module];

    let a = submission_id(&modules, &targets(&["B", "A"]));
    let b = submission_id(&modules, &targets(&["A", "B", "A"]));
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);

    let other = submission_id(&modules, &targets(&["A"]));
    assert_ne!(a, other);
}

#[test]
fn submission_id_changes_with_module_contents() {
    let dir = tempdir().expect("tempdir");
    let module = dir.path().join("App.exe");
    let t = targets(&[".NETCoreApp,Version=v2.0"]);

    fs::write(&module, b"first").expect("write");
    let first = submission_id(std::slice::from_ref(&module), &t);
    fs::write(&module, b"second").expect("write");
    let second = submission_id(std::slice::from_ref(&module), &t);

    assert_ne!(first, second);
}

#[test]
fn submission_id_hashes_unreadable_modules_by_path() {
    let dir = tempdir().expect("tempdir");
    let present = dir.path().join("App.exe");
    fs::write(&present, b"module bytes").expect("write");
    let t = targets(&["A"]);

    let gone = vec![present.clone(), dir.path().join("gone.dll")];
    let first = submission_id(&gone, &t);
    assert_eq!(first.len(), 64);
    assert_eq!(first, submission_id(&gone, &t));

    let other = vec![present.clone(), dir.path().join("elsewhere.dll")];
    assert_ne!(first, submission_id(&other, &t));
    assert_ne!(first, submission_id(&[present], &t));
}
