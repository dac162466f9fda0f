use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn detjar(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_detjar"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn test_no_arguments_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let out = detjar(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(64));
    assert!(stderr(&out).contains("Usage"), "stderr: {}", stderr(&out));
}

#[test]
fn test_one_argument_is_usage_error() {
    let dir = TempDir::new().unwrap();
    write_jar(&dir.path().join("in.jar"), &[("a.txt", b"a")]);

    let out = detjar(dir.path(), &["in.jar"]);
    assert_eq!(out.status.code(), Some(64));
    assert!(stderr(&out).contains("OUTPUT"), "stderr: {}", stderr(&out));
    assert!(!dir.path().join("out.jar").exists());
}

#[test]
fn test_same_file_through_different_spelling_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jar");
    write_jar(&input, &[("a.txt", b"a")]);
    let before = std::fs::read(&input).unwrap();

    let out = detjar(dir.path(), &["in.jar", "./in.jar"]);
    assert_eq!(out.status.code(), Some(64));
    assert!(stderr(&out).contains("different files"), "stderr: {}", stderr(&out));
    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[test]
fn test_malformed_refmap_exits_with_data_error() {
    let dir = TempDir::new().unwrap();
    write_jar(
        &dir.path().join("in.jar"),
        &[("a.txt", b"a"), ("broken.refmap.json", br#"{"mappings": ["#)],
    );

    let out = detjar(dir.path(), &["in.jar", "out.jar"]);
    assert_eq!(out.status.code(), Some(65));
    let err = stderr(&out);
    assert!(err.contains("error:"), "stderr: {err}");
    assert!(err.contains("broken.refmap.json"), "stderr: {err}");
    assert!(!dir.path().join("out.jar").exists());
}

#[test]
fn test_missing_input_exits_with_io_error() {
    let dir = TempDir::new().unwrap();
    let out = detjar(dir.path(), &["absent.jar", "out.jar"]);
    assert_eq!(out.status.code(), Some(74));
    assert!(stderr(&out).contains("absent.jar"), "stderr: {}", stderr(&out));
}

#[test]
fn test_success_prints_summary() {
    let dir = TempDir::new().unwrap();
    write_jar(
        &dir.path().join("in.jar"),
        &[("b.txt", b"b"), ("x.refmap.json", br#"{"b":1,"a":2}"#), ("a.txt", b"a")],
    );

    let out = detjar(dir.path(), &["in.jar", "out.jar"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Determinized: out.jar"), "stdout: {stdout}");
    assert!(stdout.contains("3 entries, 1 canonicalized, 0 dropped"), "stdout: {stdout}");
    assert!(dir.path().join("out.jar").exists());
}
