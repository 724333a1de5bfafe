#![allow(missing_docs)]

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("cetest")
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .output()
        .expect("run cetest");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read config"), "{stderr}");
}

#[test]
fn unknown_dataset_is_rejected_before_connecting() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
query-types = ["single-col-point-query"]
report-dir = "out"
n = 10

[[datasets]]
name = "tpch"
db = "tpch"
label = "TPCH"

[[instances]]
label = "v4"
port = 1
"#,
    )
    .expect("write config");

    let output = cargo_bin_cmd!("cetest")
        .env("CETEST_CONFIG", &path)
        .output()
        .expect("run cetest");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown dataset=tpch"), "{stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn invalid_case_count_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "report-dir = \"out\"\nn = 0\n").expect("write config");

    cargo_bin_cmd!("cetest")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn help_lists_options() {
    let output = cargo_bin_cmd!("cetest")
        .arg("--help")
        .output()
        .expect("run cetest");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--log-level"));
}
