use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("ntm")
        .env("NTM_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("ntm")
        .env("NTM_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    assert!(config_path.exists());

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("origin = \"http://localhost:8000\""));
    assert!(contents.contains("# base_url ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    fs::write(&config_path, "# existing config").unwrap();

    cargo_bin_cmd!("ntm")
        .env("NTM_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_set_origin_updates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[api]\ntimeout_ms = 4000\n").unwrap();

    cargo_bin_cmd!("ntm")
        .env("NTM_HOME", dir.path())
        .args(["config", "set-origin", "http://10.0.0.2:9000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://10.0.0.2:9000"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("origin = \"http://10.0.0.2:9000\""));
    assert!(contents.contains("timeout_ms = 4000"));
}

#[test]
fn test_config_set_origin_rejects_bad_url() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("ntm")
        .env("NTM_HOME", dir.path())
        .args(["config", "set-origin", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid API base URL"));
}

#[test]
fn test_config_generate_prints_defaults() {
    cargo_bin_cmd!("ntm")
        .args(["config", "generate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[api]"))
        .stdout(predicate::str::contains("test_timeout_ms = 180000"))
        .stdout(predicate::str::contains("[toast]"));
}

#[test]
fn test_broken_config_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "[api\n").unwrap();

    cargo_bin_cmd!("ntm")
        .env("NTM_HOME", dir.path())
        .args(["tasks", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("load config"));
}
