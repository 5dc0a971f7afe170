//! CLI integration tests (teacher's `assert_cmd` + `predicates` habit,
//! generalized from the `jozin` example's `tests/cli_basic.rs`).

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("aperture").unwrap()
}

/// A fake `$HOME` so `Config::load()`'s default corpus/config paths land
/// under a scratch directory instead of the real home directory.
fn fake_home() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("photo-enrichment pipeline"));
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aperture"));
}

#[test]
fn test_config_show_defaults() {
    let home = fake_home();
    cmd()
        .env("HOME", home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[general]"))
        .stdout(predicate::str::contains("[store]"));
}

#[test]
fn test_config_path() {
    let home = fake_home();
    cmd()
        .env("HOME", home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_refuses_overwrite_without_force() {
    let home = fake_home();
    cmd()
        .env("HOME", home.path())
        .args(["config", "init"])
        .assert()
        .success();
    cmd()
        .env("HOME", home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    cmd()
        .env("HOME", home.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_stats_without_store() {
    let home = fake_home();
    cmd()
        .env("HOME", home.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("No store found"));
}

#[test]
fn test_models_path_and_list_without_models() {
    let home = fake_home();
    cmd()
        .env("HOME", home.path())
        .args(["models", "path"])
        .assert()
        .success();
    cmd()
        .env("HOME", home.path())
        .args(["models", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No models installed"));
}

#[test]
fn test_register_on_empty_corpus_succeeds() {
    let home = fake_home();
    std::fs::create_dir_all(home.path().join(".aperture/corpus/originals")).unwrap();
    cmd()
        .env("HOME", home.path())
        .arg("register")
        .assert()
        .success()
        .stdout(predicate::str::contains("register: processed 0, failed 0"));
}

#[test]
fn test_run_all_on_empty_corpus_succeeds_and_writes_export() {
    let home = fake_home();
    std::fs::create_dir_all(home.path().join(".aperture/corpus/originals")).unwrap();
    cmd()
        .env("HOME", home.path())
        .arg("run-all")
        .assert()
        .success();
    assert!(home.path().join(".aperture/corpus/export/export.json").exists());
}

#[test]
fn test_invalid_shard_rejected() {
    let home = fake_home();
    std::fs::create_dir_all(home.path().join(".aperture/corpus/originals")).unwrap();
    cmd()
        .env("HOME", home.path())
        .args(["register", "--shard", "2/2"])
        .assert()
        .failure();
}
