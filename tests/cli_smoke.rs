//! Behavioural smoke tests for the CLI entrypoint.
//!
//! Every test runs the binary in a throwaway directory so no developer
//! machine state leaks into assertions.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn temp_root() -> TempDir {
    TempDir::new().expect("tempdir should be creatable")
}

#[test]
fn help_lists_the_available_commands() {
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(contains("CLI tool to improve devX for webapps"))
        .stdout(contains("setup"))
        .stdout(contains("validate"))
        .stdout(contains("db"));
}

#[test]
fn version_flag_prints_the_tool_name() {
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.arg("-v");

    cmd.assert().success().stdout(contains("dh"));
}

#[test]
fn bare_invocation_shows_usage_and_fails() {
    let mut cmd = cargo_bin_cmd!("dh");

    cmd.assert().code(2).stderr(contains("Usage"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.arg("frobnicate");

    cmd.assert().code(2).stderr(contains("frobnicate"));
}

#[test]
fn db_migrate_requires_configuration() {
    let tmp = temp_root();
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.current_dir(tmp.path());
    cmd.args(["db", "migrate"]);

    cmd.assert()
        .code(1)
        .stderr(contains("database is not configured"));
}

#[test]
fn build_fails_without_projects() {
    let tmp = temp_root();
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.current_dir(tmp.path());
    cmd.arg("build");

    cmd.assert()
        .code(1)
        .stderr(contains("no frontend or backend project detected"));
}

#[test]
fn validate_flags_an_empty_directory() {
    let tmp = temp_root();
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.current_dir(tmp.path());
    cmd.arg("validate");

    cmd.assert()
        .code(1)
        .stderr(contains("no frontend or backend project detected"));
}

#[test]
fn db_status_reports_missing_configuration() {
    let tmp = temp_root();
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.current_dir(tmp.path());
    cmd.args(["db", "status"]);

    cmd.assert()
        .code(1)
        .stderr(contains("url: not set"))
        .stderr(contains("secret key: not set"));
}

#[test]
fn db_status_reads_the_project_file() {
    let tmp = temp_root();
    std::fs::write(
        tmp.path().join("dh.toml"),
        "[db]\nurl = \"https://abcdefghijklmnopqrst.supabase.co\"\n",
    )
    .expect("fixture write should succeed");
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.current_dir(tmp.path());
    cmd.args(["db", "status"]);

    cmd.assert()
        .code(1)
        .stdout(contains("url: https://abcdefghijklmnopqrst.supabase.co"))
        .stdout(contains("project ref: abcdefghijklmnopqrst"))
        .stderr(contains("secret key: not set"));
}

#[test]
fn malformed_project_file_is_a_configuration_error() {
    let tmp = temp_root();
    std::fs::write(tmp.path().join("dh.toml"), "[db\nurl =")
        .expect("fixture write should succeed");
    let mut cmd = cargo_bin_cmd!("dh");
    cmd.current_dir(tmp.path());
    cmd.args(["db", "status"]);

    cmd.assert().code(1).stderr(contains("dh.toml"));
}
