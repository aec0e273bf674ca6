//! Help and version surface.

use crate::prelude::*;
use assert_cmd::prelude::*;

#[test]
fn help_lists_the_pabot_flag_surface() {
    let run = PabotRun::new();
    let assert = run.pabot().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    for flag in [
        "--verbose",
        "--testlevelsplit",
        "--processes",
        "--no-pabotlib",
        "--pabotlibhost",
        "--pabotlibport",
        "--processtimeout",
        "--shard",
        "--artifacts",
        "--artifactsinsubfolders",
        "--resourcefile",
        "--suitesfrom",
        "--ordering",
        "--chunk",
        "--pabotprerunmodifier",
        "--no-rebot",
    ] {
        assert!(stdout.contains(flag), "help is missing {flag}:\n{stdout}");
    }
}

#[test]
fn version_prints_name_and_version() {
    let run = PabotRun::new();
    let assert = run.pabot().arg("--version").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.starts_with("pabot "));
}

#[test]
fn pabotd_version_and_help() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = std::process::Command::new(binary_path("pabotd"));
    cmd.current_dir(dir.path()).arg("--help");
    let assert = cmd.assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("--resourcefile"));

    let mut cmd = std::process::Command::new(binary_path("pabotd"));
    cmd.current_dir(dir.path()).arg("--version");
    cmd.assert().success();
}

#[test]
fn pabotd_rejects_unknown_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = std::process::Command::new(binary_path("pabotd"));
    cmd.current_dir(dir.path()).arg("--frobnicate");
    cmd.assert().failure();
}
