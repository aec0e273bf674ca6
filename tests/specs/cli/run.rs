//! End-to-end runs against a fake runner.

use crate::prelude::*;

fn run_pabot(run: &PabotRun, script: &str, extra: &[&str]) -> std::process::Output {
    let mut cmd = run.pabot();
    cmd.args(PabotRun::fake_runner_args(script)).args(extra);
    cmd.output().expect("pabot runs")
}

#[test]
fn all_passing_units_exit_zero() {
    let run = PabotRun::new();
    run.write("order.txt", "--suite A\n--suite B\n");
    let output = run_pabot(
        &run,
        "exit 0",
        &["--no-pabotlib", "--no-rebot", "--ordering", "order.txt", "tests/"],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    // Per-unit scratch directories with captured output
    assert!(run.path().join("pabot_results/0/stdout.txt").exists());
    assert!(run.path().join("pabot_results/1/stdout.txt").exists());
}

#[test]
fn failing_unit_count_is_the_exit_code() {
    let run = PabotRun::new();
    run.write("order.txt", "--suite A\n--suite B\n");
    let output = run_pabot(
        &run,
        r#"case "$*" in *"--suite B"*) exit 1;; *) exit 0;; esac"#,
        &["--no-pabotlib", "--no-rebot", "--ordering", "order.txt", "tests/"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("B: failed"), "stdout: {stdout}");
    assert!(stdout.contains("1 failed"), "stdout: {stdout}");
}

#[test]
fn failed_dependency_reports_skip() {
    let run = PabotRun::new();
    run.write("order.txt", "--test S.T1 #DEPENDS S.T2\n--test S.T2\n");
    let output = run_pabot(
        &run,
        r#"case "$*" in *"--test S.T2"*) exit 1;; *) exit 0;; esac"#,
        &["--no-pabotlib", "--no-rebot", "--ordering", "order.txt", "tests/"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("S.T1: skipped (dependency S.T2 did not pass)"),
        "stdout: {stdout}"
    );
}

#[test]
fn process_timeout_fails_the_unit_but_not_the_run() {
    let run = PabotRun::new();
    run.write("order.txt", "--suite Slow\n--suite Quick\n");
    let started = std::time::Instant::now();
    let output = run_pabot(
        &run,
        r#"case "$*" in *"--suite Slow"*) sleep 60;; *) exit 0;; esac"#,
        &[
            "--no-pabotlib",
            "--no-rebot",
            "--processes",
            "2",
            "--processtimeout",
            "1",
            "--ordering",
            "order.txt",
            "tests/",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(started.elapsed() < std::time::Duration::from_secs(30));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Slow: timed out"), "stdout: {stdout}");
}

#[test]
fn workers_receive_injected_environment() {
    let run = PabotRun::new();
    run.write("order.txt", "--suite A\n");
    let output = run_pabot(
        &run,
        r#"printenv PABOTQUEUEINDEX PABOTEXECUTIONPOOLID PABOTNUMBEROFPROCESSES CALLER_ID PABOTLIBURI > seen.txt"#,
        &[
            "--pabotlibport",
            "0",
            "--no-rebot",
            "--processes",
            "3",
            "--ordering",
            "order.txt",
            "tests/",
        ],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let seen = std::fs::read_to_string(run.path().join("seen.txt")).expect("env dump");
    let lines: Vec<&str> = seen.lines().collect();
    assert_eq!(lines[0], "0", "PABOTQUEUEINDEX: {seen}");
    assert_eq!(lines[1], "0", "PABOTEXECUTIONPOOLID: {seen}");
    assert_eq!(lines[2], "3", "PABOTNUMBEROFPROCESSES: {seen}");
    assert_eq!(lines[3].len(), 36, "CALLER_ID is a UUID: {seen}");
    assert!(lines[4].starts_with("tcp://127.0.0.1:"), "PABOTLIBURI: {seen}");
}

#[test]
fn merged_output_is_written_unless_no_rebot() {
    let run = PabotRun::new();
    run.write("order.txt", "--suite A\n--suite B\n");
    // $0 is --outputdir, $1 is the per-unit output directory
    let script = r#"name=$(echo "$*" | sed 's/.*--suite \([A-Za-z]*\).*/\1/'); printf '<robot><suite name="%s"><test name="T"/></suite></robot>' "$name" > "$1/output.xml""#;
    let output = run_pabot(
        &run,
        script,
        &["--no-pabotlib", "--ordering", "order.txt", "tests/"],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let merged = std::fs::read_to_string(run.path().join("output.xml")).expect("merged output");
    assert!(merged.contains("<suite name=\"Pabot\">"));
    assert!(merged.contains("<suite name=\"A\">"));
    assert!(merged.contains("<suite name=\"B\">"));
}

#[test]
fn group_members_share_one_subprocess() {
    let run = PabotRun::new();
    run.write("order.txt", "{\n--suite X\n--suite Y\n}\n");
    let output = run_pabot(
        &run,
        r#"echo "$*" >> invocations.txt"#,
        &["--no-pabotlib", "--no-rebot", "--processes", "2", "--ordering", "order.txt", "tests/"],
    );

    assert_eq!(output.status.code(), Some(0));
    let invocations = std::fs::read_to_string(run.path().join("invocations.txt")).expect("log");
    let lines: Vec<&str> = invocations.lines().collect();
    assert_eq!(lines.len(), 1, "one subprocess for the whole group");
    assert!(lines[0].contains("--suite X"));
    assert!(lines[0].contains("--suite Y"));
}
