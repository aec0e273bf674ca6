//! Fatal plan errors exit 251 before any worker spawns.

use crate::prelude::*;
use assert_cmd::prelude::*;

fn run_with_ordering(ordering: &str) -> (PabotRun, std::process::Output) {
    let run = PabotRun::new();
    run.write("order.txt", ordering);
    let mut cmd = run.pabot();
    cmd.args(PabotRun::fake_runner_args("touch ran.marker; exit 0"))
        .args(["--no-pabotlib", "--ordering", "order.txt", "tests/"]);
    let output = cmd.output().expect("pabot runs");
    (run, output)
}

#[test]
fn dependency_cycle_is_fatal() {
    let (run, output) = run_with_ordering("--test A #DEPENDS B\n--test B #DEPENDS A\n");
    assert_eq!(output.status.code(), Some(251));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cycle"), "stderr: {stderr}");
    // No worker ever started
    assert!(!run.path().join("ran.marker").exists());
}

#[test]
fn unresolved_dependency_is_fatal() {
    let (run, output) = run_with_ordering("--test A #DEPENDS Nowhere\n");
    assert_eq!(output.status.code(), Some(251));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Nowhere"), "stderr: {stderr}");
    assert!(!run.path().join("ran.marker").exists());
}

#[test]
fn malformed_sleep_is_fatal() {
    let (_run, output) = run_with_ordering("#SLEEP 9999\n--suite A\n");
    assert_eq!(output.status.code(), Some(251));
}

#[test]
fn invalid_shard_is_fatal() {
    let run = PabotRun::new();
    let mut cmd = run.pabot();
    cmd.args(["--shard", "4/2", "tests/"]);
    cmd.assert().code(251);
}
