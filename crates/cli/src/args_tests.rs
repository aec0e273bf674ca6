// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn defaults_without_flags() {
    let parsed = parse(args(&["tests/"])).unwrap();
    assert_eq!(parsed.config.command, vec!["robot"]);
    assert_eq!(parsed.config.runner_args, vec!["tests/"]);
    assert!(parsed.pabotlib);
    assert_eq!(parsed.pabotlibhost, "127.0.0.1");
    assert_eq!(parsed.pabotlibport, 8270);
    assert_eq!(parsed.config.artifacts, vec!["png"]);
    assert!(parsed.config.process_timeout.is_none());
    assert!(matches!(parsed.processes, ProcessCount::Fixed(n) if n >= 1));
}

#[test]
fn runner_args_start_at_first_unknown_token() {
    let parsed = parse(args(&[
        "--verbose",
        "--processes",
        "4",
        "--include",
        "smoke",
        "tests/",
    ]))
    .unwrap();
    assert!(parsed.config.verbose);
    assert_eq!(parsed.processes, ProcessCount::Fixed(4));
    assert_eq!(parsed.config.runner_args, vec!["--include", "smoke", "tests/"]);
}

#[test]
fn processes_all_resolves_to_unit_count() {
    let parsed = parse(args(&["--processes", "all", "tests/"])).unwrap();
    assert_eq!(parsed.processes, ProcessCount::All);
    assert_eq!(parsed.processes.resolve(17), 17);
    assert_eq!(ProcessCount::Fixed(4).resolve(17), 4);
    assert_eq!(ProcessCount::All.resolve(0), 1);
}

#[test]
fn command_capture_replaces_the_runner_invocation() {
    let parsed = parse(args(&[
        "--command",
        "python",
        "-m",
        "robot",
        "--end-command",
        "--processes",
        "2",
        "tests/",
    ]))
    .unwrap();
    assert_eq!(parsed.config.command, vec!["python", "-m", "robot"]);
    assert_eq!(parsed.processes, ProcessCount::Fixed(2));
    assert_eq!(parsed.config.runner_args, vec!["tests/"]);
}

#[test]
fn unterminated_command_is_an_error() {
    let err = parse(args(&["--command", "python", "tests/"])).unwrap_err();
    assert!(matches!(err, ArgsError::UnterminatedCommand));
}

#[test]
fn empty_command_is_an_error() {
    let err = parse(args(&["--command", "--end-command", "tests/"])).unwrap_err();
    assert!(matches!(err, ArgsError::EmptyCommand));
}

#[test]
fn numbered_argument_files_are_collected_in_index_order() {
    let parsed = parse(args(&[
        "--argumentfile2",
        "b.args",
        "--argumentfile1",
        "a.args",
        "tests/",
    ]))
    .unwrap();
    assert_eq!(
        parsed.config.argument_files,
        vec![PathBuf::from("a.args"), PathBuf::from("b.args")]
    );
}

#[test]
fn plain_argumentfile_flag_passes_through_to_the_runner() {
    let parsed = parse(args(&["--argumentfile", "all.args", "tests/"])).unwrap();
    assert!(parsed.config.argument_files.is_empty());
    assert_eq!(parsed.config.runner_args, vec!["--argumentfile", "all.args", "tests/"]);
}

#[test]
fn no_pabotlib_disables_the_server() {
    let parsed = parse(args(&["--no-pabotlib", "tests/"])).unwrap();
    assert!(!parsed.pabotlib);
}

#[test]
fn pabotlib_host_and_port_override_defaults() {
    let parsed = parse(args(&[
        "--pabotlibhost",
        "10.0.0.5",
        "--pabotlibport",
        "9999",
        "tests/",
    ]))
    .unwrap();
    assert_eq!(parsed.pabotlibhost, "10.0.0.5");
    assert_eq!(parsed.pabotlibport, 9999);
}

#[test]
fn artifacts_list_is_comma_split() {
    let parsed = parse(args(&["--artifacts", "png, log ,txt", "tests/"])).unwrap();
    assert_eq!(parsed.config.artifacts, vec!["png", "log", "txt"]);
}

#[test]
fn timeout_shard_and_discovery_flags_land_in_options() {
    let parsed = parse(args(&[
        "--processtimeout",
        "30",
        "--shard",
        "2/5",
        "--testlevelsplit",
        "--chunk",
        "--suitesfrom",
        "old.xml",
        "--ordering",
        "order.txt",
        "--pabotprerunmodifier",
        "mod.Mod",
        "tests/",
    ]))
    .unwrap();
    assert_eq!(
        parsed.config.process_timeout,
        Some(std::time::Duration::from_secs(30))
    );
    assert_eq!(parsed.discovery.shard, Some((2, 5)));
    assert!(parsed.discovery.test_level_split);
    assert!(parsed.discovery.chunk);
    assert_eq!(parsed.discovery.suites_from, Some(PathBuf::from("old.xml")));
    assert_eq!(parsed.discovery.ordering_file, Some(PathBuf::from("order.txt")));
    assert_eq!(
        parsed.discovery.prerun_modifier.as_deref(),
        Some("mod.Mod")
    );
}

#[yare::parameterized(
    not_a_number = { "abc" },
    zero_index   = { "0/3" },
    zero_total   = { "1/0" },
    reversed     = { "5/3" },
    missing_sep  = { "13" },
)]
fn invalid_shard_values_error(value: &str) {
    let err = parse(args(&["--shard", value, "tests/"])).unwrap_err();
    assert!(matches!(err, ArgsError::InvalidShard(_)));
}

#[test]
fn invalid_processes_value_errors() {
    let err = parse(args(&["--processes", "many", "tests/"])).unwrap_err();
    assert!(matches!(err, ArgsError::InvalidProcesses(_)));
}
