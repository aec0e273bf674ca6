// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_unit_output(results: &Path, queue_index: usize, suite_xml: &str) {
    let dir = results.join(queue_index.to_string());
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("output.xml"),
        format!("<?xml version=\"1.0\"?>\n<robot generator=\"robot\">\n{suite_xml}\n<statistics/>\n</robot>\n"),
    )
    .unwrap();
}

fn input(name: &str, queue_index: usize) -> MergeInput {
    MergeInput {
        name: name.to_string(),
        queue_index,
        argfile: None,
    }
}

fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("pabot_results");
    let output = dir.path().join("out");
    fs::create_dir_all(&results).unwrap();
    (dir, results, output)
}

#[test]
fn merges_unit_suites_under_one_root() {
    let (_dir, results, output) = setup();
    write_unit_output(&results, 0, "<suite name=\"A\"><test name=\"T\"/></suite>");
    write_unit_output(&results, 1, "<suite name=\"B\"><test name=\"U\"/></suite>");

    let merged = merge(
        &results,
        &output,
        &[input("A", 0), input("B", 1)],
        &ArtifactMapping::default(),
    )
    .unwrap();

    let text = fs::read_to_string(&merged).unwrap();
    assert!(text.contains("<suite name=\"Pabot\">"));
    assert!(text.contains("<suite name=\"A\">"));
    assert!(text.contains("<suite name=\"B\">"));
    // Original statistics sections are not dragged along
    assert!(!text.contains("<statistics"));
}

#[test]
fn merging_twice_is_byte_identical() {
    let (_dir, results, output) = setup();
    write_unit_output(&results, 0, "<suite name=\"A\"><test name=\"T\"/></suite>");
    write_unit_output(&results, 1, "<suite name=\"B\"><test name=\"U\"/></suite>");
    let inputs = [input("A", 0), input("B", 1)];

    let merged = merge(&results, &output, &inputs, &ArtifactMapping::default()).unwrap();
    let first = fs::read(&merged).unwrap();
    let merged = merge(&results, &output, &inputs, &ArtifactMapping::default()).unwrap();
    let second = fs::read(&merged).unwrap();
    assert_eq!(first, second);
}

#[test]
fn latest_re_execution_wins() {
    let (_dir, results, output) = setup();
    write_unit_output(&results, 0, "<suite name=\"A\"><test name=\"old\"/></suite>");
    write_unit_output(&results, 5, "<suite name=\"A\"><test name=\"new\"/></suite>");

    let merged = merge(
        &results,
        &output,
        // Deliberately out of order; queue index decides recency
        &[input("A", 5), input("A", 0)],
        &ArtifactMapping::default(),
    )
    .unwrap();

    let text = fs::read_to_string(&merged).unwrap();
    assert!(text.contains("new"));
    assert!(!text.contains("old"));
}

#[test]
fn argfile_variants_are_siblings_under_synthetic_parent() {
    let (_dir, results, output) = setup();
    write_unit_output(&results, 0, "<suite name=\"A\"><test name=\"x1\"/></suite>");
    write_unit_output(&results, 1, "<suite name=\"A\"><test name=\"x2\"/></suite>");

    let inputs = [
        MergeInput {
            name: "A".to_string(),
            queue_index: 0,
            argfile: Some(1),
        },
        MergeInput {
            name: "A".to_string(),
            queue_index: 1,
            argfile: Some(2),
        },
    ];
    let merged = merge(&results, &output, &inputs, &ArtifactMapping::default()).unwrap();

    let text = fs::read_to_string(&merged).unwrap();
    assert!(text.contains("<suite name=\"argumentfile 1\">"));
    assert!(text.contains("<suite name=\"argumentfile 2\">"));
    assert!(text.contains("x1"));
    assert!(text.contains("x2"));
}

#[test]
fn missing_unit_output_merges_the_rest_and_errors() {
    let (_dir, results, output) = setup();
    write_unit_output(&results, 0, "<suite name=\"A\"><test name=\"T\"/></suite>");

    let result = merge(
        &results,
        &output,
        &[input("A", 0), input("B", 7)],
        &ArtifactMapping::default(),
    );
    assert!(matches!(result, Err(MergeError::MissingOutputs { .. })));

    // The consolidated file still carries what merged
    let text = fs::read_to_string(output.join("output.xml")).unwrap();
    assert!(text.contains("<suite name=\"A\">"));
}

#[test]
fn corrupt_unit_output_is_reported() {
    let (_dir, results, output) = setup();
    let dir = results.join("0");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("output.xml"), "<robot>no suite here</robot>").unwrap();

    let result = merge(&results, &output, &[input("A", 0)], &ArtifactMapping::default());
    assert!(matches!(result, Err(MergeError::MissingOutputs { .. })));
}

#[test]
fn rewrites_artifact_references_in_log_and_report() {
    let (_dir, results, output) = setup();
    write_unit_output(&results, 0, "<suite name=\"A\"><test name=\"T\"/></suite>");
    fs::create_dir_all(&output).unwrap();
    fs::write(
        output.join("log.html"),
        "<img src=\"screenshot.png\"> <a href='screenshot.png'>",
    )
    .unwrap();

    let mapping = ArtifactMapping {
        entries: vec![("screenshot.png".to_string(), "0/screenshot.png".to_string())],
    };
    merge(&results, &output, &[input("A", 0)], &mapping).unwrap();

    let log = fs::read_to_string(output.join("log.html")).unwrap();
    assert_eq!(
        log,
        "<img src=\"0/screenshot.png\"> <a href='0/screenshot.png'>"
    );
}
