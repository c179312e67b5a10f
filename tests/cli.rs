use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/input/currency-flows.json")
}

#[test]
fn generates_svg_from_json_file() -> Result<(), Box<dyn std::error::Error>> {
    let fixture = fixture_path();
    assert!(fixture.exists(), "fixture flow definition should exist");

    let tmp = tempdir()?;
    let output_path = tmp.path().join("flows.svg");

    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("--input")
        .arg(&fixture)
        .arg("--output")
        .arg(&output_path)
        .arg("--output-format")
        .arg("svg");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("flows.svg"));

    let svg_contents = fs::read_to_string(&output_path)?;
    assert!(
        svg_contents.contains("<svg"),
        "output should contain an <svg> element"
    );
    assert!(
        svg_contents.contains("Clearing"),
        "node titles should make it into the svg"
    );

    Ok(())
}

#[test]
fn reads_stdin_and_writes_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let definition = fs::read_to_string(fixture_path())?;

    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("-i").arg("-").arg("-o").arg("-").write_stdin(definition);

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("<?xml"))
        .stdout(predicate::str::contains("<svg"));

    Ok(())
}

#[test]
fn quiet_flag_suppresses_progress_output() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let output_path = tmp.path().join("flows.svg");

    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("-i")
        .arg(fixture_path())
        .arg("-o")
        .arg(&output_path)
        .arg("-q");

    cmd.assert().success().stdout(predicate::str::is_empty());
    assert!(output_path.exists());

    Ok(())
}

#[test]
fn rejects_missing_input_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("--input").arg("no-such-flows.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));

    Ok(())
}

#[test]
fn rejects_cyclic_flow_definitions() -> Result<(), Box<dyn std::error::Error>> {
    let definition = r#"{
        "nodes": [{"id": "a"}, {"id": "b"}],
        "edges": [
            {"source": "a", "target": "b", "value": 1},
            {"source": "b", "target": "a", "value": 1}
        ]
    }"#;

    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("-i").arg("-").arg("-o").arg("-").write_stdin(definition);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));

    Ok(())
}

#[test]
fn rejects_malformed_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("-i").arg("-").arg("-o").arg("-").write_stdin("{not json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse flow definition"));

    Ok(())
}

#[test]
fn unknown_extension_requires_explicit_format() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let output_path = tmp.path().join("flows.dat");

    let mut cmd = Command::cargo_bin("sankey")?;
    cmd.arg("-i").arg(fixture_path()).arg("-o").arg(&output_path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("output-format"));

    Ok(())
}
