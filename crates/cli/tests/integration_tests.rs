//! Integration tests for psmctl
//!
//! Every case stays off the network: summaries read a temporary artifact tree
//! and the failing cases are rejected before any PMC is contacted.

use assert_cmd::Command;
use powershelf_test_helpers::ArtifactTree;
use predicates::prelude::*;
use serde_json::Value;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn psmctl() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("psmctl")?;
    cmd.env_remove("RUST_LOG").env_remove("PSM_FIRMWARE_ROOT");
    Ok(cmd)
}

fn tree() -> Result<ArtifactTree, Box<dyn std::error::Error>> {
    Ok(ArtifactTree::liteon(&[("1.0.0", "1.2.0"), ("1.2.0", "1.3.0")])?)
}

#[test]
fn test_help() -> TestResult {
    psmctl()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fw"));
    psmctl()?
        .args(["fw", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--action"))
        .stdout(predicate::str::contains("can_upgrade"));
    Ok(())
}

#[test]
fn test_summary_lists_artifacts() -> TestResult {
    let tree = tree()?;
    psmctl()?
        .args(["fw", "--action", "summary", "--firmware-dir"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("Firmware Manager Summary"))
        .stdout(predicate::str::contains("cm14mp1r-r1.2.0_to_r1.3.0.tar"));
    Ok(())
}

#[test]
fn test_summary_json() -> TestResult {
    let tree = tree()?;
    let output = psmctl()?
        .args(["--json", "fw", "--action", "summary", "--firmware-dir"])
        .arg(tree.root())
        .output()?;
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["success"], Value::Bool(true));
    let summary = value["summary"].as_str().ok_or("summary is not a string")?;
    assert!(summary.starts_with("Firmware Manager Summary:"));
    Ok(())
}

#[test]
fn test_summary_of_missing_directory_is_empty() -> TestResult {
    let tree = ArtifactTree::empty()?;
    psmctl()?
        .args(["fw", "--action", "summary", "--firmware-dir"])
        .arg(tree.root().join("absent"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Liteon Firmware Repo Summary"));
    Ok(())
}

#[test]
fn test_missing_ip_is_input_error() -> TestResult {
    let tree = tree()?;
    psmctl()?
        .args(["fw", "--action", "can_upgrade", "--mac", "00:11:22:33:44:55", "--version", "1.3.0"])
        .arg("--firmware-dir")
        .arg(tree.root())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("--ip is required"));
    Ok(())
}

#[test]
fn test_bad_version_is_input_error() -> TestResult {
    let tree = tree()?;
    psmctl()?
        .args([
            "fw", "--action", "can_upgrade", "--ip", "10.0.0.5", "--mac", "00:11:22:33:44:55",
            "--version", "one.three",
        ])
        .arg("--firmware-dir")
        .arg(tree.root())
        .assert()
        .code(4);
    Ok(())
}

#[test]
fn test_unsupported_vendor_json_error() -> TestResult {
    let tree = tree()?;
    let output = psmctl()?
        .args([
            "--json", "fw", "--action", "upgrade", "--vendor", "unsupported", "--ip", "10.0.0.5",
            "--mac", "00:11:22:33:44:55", "--version", "1.3.0",
        ])
        .arg("--firmware-dir")
        .arg(tree.root())
        .output()?;
    assert_eq!(output.status.code(), Some(4));

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["success"], Value::Bool(false));
    assert_eq!(value["error"]["category"], Value::from("Input"));
    Ok(())
}

#[test]
fn test_invalid_ip_rejected_by_parser() -> TestResult {
    psmctl()?
        .args(["fw", "--action", "upgrade", "--ip", "not-an-ip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
    Ok(())
}
