//! Command line smoke tests against a synthetic raw file
mod common;

use assert_cmd::Command;
use common::{con0, echo_column, frame, gga, raw0, ticks};
use predicates::prelude::*;

const CH1: &str = "GPT 38 kHz 009072033fa5 1-1 ES38B";
const CH2: &str = "GPT 120 kHz Transducer 009072034295 4-1 ES120-7";
const BASE: u64 = 1_600_000_000;

fn write_transect(dir: &std::path::Path) -> std::path::PathBuf {
    let low = echo_column(800, 500);
    let high = echo_column(800, 505);
    let mut bytes = frame(
        b"CON0",
        ticks(BASE),
        &con0("cli-survey", &[(CH1, 38_000.0), (CH2, 120_000.0)]),
    );
    for p in 0..10u64 {
        let t = ticks(BASE + 1 + p);
        bytes.extend(frame(b"NME0", t, &gga()));
        bytes.extend(frame(b"RAW0", t, &raw0(1, 38_000.0, 1.024e-3, 6.4e-5, &low)));
        bytes.extend(frame(b"RAW0", t, &raw0(2, 120_000.0, 1.024e-3, 6.4e-5, &high)));
    }
    let path = dir.join("transect.raw");
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn count_prints_per_tag_totals() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_transect(dir.path());

    Command::cargo_bin("ekraw")
        .unwrap()
        .arg("count")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("20\tRAW0"))
        .stdout(predicate::str::contains("10\tNME0"))
        .stdout(predicate::str::contains("1\tCON0"));
}

#[test]
fn info_summarizes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_transect(dir.path());

    Command::cargo_bin("ekraw")
        .unwrap()
        .arg("info")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Model: EK60"))
        .stdout(predicate::str::contains("Survey: cli-survey"))
        .stdout(predicate::str::contains(CH1));
}

#[test]
fn map_writes_the_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_transect(dir.path());

    Command::cargo_bin("ekraw")
        .unwrap()
        .arg("map")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("RAW0"));

    let sidecar = dir.path().join("transect.nav");
    let text = std::fs::read_to_string(sidecar).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["finalized"], serde_json::Value::Bool(true));
}

#[test]
fn detect_emits_survey_records_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_transect(dir.path());
    let out = dir.path().join("survey.json");

    Command::cargo_bin("ekraw")
        .unwrap()
        .arg("detect")
        .arg(&path)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let text = std::fs::read_to_string(out).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["pings"].as_array().unwrap().len(), 10);
    assert_eq!(json["navigation"].as_array().unwrap().len(), 10);
    assert!(json["pings"][0]["travel_time"].as_f64().is_some());
}
