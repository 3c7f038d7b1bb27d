#![forbid(unsafe_code)]
use assert_cmd::Command;
use chrono::NaiveDate;
use predicates::prelude::*;
use roulement::{NurseRoster, RecordingPolicy, RosterConfig, Rules, ShiftSpec, SlotUse};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn weekly_config(nurses: u32) -> RosterConfig {
    RosterConfig {
        start_date: NaiveDate::from_ymd_opt(2021, 6, 7).unwrap(),
        num_weeks: 1,
        horizon_days: None,
        nurses: NurseRoster::Count { count: nurses },
        shifts: vec![
            ShiftSpec::new("Day", "day", SlotUse::Required, SlotUse::Unavailable),
            ShiftSpec::new("Sun 1", "sunday", SlotUse::Unavailable, SlotUse::Required),
            ShiftSpec::new("Sun 2", "sunday", SlotUse::Unavailable, SlotUse::Required),
        ],
        restricted: None,
        rules: Rules::default(),
        recording: RecordingPolicy::default(),
        solution_limit: 1,
        artifact_prefix: "Solution".into(),
    }
}

fn cli() -> Command {
    Command::cargo_bin("roulement-cli").unwrap()
}

fn write_config(dir: &Path, config: &RosterConfig) -> String {
    let path = dir.join("roster.json");
    config.save(&path).unwrap();
    path.display().to_string()
}

#[test]
fn init_writes_preset() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("dialysis.json");
    cli()
        .args(["init", "--preset", "dialysis", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("preset dialysis written"));

    let config = RosterConfig::load(&out).unwrap();
    assert_eq!(config.num_weeks, 16);
    assert!(config.rules.balance_categories);
}

#[test]
fn compile_prints_summary() {
    cli()
        .args(["compile", "--preset", "single-week"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total [1, 2]"))
        .stdout(predicate::str::contains("C1 coverage: 28"))
        .stdout(predicate::str::contains("C9 sunday-spacing omitted"))
        .stdout(predicate::str::contains("C11 saturday-spacing omitted"));
}

#[test]
fn solve_then_check() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &weekly_config(6));
    let out_dir = dir.path().join("out");

    cli()
        .args(["solve", "--config", config.as_str(), "--limit", "3", "--record", "0,2", "--out-dir"])
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("solutions: 3"))
        .stdout(predicate::str::contains("recorded: 2"));

    let first = out_dir.join("Solution_0.csv");
    assert!(first.exists());
    assert!(out_dir.join("Solution_2.csv").exists());
    assert!(!out_dir.join("Solution_1.csv").exists());

    cli()
        .args(["check", "--config", config.as_str(), "--csv"])
        .arg(&first)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: no violations"));
}

#[test]
fn check_flags_violations_with_code_2() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &weekly_config(6));
    let csv = dir.path().join("broken.csv");
    fs::write(&csv, "Date,Day,Sun 1,Sun 2\n07/06/2021,OP1,,\n08/06/2021,OP1,,\n").unwrap();
    let report = dir.path().join("violations.csv");

    cli()
        .args(["check", "--config", config.as_str(), "--csv"])
        .arg(&csv)
        .arg("--report")
        .arg(&report)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("violation(s)"));

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.starts_with("family,detail"));
    assert!(written.contains("C8"));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &weekly_config(6));
    let out_dir = dir.path().join("out");
    cli()
        .args(["solve", "--config", config.as_str(), "--dry-run", "--out-dir"])
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("recorded: 1"));
    assert!(!out_dir.exists());
}

#[test]
fn evening_rota_first_roster_under_default_limits() {
    cli()
        .args(["solve", "--preset", "evening-rota", "--mode", "first", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("solutions: 1"))
        .stdout(predicate::str::contains("recorded: 1"));
}

#[test]
fn infeasible_run_exits_with_code_2() {
    let dir = tempdir().unwrap();
    let config = RosterConfig {
        shifts: vec![ShiftSpec::new(
            "Day",
            "day",
            SlotUse::Required,
            SlotUse::Required,
        )],
        ..weekly_config(2)
    };
    let config = write_config(dir.path(), &config);
    cli()
        .args(["solve", "--config", config.as_str(), "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("spacing clauses"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn missing_source_is_an_error() {
    cli()
        .arg("compile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config or --preset"));
}
