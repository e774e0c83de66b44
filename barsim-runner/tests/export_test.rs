//! Integration tests for artifact export: a real run written to a temp dir
//! and read back.

use barsim_core::audit::AuditEvent;
use barsim_core::domain::{Bar, Signal};
use barsim_core::strategy::{ScriptedStrategy, Strategy};
use barsim_runner::config::RunConfig;
use barsim_runner::export::{
    export_report_json, import_audit_jsonl, import_report_json, load_report, save_artifacts,
};
use barsim_runner::runner::{run_config, BacktestRun};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn sample_run(name: &str) -> BacktestRun {
    let start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
    let bars: Vec<Bar> = (0..4)
        .map(|i| {
            Bar::new(
                "SPY",
                start + Duration::days(i),
                dec!(500),
                dec!(505),
                dec!(495),
                dec!(500),
                dec!(10000),
            )
        })
        .collect();
    let strategy: Box<dyn Strategy> = Box::new(
        ScriptedStrategy::new("exporter")
            .at(start, Signal::open_long("SPY", dec!(2)))
            // No short open, so risk rejects this one.
            .at(start + Duration::days(1), Signal::close_short("SPY", dec!(1)))
            .at(start + Duration::days(3), Signal::close_long("SPY", dec!(2))),
    );
    let config = RunConfig {
        name: name.to_string(),
        ..RunConfig::default()
    };
    run_config(&config, vec![strategy], &bars).unwrap()
}

#[test]
fn artifacts_round_trip_through_disk() {
    let run = sample_run("spy/export");
    let tmp = TempDir::new().unwrap();
    let dir = save_artifacts(&run, tmp.path()).unwrap();

    assert!(dir.starts_with(tmp.path()));
    let dir_name = dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(dir_name.starts_with("spy_export_"), "{dir_name}");
    for file in ["report.json", "snapshots.csv", "audit.jsonl"] {
        assert!(dir.join(file).exists(), "missing {file}");
    }

    let report = load_report(&dir).unwrap();
    assert_eq!(report, run.report);

    let csv = std::fs::read_to_string(dir.join("snapshots.csv")).unwrap();
    // Header plus one row per bar.
    assert_eq!(csv.lines().count(), 1 + run.result.snapshots.len());

    let jsonl = std::fs::read_to_string(dir.join("audit.jsonl")).unwrap();
    let records = import_audit_jsonl(&jsonl).unwrap();
    assert_eq!(records.as_slice(), run.result.audit.records());
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| matches!(r.event, AuditEvent::Signal { .. })));
}

#[test]
fn saving_twice_overwrites_same_directory() {
    let run = sample_run("repeat");
    let tmp = TempDir::new().unwrap();
    let first = save_artifacts(&run, tmp.path()).unwrap();
    let second = save_artifacts(&run, tmp.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn newer_schema_is_rejected() {
    let mut report = sample_run("schema").report;
    report.schema_version = 99;
    let json = export_report_json(&report).unwrap();
    let err = import_report_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version 99"));
}

#[test]
fn missing_report_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(load_report(tmp.path()).is_err());
}
