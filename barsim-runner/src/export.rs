//! Artifact export: snapshots as CSV, the audit stream as JSONL, the report
//! as JSON.
//!
//! Decimal values are written with their full precision so exported files can
//! be reconciled against the ledger exactly.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use barsim_core::audit::{AuditRecord, AuditTrail};
use barsim_core::engine::LedgerSnapshot;

use crate::runner::{BacktestReport, BacktestRun, SCHEMA_VERSION};

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: bar_index, timestamp, cash, position_value, equity, drawdown,
/// open_positions
pub fn export_snapshots_csv(snapshots: &[LedgerSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bar_index",
        "timestamp",
        "cash",
        "position_value",
        "equity",
        "drawdown",
        "open_positions",
    ])?;
    for s in snapshots {
        wtr.write_record([
            s.bar_index.to_string(),
            s.timestamp.to_rfc3339(),
            s.cash.to_string(),
            s.position_value.to_string(),
            s.equity.to_string(),
            s.drawdown.to_string(),
            s.open_positions.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSONL export ───────────────────────────────────────────────────

/// One audit record per line, in sequence order.
pub fn export_audit_jsonl(audit: &AuditTrail) -> Result<String> {
    let mut out = String::new();
    for record in audit.records() {
        let line = serde_json::to_string(record)
            .with_context(|| format!("failed to serialize audit record {}", record.seq))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

pub fn import_audit_jsonl(content: &str) -> Result<Vec<AuditRecord>> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("bad audit record on line {}", i + 1))
        })
        .collect()
}

// ─── Report JSON ────────────────────────────────────────────────────

pub fn export_report_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

/// Parse a report, rejecting schema versions newer than this build.
pub fn import_report_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport = serde_json::from_str(json).context("failed to deserialize report")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Directory-safe form of a run name; sweep names contain `/` and `=`.
fn dir_name(run: &BacktestRun) -> String {
    let name: String = run
        .report
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    let id: String = run.report.run_id.0.chars().take(12).collect();
    format!("{name}_{id}")
}

/// Write `report.json`, `snapshots.csv` and `audit.jsonl` under
/// `output_dir/<name>_<run id prefix>/`. Returns the run directory.
pub fn save_artifacts(run: &BacktestRun, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(dir_name(run));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_report_json(&run.report)?)
        .context("failed to write report.json")?;
    std::fs::write(
        run_dir.join("snapshots.csv"),
        export_snapshots_csv(&run.result.snapshots)?,
    )
    .context("failed to write snapshots.csv")?;
    std::fs::write(run_dir.join("audit.jsonl"), export_audit_jsonl(&run.result.audit)?)
        .context("failed to write audit.jsonl")?;

    Ok(run_dir)
}

pub fn load_report(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_report_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn snapshot_csv_has_header_and_rows() {
        let snaps = vec![LedgerSnapshot {
            bar_index: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            cash: dec!(9899.9),
            position_value: dec!(100),
            equity: dec!(9999.9),
            drawdown: dec!(0.00001),
            open_positions: 1,
        }];
        let csv = export_snapshots_csv(&snaps).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("bar_index,timestamp,cash,position_value,equity,drawdown,open_positions")
        );
        assert_eq!(
            lines.next(),
            Some("0,2024-01-02T00:00:00+00:00,9899.9,100,9999.9,0.00001,1")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_audit_exports_nothing() {
        assert_eq!(export_audit_jsonl(&AuditTrail::new()).unwrap(), "");
        assert!(import_audit_jsonl("").unwrap().is_empty());
    }

    #[test]
    fn rejects_future_schema() {
        let json = r#"{"schema_version": 99}"#;
        assert!(import_report_json(json).is_err());
    }
}
