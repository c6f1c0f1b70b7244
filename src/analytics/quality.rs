//! Lightweight data-quality checks on query output

use crate::models::{DataQualityFinding, FindingKind, QueryTable, Severity};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use serde_json::Value;

const MAX_NULL_SHARE: f64 = 0.3;
const MAX_DUPLICATE_RATIO: f64 = 0.1;
const STALE_AFTER_DAYS: i64 = 60;
const FRESHNESS_COLUMN: &str = "order_date";

#[derive(Debug, Default, Clone, Copy)]
pub struct DataQualityEngine;

impl DataQualityEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, table: &QueryTable) -> Vec<DataQualityFinding> {
        self.evaluate_at(table, Utc::now())
    }

    /// Same as [`evaluate`](Self::evaluate) with an explicit "now" for the
    /// freshness check.
    pub fn evaluate_at(&self, table: &QueryTable, now: DateTime<Utc>) -> Vec<DataQualityFinding> {
        let mut findings = Vec::new();
        if table.is_empty() {
            findings.push(warning(FindingKind::Emptiness, "Query returned no rows.".to_string()));
            return findings;
        }

        let null_share = max_null_share(table);
        if null_share > MAX_NULL_SHARE {
            findings.push(warning(
                FindingKind::Nulls,
                format!(
                    "High null rate detected (max column null share {:.0}%).",
                    null_share * 100.0
                ),
            ));
        }

        if duplicate_ratio(table) > MAX_DUPLICATE_RATIO {
            findings.push(warning(
                FindingKind::Duplicates,
                "Potential duplicate rows detected.".to_string(),
            ));
        }

        if let Some(latest) = latest_timestamp(table, FRESHNESS_COLUMN) {
            if now - latest > Duration::days(STALE_AFTER_DAYS) {
                findings.push(warning(
                    FindingKind::Freshness,
                    format!("Data may be stale (older than {} days).", STALE_AFTER_DAYS),
                ));
            }
        }

        findings
    }
}

fn warning(kind: FindingKind, message: String) -> DataQualityFinding {
    DataQualityFinding {
        kind,
        message,
        severity: Severity::Warning,
    }
}

fn max_null_share(table: &QueryTable) -> f64 {
    let rows = table.row_count() as f64;
    table
        .columns
        .iter()
        .filter_map(|name| table.column_values(name))
        .map(|values| values.filter(|v| v.is_null()).count() as f64 / rows)
        .fold(0.0, f64::max)
}

fn duplicate_ratio(table: &QueryTable) -> f64 {
    let total = table.row_count();
    let distinct = table
        .rows
        .iter()
        .map(|row| Value::Array(row.clone()).to_string())
        .unique()
        .count();
    (total - distinct) as f64 / total.max(1) as f64
}

/// Latest parseable timestamp in `column`; unparseable values are skipped.
fn latest_timestamp(table: &QueryTable, column: &str) -> Option<DateTime<Utc>> {
    table
        .column_values(column)?
        .filter_map(|v| v.as_str().and_then(parse_timestamp))
        .max()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryTable {
        QueryTable::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn kinds(findings: &[DataQualityFinding]) -> Vec<FindingKind> {
        findings.iter().map(|f| f.kind).collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_result_only_reports_emptiness() {
        let findings = DataQualityEngine::new().evaluate_at(&table(&["a"], vec![]), now());
        assert_eq!(kinds(&findings), vec![FindingKind::Emptiness]);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_clean_result_has_no_findings() {
        let t = table(
            &["total_amount", "customer_id"],
            vec![vec![json!(420.5), json!(101)], vec![json!(90.2), json!(102)]],
        );
        assert!(DataQualityEngine::new().evaluate_at(&t, now()).is_empty());
    }

    #[test]
    fn test_high_null_share() {
        let t = table(
            &["customer_id", "segment"],
            vec![
                vec![json!(1), Value::Null],
                vec![json!(2), Value::Null],
                vec![json!(3), json!("SMB")],
            ],
        );
        let findings = DataQualityEngine::new().evaluate_at(&t, now());
        assert_eq!(kinds(&findings), vec![FindingKind::Nulls]);
        assert!(findings[0].message.contains("67%"));
    }

    #[test]
    fn test_duplicate_rows() {
        let row = vec![json!(101), json!("web")];
        let t = table(&["customer_id", "channel"], vec![row.clone(), row, vec![json!(102), json!("store")]]);
        let findings = DataQualityEngine::new().evaluate_at(&t, now());
        assert_eq!(kinds(&findings), vec![FindingKind::Duplicates]);
    }

    #[test]
    fn test_stale_order_dates() {
        let t = table(
            &["order_id", "order_date"],
            vec![vec![json!(1), json!("2024-11-01")], vec![json!(2), json!("2024-11-10")]],
        );
        let findings = DataQualityEngine::new().evaluate_at(&t, now());
        assert_eq!(kinds(&findings), vec![FindingKind::Freshness]);

        let recent = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert!(DataQualityEngine::new().evaluate_at(&t, recent).is_empty());
    }

    #[test]
    fn test_unparseable_dates_are_ignored() {
        let t = table(&["order_date"], vec![vec![json!("soon")], vec![json!(20240101)]]);
        assert!(DataQualityEngine::new().evaluate_at(&t, now()).is_empty());
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-11-01T10:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-11-01 10:00:00").is_some());
        assert!(parse_timestamp("2024-11-01 10:00:00.123").is_some());
        assert!(parse_timestamp("2024-11-01").is_some());
        assert!(parse_timestamp("11/01/2024").is_none());
    }
}
