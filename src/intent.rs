//! Intent Extractor
//!
//! Rule-based reading of a question: which table it is about, which measures
//! it asks for, how to group them and over what period. Matching is plain
//! case-insensitive substring search, so precision is low; the compiler
//! decides later which parts of the intent are usable.

use crate::models::{Intent, Parameters, SchemaSnapshot};
use lazy_static::lazy_static;
use regex::Regex;

pub const METRIC_AMOUNT: &str = "amount";
pub const METRIC_ORDER_COUNT: &str = "order_count";

const BASE_CONFIDENCE: f64 = 0.3;
const TABLE_CONFIDENCE: f64 = 0.3;
const METRIC_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

/// Checked in order. The first matching term decides; if its table is not in
/// the schema the question has no table.
const TABLE_SYNONYMS: &[(&str, &str)] = &[
    ("order", "orders"),
    ("revenue", "orders"),
    ("sales", "orders"),
    ("amount", "orders"),
    ("customer", "customers"),
];

const AMOUNT_TERMS: &[&str] = &["revenue", "amount", "sales"];
const ORDER_COUNT_TERMS: &[&str] = &["orders"];

const DIMENSION_TERMS: &[(&str, &str)] = &[
    ("customer", "customer_id"),
    ("country", "country"),
    ("segment", "segment"),
];

lazy_static! {
    static ref TIMEFRAME_PATTERN: Regex =
        Regex::new(r"last (\d+)\s*(days|day|weeks|week|months|month)")
            .expect("timeframe pattern is valid");
}

/// How the table guess was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableMatch {
    Named,
    Synonym,
    Default,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, question: &str, schema: &SchemaSnapshot, filters: &Parameters) -> Intent {
        let text = question.to_lowercase();

        let table_guess = guess_table(&text, schema);
        let metrics = detect_metrics(&text);
        let dimensions = detect_dimensions(&text);
        let timeframe = extract_timeframe(&text);

        let mut confidence = BASE_CONFIDENCE;
        if matches!(table_guess, Some((_, TableMatch::Named | TableMatch::Synonym))) {
            confidence += TABLE_CONFIDENCE;
        }
        if !metrics.is_empty() {
            confidence += METRIC_CONFIDENCE;
        }

        Intent {
            table: table_guess.map(|(name, _)| name),
            metrics,
            dimensions,
            filters: filters.clone(),
            timeframe,
            confidence: confidence.min(MAX_CONFIDENCE),
        }
    }
}

fn guess_table(text: &str, schema: &SchemaSnapshot) -> Option<(String, TableMatch)> {
    if let Some(table) = schema
        .tables()
        .iter()
        .find(|t| text.contains(&t.name.to_lowercase()))
    {
        return Some((table.name.clone(), TableMatch::Named));
    }

    if let Some((_, table)) = TABLE_SYNONYMS.iter().find(|(term, _)| text.contains(term)) {
        return schema
            .contains_table(table)
            .then(|| (table.to_string(), TableMatch::Synonym));
    }

    schema
        .first_table()
        .map(|t| (t.name.clone(), TableMatch::Default))
}

fn detect_metrics(text: &str) -> Vec<String> {
    let mut metrics = Vec::new();
    if AMOUNT_TERMS.iter().any(|term| text.contains(term)) {
        metrics.push(METRIC_AMOUNT.to_string());
    }
    if ORDER_COUNT_TERMS.iter().any(|term| text.contains(term)) {
        metrics.push(METRIC_ORDER_COUNT.to_string());
    }
    metrics
}

fn detect_dimensions(text: &str) -> Vec<String> {
    DIMENSION_TERMS
        .iter()
        .filter(|(term, _)| text.contains(term))
        .map(|(_, column)| column.to_string())
        .collect()
}

fn extract_timeframe(text: &str) -> Option<String> {
    if let Some(caps) = TIMEFRAME_PATTERN.captures(text) {
        return Some(format!("last_{}_{}", &caps[1], &caps[2]));
    }
    if text.contains("today") {
        return Some("today".to_string());
    }
    if text.contains("yesterday") {
        return Some("yesterday".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sample_schema;
    use crate::models::{SchemaSource, TableSchema};
    use chrono::Utc;
    use serde_json::json;

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(sample_schema(), Utc::now(), SchemaSource::Fallback).unwrap()
    }

    fn parse(question: &str) -> Intent {
        IntentExtractor::new().parse(question, &snapshot(), &Parameters::new())
    }

    #[test]
    fn test_revenue_by_customer() {
        let intent = parse("Show revenue by customer");
        assert_eq!(intent.table.as_deref(), Some("orders"));
        assert_eq!(intent.metrics, vec!["amount"]);
        assert_eq!(intent.dimensions, vec!["customer_id"]);
        assert_eq!(intent.timeframe, None);
        assert!((intent.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_exact_table_name_wins_over_synonyms() {
        let intent = parse("How many customers per segment");
        assert_eq!(intent.table.as_deref(), Some("customers"));
        assert!(intent.metrics.is_empty());
        assert_eq!(intent.dimensions, vec!["customer_id", "segment"]);
        assert!((intent.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_metrics_are_kept() {
        let intent = parse("sales and orders by country");
        assert_eq!(intent.table.as_deref(), Some("orders"));
        assert_eq!(intent.metrics, vec!["amount", "order_count"]);
        assert_eq!(intent.dimensions, vec!["country"]);
    }

    #[test]
    fn test_unrecognized_question_defaults_to_first_table() {
        let intent = parse("what is going on");
        assert_eq!(intent.table.as_deref(), Some("orders"));
        assert!(intent.metrics.is_empty());
        assert!(intent.dimensions.is_empty());
        assert!(intent.confidence <= 0.3);
    }

    #[test]
    fn test_empty_question() {
        let intent = parse("");
        assert_eq!(intent.table.as_deref(), Some("orders"));
        assert!((intent.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_empty_schema_yields_no_table() {
        let empty = SchemaSnapshot::new(vec![], Utc::now(), SchemaSource::Live).unwrap();
        let intent = IntentExtractor::new().parse("revenue", &empty, &Parameters::new());
        assert_eq!(intent.table, None);
        assert!((intent.confidence - 0.4).abs() < 1e-9);
    }

    fn invoices_only() -> SchemaSnapshot {
        SchemaSnapshot::new(
            vec![TableSchema::new("invoices", vec![])],
            Utc::now(),
            SchemaSource::Live,
        )
        .unwrap()
    }

    #[test]
    fn test_synonym_with_missing_table_leaves_table_unset() {
        let extractor = IntentExtractor::new();
        let intent = extractor.parse("order totals", &invoices_only(), &Parameters::new());
        assert_eq!(intent.table, None);
        assert!((intent.confidence - 0.3).abs() < 1e-9);

        // No fall-through to a later synonym or to the default table
        let intent = extractor.parse("customer orders", &invoices_only(), &Parameters::new());
        assert_eq!(intent.table, None);
    }

    #[test]
    fn test_no_synonym_match_still_defaults() {
        let intent = IntentExtractor::new().parse("show totals", &invoices_only(), &Parameters::new());
        assert_eq!(intent.table.as_deref(), Some("invoices"));
    }

    #[test]
    fn test_timeframe_extraction() {
        assert_eq!(parse("revenue for the last 7 days").timeframe.as_deref(), Some("last_7_days"));
        assert_eq!(parse("Orders LAST 2 Weeks").timeframe.as_deref(), Some("last_2_weeks"));
        assert_eq!(parse("sales last 3months").timeframe.as_deref(), Some("last_3_months"));
        assert_eq!(parse("sales last 1 month").timeframe.as_deref(), Some("last_1_month"));
        assert_eq!(parse("orders today").timeframe.as_deref(), Some("today"));
        assert_eq!(parse("orders yesterday").timeframe.as_deref(), Some("yesterday"));
        assert_eq!(parse("orders last year").timeframe, None);
    }

    #[test]
    fn test_filters_pass_through() {
        let mut filters = Parameters::new();
        filters.insert("status".to_string(), json!("shipped"));
        let intent = IntentExtractor::new().parse("orders", &snapshot(), &filters);
        assert_eq!(intent.filters, filters);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse("revenue by segment last 30 days");
        let b = parse("revenue by segment last 30 days");
        assert_eq!(a, b);
    }
}
