//! Insight derivation from aggregated results

use crate::models::{Impact, Insight, QueryTable};
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct InsightEngine;

impl InsightEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn derive(&self, table: &QueryTable) -> Vec<Insight> {
        let mut insights = Vec::new();
        if table.is_empty() {
            return insights;
        }

        if let Some(insight) = top_customer(table) {
            insights.push(insight);
        }
        if let Some(insight) = average_order_volume(table) {
            insights.push(insight);
        }

        insights
    }
}

fn top_customer(table: &QueryTable) -> Option<Insight> {
    let amount_idx = table.column_index("total_amount")?;
    let customer_idx = table.column_index("customer_id")?;

    // First row wins on ties.
    let (amount, row) = table
        .rows
        .iter()
        .filter_map(|row| row.get(amount_idx).and_then(Value::as_f64).map(|a| (a, row)))
        .fold(None, |best: Option<(f64, &Vec<Value>)>, (a, row)| match best {
            Some((b, _)) if b >= a => best,
            _ => Some((a, row)),
        })?;

    let customer = match row.get(customer_idx) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    };

    Some(Insight {
        title: "Top customer by revenue".to_string(),
        detail: format!("Customer {} leads with ${:.2} in sales.", customer, amount),
        impact: Impact::Positive,
    })
}

fn average_order_volume(table: &QueryTable) -> Option<Insight> {
    let counts: Vec<f64> = table
        .column_values("order_count")?
        .filter_map(Value::as_f64)
        .collect();
    if counts.is_empty() {
        return None;
    }
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;

    Some(Insight {
        title: "Average order volume".to_string(),
        detail: format!("Average order count across groups: {:.1}", mean),
        impact: Impact::Neutral,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryTable {
        QueryTable::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_top_customer_by_revenue() {
        let t = table(
            &["total_amount", "customer_id"],
            vec![vec![json!(90.2), json!(102)], vec![json!(420.5), json!(101)]],
        );
        let insights = InsightEngine::new().derive(&t);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "Top customer by revenue");
        assert_eq!(insights[0].detail, "Customer 101 leads with $420.50 in sales.");
        assert_eq!(insights[0].impact, Impact::Positive);
    }

    #[test]
    fn test_string_customer_ids_are_unquoted() {
        let t = table(
            &["customer_id", "total_amount"],
            vec![vec![json!("C-7"), json!(12)]],
        );
        let insights = InsightEngine::new().derive(&t);
        assert_eq!(insights[0].detail, "Customer C-7 leads with $12.00 in sales.");
    }

    #[test]
    fn test_average_order_volume() {
        let t = table(
            &["order_count", "customer_id"],
            vec![vec![json!(2), json!(101)], vec![json!(1), json!(102)]],
        );
        let insights = InsightEngine::new().derive(&t);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "Average order volume");
        assert_eq!(insights[0].detail, "Average order count across groups: 1.5");
        assert_eq!(insights[0].impact, Impact::Neutral);
    }

    #[test]
    fn test_both_insights_in_order() {
        let t = table(
            &["total_amount", "order_count", "customer_id"],
            vec![vec![json!(420.5), json!(2), json!(101)]],
        );
        let titles: Vec<String> = InsightEngine::new()
            .derive(&t)
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["Top customer by revenue", "Average order volume"]);
    }

    #[test]
    fn test_no_insights_for_empty_or_plain_rows() {
        let engine = InsightEngine::new();
        assert!(engine.derive(&table(&["total_amount", "customer_id"], vec![])).is_empty());

        let plain = table(&["order_id", "status"], vec![vec![json!(1), json!("shipped")]]);
        assert!(engine.derive(&plain).is_empty());
    }
}
