//! Simulated execution against built-in sample data
//!
//! Understands exactly the statements the compiler produces: one table,
//! optional `SUM(amount)` / `COUNT(*)` aggregates grouped by the listed
//! columns, and a LIMIT. Predicates are not applied; results are marked
//! simulated so callers can tell.

use super::result::{dataframe_to_table, frame_error};
use super::{Execution, QueryRunner};
use crate::error::Result;
use crate::models::QueryTable;
use crate::safety::ValidatedQuery;
use async_trait::async_trait;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

/// Grouping column used when aggregates come without a GROUP BY list that
/// names a sample column.
const DEFAULT_GROUP_KEY: &str = "customer_id";

lazy_static! {
    static ref FROM_TABLE: Regex =
        Regex::new(r"\bfrom\s+([a-z_][a-z0-9_]*)").expect("from pattern is valid");
    static ref GROUP_BY: Regex =
        Regex::new(r"\bgroup by\s+([a-z0-9_,\s]+?)\s*(?:limit\b|;|$)").expect("group by pattern is valid");
    static ref LIMIT: Regex = Regex::new(r"\blimit\s+(\d+)").expect("limit pattern is valid");
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedRunner;

impl SimulatedRunner {
    pub fn new() -> Self {
        Self
    }

    fn simulate(&self, sql: &str) -> Result<QueryTable> {
        let lowered = sql.to_lowercase();
        let table = FROM_TABLE.captures(&lowered).map(|c| c[1].to_string());

        let frame = match table.as_deref() {
            Some("orders") => aggregate_orders(sample_orders()?, &lowered)?,
            Some("customers") => sample_customers()?,
            _ => return Ok(QueryTable::default()),
        };

        let frame = match LIMIT.captures(&lowered).and_then(|c| c[1].parse::<usize>().ok()) {
            Some(limit) => frame.head(Some(limit)),
            None => frame,
        };

        dataframe_to_table(&frame)
    }
}

#[async_trait]
impl QueryRunner for SimulatedRunner {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn execute(&self, query: &ValidatedQuery) -> Result<Execution> {
        let table = self.simulate(query.sql())?;
        debug!(rows = table.row_count(), "Simulated execution finished");
        Ok(Execution {
            table,
            simulated: true,
        })
    }
}

fn aggregate_orders(orders: DataFrame, lowered_sql: &str) -> Result<DataFrame> {
    let mut aggregates = Vec::new();
    let mut output = Vec::new();
    if lowered_sql.contains("sum(amount)") {
        aggregates.push(col("amount").sum().alias("total_amount"));
        output.push(col("total_amount"));
    }
    if lowered_sql.contains("count(*)") {
        aggregates.push(col("order_id").count().alias("order_count"));
        output.push(col("order_count"));
    }
    if aggregates.is_empty() {
        return Ok(orders);
    }

    let available: Vec<String> = orders
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut keys: Vec<String> = GROUP_BY
        .captures(lowered_sql)
        .map(|c| {
            c[1].split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| available.contains(k))
                .collect()
        })
        .unwrap_or_default();

    let has_group_by = GROUP_BY.is_match(lowered_sql);
    if has_group_by && keys.is_empty() {
        keys.push(DEFAULT_GROUP_KEY.to_string());
    }

    let frame = if keys.is_empty() {
        orders.lazy().select(aggregates)
    } else {
        output.extend(keys.iter().map(|k| col(k.as_str())));
        let key_exprs: Vec<Expr> = keys.iter().map(|k| col(k.as_str())).collect();
        orders
            .lazy()
            .group_by_stable(key_exprs)
            .agg(aggregates)
            .select(output)
    };

    frame.collect().map_err(frame_error)
}

fn sample_orders() -> Result<DataFrame> {
    df![
        "order_id" => [1i64, 2, 3],
        "customer_id" => [101i64, 102, 101],
        "order_date" => ["2024-11-01", "2024-11-02", "2024-11-10"],
        "status" => ["shipped", "processing", "shipped"],
        "amount" => [120.5f64, 90.2, 300.0],
        "channel" => ["web", "store", "web"],
    ]
    .map_err(frame_error)
}

fn sample_customers() -> Result<DataFrame> {
    df![
        "customer_id" => [101i64, 102],
        "segment" => ["SMB", "ENT"],
        "country" => ["US", "UK"],
        "created_at" => ["2023-01-01", "2023-04-10"],
    ]
    .map_err(frame_error)
}
