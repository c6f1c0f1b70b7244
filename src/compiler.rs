//! Query Compiler
//!
//! Turns an [`Intent`] into a single parameterized SELECT against one table of
//! the snapshot. Only identifiers taken from the schema and the numeric limit
//! are written into the SQL text; every other value travels in the parameter
//! map.

use crate::error::{DataWiseError, Result};
use crate::intent::{METRIC_AMOUNT, METRIC_ORDER_COUNT};
use crate::models::{CompiledQuery, Intent, Parameters, SchemaSnapshot, TableSchema};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Date column the timeframe predicate is applied to.
const TIMEFRAME_COLUMN: &str = "order_date";
const TIMEFRAME_PARAM: &str = "timeframe";

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

#[derive(Debug, Clone)]
pub struct QueryCompiler {
    default_limit: u64,
    max_limit: u64,
}

impl QueryCompiler {
    pub fn new(default_limit: u64, max_limit: u64) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }

    pub fn compile(
        &self,
        intent: &Intent,
        schema: &SchemaSnapshot,
        limit: Option<u64>,
    ) -> Result<CompiledQuery> {
        let table_name = intent.table.as_deref().ok_or_else(|| {
            DataWiseError::UnresolvableIntent("question does not name a table".to_string())
        })?;
        let table = schema.table(table_name).ok_or_else(|| {
            DataWiseError::UnresolvableIntent(format!("unknown table '{}'", table_name))
        })?;

        let aggregates = resolve_aggregates(intent, table);
        let dimensions = resolve_dimensions(intent, table);
        let (predicates, parameters) = build_predicates(intent)?;
        let limit = self.effective_limit(limit);

        let mut projection: Vec<&str> = Vec::new();
        if aggregates.is_empty() {
            projection.push("*");
        } else {
            projection.extend(aggregates.iter().copied());
            projection.extend(dimensions.iter().copied());
        }

        let mut sql = format!("SELECT {} FROM {}", projection.join(", "), table.name);
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        if !dimensions.is_empty() && !aggregates.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&dimensions.join(", "));
        }
        sql.push_str(&format!(" LIMIT {};", limit));

        debug!(table = %table.name, %sql, "Compiled intent");
        Ok(CompiledQuery { sql, parameters })
    }

    /// The configured ceiling always wins over the requested limit.
    pub fn effective_limit(&self, requested: Option<u64>) -> u64 {
        let requested = requested.filter(|l| *l > 0).unwrap_or(self.default_limit);
        requested.min(self.max_limit)
    }
}

fn resolve_aggregates(intent: &Intent, table: &TableSchema) -> Vec<&'static str> {
    let mut aggregates = Vec::new();
    for metric in &intent.metrics {
        match metric.as_str() {
            METRIC_AMOUNT if table.has_column("amount") => {
                aggregates.push("SUM(amount) AS total_amount");
            }
            METRIC_ORDER_COUNT => aggregates.push("COUNT(*) AS order_count"),
            _ => {}
        }
    }
    aggregates
}

fn resolve_dimensions<'a>(intent: &Intent, table: &'a TableSchema) -> Vec<&'a str> {
    intent
        .dimensions
        .iter()
        .filter_map(|dim| {
            table
                .columns
                .iter()
                .find(|c| &c.name == dim)
                .map(|c| c.name.as_str())
        })
        .collect()
}

fn build_predicates(intent: &Intent) -> Result<(Vec<String>, Parameters)> {
    let mut predicates = Vec::new();
    let mut parameters = Parameters::new();

    for (key, value) in &intent.filters {
        if !IDENTIFIER.is_match(key) {
            return Err(DataWiseError::UnresolvableIntent(format!(
                "filter '{}' is not a plain column name",
                key
            )));
        }
        if key == TIMEFRAME_PARAM && intent.timeframe.is_some() {
            return Err(DataWiseError::UnresolvableIntent(
                "filter 'timeframe' conflicts with the question's timeframe".to_string(),
            ));
        }
        predicates.push(format!("{} = :{}", key, key));
        parameters.insert(key.clone(), value.clone());
    }

    if let Some(timeframe) = &intent.timeframe {
        predicates.push(format!(
            "{} >= NOW() - INTERVAL :{}",
            TIMEFRAME_COLUMN, TIMEFRAME_PARAM
        ));
        parameters.insert(
            TIMEFRAME_PARAM.to_string(),
            Value::String(normalize_timeframe(timeframe)),
        );
    }

    Ok((predicates, parameters))
}

/// `last_7_days` becomes `7 days`; other tokens only lose underscores.
fn normalize_timeframe(token: &str) -> String {
    token.replacen("last_", "", 1).replace('_', " ")
}
