//! Live execution on Postgres through sqlx
//!
//! Compiled SQL uses named `:param` placeholders; Postgres wants positional
//! `$n`. Rows are read back as `row_to_json` text so any column type can be
//! returned without per-type decoding, in the order the SELECT lists them.
//! An empty result carries no JSON keys, so its column names come from
//! preparing the statement instead.

use super::{Execution, QueryRunner};
use crate::db::DbPool;
use crate::error::Result;
use crate::models::QueryTable;
use crate::safety::ValidatedQuery;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryScalar;
use sqlx::{Column, Executor, Statement};
use tracing::debug;

lazy_static! {
    static ref NAMED_INTERVAL: Regex =
        Regex::new(r"(?i)\bINTERVAL\s+:([A-Za-z_][A-Za-z0-9_]*)").expect("interval pattern is valid");
    static ref PLACEHOLDER: Regex =
        Regex::new(r"::?([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder pattern is valid");
}

type RowQuery<'q> = QueryScalar<'q, Postgres, String, PgArguments>;

pub struct PostgresRunner {
    pool: DbPool,
}

impl PostgresRunner {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Output column names of `sql`, without running it.
    async fn describe_columns(&self, sql: &str) -> Result<Vec<String>> {
        let prepared = (&self.pool).prepare(sql).await?;
        Ok(prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }
}

#[async_trait]
impl QueryRunner for PostgresRunner {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn execute(&self, query: &ValidatedQuery) -> Result<Execution> {
        let (sql, order) = to_positional(query.sql());
        let inner = sql.trim_end().trim_end_matches(';');
        let wrapped = format!("SELECT row_to_json(q)::text FROM ({}) AS q", inner);

        let mut statement: RowQuery<'_> = sqlx::query_scalar(&wrapped);
        for name in &order {
            let value = query.parameters().get(name).cloned().unwrap_or(Value::Null);
            statement = bind_value(statement, value);
        }

        let rows: Vec<String> = statement.fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "Postgres execution finished");

        let described = if rows.is_empty() {
            self.describe_columns(inner).await?
        } else {
            Vec::new()
        };

        Ok(Execution {
            table: rows_to_table(&rows, described)?,
            simulated: false,
        })
    }
}

/// Rewrite `:name` placeholders to `$n`, returning the parameter name bound to
/// each position. Repeated names share a position; `::type` casts are left
/// alone.
fn to_positional(sql: &str) -> (String, Vec<String>) {
    let sql = NAMED_INTERVAL.replace_all(sql, "CAST(:${1} AS INTERVAL)");

    let mut order: Vec<String> = Vec::new();
    let rewritten = PLACEHOLDER.replace_all(&sql, |caps: &Captures| {
        if caps[0].starts_with("::") {
            return caps[0].to_string();
        }
        let name = caps[1].to_string();
        let position = match order.iter().position(|n| *n == name) {
            Some(idx) => idx + 1,
            None => {
                order.push(name);
                order.len()
            }
        };
        format!("${}", position)
    });

    (rewritten.into_owned(), order)
}

fn bind_value(statement: RowQuery<'_>, value: Value) -> RowQuery<'_> {
    match value {
        Value::Null => statement.bind(None::<String>),
        Value::Bool(b) => statement.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => statement.bind(i),
            None => statement.bind(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => statement.bind(s),
        other => statement.bind(other.to_string()),
    }
}

/// Build a table from `row_to_json` rows. Column names come from the first row;
/// `described` is used when there are no rows.
fn rows_to_table(rows: &[String], described: Vec<String>) -> Result<QueryTable> {
    let mut objects = Vec::with_capacity(rows.len());
    for row in rows {
        objects.push(serde_json::from_str::<Map<String, Value>>(row)?);
    }

    let columns: Vec<String> = objects
        .first()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or(described);

    let rows = objects
        .into_iter()
        .map(|mut obj| {
            columns
                .iter()
                .map(|c| obj.remove(c).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(QueryTable::new(columns, rows))
}
