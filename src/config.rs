//! Process configuration
//!
//! Settings are read from the environment (after loading `.env` if present).
//! Every value has a default so the engine runs offline against the built-in
//! sample schema and simulated executor.

use crate::error::{DataWiseError, Result};
use crate::models::{ColumnSpec, TableSchema};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Postgres connection string; `None` selects the simulated runner
    pub database_url: Option<String>,

    /// Hard ceiling for any LIMIT the compiler emits or the validator accepts
    pub max_limit: u64,

    /// LIMIT used when the caller does not request one
    pub default_limit: u64,

    pub cache_ttl: Duration,

    pub history_size: usize,

    /// Bound on a single runner call
    pub query_timeout: Duration,

    /// Bound on a live schema fetch
    pub schema_timeout: Duration,

    /// Extra attempts for transient runner failures
    pub max_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_limit: 200,
            default_limit: 50,
            cache_ttl: Duration::from_secs(300),
            history_size: 50,
            query_timeout: Duration::from_millis(30_000),
            schema_timeout: Duration::from_millis(5_000),
            max_retries: 2,
        }
    }
}

impl Settings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let max_limit = parse_var(&lookup, "MAX_QUERY_LIMIT", defaults.max_limit)?;
        let default_limit = parse_var(&lookup, "DEFAULT_QUERY_LIMIT", defaults.default_limit)?;
        let cache_ttl_secs = parse_var(&lookup, "CACHE_TTL_SECONDS", defaults.cache_ttl.as_secs())?;
        let history_size = parse_var(&lookup, "HISTORY_SIZE", defaults.history_size)?;
        let query_timeout_ms = parse_var(
            &lookup,
            "QUERY_TIMEOUT_MS",
            defaults.query_timeout.as_millis() as u64,
        )?;
        let schema_timeout_ms = parse_var(
            &lookup,
            "SCHEMA_TIMEOUT_MS",
            defaults.schema_timeout.as_millis() as u64,
        )?;
        let max_retries = parse_var(&lookup, "QUERY_MAX_RETRIES", defaults.max_retries)?;

        if max_limit == 0 {
            return Err(DataWiseError::Configuration(
                "MAX_QUERY_LIMIT must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            max_limit,
            default_limit,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            history_size,
            query_timeout: Duration::from_millis(query_timeout_ms),
            schema_timeout: Duration::from_millis(schema_timeout_ms),
            max_retries,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            DataWiseError::Configuration(format!("invalid value for {}: '{}' ({})", key, raw, e))
        }),
        None => Ok(default),
    }
}

/// Schema served when no live database is reachable.
pub fn sample_schema() -> Vec<TableSchema> {
    vec![
        TableSchema::new(
            "orders",
            vec![
                ColumnSpec::new("order_id", "int", false),
                ColumnSpec::new("customer_id", "int", false),
                ColumnSpec::new("order_date", "timestamp", false),
                ColumnSpec::new("status", "text", false),
                ColumnSpec::new("amount", "numeric", false),
                ColumnSpec::new("channel", "text", true),
            ],
        ),
        TableSchema::new(
            "customers",
            vec![
                ColumnSpec::new("customer_id", "int", false),
                ColumnSpec::new("segment", "text", true),
                ColumnSpec::new("country", "text", true),
                ColumnSpec::new("created_at", "timestamp", false),
            ],
        ),
    ]
}
