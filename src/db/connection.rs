//! Database connection management using sqlx

use crate::error::{DataWiseError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub type DbPool = PgPool;

/// Build a connection pool without touching the network.
///
/// Connections are opened on first use, so an unreachable database shows up
/// as a per-call upstream error instead of failing startup.
pub fn connect_lazy(database_url: &str, acquire_timeout: Duration) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(database_url)
        .map_err(|e| DataWiseError::Configuration(format!("invalid DATABASE_URL: {}", e)))
}
