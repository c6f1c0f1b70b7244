//! Execution Module - runners for validated queries
//!
//! - `QueryRunner` trait: the only way SQL leaves the process
//! - `SimulatedRunner`: sample data held in Polars frames, for offline use
//! - `PostgresRunner`: live execution through sqlx

pub mod postgres;
pub mod result;
pub mod simulated;

use crate::error::Result;
use crate::models::QueryTable;
use crate::safety::ValidatedQuery;
use async_trait::async_trait;

pub use postgres::PostgresRunner;
pub use result::dataframe_to_table;
pub use simulated::SimulatedRunner;

/// Output of one runner call.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub table: QueryTable,
    /// True when rows came from sample data rather than a database
    pub simulated: bool,
}

/// Executes statements that already passed the safety validator.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Runner name for logs (e.g. "postgres", "simulated")
    fn name(&self) -> &'static str;

    async fn execute(&self, query: &ValidatedQuery) -> Result<Execution>;
}
