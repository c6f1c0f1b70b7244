//! DataWise: natural-language questions to safe, parameterized, read-only SQL.
//!
//! The compilation chain is `intent` -> `compiler` -> `safety`; `pipeline`
//! wires it to the schema provider, cache, runners, analytics and history.

pub mod analytics;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod history;
pub mod intent;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod safety;
pub mod schema;

pub use error::{DataWiseError, Result};
pub use models::{QueryRequest, QueryResponse};
pub use pipeline::DataWisePipeline;
