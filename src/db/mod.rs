//! Database connectivity for the live schema store and query runner

pub mod connection;

pub use connection::{connect_lazy, DbPool};
