//! Schema Snapshot Provider
//!
//! Serves the tables and columns the compiler is allowed to reference. The
//! first successful load is memoized; `refresh` replaces it. When the live
//! store fails or times out the provider serves the built-in fallback schema
//! instead of erroring, so compilation can always proceed offline.

pub mod postgres;

use crate::error::{DataWiseError, Result};
use crate::models::{SchemaSnapshot, SchemaSource, TableSchema};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use postgres::PostgresSchemaStore;

/// Source of live table metadata.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tables with their columns in ordinal order.
    async fn fetch_tables(&self) -> Result<Vec<TableSchema>>;
}

pub struct SchemaProvider {
    store: Option<Arc<dyn SchemaStore>>,
    fallback: Vec<TableSchema>,
    fetch_timeout: Duration,
    snapshot: RwLock<Option<Arc<SchemaSnapshot>>>,
    fallback_loads: AtomicU64,
}

impl SchemaProvider {
    pub fn new(
        store: Option<Arc<dyn SchemaStore>>,
        fallback: Vec<TableSchema>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fallback,
            fetch_timeout,
            snapshot: RwLock::new(None),
            fallback_loads: AtomicU64::new(0),
        }
    }

    /// Provider that only ever serves `fallback`.
    pub fn offline(fallback: Vec<TableSchema>) -> Self {
        Self::new(None, fallback, Duration::from_secs(0))
    }

    /// Memoized snapshot, loading it on first use.
    pub async fn load(&self) -> Result<Arc<SchemaSnapshot>> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let mut guard = self.snapshot.write().await;
        // Another request may have loaded while we waited for the write lock
        if let Some(snapshot) = guard.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let snapshot = Arc::new(self.build().await?);
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Reload from the store and replace the memoized snapshot.
    pub async fn refresh(&self) -> Result<Arc<SchemaSnapshot>> {
        let mut guard = self.snapshot.write().await;
        let snapshot = Arc::new(self.build().await?);
        *guard = Some(Arc::clone(&snapshot));
        info!(
            source = ?snapshot.source,
            tables = snapshot.tables().len(),
            "Schema refreshed"
        );
        Ok(snapshot)
    }

    /// Number of times the fallback schema was served instead of a live one.
    pub fn fallback_loads(&self) -> u64 {
        self.fallback_loads.load(Ordering::Relaxed)
    }

    async fn build(&self) -> Result<SchemaSnapshot> {
        if let Some(store) = &self.store {
            match self.fetch_live(store.as_ref()).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    warn!(
                        store = store.name(),
                        error = %e,
                        "Live schema unavailable, serving fallback schema"
                    );
                }
            }
        }
        self.fallback_snapshot()
    }

    async fn fetch_live(&self, store: &dyn SchemaStore) -> Result<SchemaSnapshot> {
        let tables = tokio::time::timeout(self.fetch_timeout, store.fetch_tables())
            .await
            .map_err(|_| DataWiseError::Timeout(self.fetch_timeout))??;

        if tables.is_empty() {
            return Err(DataWiseError::upstream(
                format!("{} returned no tables", store.name()),
                false,
            ));
        }

        debug!(store = store.name(), tables = tables.len(), "Loaded live schema");
        SchemaSnapshot::new(tables, Utc::now(), SchemaSource::Live)
    }

    fn fallback_snapshot(&self) -> Result<SchemaSnapshot> {
        if self.fallback.is_empty() {
            return Err(DataWiseError::Configuration(
                "no live schema and the fallback schema is empty".to_string(),
            ));
        }
        self.fallback_loads.fetch_add(1, Ordering::Relaxed);
        SchemaSnapshot::new(self.fallback.clone(), Utc::now(), SchemaSource::Fallback)
    }
}
