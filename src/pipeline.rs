//! Question-to-answer orchestration
//!
//! Sequence for one request:
//! schema -> intent -> compile -> approve -> cache lookup -> execute ->
//! analytics -> cache store -> history append -> response.
//!
//! Cache hits return before the runner is touched and are not added to the
//! history.

use crate::analytics::{DataQualityEngine, InsightEngine};
use crate::cache::{fingerprint, ResponseCache};
use crate::compiler::QueryCompiler;
use crate::config::{sample_schema, Settings};
use crate::db::connect_lazy;
use crate::error::{DataWiseError, Result};
use crate::execution::{Execution, PostgresRunner, QueryRunner, SimulatedRunner};
use crate::history::HistoryStore;
use crate::intent::IntentExtractor;
use crate::models::{HistoryItem, Intent, QueryRequest, QueryResponse, Severity};
use crate::observability::{PipelineStats, StatsSnapshot};
use crate::retry::RetryPolicy;
use crate::safety::{SafetyValidator, ValidatedQuery};
use crate::schema::{PostgresSchemaStore, SchemaProvider, SchemaStore};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct DataWisePipeline {
    schema: Arc<SchemaProvider>,
    runner: Arc<dyn QueryRunner>,
    cache: Arc<ResponseCache>,
    history: Arc<HistoryStore>,
    extractor: IntentExtractor,
    compiler: QueryCompiler,
    validator: SafetyValidator,
    quality: DataQualityEngine,
    insights: InsightEngine,
    retry: RetryPolicy,
    query_timeout: Duration,
    stats: PipelineStats,
}

impl DataWisePipeline {
    pub fn new(
        settings: &Settings,
        schema: Arc<SchemaProvider>,
        runner: Arc<dyn QueryRunner>,
        cache: Arc<ResponseCache>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            schema,
            runner,
            cache,
            history,
            extractor: IntentExtractor::new(),
            compiler: QueryCompiler::new(settings.default_limit, settings.max_limit),
            validator: SafetyValidator::new(settings.max_limit),
            quality: DataQualityEngine::new(),
            insights: InsightEngine::new(),
            retry: RetryPolicy::new(settings.max_retries),
            query_timeout: settings.query_timeout,
            stats: PipelineStats::new(),
        }
    }

    /// Wire backends from settings: Postgres when `DATABASE_URL` is set,
    /// otherwise the fallback schema and simulated runner.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let (store, runner): (Option<Arc<dyn SchemaStore>>, Arc<dyn QueryRunner>) =
            match &settings.database_url {
                Some(url) => {
                    let pool = connect_lazy(url, settings.schema_timeout)?;
                    info!("Using Postgres backend");
                    (
                        Some(Arc::new(PostgresSchemaStore::new(pool.clone()))),
                        Arc::new(PostgresRunner::new(pool)),
                    )
                }
                None => {
                    info!("DATABASE_URL not set, using simulated backend");
                    (None, Arc::new(SimulatedRunner::new()))
                }
            };

        let schema = Arc::new(SchemaProvider::new(
            store,
            sample_schema(),
            settings.schema_timeout,
        ));
        let cache = Arc::new(ResponseCache::new(settings.cache_ttl));
        let history = Arc::new(HistoryStore::new(settings.history_size));

        Ok(Self::new(settings, schema, runner, cache, history))
    }

    pub async fn run(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "query",
            %request_id,
            user = request.user_id.as_deref().unwrap_or("anonymous")
        );
        self.stats.record_request();

        let result = self.run_inner(request).instrument(span).await;
        if let Err(e) = &result {
            match e {
                DataWiseError::SafetyRejection(_) => self.stats.record_rejection(),
                DataWiseError::UnresolvableIntent(_) => self.stats.record_unresolved(),
                _ => self.stats.record_failure(),
            }
        }
        result
    }

    async fn run_inner(&self, request: &QueryRequest) -> Result<QueryResponse> {
        info!(question = %request.question, "Processing question");

        let schema = self.schema.load().await?;
        let intent = self
            .extractor
            .parse(&request.question, &schema, &request.filters);
        debug!(
            table = ?intent.table,
            metrics = ?intent.metrics,
            confidence = intent.confidence,
            schema_source = ?schema.source,
            "Extracted intent"
        );

        let compiled = self.compiler.compile(&intent, &schema, request.limit)?;
        let validated = self.validator.approve(compiled)?;

        let key = fingerprint(&request.question, validated.parameters());
        if let Some(hit) = self.cache.get(&key) {
            self.stats.record_cache_hit();
            info!(fingerprint = %key, "Cache hit");
            return Ok(hit);
        }
        self.stats.record_cache_miss();

        let execution = self.execute(&validated).await?;
        self.stats.record_execution();

        let data_quality = self.quality.evaluate(&execution.table);
        let insights = self.insights.derive(&execution.table);
        let compiled = validated.into_inner();

        let response = QueryResponse {
            sql: compiled.sql,
            parameters: compiled.parameters,
            confidence: intent.confidence,
            explanation: build_explanation(&intent)?,
            insights,
            result: execution.table,
            cached: false,
            simulated: execution.simulated,
            executed_at: Utc::now(),
            data_quality,
        };

        let mut cached_copy = response.clone();
        cached_copy.cached = true;
        self.cache.set(&key, cached_copy);

        self.history.append(HistoryItem {
            question: request.question.clone(),
            sql: response.sql.clone(),
            executed_at: response.executed_at,
            rowcount: response.result.row_count(),
            warnings: response
                .data_quality
                .iter()
                .filter(|f| f.severity != Severity::Info)
                .map(|f| f.kind.as_str().to_string())
                .collect(),
        });

        info!(
            rows = response.result.row_count(),
            simulated = response.simulated,
            runner = self.runner.name(),
            "Query answered"
        );
        Ok(response)
    }

    /// One runner call per attempt, each bounded by the query timeout.
    /// Only transient upstream failures are retried; a timeout is final.
    async fn execute(&self, query: &ValidatedQuery) -> Result<Execution> {
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;
        let runner = &self.runner;
        let timeout = self.query_timeout;
        let stats = &self.stats;

        let outcome = self
            .retry
            .retry_with_backoff(
                move || async move {
                    if attempts_ref.fetch_add(1, Ordering::SeqCst) > 0 {
                        stats.record_retry();
                    }
                    tokio::time::timeout(timeout, runner.execute(query))
                        .await
                        .map_err(|_| DataWiseError::Timeout(timeout))?
                },
                DataWiseError::is_transient,
            )
            .await;

        if let Err(e) = &outcome {
            warn!(
                runner = runner.name(),
                attempts = attempts.load(Ordering::SeqCst),
                error = %e,
                "Execution failed"
            );
        }
        outcome
    }

    pub fn schema(&self) -> &SchemaProvider {
        &self.schema
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.schema.fallback_loads())
    }
}

/// Human-readable summary of how a question was interpreted.
pub fn build_explanation(intent: &Intent) -> Result<String> {
    let list_or_none = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };

    let mut parts = vec![
        format!("Target table: {}", intent.table.as_deref().unwrap_or("none")),
        format!("Metrics: {}", list_or_none(&intent.metrics)),
        format!("Dimensions: {}", list_or_none(&intent.dimensions)),
    ];
    if let Some(timeframe) = &intent.timeframe {
        parts.push(format!("Timeframe: {}", timeframe));
    }
    if !intent.filters.is_empty() {
        parts.push(format!("Filters: {}", serde_json::to_string(&intent.filters)?));
    }
    Ok(parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Parameters;
    use serde_json::json;

    fn intent() -> Intent {
        Intent {
            table: Some("orders".to_string()),
            metrics: vec!["amount".to_string()],
            dimensions: vec!["customer_id".to_string()],
            filters: Parameters::new(),
            timeframe: None,
            confidence: 0.7,
        }
    }

    #[test]
    fn test_explanation_basic() {
        assert_eq!(
            build_explanation(&intent()).unwrap(),
            "Target table: orders; Metrics: amount; Dimensions: customer_id"
        );
    }

    #[test]
    fn test_explanation_with_timeframe_and_filters() {
        let mut intent = intent();
        intent.metrics.clear();
        intent.dimensions.clear();
        intent.timeframe = Some("last_7_days".to_string());
        intent.filters.insert("channel".to_string(), json!("web"));
        assert_eq!(
            build_explanation(&intent).unwrap(),
            "Target table: orders; Metrics: none; Dimensions: none; \
             Timeframe: last_7_days; Filters: {\"channel\":\"web\"}"
        );
    }

    #[tokio::test]
    async fn test_offline_pipeline_answers_from_sample_data() {
        let pipeline = DataWisePipeline::from_settings(&Settings::default()).unwrap();
        let response = pipeline
            .run(&QueryRequest::new("Show revenue by customer"))
            .await
            .unwrap();
        assert!(response.simulated);
        assert_eq!(response.result.row_count(), 2);
        assert_eq!(pipeline.stats().fallback_schema_loads, 1);
        assert_eq!(pipeline.stats().executions, 1);
    }
}
