//! Shared data model
//!
//! These shapes are the contract any outer surface (CLI, HTTP) serializes.

use crate::error::{DataWiseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Named SQL parameters. Ordered so iteration and serialization are stable.
pub type Parameters = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, data_type: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(name: &str, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.to_string(),
            columns,
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Where a snapshot came from. Callers never see a difference in behaviour,
/// but logs and stats do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSource {
    Live,
    Fallback,
}

/// Tables and columns known at `refreshed_at`, in discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    tables: Vec<TableSchema>,
    pub refreshed_at: DateTime<Utc>,
    pub source: SchemaSource,
}

impl SchemaSnapshot {
    pub fn new(
        tables: Vec<TableSchema>,
        refreshed_at: DateTime<Utc>,
        source: SchemaSource,
    ) -> Result<Self> {
        let mut seen_tables = HashSet::new();
        for table in &tables {
            if !seen_tables.insert(table.name.as_str()) {
                return Err(DataWiseError::Configuration(format!(
                    "duplicate table '{}' in schema",
                    table.name
                )));
            }
            let mut seen_columns = HashSet::new();
            for column in &table.columns {
                if !seen_columns.insert(column.name.as_str()) {
                    return Err(DataWiseError::Configuration(format!(
                        "duplicate column '{}.{}' in schema",
                        table.name, column.name
                    )));
                }
            }
        }

        Ok(Self {
            tables,
            refreshed_at,
            source,
        })
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn first_table(&self) -> Option<&TableSchema> {
        self.tables.first()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Structured reading of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub table: Option<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Parameters,
    pub timeframe: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub filters: Parameters,
    pub user_id: Option<String>,
    pub limit: Option<u64>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            filters: Parameters::new(),
            user_id: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.filters.insert(name.into(), value);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Tabular result with named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column, top to bottom. Short rows yield `Null`.
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Emptiness,
    Nulls,
    Duplicates,
    Freshness,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Emptiness => "emptiness",
            FindingKind::Nulls => "nulls",
            FindingKind::Duplicates => "duplicates",
            FindingKind::Freshness => "freshness",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityFinding {
    pub kind: FindingKind,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub detail: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub sql: String,
    pub parameters: Parameters,
    pub confidence: f64,
    pub data_quality: Vec<DataQualityFinding>,
    pub explanation: String,
    pub insights: Vec<Insight>,
    pub result: QueryTable,
    pub cached: bool,
    /// True when the result came from sample data rather than a database
    pub simulated: bool,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub question: String,
    pub sql: String,
    pub executed_at: DateTime<Utc>,
    pub rowcount: usize,
    pub warnings: Vec<String>,
}
