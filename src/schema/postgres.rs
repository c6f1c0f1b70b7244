//! Live schema from Postgres `information_schema`

use super::SchemaStore;
use crate::db::DbPool;
use crate::error::Result;
use crate::models::{ColumnSpec, TableSchema};
use async_trait::async_trait;

const COLUMNS_SQL: &str = r#"
    SELECT table_name::text, column_name::text, data_type::text, is_nullable::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
    ORDER BY table_name, ordinal_position
"#;

pub struct PostgresSchemaStore {
    pool: DbPool,
}

impl PostgresSchemaStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaStore for PostgresSchemaStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_tables(&self) -> Result<Vec<TableSchema>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(COLUMNS_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(group_columns(rows))
    }
}

/// Fold `(table, column, type, is_nullable)` rows, already ordered by table,
/// into one entry per table.
fn group_columns(rows: Vec<(String, String, String, String)>) -> Vec<TableSchema> {
    let mut tables: Vec<TableSchema> = Vec::new();
    for (table_name, column_name, data_type, is_nullable) in rows {
        let column = ColumnSpec {
            name: column_name,
            data_type,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
        };
        match tables.last_mut() {
            Some(table) if table.name == table_name => table.columns.push(column),
            _ => tables.push(TableSchema {
                name: table_name,
                columns: vec![column],
            }),
        }
    }
    tables
}
