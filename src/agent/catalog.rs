//! Schema catalog loaded once at startup.

use crate::db::{DbPool, SchemaInspector};
use crate::error::AgentResult;
use crate::models::{KeyRole, TableSchema};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Immutable map of table name to schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableSchema>,
}

/// Compact per-table view returned by `/tables`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<ColumnSummary>,
    pub primary_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub key: KeyRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl SchemaCatalog {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.table_name.clone(), t))
                .collect(),
        }
    }

    /// Read every table from the database's information schema.
    pub async fn load(pool: &DbPool, database: Option<&str>) -> AgentResult<Self> {
        let tables = SchemaInspector::load_tables(pool, database).await?;
        let catalog = Self::new(tables);
        info!(
            tables = catalog.len(),
            names = ?catalog.table_names(),
            "Schema catalog loaded"
        );
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Prompt text for the given tables. Unknown names are skipped.
    pub fn schema_text(&self, names: &[String]) -> String {
        names
            .iter()
            .filter_map(|name| self.tables.get(name))
            .map(TableSchema::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn summaries(&self) -> Vec<TableSummary> {
        self.tables
            .values()
            .map(|table| TableSummary {
                name: table.table_name.clone(),
                comment: table.comment.clone(),
                primary_keys: table.primary_keys().into_iter().map(String::from).collect(),
                columns: table
                    .columns
                    .iter()
                    .map(|c| ColumnSummary {
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                        nullable: c.nullable,
                        key: c.key,
                        references: c
                            .references
                            .as_ref()
                            .map(|r| format!("{}.{}", r.table, r.column)),
                    })
                    .collect(),
            })
            .collect()
    }
}
