//! Schema-related data models.
//!
//! This module defines the table and column metadata loaded from the database's
//! information schema at startup.

use serde::{Deserialize, Serialize};

/// Role a column plays in keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    #[default]
    None,
    Primary,
    Foreign,
}

/// Target of a foreign key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Full type (e.g., `varchar(255)`, `int unsigned`)
    pub data_type: String,
    pub nullable: bool,
    pub key: KeyRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignRef>,
}

impl ColumnInfo {
    /// Create a new column with no key role.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            key: KeyRole::None,
            default_value: None,
            comment: None,
            references: None,
        }
    }

    /// Mark this column as (part of) the primary key.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        if is_pk {
            self.key = KeyRole::Primary;
        }
        self
    }

    /// Mark this column as a foreign key. A primary key role is kept.
    pub fn with_reference(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        if self.key == KeyRole::None {
            self.key = KeyRole::Foreign;
        }
        self.references = Some(ForeignRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// One-line description used in model prompts.
    pub fn describe(&self) -> String {
        let mut line = format!("{} {}", self.name, self.data_type);
        match (&self.key, &self.references) {
            (KeyRole::Primary, _) => line.push_str(" [PRIMARY KEY]"),
            (KeyRole::Foreign, Some(r)) => {
                line.push_str(&format!(" [FOREIGN KEY -> {}.{}]", r.table, r.column))
            }
            (KeyRole::Foreign, None) => line.push_str(" [FOREIGN KEY]"),
            (KeyRole::None, _) => {}
        }
        if !self.nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(comment) = &self.comment {
            line.push_str(&format!(" -- {}", comment));
        }
        line
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            comment: None,
            columns: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Add a column definition.
    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.key == KeyRole::Primary)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn foreign_keys(&self) -> Vec<&ColumnInfo> {
        self.columns
            .iter()
            .filter(|c| c.references.is_some())
            .collect()
    }

    /// Prompt block describing this table and its columns.
    pub fn describe(&self) -> String {
        let mut out = format!("Table: {}", self.table_name);
        if let Some(comment) = &self.comment {
            out.push_str(&format!(" ({})", comment));
        }
        out.push('\n');
        for column in &self.columns {
            out.push_str("  - ");
            out.push_str(&column.describe());
            out.push('\n');
        }
        out
    }
}
