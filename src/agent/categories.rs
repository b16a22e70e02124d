//! Category definitions: business domains mapped onto schema tables.

use crate::agent::catalog::SchemaCatalog;
use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Name of the synthetic category used when nothing else fits.
pub const GENERAL_CATEGORY: &str = "General";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub name: String,
    pub tables: Vec<String>,
    pub keywords: Vec<String>,
}

impl CategoryDefinition {
    pub fn new(name: &str, tables: &[&str], keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Sum of the lengths of every keyword found in the lowercased question.
    pub fn keyword_score(&self, question_lower: &str) -> usize {
        self.keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty() && question_lower.contains(k.as_str()))
            .map(|k| k.len())
            .sum()
    }
}

/// Ordered category map. Order decides ties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap {
    categories: Vec<CategoryDefinition>,
}

impl CategoryMap {
    pub fn new(categories: Vec<CategoryDefinition>) -> Self {
        Self { categories }
    }

    /// The business map for the company/project/contact/timesheet schema.
    pub fn builtin() -> Self {
        Self::new(vec![
            CategoryDefinition::new(
                "Company / Organization",
                &["company"],
                &[
                    "company",
                    "companies",
                    "organization",
                    "organisation",
                    "client",
                    "business",
                    "firm",
                    "vendor",
                    "industry",
                ],
            ),
            CategoryDefinition::new(
                "Projects",
                &["projects", "company"],
                &[
                    "project",
                    "budget",
                    "deadline",
                    "milestone",
                    "progress",
                    "status",
                ],
            ),
            CategoryDefinition::new(
                "Contacts",
                &["contacts", "company"],
                &[
                    "contact", "person", "people", "email", "phone", "employee", "staff",
                ],
            ),
            CategoryDefinition::new(
                "Timesheets",
                &["timesheets", "projects", "contacts"],
                &[
                    "timesheet",
                    "hours",
                    "billable",
                    "worked",
                    "time entry",
                    "logged",
                ],
            ),
        ])
    }

    /// Parse a JSON array of category definitions.
    pub fn from_json_str(json: &str) -> AgentResult<Self> {
        let categories: Vec<CategoryDefinition> = serde_json::from_str(json).map_err(|e| {
            AgentError::unknown(format!("Invalid categories file: {}", e), Some("CONFIG"))
        })?;
        if categories.is_empty() {
            return Err(AgentError::unknown(
                "Categories file defines no categories",
                Some("CONFIG"),
            ));
        }
        Ok(Self::new(categories))
    }

    pub fn from_json_file(path: &Path) -> AgentResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::unknown(
                format!("Failed to read categories file {}: {}", path.display(), e),
                Some("CONFIG"),
            )
        })?;
        let map = Self::from_json_str(&raw)?;
        info!(path = %path.display(), count = map.len(), "Loaded category map");
        Ok(map)
    }

    /// Keep only tables the catalog knows. A category left empty gets every table.
    pub fn narrowed_to(self, catalog: &SchemaCatalog) -> Self {
        let all_tables = catalog.table_names();
        let categories = self
            .categories
            .into_iter()
            .map(|mut category| {
                let before = category.tables.len();
                category.tables.retain(|t| catalog.contains(t));
                if category.tables.len() != before {
                    warn!(
                        category = %category.name,
                        dropped = before - category.tables.len(),
                        "Category references tables missing from the database"
                    );
                }
                if category.tables.is_empty() {
                    category.tables = all_tables.clone();
                }
                category
            })
            .collect();
        Self { categories }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.categories.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Case-insensitive lookup.
    pub fn find_ignore_case(&self, name: &str) -> Option<&CategoryDefinition> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
