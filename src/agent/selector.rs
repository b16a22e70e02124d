//! Category and table selection for a question.
//!
//! Keyword heuristics decide first. The model is asked at most once, and only when
//! no category keyword appears in the question.

use crate::agent::catalog::SchemaCatalog;
use crate::agent::categories::{CategoryMap, GENERAL_CATEGORY};
use crate::llm::TextModel;
use crate::models::TableSchema;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tables kept by the heuristic ranking.
const MAX_SELECTED_TABLES: usize = 3;

/// Words that name a table directly.
const DIRECT_TABLE_WORDS: &[(&str, &str)] = &[
    ("companies", "company"),
    ("company", "company"),
    ("organizations", "company"),
    ("organization", "company"),
    ("organisations", "company"),
    ("organisation", "company"),
    ("projects", "projects"),
    ("project", "projects"),
    ("contacts", "contacts"),
    ("contact", "contacts"),
    ("timesheets", "timesheets"),
    ("timesheet", "timesheets"),
    ("hours", "timesheets"),
];

/// How the category was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    Keywords,
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySelection {
    pub category: String,
    pub tables: Vec<String>,
    pub source: SelectionSource,
}

/// Relevance score of one table for a question.
pub trait TableScorer: Send + Sync {
    /// `question` is already lowercased.
    fn score(&self, question: &str, table: &TableSchema) -> i32;
}

/// Substring scoring over table and column names.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordScorer;

impl TableScorer for KeywordScorer {
    fn score(&self, question: &str, table: &TableSchema) -> i32 {
        let name = table.table_name.to_lowercase();
        let mut score = 0;

        if question.contains(&name) {
            score += 20;
        }
        score += name
            .split('_')
            .filter(|segment| segment.len() > 3 && question.contains(segment))
            .count() as i32
            * 10;
        score += table
            .columns
            .iter()
            .filter(|c| question.contains(&c.name.to_lowercase()))
            .count() as i32
            * 8;

        if question.contains("name")
            && table
                .columns
                .iter()
                .any(|c| c.name.to_lowercase().contains("name"))
        {
            score += 5;
        }
        let counting = ["count", "how many", "number of", "total"]
            .iter()
            .any(|w| question.contains(w));
        if counting && !table.primary_keys().is_empty() {
            score += 3;
        }
        score
    }
}

pub struct TableSelector {
    catalog: Arc<SchemaCatalog>,
    categories: Arc<CategoryMap>,
    scorer: Box<dyn TableScorer>,
}

impl TableSelector {
    pub fn new(catalog: Arc<SchemaCatalog>, categories: Arc<CategoryMap>) -> Self {
        Self::with_scorer(catalog, categories, Box::new(KeywordScorer))
    }

    pub fn with_scorer(
        catalog: Arc<SchemaCatalog>,
        categories: Arc<CategoryMap>,
        scorer: Box<dyn TableScorer>,
    ) -> Self {
        Self {
            catalog,
            categories,
            scorer,
        }
    }

    /// Best category by keyword score. Ties keep the earlier category.
    pub fn score_categories(&self, question: &str) -> Option<(&str, usize)> {
        let question = question.to_lowercase();
        let mut best: Option<(&str, usize)> = None;
        for category in self.categories.iter() {
            let score = category.keyword_score(&question);
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((category.name.as_str(), score));
            }
        }
        best
    }

    pub async fn select_category(
        &self,
        question: &str,
        model: &dyn TextModel,
    ) -> CategorySelection {
        let by_keywords = self
            .score_categories(question)
            .and_then(|(name, score)| self.categories.get(name).map(|c| (c, score)));
        if let Some((category, score)) = by_keywords {
            debug!(category = %category.name, score, "Category chosen by keywords");
            return CategorySelection {
                category: category.name.clone(),
                tables: category.tables.clone(),
                source: SelectionSource::Keywords,
            };
        }

        match model.generate(&self.classification_prompt(question)).await {
            Ok(reply) => {
                let answer = normalize_answer(&reply);
                if let Some(category) = self.categories.find_ignore_case(&answer) {
                    debug!(category = %category.name, "Category chosen by model");
                    return CategorySelection {
                        category: category.name.clone(),
                        tables: category.tables.clone(),
                        source: SelectionSource::Model,
                    };
                }
                debug!(reply = %answer, "Model answered with an unknown category");
            }
            Err(e) => warn!(error = %e, "Category classification failed"),
        }

        CategorySelection {
            category: GENERAL_CATEGORY.to_string(),
            tables: self.catalog.table_names(),
            source: SelectionSource::Fallback,
        }
    }

    fn classification_prompt(&self, question: &str) -> String {
        let mut prompt = String::from(
            "Classify the question into exactly one of these categories:\n",
        );
        for category in self.categories.iter() {
            prompt.push_str(&format!(
                "- {} (tables: {})\n",
                category.name,
                category.tables.join(", ")
            ));
        }
        prompt.push_str(&format!(
            "\nQuestion: {}\n\nAnswer with the category name only, exactly as written above.",
            question
        ));
        prompt
    }

    /// Shortlist the tables to show the model. Never empty while the catalog has tables.
    pub fn select_tables(&self, question: &str, candidates: &[String]) -> Vec<String> {
        let lower = question.to_lowercase();

        let mut direct: Vec<String> = Vec::new();
        for (word, table) in DIRECT_TABLE_WORDS {
            if contains_word(&lower, word)
                && candidates.iter().any(|c| c == table)
                && !direct.iter().any(|t| t == table)
            {
                direct.push(table.to_string());
            }
        }
        if !direct.is_empty() {
            debug!(tables = ?direct, "Tables chosen by direct match");
            return direct;
        }

        let mut scored: Vec<(&String, i32)> = candidates
            .iter()
            .filter_map(|name| {
                self.catalog
                    .get(name)
                    .map(|table| (name, self.scorer.score(&lower, table)))
            })
            .filter(|(_, score)| *score > 0)
            .collect();
        // stable, so equal scores keep candidate order
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let mut selected: Vec<String> = scored
            .into_iter()
            .take(MAX_SELECTED_TABLES)
            .map(|(name, _)| name.clone())
            .collect();

        let wants_projects = lower.contains("project") || lower.contains("how many");
        if wants_projects
            && candidates.iter().any(|c| c == "projects")
            && !selected.iter().any(|t| t == "projects")
        {
            selected.push("projects".to_string());
        }

        if selected.is_empty() {
            if let Some(first) = candidates.first() {
                selected.push(first.clone());
            } else if let Some(first) = self.catalog.table_names().into_iter().next() {
                selected.push(first);
            }
        }
        debug!(tables = ?selected, "Tables chosen by score");
        selected
    }
}

/// Whole-word containment over alphanumeric/underscore boundaries.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| token == word)
}

fn normalize_answer(reply: &str) -> String {
    reply
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnInfo;

    fn selector() -> TableSelector {
        let catalog = SchemaCatalog::new(vec![
            TableSchema::new("company")
                .with_column(ColumnInfo::new("id", "int", false).with_primary_key(true))
                .with_column(ColumnInfo::new("name", "varchar", false)),
            TableSchema::new("invoice_lines")
                .with_column(ColumnInfo::new("id", "int", false).with_primary_key(true))
                .with_column(ColumnInfo::new("amount", "decimal", false)),
            TableSchema::new("projects")
                .with_column(ColumnInfo::new("id", "int", false).with_primary_key(true))
                .with_column(ColumnInfo::new("budget", "decimal", true)),
        ]);
        let categories = CategoryMap::builtin().narrowed_to(&catalog);
        TableSelector::new(Arc::new(catalog), Arc::new(categories))
    }

    #[test]
    fn test_keyword_scorer_segments_and_columns() {
        let table = TableSchema::new("invoice_lines")
            .with_column(ColumnInfo::new("amount", "decimal", false));
        let score = KeywordScorer.score("what is the invoice amount?", &table);
        // "invoice" segment and "amount" column
        assert_eq!(score, 18);
    }

    #[test]
    fn test_score_categories_tie_keeps_first() {
        let s = selector();
        // "company" (7) vs "project" (7)
        let (name, score) = s.score_categories("company project").unwrap();
        assert_eq!(name, "Company / Organization");
        assert_eq!(score, 7);
        assert!(s.score_categories("what is the weather").is_none());
    }

    #[test]
    fn test_select_tables_direct_hit() {
        let s = selector();
        let candidates = vec!["company".to_string(), "projects".to_string()];
        assert_eq!(
            s.select_tables("List all companies", &candidates),
            vec!["company"]
        );
    }

    #[test]
    fn test_select_tables_scored() {
        let s = selector();
        let candidates = vec!["company".to_string(), "invoice_lines".to_string()];
        let tables = s.select_tables("Total invoice amount", &candidates);
        assert_eq!(tables[0], "invoice_lines");
    }

    #[test]
    fn test_select_tables_forces_projects() {
        let s = selector();
        let candidates = vec!["invoice_lines".to_string(), "projects".to_string()];
        let tables = s.select_tables("How many invoice lines per budget?", &candidates);
        assert!(tables.contains(&"projects".to_string()));
    }

    #[test]
    fn test_select_tables_falls_back_to_first() {
        let s = selector();
        let candidates = vec!["invoice_lines".to_string()];
        assert_eq!(
            s.select_tables("zzz", &candidates),
            vec!["invoice_lines"]
        );
        assert_eq!(s.select_tables("zzz", &[]), vec!["company"]);
    }

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("\"Projects\".\nbecause"), "Projects");
        assert_eq!(normalize_answer("  **Contacts** "), "Contacts");
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("how many companies?", "companies"));
        assert!(!contains_word("companyx", "company"));
    }
}
