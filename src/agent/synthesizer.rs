//! Question to SQL through the text model.

use crate::agent::catalog::SchemaCatalog;
use crate::agent::guard::find_unquoted;
use crate::error::{AgentError, AgentResult};
use crate::llm::TextModel;
use crate::models::DatabaseType;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Names the model tends to use for tables that exist under another name.
const TABLE_ALIASES: &[(&str, &str)] = &[
    ("companies", "company"),
    ("organizations", "company"),
    ("organisations", "company"),
];

/// Build the instruction prompt for one question.
pub fn build_prompt(question: &str, schema_text: &str, dialect: DatabaseType) -> String {
    format!(
        "You are an expert {dialect} analyst. Write one SQL query that answers the question.\n\
         \n\
         Database schema:\n\
         {schema_text}\n\
         Naming conventions:\n\
         - The companies table is named `company` (singular). Never use `companies`.\n\
         - Projects are in `projects`, contacts in `contacts`, time entries in `timesheets`.\n\
         - Join through the foreign keys shown above.\n\
         \n\
         Rules:\n\
         - Only write a single SELECT statement. Never modify data.\n\
         - Use only the tables and columns listed above.\n\
         - Return only the SQL, without explanation.\n\
         \n\
         Question: {question}\n\
         SQL:",
        dialect = dialect.display_name(),
    )
}

/// Reduce a model reply to one bare statement.
pub fn clean_sql(reply: &str) -> String {
    let fenced = Regex::new(r"(?s)```(?:sql|SQL)?\s*(.*?)```")
        .ok()
        .and_then(|re| re.captures(reply).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
        .unwrap_or(reply);

    let statement = match find_unquoted(fenced, ";") {
        Some(pos) => &fenced[..pos],
        None => fenced,
    };
    statement.trim().trim_matches('`').trim().to_string()
}

/// Canned query used when the model is rate limited.
pub fn template_query(question: &str, table: &str) -> Option<String> {
    let lower = question.to_lowercase();
    if lower.contains("summary") {
        Some(format!("SELECT COUNT(*) AS total_records FROM {}", table))
    } else if lower.contains("how many") {
        Some(format!("SELECT COUNT(*) AS count FROM {}", table))
    } else if lower.contains("list") || lower.contains("show") {
        Some(format!("SELECT * FROM {} LIMIT 10", table))
    } else {
        None
    }
}

pub struct QuerySynthesizer {
    catalog: Arc<SchemaCatalog>,
    dialect: DatabaseType,
    aliases: Vec<(Regex, &'static str)>,
}

impl QuerySynthesizer {
    pub fn new(catalog: Arc<SchemaCatalog>, dialect: DatabaseType) -> Self {
        let aliases = TABLE_ALIASES
            .iter()
            .filter_map(|(from, to)| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from)))
                    .ok()
                    .map(|re| (re, *to))
            })
            .collect();
        Self {
            catalog,
            dialect,
            aliases,
        }
    }

    /// Rewrite table names the schema does not use.
    pub fn apply_aliases(&self, sql: &str) -> String {
        self.aliases
            .iter()
            .filter(|(_, to)| self.catalog.is_empty() || self.catalog.contains(to))
            .fold(sql.to_string(), |acc, (re, to)| {
                re.replace_all(&acc, *to).into_owned()
            })
    }

    pub async fn synthesize(
        &self,
        question: &str,
        tables: &[String],
        model: &dyn TextModel,
    ) -> AgentResult<String> {
        let prompt = build_prompt(question, &self.catalog.schema_text(tables), self.dialect);

        match model.generate(&prompt).await {
            Ok(reply) => {
                let sql = self.apply_aliases(&clean_sql(&reply));
                if sql.is_empty() {
                    return Err(AgentError::unknown(
                        "Language model returned no SQL",
                        Some("EMPTY_SQL"),
                    ));
                }
                debug!(sql = %sql, "Synthesized SQL");
                Ok(sql)
            }
            Err(err @ AgentError::UpstreamRateLimit { .. }) => {
                let template = tables
                    .first()
                    .and_then(|table| template_query(question, table));
                match template {
                    Some(sql) => {
                        warn!(sql = %sql, "Model rate limited, using template query");
                        Ok(sql)
                    }
                    None => {
                        info!("Model rate limited and no template matches");
                        Err(err)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableSchema;

    fn synthesizer() -> QuerySynthesizer {
        let catalog = SchemaCatalog::new(vec![TableSchema::new("company")]);
        QuerySynthesizer::new(Arc::new(catalog), DatabaseType::MySQL)
    }

    #[test]
    fn test_clean_sql_strips_fence_and_tail() {
        let reply = "Here you go:\n```sql\nSELECT * FROM company;\nSELECT 2;\n```\nDone.";
        assert_eq!(clean_sql(reply), "SELECT * FROM company");
    }

    #[test]
    fn test_clean_sql_keeps_quoted_semicolon() {
        assert_eq!(
            clean_sql("SELECT * FROM company WHERE name = 'A;B Corp'"),
            "SELECT * FROM company WHERE name = 'A;B Corp'"
        );
        assert_eq!(
            clean_sql("SELECT * FROM company WHERE name = 'A;B';\nSELECT 2;"),
            "SELECT * FROM company WHERE name = 'A;B'"
        );
    }

    #[test]
    fn test_clean_sql_plain() {
        assert_eq!(clean_sql("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_aliases_whole_word_case_insensitive() {
        let s = synthesizer();
        assert_eq!(
            s.apply_aliases("SELECT COUNT(*) FROM Companies c JOIN companies_archive a"),
            "SELECT COUNT(*) FROM company c JOIN companies_archive a"
        );
    }

    #[test]
    fn test_template_queries() {
        assert_eq!(
            template_query("Give me a summary", "company").as_deref(),
            Some("SELECT COUNT(*) AS total_records FROM company")
        );
        assert_eq!(
            template_query("How many projects?", "projects").as_deref(),
            Some("SELECT COUNT(*) AS count FROM projects")
        );
        assert_eq!(
            template_query("show contacts", "contacts").as_deref(),
            Some("SELECT * FROM contacts LIMIT 10")
        );
        assert!(template_query("average budget", "projects").is_none());
    }

    #[test]
    fn test_prompt_mentions_conventions() {
        let prompt = build_prompt("How many companies?", "Table: company\n", DatabaseType::SQLite);
        assert!(prompt.contains("named `company`"));
        assert!(prompt.contains("Question: How many companies?"));
        assert!(prompt.contains("SQLite"));
    }
}
