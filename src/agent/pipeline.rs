//! The question-answering pipeline, wired once at startup and shared by all requests.

use crate::agent::catalog::SchemaCatalog;
use crate::agent::categories::CategoryMap;
use crate::agent::composer::compose;
use crate::agent::execution::{ExecutionLayer, ExecutionSettings};
use crate::agent::guard;
use crate::agent::selector::{SelectionSource, TableSelector};
use crate::agent::synthesizer::QuerySynthesizer;
use crate::db::QueryBackend;
use crate::error::{AgentError, AgentResult};
use crate::llm::TextModel;
use crate::models::{DatabaseType, ExecutionOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything `/query` reports back about one question.
#[derive(Debug, Clone)]
pub struct AgentAnswer {
    pub question: String,
    pub response: String,
    pub category: String,
    pub category_source: SelectionSource,
    pub tables: Vec<String>,
    pub outcome: ExecutionOutcome,
}

impl AgentAnswer {
    pub fn success(&self) -> bool {
        self.outcome.success
    }
}

pub struct AgentContext {
    catalog: Arc<SchemaCatalog>,
    categories: Arc<CategoryMap>,
    selector: TableSelector,
    synthesizer: QuerySynthesizer,
    execution: ExecutionLayer,
    model: Arc<dyn TextModel>,
    dialect: DatabaseType,
}

impl AgentContext {
    pub fn new(
        catalog: SchemaCatalog,
        categories: CategoryMap,
        backend: Arc<dyn QueryBackend>,
        model: Arc<dyn TextModel>,
        dialect: DatabaseType,
        settings: ExecutionSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let categories = Arc::new(categories.narrowed_to(&catalog));
        Self {
            selector: TableSelector::new(catalog.clone(), categories.clone()),
            synthesizer: QuerySynthesizer::new(catalog.clone(), dialect),
            execution: ExecutionLayer::new(backend, settings),
            catalog,
            categories,
            model,
            dialect,
        }
    }

    /// Replace the execution layer, e.g. to change the retry policy.
    pub fn with_execution(mut self, execution: ExecutionLayer) -> Self {
        self.execution = execution;
        self
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn execution(&self) -> &ExecutionLayer {
        &self.execution
    }

    pub fn model(&self) -> &dyn TextModel {
        self.model.as_ref()
    }

    pub fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    /// Answer a natural-language question.
    ///
    /// Synthesis failures are errors. Guard rejections and database failures come
    /// back as an unsuccessful answer with an apologetic response.
    pub async fn answer(&self, question: &str, use_cache: bool) -> AgentResult<AgentAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::validation("Question is required"));
        }

        let selection = self
            .selector
            .select_category(question, self.model.as_ref())
            .await;
        let tables = self.selector.select_tables(question, &selection.tables);
        info!(
            category = %selection.category,
            source = ?selection.source,
            tables = ?tables,
            "Selected tables"
        );

        let sql = self
            .synthesizer
            .synthesize(question, &tables, self.model.as_ref())
            .await?;

        let outcome = match guard::check(&sql) {
            Ok(guarded) => self.execution.execute(&guarded, use_cache).await,
            Err(e) => {
                warn!(sql = %sql, error = %e, "Generated SQL rejected by guard");
                ExecutionOutcome::failed(sql, &e, 0)
            }
        };

        let response = compose(self.model.as_ref(), question, &outcome.sql, &outcome).await;

        Ok(AgentAnswer {
            question: question.to_string(),
            response,
            category: selection.category,
            category_source: selection.source,
            tables,
            outcome,
        })
    }

    /// Guard and run caller-supplied SQL. A rejected statement never reaches the database.
    pub async fn run_direct_sql(&self, sql: &str, use_cache: bool) -> AgentResult<ExecutionOutcome> {
        let guarded = guard::check(sql)?;
        Ok(self.execution.execute(&guarded, use_cache).await)
    }
}
