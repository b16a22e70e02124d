//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use sql_agent_server::config::PoolOptions;
use sql_agent_server::db::{ConnectionManager, QueryBackend};
use sql_agent_server::error::{AgentError, AgentResult};
use sql_agent_server::llm::TextModel;
use sql_agent_server::models::{ConnectionConfig, JsonRow, QueryResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Text model that replays canned replies in order and records every prompt.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<AgentResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<AgentResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> AgentResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::unknown("script exhausted", None)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Query backend with scripted results and call counters.
pub struct FakeBackend {
    results: Mutex<VecDeque<AgentResult<QueryResult>>>,
    default_rows: Vec<JsonRow>,
    pub fetches: AtomicUsize,
    pub reconnects: AtomicUsize,
    generation: Mutex<u64>,
    pub healthy: AtomicBool,
}

impl FakeBackend {
    pub fn new(results: Vec<AgentResult<QueryResult>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            default_rows: vec![row(&[("count", json!(3))])],
            fetches: AtomicUsize::new(0),
            reconnects: AtomicUsize::new(0),
            generation: Mutex::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Always answers with one `count = 3` row.
    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    async fn fetch_rows(&self, _sql: &str) -> AgentResult<QueryResult> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let scripted = self.results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(rows_result(self.default_rows.clone())))
    }

    fn generation(&self) -> u64 {
        *self.generation.lock().unwrap()
    }

    /// Counts only the reconnects that actually rebuild.
    async fn reconnect(&self, seen: u64) -> AgentResult<()> {
        let mut generation = self.generation.lock().unwrap();
        if *generation == seen {
            *generation += 1;
            self.reconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

pub fn row(cells: &[(&str, serde_json::Value)]) -> JsonRow {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn rows_result(rows: Vec<JsonRow>) -> QueryResult {
    QueryResult {
        columns: Vec::new(),
        rows,
        truncated: false,
    }
}

pub fn connection_reset() -> AgentError {
    AgentError::transient("Connection reset by peer", Some("ECONNRESET"))
}

const SEED_SQL: &str = r#"
CREATE TABLE company (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    industry TEXT
);
CREATE TABLE projects (
    id INTEGER PRIMARY KEY,
    company_id INTEGER REFERENCES company(id),
    name TEXT NOT NULL,
    budget REAL,
    status TEXT
);
CREATE TABLE contacts (
    id INTEGER PRIMARY KEY,
    company_id INTEGER REFERENCES company(id),
    full_name TEXT NOT NULL,
    email TEXT
);
CREATE TABLE timesheets (
    id INTEGER PRIMARY KEY,
    project_id INTEGER REFERENCES projects(id),
    contact_id INTEGER REFERENCES contacts(id),
    hours REAL NOT NULL,
    billable INTEGER NOT NULL DEFAULT 1
);
INSERT INTO company (id, name, industry) VALUES
    (1, 'Acme', 'Manufacturing'),
    (2, 'Globex', 'Energy'),
    (3, 'Initech', 'Software');
INSERT INTO projects (id, company_id, name, budget, status) VALUES
    (1, 1, 'Rollout', 12000.5, 'active'),
    (2, 3, 'Migration', 8000, 'done');
INSERT INTO contacts (id, company_id, full_name, email) VALUES
    (1, 1, 'Ada Byron', 'ada@acme.test');
INSERT INTO timesheets (id, project_id, contact_id, hours, billable) VALUES
    (1, 1, 1, 7.5, 1);
"#;

/// Business schema in a temporary SQLite file, opened read-only through the
/// real connection manager. Keep the `TempDir` alive for the test's duration.
pub async fn seeded_sqlite() -> (TempDir, ConnectionManager) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("business.db");

    let writer = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await
        .unwrap();
    sqlx::raw_sql(SEED_SQL).execute(&writer).await.unwrap();
    writer.close().await;

    let config = ConnectionConfig::new(
        format!("sqlite://{}", path.display()),
        Some("business".to_string()),
        PoolOptions::default(),
    )
    .unwrap();
    let manager = ConnectionManager::connect(config, Duration::from_secs(5))
        .await
        .unwrap();
    (dir, manager)
}
