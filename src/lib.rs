//! SQL agent server library.
//!
//! Answers natural-language questions about a relational business database
//! (SQLite, PostgreSQL, MySQL) by selecting tables, generating SQL with a
//! text-generation model, guarding and executing it, and paraphrasing the rows.

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod llm;
pub mod models;

pub use agent::AgentContext;
pub use config::Config;
pub use error::{AgentError, AgentResult};
