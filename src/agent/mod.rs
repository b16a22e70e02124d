//! Natural-language question answering over the business schema.
//!
//! question -> selector -> synthesizer -> guard -> execution -> composer

pub mod cache;
pub mod catalog;
pub mod categories;
pub mod composer;
pub mod execution;
pub mod guard;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod selector;
pub mod synthesizer;

pub use cache::QueryCache;
pub use catalog::SchemaCatalog;
pub use categories::{CategoryDefinition, CategoryMap, GENERAL_CATEGORY};
pub use execution::{AnalyticsSnapshot, ExecutionLayer, ExecutionSettings};
pub use history::{QueryHistory, QueryHistoryRecord};
pub use metrics::Metrics;
pub use pipeline::{AgentAnswer, AgentContext};
pub use retry::RetryPolicy;
pub use selector::{CategorySelection, KeywordScorer, SelectionSource, TableScorer, TableSelector};
pub use synthesizer::QuerySynthesizer;
