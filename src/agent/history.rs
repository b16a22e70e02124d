//! Bounded log of executed queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Characters of query text kept per record.
pub const MAX_RECORDED_QUERY_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryHistoryRecord {
    pub fn new(
        query: &str,
        success: bool,
        execution_time_ms: u64,
        row_count: usize,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.chars().take(MAX_RECORDED_QUERY_CHARS).collect(),
            success,
            execution_time_ms,
            row_count,
            error,
        }
    }
}

#[derive(Debug)]
pub struct QueryHistory {
    records: VecDeque<QueryHistoryRecord>,
    capacity: usize,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, dropping the oldest when full.
    pub fn push(&mut self, record: QueryHistoryRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<QueryHistoryRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_truncated_by_chars() {
        let long = "é".repeat(300);
        let record = QueryHistoryRecord::new(&long, true, 1, 0, None);
        assert_eq!(record.query.chars().count(), MAX_RECORDED_QUERY_CHARS);
    }

    #[test]
    fn test_bounded_and_recent() {
        let mut history = QueryHistory::new(3);
        for i in 0..5 {
            history.push(QueryHistoryRecord::new(&format!("SELECT {}", i), true, 1, 1, None));
        }
        assert_eq!(history.len(), 3);
        let recent = history.recent(2);
        assert_eq!(recent[0].query, "SELECT 3");
        assert_eq!(recent[1].query, "SELECT 4");
        assert_eq!(history.recent(10).len(), 3);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = QueryHistoryRecord::new("SELECT 1", false, 7, 0, Some("boom".into()));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["executionTimeMs"], 7);
        assert_eq!(value["error"], "boom");
    }
}
