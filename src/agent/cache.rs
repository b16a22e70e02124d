//! TTL cache of query results, keyed by the literal SQL text.
//!
//! Entries expire a fixed time after insertion, independent of access. Expiry is
//! checked lazily on read. When the cache grows past its capacity the oldest-inserted
//! entry is dropped.

use crate::models::JsonRow;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Cache key for a statement. Two statements share a key only if their text is identical.
pub fn cache_key(sql: &str) -> String {
    URL_SAFE_NO_PAD.encode(sql.as_bytes())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Vec<JsonRow>,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order
    order: VecDeque<String>,
    ttl: Duration,
    max_entries: usize,
}

impl QueryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Rows for `sql` if present and younger than the TTL. Expired entries are removed.
    pub fn get(&mut self, sql: &str) -> Option<Vec<JsonRow>> {
        let key = cache_key(sql);
        let fresh = self
            .entries
            .get(&key)
            .map(|entry| entry.inserted_at.elapsed() < self.ttl)?;
        if fresh {
            self.entries.get(&key).map(|entry| entry.rows.clone())
        } else {
            self.remove(&key);
            None
        }
    }

    pub fn insert(&mut self, sql: &str, rows: Vec<JsonRow>) {
        let key = cache_key(sql);
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        self.entries.insert(
            key.clone(),
            CacheEntry {
                rows,
                inserted_at: Instant::now(),
            },
        );
        self.order.push_back(key);

        if self.entries.len() > self.max_entries {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    /// Drop every entry and return how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        count
    }

    pub fn contains(&self, sql: &str) -> bool {
        self.entries.contains_key(&cache_key(sql))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
