//! Bounded comparison cache for the dashboard.
//!
//! Strict least-recently-used cache keyed by normalized query text, so a
//! session of side-by-side comparisons does not re-issue remote searches
//! for queries it has already answered. Capacity-bounded only — entries
//! live until evicted, never expire by time — and scoped to one server
//! process.

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::models::ComparisonEntry;

pub struct ComparisonCache {
    inner: LruCache<String, ComparisonEntry>,
}

impl ComparisonCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Canonical cache key: trimmed, lowercased, inner whitespace collapsed.
    pub fn normalize_query(query: &str) -> String {
        query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Fetch a cached comparison, refreshing its recency.
    pub fn get(&mut self, query: &str) -> Option<&ComparisonEntry> {
        self.inner.get(&Self::normalize_query(query))
    }

    /// Insert or update a comparison. Updating an existing key refreshes
    /// its recency without changing the entry count; inserting a new key at
    /// capacity evicts exactly the least-recently-used other key.
    pub fn put(&mut self, query: &str, entry: ComparisonEntry) {
        self.inner.put(Self::normalize_query(query), entry);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
