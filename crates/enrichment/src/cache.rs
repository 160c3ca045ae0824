//! Bounded enrichment cache.
//!
//! Fixed-capacity associative structure: a `HashMap` for O(1) lookup plus
//! a `VecDeque` key ring for O(1) eviction. Eviction is FIFO — the
//! earliest-inserted key goes first, and a `get` does NOT refresh an
//! entry's position.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub token: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(token: &str, language: &str) -> Self {
        Self {
            token: token.to_string(),
            language: language.to_string(),
        }
    }
}

/// Derived data attached to one enriched token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentEntry {
    pub translation: String,
    pub pronunciation: String,
    pub definition: String,
}

pub struct BoundedCache {
    capacity: usize,
    entries: HashMap<CacheKey, EnrichmentEntry>,
    order: VecDeque<CacheKey>,
}

impl BoundedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, token: &str, language: &str) -> Option<&EnrichmentEntry> {
        self.entries.get(&CacheKey::new(token, language))
    }

    /// Inserts an entry, returning the evicted key when the bound was
    /// exceeded. Re-inserting an existing key replaces the value without
    /// touching its ring position.
    pub fn put(&mut self, token: &str, language: &str, entry: EnrichmentEntry) -> Option<CacheKey> {
        let key = CacheKey::new(token, language);
        if self.entries.insert(key.clone(), entry).is_some() {
            return None;
        }
        self.order.push_back(key);

        if self.order.len() > self.capacity {
            // Non-empty by the check above.
            let evicted = self.order.pop_front()?;
            self.entries.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
