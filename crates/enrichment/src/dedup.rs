//! Short-window suppression of repeated enrichment requests.

use std::collections::{HashSet, VecDeque};

/// Remembers the last N distinct tokens so noisy repeated speech does not
/// re-emit enrichment events, even on cache hits.
pub struct RecentTokens {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl RecentTokens {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Whether the token is in the recent window.
    pub fn contains(&self, token: &str) -> bool {
        self.seen.contains(token)
    }

    /// Records a token. Returns `true` when the token was not in the
    /// recent window, `false` when it was already present.
    pub fn observe(&mut self, token: &str) -> bool {
        if self.seen.contains(token) {
            return false;
        }
        self.seen.insert(token.to_string());
        self.order.push_back(token.to_string());
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
