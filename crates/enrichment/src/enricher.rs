//! Term detection and enrichment over final utterances.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use interpmon_config::EnrichmentConfig;
use interpmon_stream::Utterance;

use crate::cache::{BoundedCache, EnrichmentEntry};
use crate::dedup::RecentTokens;
use crate::provider::EnrichmentProvider;

/// Recoverable enrichment errors, surfaced through the orchestrator's
/// standard error path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("enrichment lookup for '{token}' timed out after {timeout_ms} ms")]
    Timeout { token: String, timeout_ms: u64 },
    #[error("enrichment lookup for '{token}' failed: {message}")]
    Lookup { token: String, message: String },
}

/// One enriched term ready for the presentation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedTerm {
    pub token: String,
    pub target_language: String,
    pub entry: EnrichmentEntry,
    /// Timestamp of the utterance the term was detected in.
    pub timestamp_ms: u64,
    pub from_cache: bool,
}

/// Detects configured terms in final utterances and enriches them.
///
/// Driven by a single consumer task; the interior locks exist for
/// `&self` access, not for concurrent callers.
pub struct TermEnricher {
    provider: Arc<dyn EnrichmentProvider>,
    config: EnrichmentConfig,
    /// Configured terms, pre-normalized.
    terms: Vec<String>,
    cache: Mutex<BoundedCache>,
    dedup: Mutex<RecentTokens>,
}

impl TermEnricher {
    pub fn new(provider: Arc<dyn EnrichmentProvider>, config: EnrichmentConfig) -> Self {
        let terms = config.terms.iter().map(|t| normalize(t)).collect();
        Self {
            provider,
            cache: Mutex::new(BoundedCache::new(config.cache_capacity)),
            dedup: Mutex::new(RecentTokens::new(config.dedup_capacity)),
            terms,
            config,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Scans one final utterance, enriching each detected term at most
    /// once per dedup window. Returns emitted terms and any recoverable
    /// lookup errors.
    pub async fn handle_final(
        &self,
        utterance: &Utterance,
    ) -> (Vec<EnrichedTerm>, Vec<EnrichmentError>) {
        let normalized = normalize(&utterance.text);
        let words: Vec<&str> = normalized.split_whitespace().collect();

        let mut emitted = Vec::new();
        let mut errors = Vec::new();

        for term in &self.terms {
            if !contains_phrase(&words, term) {
                continue;
            }
            // Suppress repeats even across cache hits; noisy repeated
            // speech must not spam downstream events.
            if self.dedup.lock().contains(term) {
                debug!(%term, "Term suppressed by dedup window");
                continue;
            }

            let language = self.config.target_language.clone();
            if let Some(entry) = self.cache.lock().get(term, &language).cloned() {
                self.dedup.lock().observe(term);
                emitted.push(EnrichedTerm {
                    token: term.clone(),
                    target_language: language,
                    entry,
                    timestamp_ms: utterance.timestamp_ms,
                    from_cache: true,
                });
                continue;
            }

            match self.lookup(term, &language).await {
                Ok(entry) => {
                    // Recorded only on success, so a transient failure can
                    // be retried on the token's next appearance.
                    self.dedup.lock().observe(term);
                    let evicted = self.cache.lock().put(term, &language, entry.clone());
                    if let Some(key) = evicted {
                        debug!(token = %key.token, "Cache full, evicted oldest entry");
                    }
                    emitted.push(EnrichedTerm {
                        token: term.clone(),
                        target_language: language,
                        entry,
                        timestamp_ms: utterance.timestamp_ms,
                        from_cache: false,
                    });
                }
                Err(e) => {
                    warn!(%term, %e, "Enrichment lookup failed");
                    errors.push(e);
                }
            }
        }

        (emitted, errors)
    }

    /// Runs the three facet lookups in parallel. All must complete for
    /// the result to be cacheable; partial results are discarded so a
    /// transient failure is not permanently poisoned into the cache.
    async fn lookup(&self, token: &str, language: &str) -> Result<EnrichmentEntry, EnrichmentError> {
        let timeout = Duration::from_millis(self.config.lookup_timeout_ms);
        let fanout = async {
            tokio::try_join!(
                self.provider.translate(token, language),
                self.provider.pronounce(token, language),
                self.provider.define(token, language),
            )
        };

        match tokio::time::timeout(timeout, fanout).await {
            Ok(Ok((translation, pronunciation, definition))) => Ok(EnrichmentEntry {
                translation,
                pronunciation,
                definition,
            }),
            Ok(Err(e)) => Err(EnrichmentError::Lookup {
                token: token.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(EnrichmentError::Timeout {
                token: token.to_string(),
                timeout_ms: self.config.lookup_timeout_ms,
            }),
        }
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word containment of a (possibly multi-word) phrase.
fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || words.len() < needle.len() {
        return false;
    }
    words.windows(needle.len()).any(|w| w == needle.as_slice())
}
