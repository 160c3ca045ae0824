pub mod cache;
pub mod dedup;
pub mod enricher;
pub mod provider;

pub use cache::{BoundedCache, CacheKey, EnrichmentEntry};
pub use dedup::RecentTokens;
pub use enricher::{EnrichedTerm, EnrichmentError, TermEnricher};
pub use provider::{EnrichmentProvider, HttpEnrichmentProvider};
