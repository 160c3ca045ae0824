//! Configuration for the interpretation monitor.
//!
//! All tunables live in explicit structs validated once at load time.
//! Values come from defaults, an optional `interpmon.toml`, and
//! `INTERPMON__*` environment variables (double underscore separates
//! nesting levels, e.g. `INTERPMON__STREAM__BUFFER_CAPACITY=200`).

use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Tolerance when checking that category weights sum to 1.0.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("category weights must sum to 1.0, got {0}")]
    WeightSum(f64),
}

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub stream: StreamConfig,
    #[validate(nested)]
    pub session: SessionConfig,
    #[validate(nested)]
    pub scoring: ScoringConfig,
    #[validate(nested)]
    pub enrichment: EnrichmentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            session: SessionConfig::default(),
            scoring: ScoringConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from defaults, `interpmon.toml` (optional) and
    /// `INTERPMON__*` env overrides, then validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(config::File::with_name("interpmon").required(false))
            .add_source(
                config::Environment::with_prefix("INTERPMON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Missing sections fall back to defaults via #[serde(default)].
        let app: AppConfig = cfg.try_deserialize()?;
        app.validate_all()?;
        info!(
            endpoint = %app.stream.endpoint,
            target_language = %app.enrichment.target_language,
            "Configuration loaded"
        );
        Ok(app)
    }

    /// Validates every section plus the cross-field weight-sum rule.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate()?;
        let sum = self.scoring.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Connection, buffering and reconnect parameters for the stream channel.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket endpoint of the recognition source.
    #[validate(length(min = 1))]
    pub endpoint: String,
    /// Source language sent in the session configuration frame.
    pub language: String,
    /// Audio encoding tag sent in the session configuration frame.
    pub encoding: String,
    /// Sample rate in Hz sent in the session configuration frame.
    #[validate(range(min = 8000, max = 48000))]
    pub sample_rate: u32,
    /// Whether the source should emit interim (non-final) results.
    pub interim_results: bool,
    /// Max chunks buffered while reconnecting; oldest dropped when full.
    #[validate(range(min = 1))]
    pub buffer_capacity: usize,
    /// Reconnect attempts before the channel gives up.
    #[validate(range(min = 1))]
    pub max_reconnect_attempts: u32,
    /// Base reconnect delay in milliseconds.
    #[validate(range(min = 1))]
    pub base_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    #[validate(range(min = 1))]
    pub max_delay_ms: u64,
    /// Jitter factor applied symmetrically to the reconnect delay.
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://localhost:8443/recognize".to_string(),
            language: "en-US".to_string(),
            encoding: "pcm16".to_string(),
            sample_rate: 16000,
            interim_results: true,
            buffer_capacity: 100,
            max_reconnect_attempts: 10,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: 0.2,
        }
    }
}

/// Orchestrator-level parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum interval between metrics-update emissions, in milliseconds.
    #[validate(range(min = 1))]
    pub metrics_interval_ms: u64,
    /// Lower bound of the target speaking pace band (words per minute).
    #[validate(range(min = 1.0))]
    pub target_wpm_min: f64,
    /// Upper bound of the target speaking pace band (words per minute).
    #[validate(range(min = 1.0))]
    pub target_wpm_max: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            metrics_interval_ms: 2000,
            target_wpm_min: 100.0,
            target_wpm_max: 160.0,
        }
    }
}

/// Per-category weights for the overall score. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub fluency: f64,
    pub grammar: f64,
    pub professional_conduct: f64,
    pub terminology_consistency: f64,
    pub coherence: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            fluency: 0.25,
            grammar: 0.25,
            professional_conduct: 0.20,
            terminology_consistency: 0.15,
            coherence: 0.15,
        }
    }
}

impl CategoryWeights {
    pub fn sum(&self) -> f64 {
        self.fluency
            + self.grammar
            + self.professional_conduct
            + self.terminology_consistency
            + self.coherence
    }
}

/// A single rule matched against utterance text.
///
/// `pattern` is a regex for grammar rules and a literal (word or phrase)
/// for filler/protocol rules. `delta` is the score adjustment applied per
/// match — negative for deductions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRule {
    pub pattern: String,
    pub message: String,
    pub delta: f64,
}

impl ScoringRule {
    pub fn new(pattern: &str, message: &str, delta: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            message: message.to_string(),
            delta,
        }
    }
}

/// Detector rule sets, weights and deep-pass scheduling.
///
/// Rule lists are configuration, not architecture: the defaults below are
/// a small starter set, expected to be replaced per deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: CategoryWeights,
    /// Filler words deducted by the fluency detector.
    pub filler_rules: Vec<ScoringRule>,
    /// Regex patterns deducted by the grammar detector.
    pub grammar_rules: Vec<ScoringRule>,
    /// Protocol phrases deducted by the professional-conduct detector.
    pub conduct_rules: Vec<ScoringRule>,
    /// Sliding window size (utterances) kept for the deep pass.
    #[validate(range(min = 1))]
    pub window_size: usize,
    /// Every Kth final utterance triggers one deep-analysis call.
    #[validate(range(min = 1))]
    pub deep_every: u64,
    /// Timeout for one deep-analysis call, in milliseconds.
    #[validate(range(min = 1))]
    pub deep_timeout_ms: u64,
    /// Max suggestions included in the final report.
    #[validate(range(min = 1))]
    pub max_suggestions: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            filler_rules: vec![
                ScoringRule::new("um", "Filler word", -1.0),
                ScoringRule::new("uh", "Filler word", -1.0),
                ScoringRule::new("eh", "Filler word", -0.5),
                ScoringRule::new("you know", "Filler phrase", -2.0),
            ],
            grammar_rules: vec![
                ScoringRule::new(
                    r"\b(he|she|it) (don't|have|were)\b",
                    "Subject-verb agreement",
                    -3.0,
                ),
                ScoringRule::new(r"\bmore \w+er\b", "Double comparative", -2.0),
                ScoringRule::new(r"\b(a|an) \w+s\b", "Article with plural noun", -2.0),
            ],
            conduct_rules: vec![
                ScoringRule::new("he says that", "Third-person rendering", -5.0),
                ScoringRule::new("she says that", "Third-person rendering", -5.0),
                ScoringRule::new("the speaker said", "Third-person rendering", -7.0),
                ScoringRule::new("i will summarize", "Unauthorized summarization", -10.0),
            ],
            window_size: 10,
            deep_every: 10,
            deep_timeout_ms: 8000,
            max_suggestions: 5,
        }
    }
}

/// Enrichment cache sizing and term detection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Max cached `(token, language)` entries; earliest-inserted evicted.
    #[validate(range(min = 1))]
    pub cache_capacity: usize,
    /// Distinct recent tokens suppressed from re-enrichment.
    #[validate(range(min = 1))]
    pub dedup_capacity: usize,
    /// Timeout for one full lookup fan-out, in milliseconds.
    #[validate(range(min = 1))]
    pub lookup_timeout_ms: u64,
    /// Target language for translation/pronunciation/definition lookups.
    #[validate(length(min = 1))]
    pub target_language: String,
    /// Terms worth enriching when they appear in a final utterance.
    pub terms: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 500,
            dedup_capacity: 100,
            lookup_timeout_ms: 3000,
            target_language: "es".to_string(),
            terms: vec![
                "arbitration".to_string(),
                "jurisdiction".to_string(),
                "liability".to_string(),
                "compliance".to_string(),
                "stakeholder".to_string(),
                "due diligence".to_string(),
            ],
        }
    }
}
