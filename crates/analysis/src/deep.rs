//! Deep-analysis collaborator seam.
//!
//! A higher-latency, lower-frequency pass over a rolling window of recent
//! text. The collaborator returns a bounded JSON object of named score
//! adjustments; anything not matching that shape is a no-op, never an
//! error that halts scoring.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed instruction sent with every deep-analysis request.
const DEEP_INSTRUCTION: &str = "Assess terminology consistency and coherence of the \
following consecutive interpretation segments. Respond with a JSON object: \
{\"adjustments\": {\"terminology_consistency\": <delta>, \"coherence\": <delta>}, \
\"observations\": [<string>, ...]}. Deltas are score adjustments in [-10, 10].";

/// Parsed deep-analysis response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepScores {
    /// Score-name to delta; unknown names are ignored by the pipeline.
    #[serde(default)]
    pub adjustments: HashMap<String, f64>,
    #[serde(default)]
    pub observations: Vec<String>,
}

#[async_trait]
pub trait DeepAnalyzer: Send + Sync + 'static {
    /// Analyzes the recent-utterance window. Implementations must treat
    /// unparseable responses as an empty result, not an error.
    async fn analyze(&self, window: &[String]) -> anyhow::Result<DeepScores>;

    /// Human-readable analyzer name.
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct DeepRequest<'a> {
    instruction: &'static str,
    utterances: &'a [String],
}

/// HTTP deep analyzer posting the window to an LLM-style endpoint.
pub struct HttpDeepAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDeepAnalyzer {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl DeepAnalyzer for HttpDeepAnalyzer {
    async fn analyze(&self, window: &[String]) -> anyhow::Result<DeepScores> {
        let request = DeepRequest {
            instruction: DEEP_INSTRUCTION,
            utterances: window,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        match serde_json::from_str::<DeepScores>(&body) {
            Ok(scores) => Ok(scores),
            Err(e) => {
                debug!(%e, "Deep-analysis response not in expected shape, treating as no-op");
                Ok(DeepScores::default())
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
