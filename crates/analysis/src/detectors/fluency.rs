//! Filler-word detector for the fluency category.

use async_trait::async_trait;

use interpmon_config::ScoringRule;
use interpmon_stream::Utterance;

use crate::text::{count_phrase, normalize_text};
use crate::{Category, Detector, Finding};

/// Flags configured filler words/phrases; one finding per occurrence.
pub struct FluencyDetector {
    rules: Vec<ScoringRule>,
}

impl FluencyDetector {
    pub fn new(rules: &[ScoringRule]) -> Self {
        Self {
            rules: rules.to_vec(),
        }
    }
}

#[async_trait]
impl Detector for FluencyDetector {
    fn name(&self) -> &str {
        "fluency"
    }

    fn category(&self) -> Category {
        Category::Fluency
    }

    async fn detect(&self, utterance: &Utterance) -> anyhow::Result<Vec<Finding>> {
        let normalized = normalize_text(&utterance.text);
        let mut findings = Vec::new();
        for rule in &self.rules {
            let hits = count_phrase(&normalized, &rule.pattern);
            for _ in 0..hits {
                findings.push(Finding {
                    category: Category::Fluency,
                    span: rule.pattern.clone(),
                    detail: rule.message.clone(),
                    timestamp_ms: utterance.timestamp_ms,
                    delta: rule.delta,
                });
            }
        }
        Ok(findings)
    }
}
