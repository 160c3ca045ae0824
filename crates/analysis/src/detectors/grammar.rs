//! Pattern-rule detector for the grammar category.

use async_trait::async_trait;
use regex::Regex;

use interpmon_config::ScoringRule;
use interpmon_stream::Utterance;

use crate::{Category, Detector, Finding};

/// Matches configured regex patterns against the lowercased utterance.
pub struct GrammarDetector {
    rules: Vec<(Regex, ScoringRule)>,
}

impl GrammarDetector {
    /// Compiles the configured patterns; an invalid pattern is a
    /// configuration error, surfaced at construction rather than per
    /// utterance.
    pub fn new(rules: &[ScoringRule]) -> anyhow::Result<Self> {
        let compiled = rules
            .iter()
            .map(|rule| Ok((Regex::new(&rule.pattern)?, rule.clone())))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules: compiled })
    }
}

#[async_trait]
impl Detector for GrammarDetector {
    fn name(&self) -> &str {
        "grammar"
    }

    fn category(&self) -> Category {
        Category::Grammar
    }

    async fn detect(&self, utterance: &Utterance) -> anyhow::Result<Vec<Finding>> {
        let lowered = utterance.text.to_lowercase();
        let mut findings = Vec::new();
        for (regex, rule) in &self.rules {
            for matched in regex.find_iter(&lowered) {
                findings.push(Finding {
                    category: Category::Grammar,
                    span: matched.as_str().to_string(),
                    detail: rule.message.clone(),
                    timestamp_ms: utterance.timestamp_ms,
                    delta: rule.delta,
                });
            }
        }
        Ok(findings)
    }
}
