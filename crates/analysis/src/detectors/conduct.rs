//! Protocol-phrase detector for the professional-conduct category.
//!
//! Interpreters render in first person; configured phrases catch
//! third-person reporting and other protocol violations.

use async_trait::async_trait;

use interpmon_config::ScoringRule;
use interpmon_stream::Utterance;

use crate::text::{count_phrase, normalize_text};
use crate::{Category, Detector, Finding};

pub struct ConductDetector {
    rules: Vec<ScoringRule>,
}

impl ConductDetector {
    pub fn new(rules: &[ScoringRule]) -> Self {
        Self {
            rules: rules.to_vec(),
        }
    }
}

#[async_trait]
impl Detector for ConductDetector {
    fn name(&self) -> &str {
        "professional_conduct"
    }

    fn category(&self) -> Category {
        Category::ProfessionalConduct
    }

    async fn detect(&self, utterance: &Utterance) -> anyhow::Result<Vec<Finding>> {
        let normalized = normalize_text(&utterance.text);
        let mut findings = Vec::new();
        for rule in &self.rules {
            let hits = count_phrase(&normalized, &rule.pattern);
            for _ in 0..hits {
                findings.push(Finding {
                    category: Category::ProfessionalConduct,
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
