//! Running category scores and recorded findings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use interpmon_config::CategoryWeights;

use crate::Category;

/// One detected issue, recorded against its category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    /// The matched span of text.
    pub span: String,
    /// Category-specific detail (the rule message).
    pub detail: String,
    /// Timestamp of the originating utterance, in milliseconds.
    pub timestamp_ms: u64,
    /// Score adjustment applied for this finding (negative = deduction).
    pub delta: f64,
}

impl Finding {
    /// Ranking key for suggestions: larger deductions are more severe.
    pub fn severity(&self) -> f64 {
        self.delta.abs()
    }
}

/// A named rubric category with a running score in [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub score: f64,
    pub findings: Vec<Finding>,
}

impl CategoryScore {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            score: 100.0,
            findings: Vec::new(),
        }
    }

    /// Records a finding and applies its delta, clamped to [0, 100].
    pub fn apply(&mut self, finding: Finding) {
        self.score = (self.score + finding.delta).clamp(0.0, 100.0);
        self.findings.push(finding);
    }

    /// Adjusts the score without recording a finding (deep pass).
    pub fn adjust(&mut self, delta: f64) {
        self.score = (self.score + delta).clamp(0.0, 100.0);
    }

    /// Clears score and findings. Test/reuse only; scores are never reset
    /// mid-session.
    pub fn reset(&mut self) {
        self.score = 100.0;
        self.findings.clear();
    }
}

/// All category scores for one session.
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    scores: HashMap<Category, CategoryScore>,
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreBoard {
    pub fn new() -> Self {
        let scores = Category::ALL
            .iter()
            .map(|c| (*c, CategoryScore::new(*c)))
            .collect();
        Self { scores }
    }

    pub fn apply(&mut self, finding: Finding) {
        if let Some(score) = self.scores.get_mut(&finding.category) {
            score.apply(finding);
        }
    }

    pub fn adjust(&mut self, category: Category, delta: f64) {
        if let Some(score) = self.scores.get_mut(&category) {
            score.adjust(delta);
        }
    }

    pub fn get(&self, category: Category) -> &CategoryScore {
        // All categories are seeded in `new`.
        &self.scores[&category]
    }

    /// Weighted overall score.
    pub fn overall(&self, weights: &CategoryWeights) -> f64 {
        Category::ALL
            .iter()
            .map(|c| self.get(*c).score * c.weight(weights))
            .sum()
    }

    /// Current score per category.
    pub fn snapshot(&self) -> HashMap<Category, f64> {
        self.scores.iter().map(|(c, s)| (*c, s.score)).collect()
    }

    /// All findings across categories, in category order.
    pub fn all_findings(&self) -> Vec<Finding> {
        Category::ALL
            .iter()
            .flat_map(|c| self.get(*c).findings.iter().cloned())
            .collect()
    }

    pub fn reset(&mut self) {
        for score in self.scores.values_mut() {
            score.reset();
        }
    }
}
