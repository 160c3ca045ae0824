pub mod deep;
pub mod detector;
pub mod detectors;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod text;

pub use deep::{DeepAnalyzer, DeepScores, HttpDeepAnalyzer};
pub use detector::Detector;
pub use pipeline::{AnalysisPipeline, MetricsSnapshot, PipelineError};
pub use report::{CategoryReport, Report, ReportMetadata, Suggestion};
pub use score::{CategoryScore, Finding, ScoreBoard};

use serde::{Deserialize, Serialize};

/// Rubric categories scored during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fluency,
    Grammar,
    ProfessionalConduct,
    TerminologyConsistency,
    Coherence,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Fluency,
        Category::Grammar,
        Category::ProfessionalConduct,
        Category::TerminologyConsistency,
        Category::Coherence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fluency => "fluency",
            Category::Grammar => "grammar",
            Category::ProfessionalConduct => "professional_conduct",
            Category::TerminologyConsistency => "terminology_consistency",
            Category::Coherence => "coherence",
        }
    }

    /// Weight of this category in the overall score.
    pub fn weight(&self, weights: &interpmon_config::CategoryWeights) -> f64 {
        match self {
            Category::Fluency => weights.fluency,
            Category::Grammar => weights.grammar,
            Category::ProfessionalConduct => weights.professional_conduct,
            Category::TerminologyConsistency => weights.terminology_consistency,
            Category::Coherence => weights.coherence,
        }
    }

    /// Maps a deep-analysis score name onto a consistency category.
    ///
    /// Only consistency categories may be adjusted by the deep pass; the
    /// fast per-utterance detectors own the rest.
    pub fn consistency_from_name(name: &str) -> Option<Category> {
        match name {
            "terminology_consistency" => Some(Category::TerminologyConsistency),
            "coherence" => Some(Category::Coherence),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
