//! Final session report assembly.

use serde::{Deserialize, Serialize};

use interpmon_config::CategoryWeights;

use crate::score::{Finding, ScoreBoard};
use crate::Category;

/// Categories at or above this score count as strengths.
const STRENGTH_THRESHOLD: f64 = 90.0;
/// Categories below this score count as improvement areas.
const IMPROVEMENT_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: Category,
    pub score: f64,
    pub weight: f64,
    pub findings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub severity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub duration_secs: f64,
    pub word_count: u64,
    pub words_per_minute: f64,
    pub target_wpm_min: f64,
    pub target_wpm_max: f64,
}

/// Aggregated quality report produced when a session stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub overall: f64,
    pub metadata: ReportMetadata,
    pub categories: Vec<CategoryReport>,
    pub findings: Vec<Finding>,
    /// Ranked highest severity first.
    pub suggestions: Vec<Suggestion>,
    /// Categories scoring >= 90.
    pub strengths: Vec<Category>,
    /// Categories scoring < 80, ascending by score.
    pub improvement_areas: Vec<CategoryReport>,
}

/// Builds the final report from the score board.
pub fn build_report(
    board: &ScoreBoard,
    weights: &CategoryWeights,
    metadata: ReportMetadata,
    max_suggestions: usize,
) -> Report {
    let categories: Vec<CategoryReport> = Category::ALL
        .iter()
        .map(|c| {
            let score = board.get(*c);
            CategoryReport {
                category: *c,
                score: score.score,
                weight: c.weight(weights),
                findings: score.findings.len(),
            }
        })
        .collect();

    let strengths: Vec<Category> = categories
        .iter()
        .filter(|c| c.score >= STRENGTH_THRESHOLD)
        .map(|c| c.category)
        .collect();

    let mut improvement_areas: Vec<CategoryReport> = categories
        .iter()
        .filter(|c| c.score < IMPROVEMENT_THRESHOLD)
        .cloned()
        .collect();
    improvement_areas.sort_by(|a, b| a.score.total_cmp(&b.score));

    let findings = board.all_findings();
    let suggestions = rank_suggestions(&findings, max_suggestions);

    Report {
        overall: board.overall(weights),
        metadata,
        categories,
        findings,
        suggestions,
        strengths,
        improvement_areas,
    }
}

/// Ranks distinct finding types by severity, one suggestion per rule.
fn rank_suggestions(findings: &[Finding], max: usize) -> Vec<Suggestion> {
    let mut ranked: Vec<&Finding> = findings.iter().collect();
    ranked.sort_by(|a, b| b.severity().total_cmp(&a.severity()));

    let mut seen = Vec::new();
    let mut suggestions = Vec::new();
    for finding in ranked {
        if seen.contains(&&finding.detail) {
            continue;
        }
        seen.push(&finding.detail);
        suggestions.push(Suggestion {
            text: format!("{} — e.g. \"{}\"", finding.detail, finding.span),
            severity: finding.severity(),
        });
        if suggestions.len() >= max {
            break;
        }
    }
    suggestions
}
