//! Detector seam for the analysis pipeline.

use async_trait::async_trait;

use interpmon_stream::Utterance;

use crate::{Category, Finding};

/// A category detector run over every final utterance.
///
/// Detectors are read-only with respect to each other and write only to
/// their own category's findings; the pipeline aggregates results after
/// all detectors complete.
#[async_trait]
pub trait Detector: Send + Sync + 'static {
    /// Human-readable detector name.
    fn name(&self) -> &str;

    /// The single category this detector scores.
    fn category(&self) -> Category;

    /// Scans one final utterance and returns its findings.
    async fn detect(&self, utterance: &Utterance) -> anyhow::Result<Vec<Finding>>;
}
