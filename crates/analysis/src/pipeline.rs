//! Per-utterance analysis pipeline.
//!
//! Runs all category detectors concurrently over each final utterance,
//! keeps running weighted scores, schedules the periodic deep pass over a
//! sliding window of recent text, and builds the final report on stop.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use interpmon_config::ScoringConfig;
use interpmon_stream::Utterance;

use crate::deep::{DeepAnalyzer, DeepScores};
use crate::detector::Detector;
use crate::report::{Report, ReportMetadata, build_report};
use crate::score::ScoreBoard;
use crate::text::word_count;
use crate::Category;

/// Largest single adjustment the deep pass may apply to one category.
const MAX_DEEP_ADJUSTMENT: f64 = 10.0;

/// Recoverable pipeline errors, reported through the orchestrator's
/// standard error path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("detector '{detector}' failed: {message}")]
    Detector {
        detector: String,
        category: Category,
        message: String,
    },
    #[error("deep analysis failed: {0}")]
    DeepAnalysis(String),
    #[error("deep analysis timed out after {0} ms")]
    DeepTimeout(u64),
}

/// Low-frequency score snapshot for the throttled metrics sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub scores: HashMap<Category, f64>,
    pub overall: f64,
    pub finals_processed: u64,
    pub word_count: u64,
}

struct PipelineState {
    running: bool,
    board: ScoreBoard,
    window: VecDeque<String>,
    finals_seen: u64,
    word_count: u64,
}

pub struct AnalysisPipeline {
    detectors: Vec<Arc<dyn Detector>>,
    deep: Arc<dyn DeepAnalyzer>,
    config: ScoringConfig,
    state: Mutex<PipelineState>,
    /// Bumped on stop; deep-pass results from an older generation are
    /// discarded instead of mutating a finalized report.
    generation: AtomicU64,
    error_tx: mpsc::UnboundedSender<PipelineError>,
}

impl AnalysisPipeline {
    /// Creates the pipeline and the receiver for its asynchronous errors
    /// (deep-pass failures that happen off the fast path).
    pub fn new(
        detectors: Vec<Arc<dyn Detector>>,
        deep: Arc<dyn DeepAnalyzer>,
        config: ScoringConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PipelineError>) {
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let pipeline = Arc::new(Self {
            detectors,
            deep,
            config,
            state: Mutex::new(PipelineState {
                running: false,
                board: ScoreBoard::new(),
                window: VecDeque::new(),
                finals_seen: 0,
                word_count: 0,
            }),
            generation: AtomicU64::new(0),
            error_tx,
        });
        (pipeline, error_rx)
    }

    /// Resets state and starts accepting utterances.
    pub fn start(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.board.reset();
        state.window.clear();
        state.finals_seen = 0;
        state.word_count = 0;
        info!(
            detectors = self.detectors.len(),
            deep = %self.deep.name(),
            "Analysis pipeline started"
        );
    }

    /// Runs all detectors over one final utterance and returns the
    /// updated score snapshot. Returns `None` when the pipeline is not
    /// running.
    pub async fn process_final(self: &Arc<Self>, utterance: &Utterance) -> Option<MetricsSnapshot> {
        if !self.state.lock().running {
            debug!("Pipeline not running, ignoring utterance");
            return None;
        }

        // Detectors are side-effect-isolated; run them concurrently and
        // aggregate under one lock afterwards.
        let detections = join_all(self.detectors.iter().map(|detector| {
            let detector = Arc::clone(detector);
            async move {
                let result = detector.detect(utterance).await;
                (detector.name().to_string(), detector.category(), result)
            }
        }))
        .await;

        let (snapshot, deep_window) = {
            let mut state = self.state.lock();
            for (name, category, result) in detections {
                match result {
                    Ok(findings) => {
                        for finding in findings {
                            state.board.apply(finding);
                        }
                    }
                    // One failing detector leaves its category unscored
                    // for this utterance; the others still count.
                    Err(e) => {
                        warn!(detector = %name, %category, %e, "Detector failed");
                        let _ = self.error_tx.send(PipelineError::Detector {
                            detector: name,
                            category,
                            message: e.to_string(),
                        });
                    }
                }
            }

            state.word_count += word_count(&utterance.text);
            state.window.push_back(utterance.text.clone());
            while state.window.len() > self.config.window_size {
                state.window.pop_front();
            }
            state.finals_seen += 1;

            let deep_due = state.finals_seen % self.config.deep_every == 0;
            let window = deep_due
                .then(|| state.window.iter().cloned().collect::<Vec<_>>());

            let snapshot = MetricsSnapshot {
                scores: state.board.snapshot(),
                overall: state.board.overall(&self.config.weights),
                finals_processed: state.finals_seen,
                word_count: state.word_count,
            };
            (snapshot, window)
        };

        if let Some(window) = deep_window {
            self.spawn_deep_pass(window);
        }
        Some(snapshot)
    }

    /// Fires one deep-analysis call without blocking the fast path.
    fn spawn_deep_pass(self: &Arc<Self>, window: Vec<String>) {
        let pipeline = Arc::clone(self);
        let generation = self.generation.load(Ordering::SeqCst);
        let timeout_ms = self.config.deep_timeout_ms;
        debug!(utterances = window.len(), "Scheduling deep-analysis pass");

        tokio::spawn(async move {
            let deep = Arc::clone(&pipeline.deep);
            match tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                deep.analyze(&window),
            )
            .await
            {
                Ok(Ok(scores)) => pipeline.apply_deep(generation, scores),
                Ok(Err(e)) => {
                    warn!(%e, "Deep analysis failed");
                    let _ = pipeline
                        .error_tx
                        .send(PipelineError::DeepAnalysis(e.to_string()));
                }
                Err(_) => {
                    warn!(timeout_ms, "Deep analysis timed out");
                    let _ = pipeline.error_tx.send(PipelineError::DeepTimeout(timeout_ms));
                }
            }
        });
    }

    fn apply_deep(&self, generation: u64, scores: DeepScores) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding late deep-analysis result");
            return;
        }
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        for (name, delta) in scores.adjustments {
            match Category::consistency_from_name(&name) {
                Some(category) => {
                    let delta = delta.clamp(-MAX_DEEP_ADJUSTMENT, MAX_DEEP_ADJUSTMENT);
                    debug!(%category, delta, "Applying deep-analysis adjustment");
                    state.board.adjust(category, delta);
                }
                None => debug!(score = %name, "Ignoring unknown deep-analysis score"),
            }
        }
        for observation in &scores.observations {
            debug!(%observation, "Deep-analysis observation");
        }
    }

    /// Finalizes scoring and builds the report.
    ///
    /// `duration_secs` is the session duration measured by the caller;
    /// the WPM band comes from session configuration.
    pub fn stop(&self, duration_secs: f64, target_wpm: (f64, f64)) -> Report {
        // Late deep-pass results must not touch the finalized board.
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.running = false;

        let words_per_minute = if duration_secs > 0.0 {
            state.word_count as f64 / (duration_secs / 60.0)
        } else {
            0.0
        };
        let metadata = ReportMetadata {
            duration_secs,
            word_count: state.word_count,
            words_per_minute,
            target_wpm_min: target_wpm.0,
            target_wpm_max: target_wpm.1,
        };

        let report = build_report(
            &state.board,
            &self.config.weights,
            metadata,
            self.config.max_suggestions,
        );
        info!(
            overall = report.overall,
            findings = report.findings.len(),
            "Analysis pipeline stopped"
        );
        report
    }
}
