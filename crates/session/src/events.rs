//! Session event model and the presentation sink seam.
//!
//! Every event carries the session id and a wall-clock timestamp so
//! sinks can render or persist them without extra context.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use interpmon_analysis::MetricsSnapshot;
use interpmon_enrichment::EnrichedTerm;
use interpmon_stream::Utterance;

use crate::record::SessionRecord;

/// Markers that make an error terminal regardless of its source.
/// Matched case-insensitively against the error message.
pub const FATAL_MARKERS: [&str; 4] = ["authentication", "unauthorized", "permission", "quota"];

/// Where an error originated inside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Channel,
    Pipeline,
    Enrichment,
    Orchestrator,
}

impl std::fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorSource::Channel => "channel",
            ErrorSource::Pipeline => "pipeline",
            ErrorSource::Enrichment => "enrichment",
            ErrorSource::Orchestrator => "orchestrator",
        };
        f.write_str(name)
    }
}

/// Uniform error shape surfaced to sinks, regardless of which subsystem
/// produced the underlying error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub source: ErrorSource,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    /// `false` means the session cannot continue.
    pub recoverable: bool,
}

impl ErrorEnvelope {
    /// Wraps a subsystem error. `subsystem_recoverable` is the source's
    /// own verdict; a fatal marker in the message overrides it.
    pub fn new(
        source: ErrorSource,
        session_id: Uuid,
        message: String,
        subsystem_recoverable: bool,
    ) -> Self {
        let recoverable = subsystem_recoverable && !message_is_fatal(&message);
        Self {
            source,
            message,
            timestamp: Utc::now(),
            session_id,
            recoverable,
        }
    }
}

/// Whether an error message carries one of the terminal markers.
pub fn message_is_fatal(message: &str) -> bool {
    let lower = message.to_lowercase();
    FATAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Everything a session emits, in a single serializable stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        platform: String,
    },
    /// Every utterance, interim and final, unthrottled.
    Utterance {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        utterance: Utterance,
    },
    TermEnriched {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        term: EnrichedTerm,
    },
    /// Throttled score snapshot.
    MetricsUpdate {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        metrics: MetricsSnapshot,
    },
    Error {
        #[serde(flatten)]
        envelope: ErrorEnvelope,
    },
    SessionComplete {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        record: SessionRecord,
    },
}

/// Presentation-side consumer of session events.
///
/// All methods default to no-ops so a sink only implements the events it
/// cares about. Sinks must not block; slow consumers should hand off to
/// their own queue.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn on_session_started(&self, _session_id: Uuid, _platform: &str) {}

    async fn on_utterance(&self, _session_id: Uuid, _utterance: &Utterance) {}

    async fn on_term_enriched(&self, _session_id: Uuid, _term: &EnrichedTerm) {}

    async fn on_metrics(&self, _session_id: Uuid, _metrics: &MetricsSnapshot) {}

    async fn on_error(&self, _envelope: &ErrorEnvelope) {}

    async fn on_session_complete(&self, _record: &SessionRecord) {}
}

/// Fans one event out to every sink, dispatching to the matching method.
pub async fn dispatch(sinks: &[Arc<dyn EventSink>], event: &SessionEvent) {
    for sink in sinks {
        match event {
            SessionEvent::SessionStarted {
                session_id,
                platform,
                ..
            } => sink.on_session_started(*session_id, platform).await,
            SessionEvent::Utterance {
                session_id,
                utterance,
                ..
            } => sink.on_utterance(*session_id, utterance).await,
            SessionEvent::TermEnriched {
                session_id, term, ..
            } => sink.on_term_enriched(*session_id, term).await,
            SessionEvent::MetricsUpdate {
                session_id,
                metrics,
                ..
            } => sink.on_metrics(*session_id, metrics).await,
            SessionEvent::Error { envelope } => sink.on_error(envelope).await,
            SessionEvent::SessionComplete { record, .. } => {
                sink.on_session_complete(record).await
            }
        }
    }
}
