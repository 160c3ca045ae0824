//! Event sink that records everything it sees.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use interpmon_analysis::MetricsSnapshot;
use interpmon_enrichment::EnrichedTerm;
use interpmon_session::{ErrorEnvelope, EventSink, SessionRecord};
use interpmon_stream::Utterance;

#[derive(Clone)]
pub enum Recorded {
    Started { platform: String },
    Utterance(Utterance),
    Term(EnrichedTerm),
    Metrics(MetricsSnapshot),
    Error(ErrorEnvelope),
    Complete(SessionRecord),
}

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Recorded>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Utterance(u) => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn enriched_terms(&self) -> Vec<EnrichedTerm> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Term(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn metrics_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Recorded::Metrics(_)))
            .count()
    }

    pub fn errors(&self) -> Vec<ErrorEnvelope> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Error(envelope) => Some(envelope),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> Option<SessionRecord> {
        self.events().into_iter().rev().find_map(|e| match e {
            Recorded::Complete(record) => Some(record),
            _ => None,
        })
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn on_session_started(&self, _session_id: Uuid, platform: &str) {
        self.events.lock().push(Recorded::Started {
            platform: platform.to_string(),
        });
    }

    async fn on_utterance(&self, _session_id: Uuid, utterance: &Utterance) {
        self.events.lock().push(Recorded::Utterance(utterance.clone()));
    }

    async fn on_term_enriched(&self, _session_id: Uuid, term: &EnrichedTerm) {
        self.events.lock().push(Recorded::Term(term.clone()));
    }

    async fn on_metrics(&self, _session_id: Uuid, metrics: &MetricsSnapshot) {
        self.events.lock().push(Recorded::Metrics(metrics.clone()));
    }

    async fn on_error(&self, envelope: &ErrorEnvelope) {
        self.events.lock().push(Recorded::Error(envelope.clone()));
    }

    async fn on_session_complete(&self, record: &SessionRecord) {
        self.events.lock().push(Recorded::Complete(record.clone()));
    }
}
