//! Session records and their storage seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use interpmon_analysis::Report;

/// Terminal status of one subsystem at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemStatus {
    Ok,
    Failed,
}

/// How each subsystem ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemSummary {
    pub channel: SubsystemStatus,
    pub pipeline: SubsystemStatus,
    pub enrichment: SubsystemStatus,
}

/// Durable summary of one completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub platform: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Final utterances analyzed, after noise filtering.
    pub utterance_count: usize,
    pub report: Report,
    pub subsystems: SubsystemSummary,
}

/// Storage seam for completed sessions. A save failure is logged by the
/// orchestrator and never fails the stop path.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()>;

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<SessionRecord>>;
}

/// In-process store, for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: DashMap<Uuid, SessionRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.records.insert(record.session_id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self.records.get(&session_id).map(|r| r.clone()))
    }
}
