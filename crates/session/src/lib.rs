//! Session orchestration: lifecycle, event fan-out and records.

pub mod events;
pub mod orchestrator;
pub mod record;
pub mod throttle;

pub use events::{
    dispatch, ErrorEnvelope, ErrorSource, EventSink, SessionEvent, FATAL_MARKERS,
};
pub use orchestrator::{Orchestrator, SessionError, SessionHandle};
pub use record::{
    MemoryRecordStore, RecordStore, SessionRecord, SubsystemStatus, SubsystemSummary,
};
pub use throttle::Throttle;
