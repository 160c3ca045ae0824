pub mod backoff;
pub mod buffer;
pub mod channel;
pub mod transport;

pub use channel::{ChannelEvent, StreamChannel};
pub use transport::{OutboundFrame, StreamTransport, TransportSink, TransportStream, WsTransport};

use serde::{Deserialize, Serialize};

/// One transcript unit delivered by the recognition source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    /// Milliseconds since the session started. Monotonically non-decreasing.
    pub timestamp_ms: u64,
    /// Whether the source will revise this segment further.
    pub is_final: bool,
    /// Recognition confidence in [0, 1].
    pub confidence: f64,
    /// Source language tag (e.g. "en-US").
    pub language: String,
    /// Diarization label. Upstream does not populate this yet; no code
    /// path filters on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// Connection lifecycle of the stream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Errors surfaced by the stream channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel already open")]
    AlreadyOpen,
    #[error("channel closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to parse incoming result: {0}")]
    Parse(String),
    #[error("chunk buffer full, oldest chunk dropped")]
    CapacityExceeded,
    #[error("max reconnect attempts exceeded after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl ChannelError {
    /// Whether the session can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ChannelError::ReconnectExhausted { .. })
    }
}

/// Session configuration sent to the recognition source once per
/// successful connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    pub language: String,
    pub encoding: String,
    pub sample_rate: u32,
    pub interim_results: bool,
}

impl SessionParams {
    pub fn from_config(cfg: &interpmon_config::StreamConfig) -> Self {
        Self {
            language: cfg.language.clone(),
            encoding: cfg.encoding.clone(),
            sample_rate: cfg.sample_rate,
            interim_results: cfg.interim_results,
        }
    }
}
