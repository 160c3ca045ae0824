//! Resilient stream channel.
//!
//! Owns the connection lifecycle to the recognition source: connect,
//! send the session configuration, deliver incoming results in arrival
//! order, and reconnect with exponential backoff when the transport
//! drops. Outbound chunks sent while reconnecting are held in a bounded
//! FIFO buffer and flushed on the next successful connection.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use interpmon_config::StreamConfig;

use crate::backoff;
use crate::buffer::ChunkBuffer;
use crate::transport::{OutboundFrame, StreamTransport, TransportSink, TransportStream};
use crate::{ChannelError, ConnectionState, SessionParams, Utterance};

/// Event channel depth between the read loop and the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events delivered to the channel's single consumer, in arrival order.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Utterance(Utterance),
    State(ConnectionState),
    Error(ChannelError),
}

/// How one connection attempt (and the session on top of it) ended.
enum Outcome {
    /// `close()` was called or the consumer dropped the receiver.
    Shutdown,
    /// The transport could not be established or configured.
    ConnectFailed,
    /// The connection was established and later lost.
    ConnectionLost,
}

struct Inner {
    config: StreamConfig,
    state: Mutex<ConnectionState>,
    buffer: Mutex<ChunkBuffer>,
    sink: tokio::sync::Mutex<Option<TransportSink>>,
    supervisor: Mutex<Option<tokio::task::JoinHandle<()>>>,
    event_tx: mpsc::Sender<ChannelEvent>,
}

impl Inner {
    fn current_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state == next {
            return;
        }
        debug!(from = ?*state, to = ?next, "Channel state transition");
        *state = next;
        // State events are informational; never block the channel on them.
        let _ = self.event_tx.try_send(ChannelEvent::State(next));
    }

    fn buffer_chunk(&self, chunk: Vec<u8>) {
        let dropped = self.buffer.lock().push(chunk);
        if dropped.is_some() {
            warn!("Chunk buffer full, dropped oldest chunk");
            let _ = self
                .event_tx
                .try_send(ChannelEvent::Error(ChannelError::CapacityExceeded));
        }
    }
}

/// Resilient connection to the recognition source.
///
/// Single-consumer: construction hands out the one [`ChannelEvent`]
/// receiver. The channel never reorders results.
pub struct StreamChannel {
    transport: Arc<dyn StreamTransport>,
    inner: Arc<Inner>,
}

impl StreamChannel {
    /// Creates a channel and its event receiver.
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        config: StreamConfig,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            buffer: Mutex::new(ChunkBuffer::new(config.buffer_capacity)),
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            sink: tokio::sync::Mutex::new(None),
            supervisor: Mutex::new(None),
            event_tx,
        });
        (Self { transport, inner }, event_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.current_state()
    }

    /// Opens the channel: connects, sends the session configuration and
    /// starts delivering results. Returns immediately; connect failures
    /// flow through the event stream and the reconnect path.
    pub fn open(&self, params: SessionParams) -> Result<(), ChannelError> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                ConnectionState::Disconnected => {}
                ConnectionState::Closed => return Err(ChannelError::Closed),
                _ => return Err(ChannelError::AlreadyOpen),
            }
            *state = ConnectionState::Connecting;
        }
        info!(transport = %self.transport.name(), "Opening stream channel");

        let inner = Arc::clone(&self.inner);
        let transport = Arc::clone(&self.transport);
        let handle = tokio::spawn(run_supervisor(inner, transport, params));
        *self.inner.supervisor.lock() = Some(handle);
        Ok(())
    }

    /// Sends one opaque chunk to the source.
    ///
    /// Best-effort semantics: buffered while reconnecting, silently
    /// dropped when the channel was never opened or is already closed.
    pub async fn send(&self, chunk: Vec<u8>) -> Result<(), ChannelError> {
        match self.inner.current_state() {
            ConnectionState::Connected => {
                let mut guard = self.inner.sink.lock().await;
                match guard.as_mut() {
                    Some(sink) => {
                        if let Err(e) = sink.send(OutboundFrame::Chunk(chunk)).await {
                            warn!(%e, "Chunk send failed");
                            return Err(ChannelError::Transport(e.to_string()));
                        }
                        Ok(())
                    }
                    // Connection is mid-swap; treat like a reconnect gap.
                    None => {
                        self.inner.buffer_chunk(chunk);
                        Ok(())
                    }
                }
            }
            ConnectionState::Reconnecting => {
                self.inner.buffer_chunk(chunk);
                Ok(())
            }
            state => {
                trace!(?state, "Dropping chunk, channel not connected");
                Ok(())
            }
        }
    }

    /// Closes the channel. Idempotent. Cancels any pending reconnect,
    /// flushes buffered chunks best-effort and ends in `Closed`.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }

        if let Some(handle) = self.inner.supervisor.lock().take() {
            handle.abort();
        }

        // Best-effort flush; a failure here is logged, never escalated.
        let pending = self.inner.buffer.lock().drain();
        let mut guard = self.inner.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            for chunk in pending {
                if let Err(e) = sink.send(OutboundFrame::Chunk(chunk)).await {
                    debug!(%e, "Flush on close failed");
                    break;
                }
            }
            let _ = sink.close().await;
        }
        drop(guard);

        let _ = self
            .inner
            .event_tx
            .try_send(ChannelEvent::State(ConnectionState::Closed));
        info!("Stream channel closed");
    }
}

/// Connection supervisor: runs connect/read cycles until the channel is
/// closed or reconnect attempts are exhausted.
async fn run_supervisor(
    inner: Arc<Inner>,
    transport: Arc<dyn StreamTransport>,
    params: SessionParams,
) {
    let mut attempt: u32 = 0;
    loop {
        if inner.current_state() == ConnectionState::Closed {
            break;
        }

        attempt = match run_once(&inner, transport.as_ref(), &params).await {
            Outcome::Shutdown => break,
            // Counter resets to 0 on any successful connect, so a lost
            // connection starts a fresh backoff series.
            Outcome::ConnectionLost => 1,
            Outcome::ConnectFailed => attempt + 1,
        };

        if attempt > inner.config.max_reconnect_attempts {
            error!(
                attempts = inner.config.max_reconnect_attempts,
                "Max reconnect attempts exceeded, closing channel"
            );
            inner.set_state(ConnectionState::Closed);
            let _ = inner
                .event_tx
                .send(ChannelEvent::Error(ChannelError::ReconnectExhausted {
                    attempts: inner.config.max_reconnect_attempts,
                }))
                .await;
            break;
        }

        inner.set_state(ConnectionState::Reconnecting);
        let delay = backoff::reconnect_delay(attempt, &inner.config);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        tokio::time::sleep(delay).await;
    }
}

/// One connect/configure/read cycle.
async fn run_once(
    inner: &Arc<Inner>,
    transport: &dyn StreamTransport,
    params: &SessionParams,
) -> Outcome {
    let (mut sink, stream) = match transport.connect(&inner.config.endpoint).await {
        Ok(halves) => halves,
        Err(e) => {
            warn!(%e, "Transport connect failed");
            let _ = inner
                .event_tx
                .send(ChannelEvent::Error(ChannelError::Transport(e.to_string())))
                .await;
            return Outcome::ConnectFailed;
        }
    };

    // Session configuration goes out once per successful connection.
    let config_json = match serde_json::to_string(params) {
        Ok(json) => json,
        Err(e) => {
            error!(%e, "Failed to serialize session parameters");
            return Outcome::ConnectFailed;
        }
    };
    if let Err(e) = sink.send(OutboundFrame::Config(config_json)).await {
        warn!(%e, "Failed to send session configuration");
        return Outcome::ConnectFailed;
    }

    // Flush chunks buffered during the outage, oldest first.
    let pending = inner.buffer.lock().drain();
    let flushed = pending.len();
    for chunk in pending {
        if let Err(e) = sink.send(OutboundFrame::Chunk(chunk)).await {
            warn!(%e, "Failed to flush buffered chunk");
            return Outcome::ConnectFailed;
        }
    }
    if flushed > 0 {
        debug!(flushed, "Flushed buffered chunks");
    }

    *inner.sink.lock().await = Some(sink);
    inner.set_state(ConnectionState::Connected);
    info!("Stream channel connected");

    let outcome = read_loop(inner, stream, &params.language).await;
    inner.sink.lock().await.take();
    outcome
}

/// Delivers parsed results in strict arrival order until the stream ends.
async fn read_loop(inner: &Arc<Inner>, mut stream: TransportStream, language: &str) -> Outcome {
    let mut last_timestamp_ms: u64 = 0;
    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => match parse_result(&text, language) {
                Ok(mut utterance) => {
                    // Source timestamps must never go backwards.
                    if utterance.timestamp_ms < last_timestamp_ms {
                        debug!(
                            got = utterance.timestamp_ms,
                            floor = last_timestamp_ms,
                            "Non-monotonic timestamp, clamping"
                        );
                        utterance.timestamp_ms = last_timestamp_ms;
                    }
                    last_timestamp_ms = utterance.timestamp_ms;

                    if inner
                        .event_tx
                        .send(ChannelEvent::Utterance(utterance))
                        .await
                        .is_err()
                    {
                        debug!("Event consumer gone, stopping read loop");
                        return Outcome::Shutdown;
                    }
                }
                // Parse failures drop one message, never the session.
                Err(e) => {
                    warn!(%e, "Skipping unparseable result");
                    let _ = inner
                        .event_tx
                        .try_send(ChannelEvent::Error(ChannelError::Parse(e.to_string())));
                }
            },
            Err(e) => {
                warn!(%e, "Transport read error");
                break;
            }
        }
    }

    if inner.current_state() == ConnectionState::Closed {
        return Outcome::Shutdown;
    }
    warn!("Transport closed unexpectedly");
    let _ = inner
        .event_tx
        .try_send(ChannelEvent::Error(ChannelError::Transport(
            "connection lost".to_string(),
        )));
    Outcome::ConnectionLost
}

/// Wire shape of one recognition result.
#[derive(Debug, Deserialize)]
struct RawResult {
    text: String,
    #[serde(default)]
    timestamp_ms: u64,
    #[serde(default)]
    is_final: bool,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    speaker: Option<String>,
}

fn default_confidence() -> f64 {
    1.0
}

fn parse_result(text: &str, default_language: &str) -> Result<Utterance, serde_json::Error> {
    let raw: RawResult = serde_json::from_str(text)?;
    Ok(Utterance {
        text: raw.text,
        timestamp_ms: raw.timestamp_ms,
        is_final: raw.is_final,
        confidence: raw.confidence.clamp(0.0, 1.0),
        language: raw
            .language
            .unwrap_or_else(|| default_language.to_string()),
        speaker: raw.speaker,
    })
}
