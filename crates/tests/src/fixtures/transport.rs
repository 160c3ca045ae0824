//! Scripted transport standing in for the recognition source.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Sink, StreamExt, stream};
use parking_lot::Mutex;

use interpmon_stream::{OutboundFrame, StreamTransport, TransportSink, TransportStream};

/// Outcome of one scripted connection attempt.
pub enum ScriptedConnection {
    /// `connect` fails outright.
    Refuse,
    /// Connect, deliver these payloads in order, then end the stream as
    /// if the connection dropped.
    Serve(Vec<String>),
    /// Connect, deliver these payloads, then keep the stream open.
    ServeAndHold(Vec<String>),
}

/// Plays a fixed script of connection outcomes and records every frame
/// written by the channel. Once the script is exhausted, further
/// connects succeed and stay open silently.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedConnection>>,
    connects: AtomicUsize,
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptedConnection>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            connects: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent_frames(&self) -> Vec<OutboundFrame> {
        self.sent.lock().clone()
    }

    /// Chunk payloads in the order they were written, across connections.
    pub fn sent_chunks(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Chunk(bytes) => Some(bytes.clone()),
                OutboundFrame::Config(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&self, _endpoint: &str) -> anyhow::Result<(TransportSink, TransportStream)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let connection = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(ScriptedConnection::ServeAndHold(Vec::new()));

        let sink: TransportSink = Box::pin(RecordingSink {
            sent: Arc::clone(&self.sent),
        });
        let stream: TransportStream = match connection {
            ScriptedConnection::Refuse => anyhow::bail!("connection refused"),
            ScriptedConnection::Serve(payloads) => {
                Box::pin(stream::iter(payloads.into_iter().map(Ok)))
            }
            ScriptedConnection::ServeAndHold(payloads) => Box::pin(
                stream::iter(payloads.into_iter().map(Ok)).chain(stream::pending()),
            ),
        };
        Ok((sink, stream))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct RecordingSink {
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl Sink<OutboundFrame> for RecordingSink {
    type Error = anyhow::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: OutboundFrame) -> Result<(), Self::Error> {
        self.sent.lock().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
