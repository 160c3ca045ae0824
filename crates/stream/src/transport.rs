//! Transport seam between the stream channel and the recognition source.
//!
//! The channel only sees a sink of outbound frames and a stream of inbound
//! text payloads; the WebSocket details live in [`WsTransport`]. Tests
//! substitute scripted transports behind the same trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};

/// Outbound frame: either the one-shot session configuration or an opaque
/// audio/text chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Config(String),
    Chunk(Vec<u8>),
}

pub type TransportSink = Pin<Box<dyn Sink<OutboundFrame, Error = anyhow::Error> + Send>>;
pub type TransportStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

/// A connectable transport to the recognition source.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Establishes one connection, yielding the write and read halves.
    ///
    /// The read half ends (or yields an error) when the connection is
    /// lost; reconnecting is the channel's job, not the transport's.
    async fn connect(&self, endpoint: &str) -> anyhow::Result<(TransportSink, TransportStream)>;

    /// Human-readable transport name.
    fn name(&self) -> &str;
}

/// WebSocket transport backed by tokio-tungstenite.
///
/// Outbound config frames go as text, chunks as binary. Inbound text
/// frames carry recognition results; everything else (ping/pong/binary)
/// is dropped here.
pub struct WsTransport;

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&self, endpoint: &str) -> anyhow::Result<(TransportSink, TransportStream)> {
        let (ws, _response) = connect_async(endpoint).await?;
        let (sink, stream) = ws.split();

        let sink = sink
            .with(|frame: OutboundFrame| {
                future::ready(Ok::<Message, tungstenite::Error>(match frame {
                    OutboundFrame::Config(json) => Message::text(json),
                    OutboundFrame::Chunk(bytes) => Message::binary(bytes),
                }))
            })
            .sink_map_err(anyhow::Error::from);

        let stream = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => None,
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
