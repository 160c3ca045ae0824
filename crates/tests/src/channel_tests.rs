use std::time::Duration;

use tokio::time::timeout;

use interpmon_config::StreamConfig;
use interpmon_stream::{
    ChannelError, ChannelEvent, ConnectionState, OutboundFrame, SessionParams, StreamChannel,
};

use crate::fixtures::init_tracing;
use crate::fixtures::transport::{ScriptedConnection, ScriptedTransport};

fn fast_config() -> StreamConfig {
    StreamConfig {
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter: 0.0,
        max_reconnect_attempts: 3,
        ..StreamConfig::default()
    }
}

fn params(cfg: &StreamConfig) -> SessionParams {
    SessionParams::from_config(cfg)
}

fn result_json(text: &str, timestamp_ms: u64) -> String {
    serde_json::json!({
        "text": text,
        "timestamp_ms": timestamp_ms,
        "is_final": true,
        "confidence": 0.9,
    })
    .to_string()
}

async fn wait_for_state(
    rx: &mut tokio::sync::mpsc::Receiver<ChannelEvent>,
    target: ConnectionState,
) -> Vec<ChannelEvent> {
    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for state")
            .expect("event stream ended");
        if matches!(event, ChannelEvent::State(state) if state == target) {
            return seen;
        }
        seen.push(event);
    }
}

#[tokio::test]
async fn results_delivered_in_order_across_reconnect() {
    init_tracing();
    let transport = ScriptedTransport::new(vec![
        ScriptedConnection::Serve(vec![result_json("one", 0), result_json("two", 100)]),
        ScriptedConnection::ServeAndHold(vec![result_json("three", 200)]),
    ]);
    let cfg = fast_config();
    let (channel, mut rx) = StreamChannel::new(transport.clone(), cfg.clone());
    channel.open(params(&cfg)).unwrap();

    let mut texts = Vec::new();
    while texts.len() < 3 {
        match timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for utterances")
            .expect("event stream ended")
        {
            ChannelEvent::Utterance(utterance) => texts.push(utterance.text),
            _ => {}
        }
    }
    assert_eq!(texts, ["one", "two", "three"]);
    assert!(transport.connect_count() >= 2, "should have reconnected");
    channel.close().await;
    assert_eq!(channel.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn session_config_sent_on_every_connection() {
    init_tracing();
    let transport = ScriptedTransport::new(vec![
        ScriptedConnection::Serve(vec![]),
        ScriptedConnection::ServeAndHold(vec![]),
    ]);
    let cfg = fast_config();
    let (channel, mut rx) = StreamChannel::new(transport.clone(), cfg.clone());
    channel.open(params(&cfg)).unwrap();

    // First connection drops immediately, second one holds.
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;

    let configs = transport
        .sent_frames()
        .into_iter()
        .filter(|f| matches!(f, OutboundFrame::Config(_)))
        .count();
    assert_eq!(configs, 2);
    channel.close().await;
}

#[tokio::test]
async fn reconnect_exhaustion_closes_with_single_terminal_error() {
    init_tracing();
    let transport =
        ScriptedTransport::new((0..10).map(|_| ScriptedConnection::Refuse).collect());
    let cfg = fast_config();
    let (channel, mut rx) = StreamChannel::new(transport.clone(), cfg.clone());
    channel.open(params(&cfg)).unwrap();

    let mut terminal = 0;
    let mut connect_errors = 0;
    while let Ok(Some(event)) = timeout(Duration::from_millis(500), rx.recv()).await {
        match event {
            ChannelEvent::Error(ChannelError::ReconnectExhausted { attempts }) => {
                assert_eq!(attempts, 3);
                terminal += 1;
            }
            ChannelEvent::Error(error) => {
                assert!(error.is_recoverable());
                connect_errors += 1;
            }
            _ => {}
        }
    }

    assert_eq!(terminal, 1, "terminal error must be emitted exactly once");
    // Initial attempt plus the three allowed retries.
    assert_eq!(transport.connect_count(), 4);
    assert_eq!(connect_errors, 4);
    assert_eq!(channel.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn chunks_buffered_during_outage_flush_in_order() {
    init_tracing();
    let transport = ScriptedTransport::new(vec![
        ScriptedConnection::Refuse,
        ScriptedConnection::ServeAndHold(vec![]),
    ]);
    let mut cfg = fast_config();
    cfg.base_delay_ms = 100;
    cfg.max_delay_ms = 100;
    let (channel, mut rx) = StreamChannel::new(transport.clone(), cfg.clone());
    channel.open(params(&cfg)).unwrap();

    wait_for_state(&mut rx, ConnectionState::Reconnecting).await;
    channel.send(vec![1]).await.unwrap();
    channel.send(vec![2]).await.unwrap();
    channel.send(vec![3]).await.unwrap();

    wait_for_state(&mut rx, ConnectionState::Connected).await;
    // The flush happens before the state flips, so frames are recorded.
    let frames = transport.sent_frames();
    assert!(matches!(frames[0], OutboundFrame::Config(_)));
    assert_eq!(transport.sent_chunks(), vec![vec![1], vec![2], vec![3]]);
    channel.close().await;
}

#[tokio::test]
async fn full_buffer_drops_oldest_chunk() {
    init_tracing();
    let transport = ScriptedTransport::new(vec![
        ScriptedConnection::Refuse,
        ScriptedConnection::ServeAndHold(vec![]),
    ]);
    let mut cfg = fast_config();
    cfg.buffer_capacity = 2;
    cfg.base_delay_ms = 200;
    cfg.max_delay_ms = 200;
    let (channel, mut rx) = StreamChannel::new(transport.clone(), cfg.clone());
    channel.open(params(&cfg)).unwrap();

    wait_for_state(&mut rx, ConnectionState::Reconnecting).await;
    channel.send(vec![1]).await.unwrap();
    channel.send(vec![2]).await.unwrap();
    channel.send(vec![3]).await.unwrap();

    let seen = wait_for_state(&mut rx, ConnectionState::Connected).await;
    let overflow = seen
        .iter()
        .filter(|e| matches!(e, ChannelEvent::Error(ChannelError::CapacityExceeded)))
        .count();
    assert_eq!(overflow, 1);
    assert_eq!(transport.sent_chunks(), vec![vec![2], vec![3]]);
    channel.close().await;
}

#[tokio::test]
async fn open_twice_rejected() {
    init_tracing();
    let transport = ScriptedTransport::new(vec![ScriptedConnection::ServeAndHold(vec![])]);
    let cfg = fast_config();
    let (channel, _rx) = StreamChannel::new(transport, cfg.clone());
    channel.open(params(&cfg)).unwrap();
    assert!(matches!(
        channel.open(params(&cfg)),
        Err(ChannelError::AlreadyOpen)
    ));
    channel.close().await;
    assert!(matches!(
        channel.open(params(&cfg)),
        Err(ChannelError::Closed)
    ));
}
