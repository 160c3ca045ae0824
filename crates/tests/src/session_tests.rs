use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_test::assert_ok;

use interpmon_config::AppConfig;
use interpmon_enrichment::EnrichmentProvider;
use interpmon_session::{
    MemoryRecordStore, Orchestrator, RecordStore, SessionError, SubsystemStatus,
};

use crate::fixtures::init_tracing;
use crate::fixtures::providers::{NoopDeep, SlowProvider, StaticProvider};
use crate::fixtures::sinks::CollectingSink;
use crate::fixtures::transport::{ScriptedConnection, ScriptedTransport};

struct Harness {
    orchestrator: Orchestrator,
    sink: Arc<CollectingSink>,
    store: Arc<MemoryRecordStore>,
}

fn harness_with_provider(
    script: Vec<ScriptedConnection>,
    config: AppConfig,
    provider: Arc<dyn EnrichmentProvider>,
) -> Harness {
    init_tracing();
    let transport = ScriptedTransport::new(script);
    let sink = Arc::new(CollectingSink::default());
    let store = Arc::new(MemoryRecordStore::new());
    let mut orchestrator = Orchestrator::new(
        config,
        transport,
        Arc::new(NoopDeep),
        provider,
        store.clone(),
    );
    orchestrator.add_sink(sink.clone());
    Harness {
        orchestrator,
        sink,
        store,
    }
}

fn harness(script: Vec<ScriptedConnection>, config: AppConfig) -> Harness {
    harness_with_provider(script, config, Arc::new(StaticProvider))
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.stream.base_delay_ms = 1;
    config.stream.max_delay_ms = 2;
    config.stream.jitter = 0.0;
    config
}

fn result_json(text: &str, timestamp_ms: u64, is_final: bool) -> String {
    serde_json::json!({
        "text": text,
        "timestamp_ms": timestamp_ms,
        "is_final": is_final,
        "confidence": 0.9,
    })
    .to_string()
}

#[tokio::test]
async fn second_start_rejected_while_running() {
    let h = harness(vec![ScriptedConnection::ServeAndHold(vec![])], fast_config());
    let handle = assert_ok!(h.orchestrator.start("meet").await);
    assert!(matches!(
        h.orchestrator.start("zoom").await,
        Err(SessionError::AlreadyRunning)
    ));
    assert!(h.orchestrator.is_running().await);

    let record = h.orchestrator.stop().await.expect("record");
    assert_eq!(record.session_id, handle.session_id);
    assert!(!h.orchestrator.is_running().await);
}

#[tokio::test]
async fn interims_forwarded_but_only_clean_finals_analyzed() {
    let h = harness(
        vec![ScriptedConnection::ServeAndHold(vec![
            result_json("um hello", 0, false),
            result_json("um hello there", 500, true),
            result_json("[BLANK_AUDIO]", 900, true),
        ])],
        fast_config(),
    );
    assert_ok!(h.orchestrator.start("meet").await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let record = h.orchestrator.stop().await.expect("record");
    // All three utterances reach the sink, unfiltered.
    assert_eq!(h.sink.utterances().len(), 3);
    // Only the clean final counts toward analysis.
    assert_eq!(record.utterance_count, 1);
    assert_eq!(record.report.metadata.word_count, 3);
}

#[tokio::test]
async fn metrics_updates_are_throttled() {
    let finals: Vec<String> = (0..6)
        .map(|i| result_json("a clean sentence", i * 50, true))
        .collect();
    let h = harness(vec![ScriptedConnection::ServeAndHold(finals)], fast_config());
    assert_ok!(h.orchestrator.start("meet").await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Six finals inside one interval collapse to a single update.
    assert_eq!(h.sink.metrics_count(), 1);
    let record = h.orchestrator.stop().await.expect("record");
    assert_eq!(record.utterance_count, 6);
}

#[tokio::test]
async fn stop_persists_record_and_emits_completion() {
    let h = harness(
        vec![ScriptedConnection::ServeAndHold(vec![result_json(
            "the hearing is adjourned",
            0,
            true,
        )])],
        fast_config(),
    );
    let handle = assert_ok!(h.orchestrator.start("meet").await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let record = h.orchestrator.stop().await.expect("record");
    assert_eq!(record.platform, "meet");
    assert_eq!(record.subsystems.channel, SubsystemStatus::Ok);

    let stored = h.store.load(handle.session_id).await.unwrap();
    assert!(stored.is_some(), "record should be persisted");
    let completed = h.sink.completed().expect("completion event");
    assert_eq!(completed.session_id, handle.session_id);

    // A second stop is a no-op.
    assert!(h.orchestrator.stop().await.is_none());
}

#[tokio::test]
async fn emergency_stop_suppresses_completion_event() {
    let h = harness(vec![ScriptedConnection::ServeAndHold(vec![])], fast_config());
    assert_ok!(h.orchestrator.start("meet").await);
    h.orchestrator.emergency_stop().await;

    assert!(!h.orchestrator.is_running().await);
    assert!(h.sink.completed().is_none());
    // The record is still persisted best-effort.
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn exhausted_channel_marks_subsystem_failed() {
    let mut config = fast_config();
    config.stream.max_reconnect_attempts = 2;
    let h = harness((0..8).map(|_| ScriptedConnection::Refuse).collect(), config);
    assert_ok!(h.orchestrator.start("meet").await);

    // Wait for the terminal error to reach the sink.
    let mut waited = Duration::ZERO;
    while h.sink.errors().iter().all(|e| e.recoverable) && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    let terminal: Vec<_> = h
        .sink
        .errors()
        .into_iter()
        .filter(|e| !e.recoverable)
        .collect();
    assert_eq!(terminal.len(), 1);
    assert!(terminal[0].message.contains("reconnect"));

    let record = h.orchestrator.stop().await.expect("record");
    assert_eq!(record.subsystems.channel, SubsystemStatus::Failed);
    assert_eq!(record.subsystems.pipeline, SubsystemStatus::Ok);
}

#[tokio::test]
async fn slow_enrichment_does_not_delay_live_delivery() {
    let h = harness_with_provider(
        vec![ScriptedConnection::ServeAndHold(vec![
            result_json("the arbitration clause applies", 0, true),
            result_json("and the parties", 100, false),
        ])],
        fast_config(),
        Arc::new(SlowProvider {
            delay: Duration::from_millis(800),
        }),
    );
    let started = Instant::now();
    assert_ok!(h.orchestrator.start("meet").await);

    // Both utterances must reach the live sink while the term lookup is
    // still in flight.
    let mut waited = Duration::ZERO;
    while h.sink.utterances().len() < 2 && waited < Duration::from_millis(400) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert_eq!(h.sink.utterances().len(), 2);
    assert!(
        started.elapsed() < Duration::from_millis(700),
        "live delivery stalled behind enrichment"
    );
    assert!(
        h.sink.enriched_terms().is_empty(),
        "lookup should still be in flight"
    );

    // The enriched term still arrives once the lookup completes.
    let mut waited = Duration::ZERO;
    while h.sink.enriched_terms().is_empty() && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }
    assert_eq!(h.sink.enriched_terms().len(), 1);
    assert_eq!(h.sink.enriched_terms()[0].token, "arbitration");
    h.orchestrator.stop().await;
}

#[tokio::test]
async fn detected_terms_flow_to_sinks() {
    let h = harness(
        vec![ScriptedConnection::ServeAndHold(vec![result_json(
            "the arbitration clause applies here",
            0,
            true,
        )])],
        fast_config(),
    );
    assert_ok!(h.orchestrator.start("meet").await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let terms = h.sink.enriched_terms();
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].token, "arbitration");
    assert_eq!(terms[0].entry.translation, "arbitration-es");
    assert!(!terms[0].from_cache);
    h.orchestrator.stop().await;
}
