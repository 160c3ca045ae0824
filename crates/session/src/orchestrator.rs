//! Session orchestrator.
//!
//! Owns the subsystems of one live monitoring session: the stream
//! channel feeding utterances in, the analysis pipeline, the term
//! enricher, and the presentation sinks. A single routing task consumes
//! channel and pipeline events so utterance handling stays ordered;
//! term enrichment runs on its own task so slow lookups never hold up
//! live delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use interpmon_analysis::{AnalysisPipeline, DeepAnalyzer, PipelineError};
use interpmon_analysis::detectors::default_detectors;
use interpmon_config::AppConfig;
use interpmon_enrichment::{EnrichmentProvider, TermEnricher};
use interpmon_stream::{
    ChannelError, ChannelEvent, SessionParams, StreamChannel, StreamTransport, Utterance,
};

use crate::events::{dispatch, ErrorEnvelope, ErrorSource, EventSink, SessionEvent};
use crate::record::{RecordStore, SessionRecord, SubsystemStatus, SubsystemSummary};
use crate::throttle::Throttle;

/// How long `stop` waits for the routing task to drain before aborting it.
const ROUTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("invalid scoring rules: {0}")]
    InvalidRules(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Identity of a started session.
#[derive(Debug, Clone, Copy)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// State mutated by the routing task and read at teardown.
struct SharedState {
    /// Final utterances that passed the noise filter, in order.
    finals: Mutex<Vec<Utterance>>,
    channel_failed: AtomicBool,
    pipeline_failed: AtomicBool,
    enrichment_failed: AtomicBool,
}

impl SharedState {
    fn new() -> Self {
        Self {
            finals: Mutex::new(Vec::new()),
            channel_failed: AtomicBool::new(false),
            pipeline_failed: AtomicBool::new(false),
            enrichment_failed: AtomicBool::new(false),
        }
    }

    fn status_of(failed: &AtomicBool) -> SubsystemStatus {
        if failed.load(Ordering::SeqCst) {
            SubsystemStatus::Failed
        } else {
            SubsystemStatus::Ok
        }
    }

    fn summary(&self) -> SubsystemSummary {
        SubsystemSummary {
            channel: Self::status_of(&self.channel_failed),
            pipeline: Self::status_of(&self.pipeline_failed),
            enrichment: Self::status_of(&self.enrichment_failed),
        }
    }
}

struct ActiveSession {
    id: Uuid,
    platform: String,
    started_at: DateTime<Utc>,
    channel: StreamChannel,
    pipeline: Arc<AnalysisPipeline>,
    shared: Arc<SharedState>,
    router: tokio::task::JoinHandle<()>,
    enrichment: tokio::task::JoinHandle<()>,
}

/// One orchestrator runs at most one session at a time.
pub struct Orchestrator {
    config: AppConfig,
    transport: Arc<dyn StreamTransport>,
    deep: Arc<dyn DeepAnalyzer>,
    provider: Arc<dyn EnrichmentProvider>,
    store: Arc<dyn RecordStore>,
    sinks: Vec<Arc<dyn EventSink>>,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn StreamTransport>,
        deep: Arc<dyn DeepAnalyzer>,
        provider: Arc<dyn EnrichmentProvider>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            config,
            transport,
            deep,
            provider,
            store,
            sinks: Vec::new(),
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Registers a presentation sink. Sinks must be registered before
    /// the first `start`.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Starts a session on the given platform, opening the stream channel
    /// and wiring the subsystems together.
    pub async fn start(&self, platform: &str) -> Result<SessionHandle, SessionError> {
        let mut slot = self.active.lock().await;
        if slot.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let session_id = Uuid::new_v4();
        let started_at = Utc::now();

        let detectors = default_detectors(&self.config.scoring)
            .map_err(|e| SessionError::InvalidRules(e.to_string()))?;
        let (pipeline, pipeline_errors) =
            AnalysisPipeline::new(detectors, Arc::clone(&self.deep), self.config.scoring.clone());
        pipeline.start();

        let enricher = Arc::new(TermEnricher::new(
            Arc::clone(&self.provider),
            self.config.enrichment.clone(),
        ));

        let (channel, channel_rx) =
            StreamChannel::new(Arc::clone(&self.transport), self.config.stream.clone());
        channel.open(SessionParams::from_config(&self.config.stream))?;

        let shared = Arc::new(SharedState::new());
        // Enrichment runs on its own task so a slow lookup never holds up
        // live delivery or scoring of later utterances.
        let (enrich_tx, enrich_rx) = mpsc::unbounded_channel();
        let enrichment = tokio::spawn(run_enrichment(EnrichmentCtx {
            session_id,
            sinks: self.sinks.clone(),
            enricher,
            shared: Arc::clone(&shared),
            finals_rx: enrich_rx,
        }));
        let router = tokio::spawn(run_router(RouterCtx {
            session_id,
            sinks: self.sinks.clone(),
            pipeline: Arc::clone(&pipeline),
            enrich_tx,
            throttle: Throttle::new(Duration::from_millis(
                self.config.session.metrics_interval_ms,
            )),
            shared: Arc::clone(&shared),
            channel_rx,
            pipeline_errors,
        }));

        info!(%session_id, platform, "Session started");
        dispatch(
            &self.sinks,
            &SessionEvent::SessionStarted {
                session_id,
                timestamp: started_at,
                platform: platform.to_string(),
            },
        )
        .await;

        *slot = Some(ActiveSession {
            id: session_id,
            platform: platform.to_string(),
            started_at,
            channel,
            pipeline,
            shared,
            router,
            enrichment,
        });
        Ok(SessionHandle {
            session_id,
            started_at,
        })
    }

    /// Forwards one opaque chunk to the recognition source through the
    /// active session's channel. No-op when no session is running.
    pub async fn send_chunk(&self, chunk: Vec<u8>) -> Result<(), SessionError> {
        let slot = self.active.lock().await;
        match slot.as_ref() {
            Some(active) => Ok(active.channel.send(chunk).await?),
            None => {
                debug!("Dropping chunk, no active session");
                Ok(())
            }
        }
    }

    /// Stops the active session: closes the channel, drains the routing
    /// task, finalizes the report and persists the record. Returns `None`
    /// when no session was running. Idempotent.
    pub async fn stop(&self) -> Option<SessionRecord> {
        let active = self.active.lock().await.take()?;
        self.finish(active, false).await
    }

    /// Stops the active session unconditionally, for callers that must
    /// guarantee resource release. Subsystem errors are logged, never
    /// surfaced, and no completion event reaches the sinks.
    pub async fn emergency_stop(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        warn!(session_id = %active.id, "Emergency stop");
        let _ = self.finish(active, true).await;
    }

    async fn finish(&self, active: ActiveSession, emergency: bool) -> Option<SessionRecord> {
        active.channel.close().await;
        // Dropping the channel drops the event sender, so the routing
        // task sees end-of-stream once the queue is drained.
        let ActiveSession {
            id: session_id,
            platform,
            started_at,
            channel,
            pipeline,
            shared,
            router,
            enrichment,
        } = active;
        drop(channel);

        // The router exits once the channel's events drain; its exit drops
        // the finals queue, which in turn drains the enrichment task.
        for (name, handle) in [("routing", router), ("enrichment", enrichment)] {
            let mut handle = handle;
            match tokio::time::timeout(ROUTER_DRAIN_TIMEOUT, &mut handle).await {
                Ok(Err(e)) => debug!(%session_id, %e, "{name} task ended abnormally"),
                Ok(Ok(())) => {}
                Err(_) => {
                    warn!(%session_id, "{name} task did not drain in time, aborting");
                    handle.abort();
                }
            }
        }

        let ended_at = Utc::now();
        let duration_secs = (ended_at - started_at).num_milliseconds() as f64 / 1000.0;
        let report = pipeline.stop(
            duration_secs,
            (
                self.config.session.target_wpm_min,
                self.config.session.target_wpm_max,
            ),
        );
        let utterance_count = shared.finals.lock().len();

        let record = SessionRecord {
            session_id,
            platform,
            started_at,
            ended_at,
            duration_secs,
            utterance_count,
            report,
            subsystems: shared.summary(),
        };

        // Persistence is best-effort on both stop paths.
        if let Err(e) = self.store.save(&record).await {
            warn!(%session_id, %e, "Failed to persist session record");
        }

        if !emergency {
            dispatch(
                &self.sinks,
                &SessionEvent::SessionComplete {
                    session_id,
                    timestamp: ended_at,
                    record: record.clone(),
                },
            )
            .await;
        }
        info!(
            %session_id,
            overall = record.report.overall,
            utterances = utterance_count,
            "Session stopped"
        );
        Some(record)
    }
}

struct RouterCtx {
    session_id: Uuid,
    sinks: Vec<Arc<dyn EventSink>>,
    pipeline: Arc<AnalysisPipeline>,
    enrich_tx: mpsc::UnboundedSender<Utterance>,
    throttle: Throttle,
    shared: Arc<SharedState>,
    channel_rx: mpsc::Receiver<ChannelEvent>,
    pipeline_errors: mpsc::UnboundedReceiver<PipelineError>,
}

/// Single consumer of channel and pipeline events. Exits when the
/// channel's event stream ends.
async fn run_router(mut ctx: RouterCtx) {
    loop {
        tokio::select! {
            maybe_event = ctx.channel_rx.recv() => match maybe_event {
                Some(ChannelEvent::Utterance(utterance)) => {
                    handle_utterance(&ctx, utterance).await;
                }
                Some(ChannelEvent::State(state)) => {
                    debug!(?state, "Channel state changed");
                }
                Some(ChannelEvent::Error(error)) => {
                    handle_channel_error(&ctx, error).await;
                }
                None => break,
            },
            Some(error) = ctx.pipeline_errors.recv() => {
                handle_pipeline_error(&ctx, error).await;
            }
        }
    }
    debug!(session_id = %ctx.session_id, "Routing task drained");
}

async fn handle_utterance(ctx: &RouterCtx, utterance: Utterance) {
    dispatch(
        &ctx.sinks,
        &SessionEvent::Utterance {
            session_id: ctx.session_id,
            timestamp: Utc::now(),
            utterance: utterance.clone(),
        },
    )
    .await;

    if !utterance.is_final {
        return;
    }
    if is_recognizer_noise(&utterance.text) {
        debug!(text = %utterance.text, "Skipping recognizer noise");
        return;
    }
    ctx.shared.finals.lock().push(utterance.clone());

    if let Some(snapshot) = ctx.pipeline.process_final(&utterance).await {
        if ctx.throttle.try_acquire() {
            dispatch(
                &ctx.sinks,
                &SessionEvent::MetricsUpdate {
                    session_id: ctx.session_id,
                    timestamp: Utc::now(),
                    metrics: snapshot,
                },
            )
            .await;
        }
    }

    // Term scanning happens off this task; a stalled lookup must not
    // delay the next utterance.
    if ctx.enrich_tx.send(utterance).is_err() {
        debug!("Enrichment task gone, skipping term scan");
    }
}

struct EnrichmentCtx {
    session_id: Uuid,
    sinks: Vec<Arc<dyn EventSink>>,
    enricher: Arc<TermEnricher>,
    shared: Arc<SharedState>,
    finals_rx: mpsc::UnboundedReceiver<Utterance>,
}

/// Consumes queued finals and emits enrichment events. Exits when the
/// routing task drops the queue sender.
async fn run_enrichment(mut ctx: EnrichmentCtx) {
    while let Some(utterance) = ctx.finals_rx.recv().await {
        let (terms, errors) = ctx.enricher.handle_final(&utterance).await;
        for term in terms {
            dispatch(
                &ctx.sinks,
                &SessionEvent::TermEnriched {
                    session_id: ctx.session_id,
                    timestamp: Utc::now(),
                    term,
                },
            )
            .await;
        }
        for error in errors {
            let envelope = ErrorEnvelope::new(
                ErrorSource::Enrichment,
                ctx.session_id,
                error.to_string(),
                true,
            );
            if !envelope.recoverable {
                ctx.shared.enrichment_failed.store(true, Ordering::SeqCst);
            }
            dispatch(&ctx.sinks, &SessionEvent::Error { envelope }).await;
        }
    }
    debug!(session_id = %ctx.session_id, "Enrichment task drained");
}

async fn handle_channel_error(ctx: &RouterCtx, error: ChannelError) {
    let envelope = ErrorEnvelope::new(
        ErrorSource::Channel,
        ctx.session_id,
        error.to_string(),
        error.is_recoverable(),
    );
    if !envelope.recoverable {
        warn!(session_id = %ctx.session_id, %error, "Channel failed terminally");
        ctx.shared.channel_failed.store(true, Ordering::SeqCst);
    }
    dispatch(&ctx.sinks, &SessionEvent::Error { envelope }).await;
}

async fn handle_pipeline_error(ctx: &RouterCtx, error: PipelineError) {
    let envelope = ErrorEnvelope::new(
        ErrorSource::Pipeline,
        ctx.session_id,
        error.to_string(),
        true,
    );
    if !envelope.recoverable {
        ctx.shared.pipeline_failed.store(true, Ordering::SeqCst);
    }
    dispatch(&ctx.sinks, &SessionEvent::Error { envelope }).await;
}

/// Recognizer placeholder output that must not reach analysis.
fn is_recognizer_noise(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower.is_empty()
        || lower.contains("[blank_audio]")
        || lower.contains("[silence]")
        || lower.contains("[music]")
        || lower.contains("(silence)")
        || lower.contains("(music)")
        || lower == "you"
        || lower == "thank you."
}
