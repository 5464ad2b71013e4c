//! Measurement orchestration
//!
//! A [`SpeedTestEngine`] runs one measurement at a time on a spawned task.
//! Each run walks the phases its mode asks for, tries the catalog's
//! endpoints one after another until one yields a rate, and reports
//! progress, live rates and log lines on an event channel ending in exactly
//! one `Completed` or `Failed` (or nothing, when cancelled).

pub mod cancel;
pub mod retained;
pub mod state;

pub use cancel::CancelFlag;
pub use retained::RetainedPayload;
pub use state::{phase_plan, StateTracker};

use crate::{
    catalog::{Endpoint, EndpointCatalog},
    client::{HttpClient, NetworkClient},
    error::{AppError, Result},
    logging::ProbeLogger,
    models::{
        metrics::{LatencyAggregate, ProbeResult, RateObservation, TestRun, ThroughputReport},
        Config,
    },
    probe::{guarded, panic_detail, DownloadProber, LatencyProber, UploadProber},
    types::{Direction, RunState, TestMode},
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Everything a run reports to its caller, in emission order
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A phase was entered
    Progress(String),
    /// Throughput observed during an active probe, at most once per second
    LiveRate {
        direction: Direction,
        observation: RateObservation,
    },
    /// Human-readable diagnostic line
    Log(String),
    /// The run finished; the snapshot is final
    Completed(TestRun),
    /// A required phase had no successful endpoint
    Failed(AppError),
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Completed(_) | EngineEvent::Failed(_))
    }
}

/// Probe tuning taken from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub probe_duration: Duration,
    pub io_timeout: Duration,
    pub latency_timeout: Duration,
    pub retain_payload: bool,
    pub max_retained_bytes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe_duration: config.probe_duration(),
            io_timeout: config.io_timeout(),
            latency_timeout: config.latency_timeout(),
            retain_payload: config.retain_payload,
            max_retained_bytes: config.max_retained_bytes(),
        }
    }
}

/// Caller's side of one run
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    cancel: CancelFlag,
    state: watch::Receiver<RunState>,
    retained: Arc<AtomicUsize>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Next event, or `None` once the run has stopped and all events were read
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Request cancellation. Safe to call repeatedly and after the run ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Bytes currently held for upload reuse
    pub fn retained_payload_bytes(&self) -> usize {
        self.retained.load(Ordering::SeqCst)
    }

    /// Drain the run, returning its snapshot or the reason it stopped
    pub async fn finish(mut self) -> Result<TestRun> {
        while let Some(event) = self.next_event().await {
            match event {
                EngineEvent::Completed(run) => return Ok(run),
                EngineEvent::Failed(error) => return Err(error),
                _ => {}
            }
        }
        Err(AppError::Cancelled)
    }
}

struct ActiveRun {
    cancel: CancelFlag,
    task: JoinHandle<()>,
}

/// Runs measurements against an endpoint catalog, one at a time
pub struct SpeedTestEngine {
    client: Arc<dyn HttpClient>,
    catalog: Arc<EndpointCatalog>,
    settings: EngineSettings,
    logger: ProbeLogger,
    active: Option<ActiveRun>,
}

impl SpeedTestEngine {
    pub fn new(
        client: Arc<dyn HttpClient>,
        catalog: EndpointCatalog,
        settings: EngineSettings,
        logger: ProbeLogger,
    ) -> Self {
        Self {
            client,
            catalog: Arc::new(catalog),
            settings,
            logger,
            active: None,
        }
    }

    /// Engine backed by the real HTTP client
    pub fn from_config(config: &Config, catalog: EndpointCatalog) -> Result<Self> {
        let client = NetworkClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(client),
            catalog,
            EngineSettings::from_config(config),
            ProbeLogger::new(config),
        ))
    }

    pub fn catalog(&self) -> &EndpointCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Start a run. A run still in flight is cancelled and awaited first.
    pub async fn start_run(&mut self, mode: TestMode) -> RunHandle {
        self.stop_active().await;

        let run_id = Uuid::new_v4();
        let cancel = CancelFlag::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = StateTracker::new();
        let retained = Arc::new(AtomicUsize::new(0));

        let worker = RunWorker {
            run_id,
            correlation_id: run_id.to_string(),
            mode,
            client: self.client.clone(),
            catalog: self.catalog.clone(),
            settings: self.settings.clone(),
            logger: self.logger.clone(),
            cancel: cancel.clone(),
            events: events_tx,
            state,
            retained: retained.clone(),
        };
        let task = tokio::spawn(worker.run());

        self.active = Some(ActiveRun {
            cancel: cancel.clone(),
            task,
        });

        RunHandle {
            run_id,
            events: events_rx,
            cancel,
            state: state_rx,
            retained,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|active| !active.task.is_finished())
    }

    /// Request cancellation of the active run, if any
    pub fn cancel(&self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }

    /// Cancel the active run and wait until its worker has stopped
    pub async fn stop_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                self.logger
                    .logger()
                    .error("Measurement worker did not stop cleanly")
                    .error_info(&AppError::from(e))
                    .log()
                    .await;
            }
        }
    }
}

/// State owned by the task executing one run
struct RunWorker {
    run_id: Uuid,
    correlation_id: String,
    mode: TestMode,
    client: Arc<dyn HttpClient>,
    catalog: Arc<EndpointCatalog>,
    settings: EngineSettings,
    logger: ProbeLogger,
    cancel: CancelFlag,
    events: mpsc::UnboundedSender<EngineEvent>,
    state: StateTracker,
    retained: Arc<AtomicUsize>,
}

impl RunWorker {
    async fn run(self) {
        let outcome = AssertUnwindSafe(self.execute()).catch_unwind().await;

        match outcome {
            Ok(Ok(run)) => {
                self.state.enter(RunState::Completed);
                self.emit(EngineEvent::Completed(run));
            }
            Ok(Err(e)) if e.is_cancellation() => {
                self.state.enter(RunState::Cancelled);
                self.logger
                    .logger()
                    .info("Run cancelled")
                    .correlation_id(&self.correlation_id)
                    .log()
                    .await;
            }
            Ok(Err(e)) => self.fail(e).await,
            Err(panic) => {
                let error = AppError::internal(format!(
                    "measurement worker aborted unexpectedly ({})",
                    panic_detail(panic.as_ref())
                ));
                self.fail(error).await;
            }
        }
    }

    async fn fail(&self, error: AppError) {
        self.logger
            .logger()
            .error(&format!("Run failed: {}", error))
            .correlation_id(&self.correlation_id)
            .error_info(&error)
            .log()
            .await;
        self.state.enter(RunState::Failed);
        self.emit(EngineEvent::Failed(error));
    }

    async fn execute(&self) -> Result<TestRun> {
        let mut run = TestRun::new(self.run_id, self.mode);
        let mut retained = RetainedPayload::new(self.retained.clone());

        for phase in phase_plan(self.mode) {
            self.cancel.check()?;
            self.enter(phase);

            match phase {
                RunState::Downloading => {
                    run.download = Some(self.download_phase(&mut retained).await?);
                }
                RunState::Uploading => {
                    let report = self.upload_phase(&retained).await;
                    retained.release();
                    run.upload = Some(report?);
                }
                RunState::ProbingLatency => {
                    run.latency = Some(self.latency_phase().await?);
                }
                _ => {}
            }
        }

        retained.release();
        Ok(run.complete())
    }

    fn enter(&self, state: RunState) {
        if self.state.enter(state) {
            if let Some(message) = state.progress_message() {
                self.emit(EngineEvent::Progress(message.to_string()));
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        // The caller may have dropped its handle; the run still finishes
        let _ = self.events.send(event);
    }

    fn log_line(&self, line: String) {
        self.emit(EngineEvent::Log(line));
    }

    fn rate_sink(&self, direction: Direction) -> impl FnMut(RateObservation) + Send {
        let events = self.events.clone();
        move |observation| {
            let _ = events.send(EngineEvent::LiveRate { direction, observation });
        }
    }

    async fn announce_attempt(&self, direction: Direction, endpoint: &Endpoint, index: usize, total: usize) {
        self.log_line(format!(
            "Trying {} endpoint {}/{}: {} ({})",
            direction,
            index + 1,
            total,
            endpoint.label,
            endpoint.url
        ));
        self.logger
            .log_attempt(&self.correlation_id, direction, &endpoint.label, &endpoint.url, index + 1, total)
            .await;
    }

    async fn record_success(&self, direction: Direction, result: &ProbeResult) {
        self.log_line(format!(
            "{} via {}: {:.2} Mbps ({} bytes in {:.1}s)",
            direction,
            result.endpoint_label,
            result.rate_mbps.unwrap_or_default(),
            result.bytes_transferred,
            result.elapsed.as_secs_f64()
        ));
        self.logger
            .log_probe_success(&self.correlation_id, direction, result)
            .await;
    }

    async fn record_failure(&self, direction: Direction, endpoint: &Endpoint, error: &AppError, remaining: usize) {
        let next = if remaining > 0 { "trying next endpoint" } else { "no endpoints left" };
        self.log_line(format!(
            "{} endpoint {} failed: {}; {}",
            direction, endpoint.label, error, next
        ));
        self.logger
            .log_probe_failure(&self.correlation_id, direction, &endpoint.label, error)
            .await;
    }

    async fn exhausted(&self, phase: &str, attempts: usize) -> AppError {
        self.logger
            .log_phase_exhausted(&self.correlation_id, phase, attempts)
            .await;
        AppError::phase_exhausted(format!("All {} {} endpoints failed", attempts, phase))
    }

    /// Handle one attempt's outcome. `Ok(true)` ends the phase with a winner.
    async fn settle_attempt(
        &self,
        direction: Direction,
        endpoint: &Endpoint,
        outcome: Result<ProbeResult>,
        attempts: &mut Vec<ProbeResult>,
        remaining: usize,
    ) -> Result<bool> {
        let error = match outcome {
            Ok(result) if result.is_successful() => {
                self.record_success(direction, &result).await;
                attempts.push(result);
                return Ok(true);
            }
            Ok(result) => AppError::endpoint_unreachable(
                result
                    .error_message
                    .unwrap_or_else(|| "no usable measurement".to_string()),
            ),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => e,
        };

        self.record_failure(direction, endpoint, &error, remaining).await;
        attempts.push(ProbeResult::failed(&endpoint.label, &endpoint.url, error.to_string()));
        Ok(false)
    }

    async fn download_phase(&self, retained: &mut RetainedPayload) -> Result<ThroughputReport> {
        let direction = Direction::Download;
        let prober = DownloadProber::new(self.client.clone(), self.settings.probe_duration, self.settings.io_timeout);
        let retain_limit = (self.mode.wants_retained_payload() && self.settings.retain_payload)
            .then_some(self.settings.max_retained_bytes);

        let endpoints = self.catalog.endpoints(direction);
        let mut attempts = Vec::with_capacity(endpoints.len());

        for (index, endpoint) in endpoints.iter().enumerate() {
            self.cancel.check()?;
            self.announce_attempt(direction, endpoint, index, endpoints.len()).await;

            let probe = prober.probe(endpoint, retain_limit, &self.cancel, self.rate_sink(direction));
            let (outcome, payload) = match guarded(&endpoint.label, probe).await {
                Ok(outcome) => (Ok(outcome.result), outcome.payload),
                Err(e) => (Err(e), None),
            };

            let remaining = endpoints.len() - index - 1;
            if self
                .settle_attempt(direction, endpoint, outcome, &mut attempts, remaining)
                .await?
            {
                if let Some(bytes) = payload {
                    self.log_line(format!("Retained {} bytes for upload reuse", bytes.len()));
                    retained.store(bytes);
                }
                return ThroughputReport::from_attempts(attempts, None)
                    .ok_or_else(|| AppError::internal("download report without a successful attempt"));
            }
        }

        Err(self.exhausted(direction.as_str(), attempts.len()).await)
    }

    async fn upload_phase(&self, retained: &RetainedPayload) -> Result<ThroughputReport> {
        let direction = Direction::Upload;
        let prober = UploadProber::new(self.client.clone(), self.settings.probe_duration);
        let payload = retained.view();
        self.log_line(format!("Upload payload: {} ({} bytes held)", payload.source(), retained.len()));

        let endpoints = self.catalog.endpoints(direction);
        let mut attempts = Vec::with_capacity(endpoints.len());

        for (index, endpoint) in endpoints.iter().enumerate() {
            self.cancel.check()?;
            self.announce_attempt(direction, endpoint, index, endpoints.len()).await;

            let probe = prober.probe(endpoint, &payload, &self.cancel, self.rate_sink(direction));
            let outcome = guarded(&endpoint.label, probe).await.map(|outcome| outcome.result);

            let remaining = endpoints.len() - index - 1;
            if self
                .settle_attempt(direction, endpoint, outcome, &mut attempts, remaining)
                .await?
            {
                return ThroughputReport::from_attempts(attempts, Some(payload.source()))
                    .ok_or_else(|| AppError::internal("upload report without a successful attempt"));
            }
        }

        Err(self.exhausted(direction.as_str(), attempts.len()).await)
    }

    async fn latency_phase(&self) -> Result<LatencyAggregate> {
        let prober = LatencyProber::new(self.client.clone(), self.settings.latency_timeout);
        let events = self.events.clone();

        let aggregate = prober
            .probe_all(&self.catalog.latency, &self.cancel, |result| {
                let line = match &result.error_message {
                    Some(reason) if !result.is_successful() => {
                        format!("Latency {}: no response ({})", result.host_label, reason)
                    }
                    _ => format!("Latency {}: {}", result.host_label, result.format_round_trip()),
                };
                let _ = events.send(EngineEvent::Log(line));
            })
            .await?;

        for result in &aggregate.results {
            self.logger.log_latency(&self.correlation_id, result).await;
        }

        if aggregate.success_count == 0 {
            return Err(self.exhausted("latency", aggregate.total_count).await);
        }

        self.log_line(format!(
            "Latency: {}/{} hosts answered",
            aggregate.success_count, aggregate.total_count
        ));
        Ok(aggregate)
    }
}
