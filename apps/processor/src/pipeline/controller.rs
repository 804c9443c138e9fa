//! Sequences the stages of a run and owns its lifecycle.
//!
//! Flow: show → quota check → parsing → (delay) → atsCheck → (delay) →
//!       optimization → (delay) → ready message → (delay) → on_complete.
//!
//! One driver task runs the stages strictly in order. A failure parks the run
//! on the failed stage until `retry()`, which restarts from parsing with every
//! earlier result discarded. `hide()` aborts the driver and clears all state;
//! a response arriving after that is never applied.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{info, warn};

use crate::backend::ProcessingBackend;
use crate::errors::PipelineError;
use crate::listener::ProcessorListener;
use crate::models::{AccumulatedResult, EntryPoint, ResumeUpload};
use crate::pipeline::executor::StageExecutor;
use crate::pipeline::progress::spawn_ticker;
use crate::pipeline::snapshot::{RunPhase, RunSnapshot};
use crate::pipeline::stages::{StageId, READY_MESSAGE};
use crate::quota::{PlanTier, UploadQuota};

/// Pacing of the cosmetic parts of a run. None of these affect data flow.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Pause after each completed stage and before the completion callback.
    pub stage_delay: Duration,
    /// Rotation period of a stage's anticipation messages. Zero disables them.
    pub message_interval: Duration,
    /// Elapsed-time tick. Zero disables the ticker.
    pub tick_interval: Duration,
    pub entry_point: EntryPoint,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage_delay: Duration::from_secs(2),
            message_interval: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            entry_point: EntryPoint::default(),
        }
    }
}

impl PipelineSettings {
    /// No pauses and no message rotation; stages follow each other immediately.
    pub fn immediate() -> Self {
        Self {
            stage_delay: Duration::ZERO,
            message_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub struct ResumeProcessorBuilder {
    backend: Arc<dyn ProcessingBackend>,
    listener: Arc<dyn ProcessorListener>,
    settings: PipelineSettings,
    quota: Option<UploadQuota>,
}

impl ResumeProcessorBuilder {
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Enables the free-tier upload limit. Without a quota every caller is admitted.
    pub fn quota(mut self, quota: UploadQuota) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn build(self) -> ResumeProcessor {
        let (state, _) = watch::channel(RunSnapshot::idle(0));
        ResumeProcessor {
            inner: Arc::new(Inner {
                backend: self.backend,
                listener: self.listener,
                quota: self.quota,
                settings: self.settings,
                state: Arc::new(state),
                session: Mutex::new(Session::default()),
            }),
        }
    }
}

/// Host-facing handle to the pipeline. Cheap to clone; clones share one run.
///
/// Must be used from within a tokio runtime: starting a run spawns tasks.
#[derive(Clone)]
pub struct ResumeProcessor {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn ProcessingBackend>,
    listener: Arc<dyn ProcessorListener>,
    quota: Option<UploadQuota>,
    settings: PipelineSettings,
    state: Arc<watch::Sender<RunSnapshot>>,
    session: Mutex<Session>,
}

/// Bookkeeping for the run currently attached to the processor.
#[derive(Default)]
struct Session {
    generation: u64,
    upload: Option<ResumeUpload>,
    tier: PlanTier,
    driver: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Session {
    fn stop_tasks(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn is_live(&self) -> bool {
        self.upload.is_some() || self.driver.is_some() || self.ticker.is_some()
    }
}

impl ResumeProcessor {
    pub fn builder(
        backend: Arc<dyn ProcessingBackend>,
        listener: Arc<dyn ProcessorListener>,
    ) -> ResumeProcessorBuilder {
        ResumeProcessorBuilder {
            backend,
            listener,
            settings: PipelineSettings::default(),
            quota: None,
        }
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Mirrors the host's visibility: visible with a file starts a run,
    /// invisible tears the run down.
    pub fn set_visible(&self, visible: bool, upload: Option<ResumeUpload>, tier: PlanTier) {
        match (visible, upload) {
            (true, Some(upload)) => self.show(upload, tier),
            (true, None) => {}
            (false, _) => self.hide(),
        }
    }

    /// Starts a run for `upload`, replacing any run in progress.
    ///
    /// Free-tier callers over the upload limit never reach a stage: the
    /// upgrade prompt and the error callback fire instead.
    pub fn show(&self, upload: ResumeUpload, tier: PlanTier) {
        let inner = &self.inner;

        if let Some(quota) = &inner.quota {
            if !quota.allows_or_default(tier) {
                warn!("Upload limit reached for {tier} caller, not starting");
                self.reject_over_quota();
                return;
            }
        }

        let mut session = inner.lock_session();
        session.stop_tasks();
        session.generation += 1;
        session.upload = Some(upload.clone());
        session.tier = tier;

        let snapshot = RunSnapshot::started(session.generation);
        info!(
            "Starting run {} for {} ({} bytes, {tier} tier)",
            snapshot.run_id.unwrap_or_default(),
            upload.file_name,
            upload.len()
        );
        inner.state.send_replace(snapshot);
        self.spawn_run(&mut session, upload, tier);
    }

    /// Restarts the whole pipeline from parsing with the same file.
    ///
    /// Results of stages that already completed are discarded and the file is
    /// uploaded again. Ignored unless the run is parked on a failed stage.
    pub fn retry(&self) {
        let inner = &self.inner;
        let mut session = inner.lock_session();
        let Some(upload) = session.upload.clone() else {
            warn!("Retry ignored: no resume is attached");
            return;
        };
        let phase = inner.state.borrow().phase;
        if phase != RunPhase::Error {
            warn!("Retry ignored: run is {phase:?}, not parked on an error");
            return;
        }

        session.stop_tasks();
        session.generation += 1;
        let tier = session.tier;

        let restarted = inner.state.borrow().restarted(session.generation);
        info!(
            "Retrying run {} from the first stage (attempt {})",
            restarted.run_id.unwrap_or_default(),
            restarted.attempt
        );
        inner.state.send_replace(restarted);
        self.spawn_run(&mut session, upload, tier);
    }

    /// Tears the run down without starting a new one. Idempotent.
    ///
    /// In-flight requests are dropped with the driver task; nothing they
    /// return reaches the snapshot or the listener.
    pub fn hide(&self) {
        let inner = &self.inner;
        let mut session = inner.lock_session();
        if session.is_live() {
            session.stop_tasks();
            session.generation += 1;
            session.upload = None;
            info!("Run torn down");
        }
        inner.state.send_replace(RunSnapshot::idle(session.generation));
    }

    fn reject_over_quota(&self) {
        let inner = &self.inner;
        {
            let mut session = inner.lock_session();
            session.stop_tasks();
            session.generation += 1;
            session.upload = None;

            let mut rejected = RunSnapshot::idle(session.generation);
            rejected.error_message = Some(PipelineError::QuotaExceeded.to_string());
            inner.state.send_replace(rejected);
        }
        inner.listener.on_upgrade_required();
        inner.listener.on_error(&PipelineError::QuotaExceeded);
    }

    fn spawn_run(&self, session: &mut Session, upload: ResumeUpload, tier: PlanTier) {
        let generation = session.generation;
        let tick = self.inner.settings.tick_interval;
        if !tick.is_zero() {
            session.ticker = Some(spawn_ticker(self.inner.state.clone(), generation, tick));
        }

        let inner = Arc::clone(&self.inner);
        session.driver = Some(tokio::spawn(async move {
            inner.drive(generation, upload, tier).await;
        }));
    }
}

impl Inner {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `update` if `generation` is still current. Returns false for a
    /// superseded run, which must then stop without side effects.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut RunSnapshot)) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                return false;
            }
            update(snapshot);
            true
        })
    }

    /// Publishes the final transition of a run and reports it to the host.
    ///
    /// Runs under the session lock so a concurrent `hide()` either lands
    /// first, and nothing is reported, or waits until the callback returns.
    /// Listeners must therefore not call back into the processor.
    fn settle(
        &self,
        generation: u64,
        update: impl FnOnce(&mut RunSnapshot),
        report: impl FnOnce(&dyn ProcessorListener),
    ) -> bool {
        let session = self.lock_session();
        if session.generation != generation || !self.publish(generation, update) {
            return false;
        }
        report(self.listener.as_ref());
        true
    }

    async fn drive(&self, generation: u64, upload: ResumeUpload, tier: PlanTier) {
        let executor = StageExecutor::new(self.backend.as_ref(), &upload, &self.settings.entry_point);
        let mut accumulated = AccumulatedResult::default();

        for stage in StageId::ALL {
            if !self.publish(generation, |s| s.begin_stage(stage)) {
                return;
            }
            info!("Stage {stage} started for {}", upload.file_name);

            let outcome = self
                .with_anticipation(generation, stage, executor.run(stage, &accumulated))
                .await;

            match outcome {
                Ok(next) => {
                    accumulated = next;
                    if !self.publish(generation, |s| s.complete_stage(stage, &accumulated)) {
                        return;
                    }
                    info!("Stage {stage} completed for {}", upload.file_name);
                }
                Err(error) => {
                    warn!("Stage {stage} failed for {}: {error}", upload.file_name);
                    self.settle(
                        generation,
                        |s| s.fail_stage(stage, error.to_string()),
                        |listener| listener.on_error(&error),
                    );
                    return;
                }
            }

            sleep(self.settings.stage_delay).await;
        }

        if !self.publish(generation, |s| s.current_message = READY_MESSAGE.to_string()) {
            return;
        }
        sleep(self.settings.stage_delay).await;
        let settled = self.settle(generation, RunSnapshot::finish, |listener| {
            if let Some(quota) = &self.quota {
                if let Err(e) = quota.record_upload(tier) {
                    warn!("Could not record upload: {e}");
                }
            }
            listener.on_complete(&accumulated);
        });
        if settled {
            info!("All stages completed for {}", upload.file_name);
        }
    }

    /// Awaits `work`, publishing the stage's anticipation messages one per
    /// message interval while it is pending.
    async fn with_anticipation<T>(
        &self,
        generation: u64,
        stage: StageId,
        work: impl Future<Output = T>,
    ) -> T {
        let period = self.settings.message_interval;
        let messages = stage.definition().anticipation_messages;
        if period.is_zero() || messages.is_empty() {
            return work.await;
        }

        tokio::pin!(work);
        let mut rotation = interval_at(Instant::now() + period, period);
        let mut next = 0;
        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = rotation.tick(), if next < messages.len() => {
                    let message = messages[next];
                    next += 1;
                    self.publish(generation, |s| s.current_message = message.to_string());
                }
            }
        }
    }
}
