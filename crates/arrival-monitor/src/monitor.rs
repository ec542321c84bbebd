use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arrival_core::{
    distance_meters, is_within, DispatchOutcome, PositionSample, UpdateRequest, WorkflowConfig,
    WorkflowStatus,
};
use arrival_store::WorkflowStore;
use arrival_telegram::Dispatcher;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{MonitorError, Result};
use crate::source::{PositionError, PositionSource};

/// In-memory phase of the monitor. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Armed,
    Triggered,
}

/// What `start` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Subscribed and evaluating samples.
    Armed,
    /// The stored config is inactive: nothing subscribed, the controller should stop.
    NotArmed,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Delivered,
    Failed { detail: String },
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub samples_evaluated: u64,
}

struct ActiveRun {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<RunSummary>>,
}

/// Everything the run task owns for the duration of one run.
struct RunContext {
    config: WorkflowConfig,
    store: Arc<WorkflowStore>,
    dispatcher: Arc<dyn Dispatcher>,
    source: Arc<dyn PositionSource>,
    phase: Arc<watch::Sender<MonitorPhase>>,
    /// Set exactly once per run, by the sample that wins the arrival race.
    message_sent: AtomicBool,
}

/// Geofence state machine: one arrival, one dispatch, one persisted outcome.
///
/// Owned by the controller; `start` and `stop` are the only mutation entry
/// points. At most one run is active at a time.
pub struct GeofenceMonitor {
    store: Arc<WorkflowStore>,
    dispatcher: Arc<dyn Dispatcher>,
    source: Arc<dyn PositionSource>,
    update_request: UpdateRequest,
    phase: Arc<watch::Sender<MonitorPhase>>,
    run: Mutex<Option<ActiveRun>>,
}

impl GeofenceMonitor {
    pub fn new(
        store: Arc<WorkflowStore>,
        dispatcher: Arc<dyn Dispatcher>,
        source: Arc<dyn PositionSource>,
        update_request: UpdateRequest,
    ) -> Self {
        let (phase, _) = watch::channel(MonitorPhase::Idle);
        Self {
            store,
            dispatcher,
            source,
            update_request,
            phase: Arc::new(phase),
            run: Mutex::new(None),
        }
    }

    /// Validate, persist and arm `config`.
    ///
    /// An active config is validated first; a rejected config leaves the
    /// store untouched. The config is then saved and read back, and only the
    /// stored copy is used for the run.
    pub async fn start(&self, config: WorkflowConfig) -> Result<StartOutcome> {
        if config.active {
            config.validate()?;
        }

        let mut run = self.run.lock().await;
        if self.phase() != MonitorPhase::Idle {
            return Err(MonitorError::AlreadyRunning);
        }

        self.store.save(&config)?;
        let config = self.store.load()?;
        if !config.active {
            info!("workflow inactive, not arming");
            self.phase.send_replace(MonitorPhase::Idle);
            return Ok(StartOutcome::NotArmed);
        }

        self.store.set_status(WorkflowStatus::Tracking)?;

        let samples = match self.source.request_updates(&self.update_request).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "position updates refused, aborting run");
                self.store.set_active(false)?;
                self.store.set_status(WorkflowStatus::Inactive)?;
                return Err(match e {
                    PositionError::PermissionDenied(reason) => {
                        MonitorError::PermissionDenied(reason)
                    }
                    PositionError::Unavailable(reason) => {
                        MonitorError::PositionUnavailable(reason)
                    }
                });
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = RunContext {
            config,
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
            source: Arc::clone(&self.source),
            phase: Arc::clone(&self.phase),
            message_sent: AtomicBool::new(false),
        };

        self.phase.send_replace(MonitorPhase::Armed);
        let handle = tokio::spawn(run_loop(ctx, samples, shutdown_rx));
        *run = Some(ActiveRun {
            shutdown: shutdown_tx,
            handle: Some(handle),
        });

        Ok(StartOutcome::Armed)
    }

    /// Stop tracking.
    ///
    /// Always clears the stored `active` flag. While armed the run is aborted
    /// and records `inactive`; while a dispatch is in flight the dispatch is
    /// allowed to finish and its outcome wins. When idle the status is reset
    /// to `inactive` directly.
    pub async fn stop(&self) -> Result<()> {
        let run = self.run.lock().await;
        self.store.set_active(false)?;

        match (self.phase(), run.as_ref()) {
            (MonitorPhase::Armed | MonitorPhase::Triggered, Some(active)) => {
                info!(phase = ?self.phase(), "stop requested");
                active.shutdown.send_replace(true);
            }
            _ => {
                info!("stop requested while idle");
                self.store.set_status(WorkflowStatus::Inactive)?;
            }
        }
        Ok(())
    }

    /// Persisted workflow status; storage errors read as `Inactive`.
    pub fn current_status(&self) -> WorkflowStatus {
        self.store.status().unwrap_or_else(|e| {
            error!(error = %e, "status read failed, reporting inactive");
            WorkflowStatus::Inactive
        })
    }

    pub fn phase(&self) -> MonitorPhase {
        *self.phase.borrow()
    }

    /// Phase updates; the controller waits for `Idle` to know the run is over.
    pub fn subscribe_phase(&self) -> watch::Receiver<MonitorPhase> {
        self.phase.subscribe()
    }

    /// Wait for the current run to finish. `None` when there is no run to
    /// wait for (never started, not armed, or already awaited).
    pub async fn wait(&self) -> Option<RunSummary> {
        let handle = self.run.lock().await.as_mut()?.handle.take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(error = %e, "monitor run task failed");
                self.phase.send_replace(MonitorPhase::Idle);
                None
            }
        }
    }
}

/// Main run loop. Ends on dispatch completion or on a stop request.
///
/// Branch order is fixed: a finished dispatch is handled first, then a stop
/// request, then queued samples. Samples still buffered when a stop arrives
/// are never evaluated.
async fn run_loop(
    ctx: RunContext,
    mut samples: mpsc::Receiver<PositionSample>,
    mut shutdown: watch::Receiver<bool>,
) -> RunSummary {
    info!(
        destination = %ctx.config.destination,
        radius_m = ctx.config.radius_meters,
        "geofence armed"
    );

    let mut dispatch: Option<JoinHandle<DispatchOutcome>> = None;
    let mut evaluated: u64 = 0;
    let mut stream_open = true;
    let mut stopping = false;

    loop {
        tokio::select! {
            biased;

            outcome = join_dispatch(&mut dispatch) => {
                let outcome = finish_dispatch(&ctx, outcome).await;
                return RunSummary { outcome, samples_evaluated: evaluated };
            }

            changed = shutdown.changed(), if !stopping => {
                // A dropped sender means the monitor itself is gone.
                let requested = changed.is_err() || *shutdown.borrow();
                if !requested {
                    continue;
                }
                ctx.source.cancel_updates().await;
                if dispatch.is_some() {
                    info!("stop requested during dispatch, waiting for its outcome");
                    stopping = true;
                } else {
                    return abort(&ctx, evaluated);
                }
            }

            next = samples.recv(), if stream_open && !stopping => match next {
                Some(_) if *shutdown.borrow() => {
                    debug!("stop pending, sample dropped");
                }
                Some(sample) => {
                    evaluated += 1;
                    if let Some(handle) = evaluate(&ctx, sample) {
                        dispatch = Some(handle);
                    }
                }
                None => {
                    stream_open = false;
                    info!("position stream ended, staying armed");
                }
            },
        }
    }
}

/// Evaluate one sample. Returns the dispatch task if this sample triggered.
fn evaluate(ctx: &RunContext, sample: PositionSample) -> Option<JoinHandle<DispatchOutcome>> {
    let position = sample.coordinate();
    let distance = distance_meters(position, ctx.config.destination);
    let inside = is_within(position, ctx.config.destination, ctx.config.radius_meters);
    debug!(
        distance_m = distance,
        inside,
        observed_at = sample.observed_at_millis,
        "position sample evaluated"
    );
    if !inside {
        return None;
    }

    // Check-and-set in one step so two close samples cannot both dispatch.
    if ctx
        .message_sent
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("arrival already handled, sample ignored");
        return None;
    }

    ctx.phase.send_replace(MonitorPhase::Triggered);
    info!(distance_m = distance, "destination reached, dispatching message");

    let dispatcher = Arc::clone(&ctx.dispatcher);
    let credential = ctx.config.endpoint_credential.clone();
    let channel = ctx.config.target_channel.clone();
    let body = ctx.config.message_body.clone();
    Some(tokio::spawn(async move {
        DispatchOutcome::from(dispatcher.send(&credential, &channel, &body).await)
    }))
}

async fn join_dispatch(dispatch: &mut Option<JoinHandle<DispatchOutcome>>) -> DispatchOutcome {
    match dispatch {
        Some(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(e) => DispatchOutcome::failure(format!("dispatch task failed: {e}")),
        },
        None => std::future::pending().await,
    }
}

/// Record the dispatch outcome and end the run. Never re-arms.
async fn finish_dispatch(ctx: &RunContext, outcome: DispatchOutcome) -> RunOutcome {
    ctx.source.cancel_updates().await;

    let status = outcome.status();
    if let Err(e) = ctx.store.set_status(status) {
        error!(error = %e, %status, "failed to persist dispatch outcome");
    }
    // One arrival per run: a restart must not arm this config again.
    if let Err(e) = ctx.store.set_active(false) {
        error!(error = %e, "failed to clear active flag");
    }

    ctx.phase.send_replace(MonitorPhase::Idle);

    if outcome.sent_successfully {
        info!(dispatcher = ctx.dispatcher.name(), "arrival message sent");
        RunOutcome::Delivered
    } else {
        warn!(
            dispatcher = ctx.dispatcher.name(),
            detail = %outcome.error_detail,
            "arrival message failed, a new start is required to retry"
        );
        RunOutcome::Failed {
            detail: outcome.error_detail,
        }
    }
}

fn abort(ctx: &RunContext, evaluated: u64) -> RunSummary {
    if let Err(e) = ctx.store.set_status(WorkflowStatus::Inactive) {
        error!(error = %e, "failed to persist inactive status on abort");
    }
    ctx.phase.send_replace(MonitorPhase::Idle);
    info!(samples = evaluated, "tracking aborted");
    RunSummary {
        outcome: RunOutcome::Aborted,
        samples_evaluated: evaluated,
    }
}
