//! Sync scheduler - periodic and on-demand triggering of sync cycles
//!
//! The [`SyncScheduler`] owns the timer that drives the
//! [`SyncOrchestrator`](crate::orchestrator::SyncOrchestrator). Callers talk
//! to it through a cloneable [`SchedulerHandle`].
//!
//! ## Flow
//!
//! ```text
//! interval timer ──┐
//!                  ├──→ SyncScheduler ──spawn──→ SyncOrchestrator::run_claimed
//! SchedulerHandle ─┘         │                              │
//!   (sync now, connect)      └──── watch<Option<SyncOutcome>> ←┘
//! ```
//!
//! The first cycle runs as soon as the scheduler starts; after that one
//! runs every interval. Every cycle runs in its own task, so a slow cycle
//! never delays the timer. A trigger that fires while a cycle is active is
//! dropped, and the active cycle's outcome is still published. A successful
//! connect pushes the next tick one full interval into the future.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tasksync_core::connection::RemoteConnectionConfig;

use crate::orchestrator::{SyncOrchestrator, SyncOutcome};
use crate::SyncError;

/// Capacity of the command channel
const COMMAND_BUFFER: usize = 16;

enum Command {
    SyncNow,
    Connect {
        config: RemoteConnectionConfig,
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
}

/// Runs sync cycles on an interval and on request
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    commands: mpsc::Receiver<Command>,
    outcomes: Arc<watch::Sender<Option<SyncOutcome>>>,
    shutdown: CancellationToken,
    /// Task running the claimed cycle, if any was started
    active: Option<JoinHandle<()>>,
}

/// Cloneable handle for requesting cycles and observing their outcomes
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    outcomes: watch::Receiver<Option<SyncOutcome>>,
}

impl SyncScheduler {
    /// Creates a scheduler and its handle
    ///
    /// The scheduler does nothing until [`run`](Self::run) is awaited.
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (outcome_tx, outcome_rx) = watch::channel(None);

        info!(interval_secs = interval.as_secs(), "Creating sync scheduler");

        let scheduler = Self {
            orchestrator,
            interval,
            commands: command_rx,
            outcomes: Arc::new(outcome_tx),
            shutdown,
            active: None,
        };
        let handle = SchedulerHandle {
            commands: command_tx,
            outcomes: outcome_rx,
        };
        (scheduler, handle)
    }

    /// Main loop; returns when the shutdown token is cancelled or every
    /// handle has been dropped
    ///
    /// A cycle still running at that point is awaited, not cancelled.
    pub async fn run(mut self) {
        info!("Sync scheduler starting");
        let mut next_tick = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }

                _ = tokio::time::sleep_until(next_tick) => {
                    self.trigger("interval");
                    next_tick = Instant::now() + self.interval;
                }

                command = self.commands.recv() => match command {
                    Some(Command::SyncNow) => self.trigger("manual"),
                    Some(Command::Connect { config, reply }) => {
                        let result = self.orchestrator.connect(config).await;
                        if result.is_ok() {
                            next_tick = Instant::now() + self.interval;
                            info!(
                                next_in_secs = self.interval.as_secs(),
                                "Connected, next sync rescheduled"
                            );
                        }
                        // The caller may have given up waiting.
                        let _ = reply.send(result);
                    }
                    None => {
                        info!("All scheduler handles dropped, scheduler stopping");
                        break;
                    }
                },
            }
        }

        if let Some(active) = self.active.take() {
            if !active.is_finished() {
                info!("Waiting for the active sync cycle to finish");
            }
            if let Err(e) = active.await {
                warn!(error = %e, "Sync cycle task failed");
            }
        }
        info!("Sync scheduler stopped");
    }

    /// Claim the cycle slot and spawn the cycle; dropped if the slot is taken
    fn trigger(&mut self, source: &'static str) {
        let Some(permit) = self.orchestrator.try_begin() else {
            info!(source, "Sync cycle already in progress, trigger dropped");
            return;
        };
        debug!(source, "Sync triggered");

        let orchestrator = Arc::clone(&self.orchestrator);
        let outcomes = Arc::clone(&self.outcomes);
        self.active = Some(tokio::spawn(async move {
            if let Some(outcome) = orchestrator.run_claimed(permit).await {
                outcomes.send_replace(Some(outcome));
            }
        }));
    }
}

impl SchedulerHandle {
    /// Ask for an immediate cycle; returns false if the scheduler has stopped
    /// or is saturated with requests
    pub fn request_sync(&self) -> bool {
        match self.commands.try_send(Command::SyncNow) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Sync request not delivered");
                false
            }
        }
    }

    /// Connect through the orchestrator and reschedule the next tick
    pub async fn connect(&self, config: RemoteConnectionConfig) -> anyhow::Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect { config, reply })
            .await
            .map_err(|_| anyhow::anyhow!("sync scheduler is not running"))?;
        let result = response
            .await
            .map_err(|_| anyhow::anyhow!("sync scheduler stopped before connecting"))?;
        Ok(result?)
    }

    /// Outcome of the most recent cycle, if any has completed
    pub fn latest_outcome(&self) -> Option<SyncOutcome> {
        self.outcomes.borrow().clone()
    }

    /// Receiver notified after every completed cycle
    pub fn outcomes(&self) -> watch::Receiver<Option<SyncOutcome>> {
        self.outcomes.clone()
    }
}
