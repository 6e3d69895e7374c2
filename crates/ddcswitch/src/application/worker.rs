//! SwitchWorker: runs switches one at a time off the caller's thread.
//!
//! A switch blocks twice: once inside the vendor block-write call and once
//! for the settle interval.  The worker moves both off the caller:
//!
//! ```text
//! caller ──submit()──▶ mpsc ──▶ worker task
//!                                 ├─ debounce / resolve   (SwitchInputUseCase)
//!                                 ├─ block write          (spawn_blocking)
//!                                 ├─ settle               (tokio sleep, cancellable)
//!                                 └─ outcome ──▶ mpsc ──▶ caller.recv_outcome()
//! ```
//!
//! Requests are processed strictly in order and a new write never starts
//! before the previous settle has finished or been cancelled.  Cancelling
//! only shortens the wait; a write already handed to the driver always runs
//! to completion and is never re-sent.

use std::sync::Arc;

use ddcswitch_core::{CommandFrame, SwitchError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::switch_input::{
    SelectionError, SwitchInputUseCase, SwitchKind, SwitchOutcome, SwitchRequest, SwitchSettings,
};

/// Capacity of the request and outcome channels.
const CHANNEL_CAPACITY: usize = 32;

/// Error returned when the worker task has already stopped.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("switch worker has stopped")]
pub struct WorkerClosed;

/// Messages the worker task understands.
#[derive(Debug)]
enum WorkerCommand {
    Switch(SwitchRequest),
    Reconfigure(SwitchSettings),
}

/// Caller side of a running [`SwitchWorker`].
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) closes the
/// request channel; the worker finishes the request in progress and exits.
pub struct SwitchHandle {
    commands: mpsc::Sender<WorkerCommand>,
    outcomes: mpsc::Receiver<SwitchOutcome>,
    cancel: watch::Sender<()>,
}

impl SwitchHandle {
    /// Queues a switch request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerClosed`] if the worker task is no longer running.
    pub async fn submit(&self, request: SwitchRequest) -> Result<(), WorkerClosed> {
        self.commands
            .send(WorkerCommand::Switch(request))
            .await
            .map_err(|_| WorkerClosed)
    }

    /// Replaces the worker's target, inputs and timing.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerClosed`] if the worker task is no longer running.
    pub async fn reconfigure(&self, settings: SwitchSettings) -> Result<(), WorkerClosed> {
        self.commands
            .send(WorkerCommand::Reconfigure(settings))
            .await
            .map_err(|_| WorkerClosed)
    }

    /// Cuts short the settle wait currently in progress, if any.
    pub fn cancel_settle(&self) {
        // Only fails when the worker is gone, in which case nothing is settling.
        let _ = self.cancel.send(());
    }

    /// Waits for the next outcome.  Returns `None` once the worker has exited
    /// and every outcome has been read.
    pub async fn recv_outcome(&mut self) -> Option<SwitchOutcome> {
        self.outcomes.recv().await
    }

    /// Stops accepting requests and returns the receiver for any outcomes
    /// still in flight.
    pub fn shutdown(self) -> mpsc::Receiver<SwitchOutcome> {
        self.outcomes
    }
}

/// Spawns the switch worker task.
pub struct SwitchWorker;

impl SwitchWorker {
    /// Starts a worker that owns `use_case` on the current Tokio runtime.
    pub fn spawn(use_case: SwitchInputUseCase) -> (SwitchHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(());

        let task = tokio::spawn(run(use_case, command_rx, outcome_tx, cancel_rx));

        let handle = SwitchHandle {
            commands: command_tx,
            outcomes: outcome_rx,
            cancel: cancel_tx,
        };
        (handle, task)
    }
}

async fn run(
    mut use_case: SwitchInputUseCase,
    mut commands: mpsc::Receiver<WorkerCommand>,
    outcomes: mpsc::Sender<SwitchOutcome>,
    mut cancel: watch::Receiver<()>,
) {
    info!("switch worker started");

    while let Some(command) = commands.recv().await {
        let request = match command {
            WorkerCommand::Switch(request) => request,
            WorkerCommand::Reconfigure(settings) => {
                use_case.reconfigure(settings);
                continue;
            }
        };

        if !use_case.accept(request.issued_at) {
            continue;
        }

        let outcome = process(&mut use_case, request.kind, &mut cancel).await;
        if outcomes.send(outcome).await.is_err() {
            debug!("outcome receiver dropped; result discarded");
        }
    }

    info!("switch worker stopped");
}

async fn process(
    use_case: &mut SwitchInputUseCase,
    kind: SwitchKind,
    cancel: &mut watch::Receiver<()>,
) -> SwitchOutcome {
    // Cancellations sent before this request started do not apply to it.
    cancel.borrow_and_update();

    let (index, input) = match use_case.resolve(&kind) {
        Ok(selection) => selection,
        Err(e) => {
            return SwitchOutcome {
                kind,
                index: None,
                input: None,
                result: Err(e),
            }
        }
    };

    let settings = use_case.settings();
    let target = settings.target;
    let frame = CommandFrame::switch_input(settings.subaddress, u32::from(input.code.value()));
    let settle = settings.settle;
    let transport = Arc::clone(use_case.transport());

    let result = match tokio::task::spawn_blocking(move || transport.write_frame(target, &frame))
        .await
    {
        Ok(result) => result.map_err(SelectionError::from),
        Err(e) => {
            error!("block write task failed: {e}");
            Err(SwitchError::Unavailable(format!("block write task failed: {e}")).into())
        }
    };
    use_case.record(index, &result);

    if let Some(delay) = settle.delay_after(result.is_ok()) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            Ok(()) = cancel.changed() => debug!("settle cancelled"),
        }
    }

    SwitchOutcome {
        kind,
        index: Some(index),
        input: Some(input),
        result,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
