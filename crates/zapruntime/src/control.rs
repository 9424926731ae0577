//! Run control: the resumable state machine shared between a run loop and
//! whoever wants to pause, resume or stop it.
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |          |
//!            v          v
//!     Completed | Failed
//! ```
//!
//! Pausing takes effect before the next step is dispatched; a step already
//! in flight runs to completion. Stopping cancels the run's token, which is
//! also handed to the in-flight handler.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use zapcore::{status::progress_percent, ExecutionStatus, StepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// Steps fully processed out of the run's total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunProgress {
    pub processed: usize,
    pub total: usize,
    /// Index of the step currently dispatched, if any.
    pub current_step: Option<usize>,
}

impl RunProgress {
    pub fn percent(&self) -> f64 {
        progress_percent(self.processed, self.total)
    }
}

#[derive(Clone)]
pub struct RunControl {
    state: Arc<watch::Sender<RunState>>,
    progress: Arc<watch::Sender<RunProgress>>,
    cancellation: CancellationToken,
}

impl RunControl {
    pub fn new(total_steps: usize) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        let (progress, _) = watch::channel(RunProgress {
            total: total_steps,
            ..RunProgress::default()
        });
        Self {
            state: Arc::new(state),
            progress: Arc::new(progress),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Run-level status matching the current control state, for a record
    /// that hasn't reached a terminal status yet.
    pub fn execution_status(&self) -> ExecutionStatus {
        match self.state() {
            RunState::Paused => ExecutionStatus::Paused,
            RunState::Completed => ExecutionStatus::Completed,
            RunState::Failed => ExecutionStatus::Failed,
            RunState::Idle | RunState::Running => ExecutionStatus::Running,
        }
    }

    pub(crate) fn begin(&self) -> bool {
        self.transition(RunState::Idle, RunState::Running)
    }

    /// Running -> Paused. Returns false if the run wasn't running.
    pub fn pause(&self) -> bool {
        !self.is_stopped() && self.transition(RunState::Running, RunState::Paused)
    }

    /// Paused -> Running. Returns false if the run wasn't paused.
    pub fn resume(&self) -> bool {
        !self.is_stopped() && self.transition(RunState::Paused, RunState::Running)
    }

    /// Request a hard stop. Returns false if the run already finished or
    /// was already stopped.
    pub fn stop(&self) -> bool {
        if self.state().is_terminal() || self.is_stopped() {
            return false;
        }
        self.cancellation.cancel();
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub(crate) fn finish(&self, state: RunState) {
        debug_assert!(state.is_terminal());
        self.state.send_replace(state);
        self.progress.send_modify(|p| p.current_step = None);
    }

    /// Block while paused. Returns immediately when running and with
    /// `Cancelled` once the run is stopped.
    pub async fn wait_while_paused(&self) -> Result<(), StepError> {
        let mut rx = self.subscribe_state();
        loop {
            if self.is_stopped() {
                return Err(StepError::Cancelled);
            }
            if *rx.borrow_and_update() != RunState::Paused {
                return Ok(());
            }
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(StepError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    pub fn progress(&self) -> RunProgress {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<RunProgress> {
        self.progress.subscribe()
    }

    pub(crate) fn enter_step(&self, index: usize) {
        self.progress.send_modify(|p| p.current_step = Some(index));
    }

    /// Record that steps `0..=index` are processed. Never moves backwards.
    pub(crate) fn advance(&self, index: usize) -> RunProgress {
        self.progress.send_modify(|p| {
            p.processed = p.processed.max(index + 1).min(p.total);
        });
        self.progress()
    }

    pub(crate) fn reset_progress(&self) {
        self.progress.send_modify(|p| {
            p.processed = 0;
            p.current_step = None;
        });
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}
