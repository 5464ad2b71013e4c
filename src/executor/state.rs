//! Run state machine shared between the worker and its handle

use crate::types::{RunState, TestMode};
use tokio::sync::watch;

/// States a run walks through for `mode`, in order, before it completes
pub fn phase_plan(mode: TestMode) -> Vec<RunState> {
    let mut plan = vec![RunState::Preparing];
    if mode.includes_download() {
        plan.push(RunState::Downloading);
    }
    if mode.includes_upload() {
        plan.push(RunState::Uploading);
    }
    if mode.includes_latency() {
        plan.push(RunState::ProbingLatency);
    }
    plan
}

/// Publishes the current run state to any number of observers.
///
/// Once a terminal state is entered further transitions are ignored.
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<RunState>,
}

impl StateTracker {
    pub fn new() -> (Self, watch::Receiver<RunState>) {
        let (tx, rx) = watch::channel(RunState::Idle);
        (Self { tx }, rx)
    }

    pub fn current(&self) -> RunState {
        *self.tx.borrow()
    }

    /// Move to `next`. Returns false when the run already ended.
    pub fn enter(&self, next: RunState) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_terminal() || *state == next {
                false
            } else {
                *state = next;
                true
            }
        })
    }
}
