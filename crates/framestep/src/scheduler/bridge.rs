//! External bridges: resuming tasks that wait on foreign operations.

use crate::error::{SchedulerError, TaskError};
use crate::scheduler::scheduler::Shared;
use crate::scheduler::suspend::{ResumeFn, Wake};
use parking_lot::Mutex;
use std::sync::Arc;

enum BridgeState {
    /// Neither side has arrived yet.
    Waiting,
    /// The waiting task registered its resume callback first.
    Registered(ResumeFn),
    /// The foreign operation finished first.
    Completed,
    /// The resume callback was handed to the frame queue; the bridge is
    /// spent.
    Fired,
}

struct BridgeInner {
    shared: Arc<Shared>,
    state: Mutex<BridgeState>,
}

/// One-shot connection between a foreign operation and the frame queue.
///
/// Returned by [`Scheduler::run_task`](crate::Scheduler::run_task). The
/// waiting task registers exactly one resume callback; when the foreign
/// operation signals completion, the callback is enqueued at delay 0 so the
/// task resumes during a subsequent drain on the scheduler's owning context
/// — never on the foreign one. Registration and completion may happen in
/// either order.
pub struct ExternalBridge {
    inner: Arc<BridgeInner>,
}

impl ExternalBridge {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                shared,
                state: Mutex::new(BridgeState::Waiting),
            }),
        }
    }

    /// The completion side handed to the foreign execution context.
    pub(crate) fn completer(&self) -> BridgeCompleter {
        BridgeCompleter {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Register the waiting task's single resume callback.
    ///
    /// If the foreign operation already finished, the callback goes straight
    /// to the frame queue for the next drain pass. Fails with `InvalidState`
    /// if a callback was already registered.
    pub fn register<F>(&self, resume: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(Wake) -> Result<(), TaskError> + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        match std::mem::replace(&mut *state, BridgeState::Fired) {
            BridgeState::Waiting => {
                *state = BridgeState::Registered(Box::new(resume));
                Ok(())
            }
            BridgeState::Completed => {
                drop(state);
                self.inner.shared.complete_external(Box::new(resume));
                Ok(())
            }
            previous @ BridgeState::Registered(_) => {
                *state = previous;
                Err(SchedulerError::InvalidState(
                    "bridge already has a resume callback",
                ))
            }
            BridgeState::Fired => Err(SchedulerError::InvalidState("bridge already fired")),
        }
    }
}

/// Completion side of a bridge, fired exactly once from the foreign
/// execution context when its operation finishes.
pub(crate) struct BridgeCompleter {
    inner: Arc<BridgeInner>,
}

impl BridgeCompleter {
    /// Signal that the foreign operation finished.
    pub(crate) fn fire(self) {
        let mut state = self.inner.state.lock();
        match std::mem::replace(&mut *state, BridgeState::Fired) {
            BridgeState::Waiting => {
                *state = BridgeState::Completed;
            }
            BridgeState::Registered(resume) => {
                drop(state);
                self.inner.shared.complete_external(resume);
            }
            BridgeState::Completed | BridgeState::Fired => {
                // fire is called once per bridge; nothing left to do.
            }
        }
    }
}
