//! Task handles: the observable state of one suspendable computation.

use crate::error::{SchedulerError, TaskError};
use parking_lot::Mutex;
use std::sync::Arc;

/// State of a task.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Still running, or suspended at a yield point.
    InProgress,
    /// Completed with a result.
    Completed,
    /// Failed with a captured error.
    Failed,
}

struct TaskInner<T> {
    state: TaskState,
    result: Option<T>,
    failure: Option<TaskError>,
    continuations: Vec<Box<dyn FnOnce() + Send>>,
}

/// Handle to one suspendable computation.
///
/// Created when the computation is entered and driven to a terminal state
/// exactly once by the computation's own success or failure signal.
/// Continuations registered before completion fire in registration order on
/// the completing context; a continuation registered after completion fires
/// immediately, so awaiting an already-finished task resumes without a frame
/// of delay.
///
/// The handle is clonable so both the computation and its awaiters can hold
/// it. It is designed to be touched from the scheduler's owning context;
/// the interior lock covers the completion handoff, not any wider
/// cross-context protocol.
pub struct Task<T> {
    inner: Arc<Mutex<TaskInner<T>>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Task<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Task<T> {
    /// Create a handle for a computation that has just been entered.
    pub fn new() -> Self {
        Self::with_state(TaskState::InProgress, None, None)
    }

    /// Create an already-completed handle.
    pub fn completed(value: T) -> Self {
        Self::with_state(TaskState::Completed, Some(value), None)
    }

    /// Create an already-failed handle.
    pub fn failed(error: TaskError) -> Self {
        Self::with_state(TaskState::Failed, None, Some(error))
    }

    fn with_state(state: TaskState, result: Option<T>, failure: Option<TaskError>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TaskInner {
                state,
                result,
                failure,
                continuations: Vec::new(),
            })),
        }
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state() != TaskState::InProgress
    }

    /// Complete the task with a result and fire registered continuations in
    /// registration order.
    ///
    /// Fails with `InvalidState` if the task is already terminal.
    pub fn complete(&self, value: T) -> Result<(), SchedulerError> {
        let continuations = {
            let mut inner = self.inner.lock();
            if inner.state != TaskState::InProgress {
                return Err(SchedulerError::InvalidState("task is already terminal"));
            }
            inner.state = TaskState::Completed;
            inner.result = Some(value);
            std::mem::take(&mut inner.continuations)
        };
        // Invoked outside the lock: a continuation may register further
        // continuations or complete other tasks.
        for continuation in continuations {
            continuation();
        }
        Ok(())
    }

    /// Fail the task, capturing the error for later re-raising, and fire
    /// continuations exactly as on success.
    ///
    /// Fails with `InvalidState` if the task is already terminal.
    pub fn fail(&self, error: TaskError) -> Result<(), SchedulerError> {
        let continuations = {
            let mut inner = self.inner.lock();
            if inner.state != TaskState::InProgress {
                return Err(SchedulerError::InvalidState("task is already terminal"));
            }
            inner.state = TaskState::Failed;
            inner.failure = Some(error);
            std::mem::take(&mut inner.continuations)
        };
        for continuation in continuations {
            continuation();
        }
        Ok(())
    }

    /// Register a callback to run when the task reaches a terminal state.
    ///
    /// If the task is already terminal the callback runs synchronously right
    /// away. Multiple registrations all fire, in the order registered.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut inner = self.inner.lock();
            if inner.state == TaskState::InProgress {
                inner.continuations.push(Box::new(continuation));
                return;
            }
        }
        continuation();
    }

    /// Read the stored result.
    ///
    /// Fails with `InvalidState` while the task is in progress, or if it
    /// failed instead of completing.
    pub fn result(&self) -> Result<T, SchedulerError>
    where
        T: Clone,
    {
        let inner = self.inner.lock();
        match inner.state {
            TaskState::InProgress => Err(SchedulerError::InvalidState("task has not finished")),
            TaskState::Failed => Err(SchedulerError::InvalidState(
                "task failed; read the failure instead",
            )),
            TaskState::Completed => inner
                .result
                .clone()
                .ok_or(SchedulerError::InvalidState("completed task has no result")),
        }
    }

    /// Read the captured failure.
    ///
    /// Fails with `InvalidState` while the task is in progress, or if it
    /// completed successfully.
    pub fn failure(&self) -> Result<TaskError, SchedulerError> {
        let inner = self.inner.lock();
        match inner.state {
            TaskState::InProgress => Err(SchedulerError::InvalidState("task has not finished")),
            TaskState::Completed => Err(SchedulerError::InvalidState("task did not fail")),
            TaskState::Failed => inner
                .failure
                .clone()
                .ok_or(SchedulerError::InvalidState("failed task has no error")),
        }
    }
}
