//! Scheduler error types.

use std::fmt;
use std::sync::Arc;

/// Errors produced by misusing the scheduler API.
///
/// These are programmer defects surfaced at the call site; they are fatal to
/// the offending call but never to the scheduler itself.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// A timed wait was requested with a zero-frame delay.
    ///
    /// Delay 0 is reserved for bridge completions, which resume on the very
    /// next drain pass.
    #[error("delay must be at least one frame (got {0})")]
    InvalidDelay(u64),

    /// An operation was attempted in a state that does not permit it, e.g.
    /// completing a task that is already terminal.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

/// A failure captured from a task body.
///
/// Cheap to clone and preserves the originating error's cause chain, so the
/// same failure can be stored on a task handle and re-raised at every await
/// point that observes it. Clones share identity: [`TaskError::is`] tells
/// whether two values refer to the same captured failure, which is how
/// `cancel_all` recognizes its own injected cancellation error.
#[derive(Clone)]
pub struct TaskError(Arc<anyhow::Error>);

impl TaskError {
    /// Wrap an error for propagation through task handles.
    pub fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }

    /// Construct from a message, without an underlying source error.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(anyhow::Error::msg(message))
    }

    /// Whether `other` is the same captured failure (identity, not equality).
    pub fn is(&self, other: &TaskError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the underlying error chain.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let err: &anyhow::Error = &self.0;
        Some(err.as_ref())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err)
    }
}
