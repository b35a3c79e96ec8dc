//! Suspension requests and the resume-callback contract.

use crate::error::TaskError;
use crate::scheduler::scheduler::Shared;
use std::sync::Arc;

/// Why a queued resumption is being invoked.
#[derive(Debug)]
pub enum Wake {
    /// The target frame arrived; resume normally.
    Frame,
    /// The scheduler is cancelling all work; the task should abort at its
    /// suspension point with this error.
    Cancelled(TaskError),
}

/// Callback registered at a suspension point.
///
/// Returning `Err` means the wake signal escaped the task body uncaught.
/// During normal frame stepping a failing task captures its error on its own
/// task handle and returns `Ok`, so `Err` is seen almost exclusively when a
/// [`Wake::Cancelled`] signal is not caught inside the task.
pub type ResumeFn = Box<dyn FnOnce(Wake) -> Result<(), TaskError> + Send>;

/// A request to resume a suspended task a fixed number of frames from now.
///
/// Obtained from [`Scheduler::next`](crate::Scheduler::next) or
/// [`Scheduler::delay`](crate::Scheduler::delay). The suspending computation
/// registers its single resume callback with [`register`](Self::register),
/// which places the resumption in the frame queue; the request is consumed
/// by registration and is immutable before it.
pub struct SuspensionRequest {
    shared: Arc<Shared>,
    delay: u64,
}

impl SuspensionRequest {
    pub(crate) fn new(shared: Arc<Shared>, delay: u64) -> Self {
        Self { shared, delay }
    }

    /// Number of frames until the resumption fires.
    pub fn delay(&self) -> u64 {
        self.delay
    }

    /// Register the resume callback, scheduling it `delay` frames from now.
    pub fn register<F>(self, resume: F)
    where
        F: FnOnce(Wake) -> Result<(), TaskError> + Send + 'static,
    {
        self.shared.enqueue(Box::new(resume), self.delay);
    }
}
