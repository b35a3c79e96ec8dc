//! Frame-stepped task scheduler.
//!
//! The scheduler owns the frame counter and a time-ordered queue of pending
//! resumptions. Task bodies execute synchronously on the owning context;
//! worker threads only run foreign operations handed to
//! [`Scheduler::run_task`] and hand their completions back through the
//! queue.

mod bridge;
mod pool;
mod queue;
#[allow(clippy::module_inception)]
mod scheduler;
mod suspend;
mod task;

pub use bridge::ExternalBridge;
pub use scheduler::{AbortInvocation, Scheduler, SchedulerConfig};
pub use suspend::{ResumeFn, SuspensionRequest, Wake};
pub use task::{Task, TaskState};
