//! Frame-stepped cooperative task scheduling.
//!
//! Many independently written suspendable computations run in lock-step
//! with an external clock: each executes synchronously until it voluntarily
//! suspends, then resumes exactly when the scheduler decides the requested
//! frame has arrived. This crate supplies the scheduler, task handles, and
//! the bridge for foreign asynchronous work; *how* a computation is made
//! resumable (generators, hand-written state machines, native coroutines)
//! is the embedder's business. The contract is small: run until a
//! suspension point, register one resume callback per suspension, and
//! report the outcome through a [`Task`] handle.
//!
//! A host loop launches work with [`Scheduler::start_immediately`] or
//! [`Scheduler::start_deferred`], calls [`Scheduler::run_next_frame`] once
//! per tick, and at shutdown runs [`Scheduler::cancel_all`] followed by
//! [`Scheduler::run_until_all_tasks_finish`].
//!
//! # Example
//!
//! ```rust,ignore
//! use framestep::{Scheduler, Task, Wake};
//!
//! let scheduler = Scheduler::new();
//! let task = Task::new();
//!
//! let handle = task.clone();
//! let sched = scheduler.clone();
//! scheduler.start_immediately(move || {
//!     // Suspend for two frames, then finish with a value.
//!     sched.delay(2).unwrap().register(move |wake| match wake {
//!         Wake::Frame => { handle.complete(42).unwrap(); Ok(()) }
//!         Wake::Cancelled(err) => { let _ = handle.fail(err.clone()); Err(err) }
//!     });
//! });
//!
//! scheduler.run_next_frame().unwrap(); // still in progress
//! scheduler.run_next_frame().unwrap(); // completes here
//! assert_eq!(task.result().unwrap(), 42);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, TaskError};
pub use scheduler::{
    AbortInvocation, ExternalBridge, ResumeFn, Scheduler, SchedulerConfig, SuspensionRequest,
    Task, TaskState, Wake,
};
