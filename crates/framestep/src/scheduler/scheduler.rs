//! Frame-stepped scheduler: the frame counter, the pending queue, task
//! launch entry points, and the cancellation protocol.

use crate::error::{SchedulerError, TaskError};
use crate::scheduler::bridge::ExternalBridge;
use crate::scheduler::pool::WorkerPool;
use crate::scheduler::queue::{PendingEntry, PendingQueue};
use crate::scheduler::suspend::{ResumeFn, SuspensionRequest, Wake};
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// How long a blocking drain waits before re-checking the foreign-operation
/// count, as a safety net under the condvar.
const DRAIN_RECHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a scheduler instance.
///
/// Passed explicitly at construction; schedulers share no process-wide
/// state, so independent instances can coexist in one process.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker threads available to [`Scheduler::run_task`] foreign
    /// operations. The pool is only spawned on first use.
    pub worker_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get().min(4),
        }
    }
}

/// State shared between the scheduler, suspension requests, and bridges.
pub(crate) struct Shared {
    /// Current frame; advanced only by the owning context.
    frame: AtomicU64,
    /// Time-ordered pending resumptions.
    queue: Mutex<PendingQueue>,
    /// Signalled whenever the queue grows, so blocking drains can wait for
    /// foreign completions instead of spinning.
    queue_grew: Condvar,
    /// In-flight foreign operations bridged into this scheduler.
    external: AtomicUsize,
    /// Whether a cancellation pass is running.
    cancelling: AtomicBool,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            frame: AtomicU64::new(0),
            queue: Mutex::new(PendingQueue::new()),
            queue_grew: Condvar::new(),
            external: AtomicUsize::new(0),
            cancelling: AtomicBool::new(false),
        }
    }

    pub(crate) fn current_frame(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// Insert a resumption `delay` frames from now.
    pub(crate) fn enqueue(&self, resume: ResumeFn, delay: u64) {
        let target = self.current_frame() + delay;
        trace!(target_frame = target, delay, "queued resumption");
        self.queue.lock().push(target, resume);
        self.queue_grew.notify_all();
    }

    /// Reserve an external slot for a foreign operation in flight.
    pub(crate) fn add_external(&self) {
        self.external.fetch_add(1, Ordering::AcqRel);
    }

    /// Bridge completion: move the registered resume into the queue at delay
    /// 0 and release the external slot in one queue-locked step, so
    /// `task_count` never dips while a bridged task changes hands.
    pub(crate) fn complete_external(&self, resume: ResumeFn) {
        let target = self.current_frame();
        let mut queue = self.queue.lock();
        queue.push(target, resume);
        self.external.fetch_sub(1, Ordering::AcqRel);
        drop(queue);
        self.queue_grew.notify_all();
    }

    pub(crate) fn task_count(&self) -> usize {
        self.queue.lock().len() + self.external.load(Ordering::Acquire)
    }

    /// Pop the earliest entry regardless of frame, blocking while foreign
    /// operations are still in flight. `None` means nothing is left at all.
    ///
    /// When `drain_external_first` is set the wait happens even if the queue
    /// is non-empty, so the caller only sees entries once no foreign work
    /// remains (the cancellation protocol's first phase).
    fn pop_blocking(&self, drain_external_first: bool) -> Option<PendingEntry> {
        let mut queue = self.queue.lock();
        loop {
            if drain_external_first && self.external.load(Ordering::Acquire) != 0 {
                self.queue_grew.wait_for(&mut queue, DRAIN_RECHECK_INTERVAL);
                continue;
            }
            if let Some(entry) = queue.pop_earliest() {
                return Some(entry);
            }
            if self.external.load(Ordering::Acquire) == 0 {
                return None;
            }
            self.queue_grew.wait_for(&mut queue, DRAIN_RECHECK_INTERVAL);
        }
    }
}

struct SchedulerInner {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    pool: OnceCell<WorkerPool>,
}

/// Single-threaded, frame-stepped cooperative scheduler.
///
/// One owning context drives [`run_next_frame`](Self::run_next_frame),
/// [`run_until_all_tasks_finish`](Self::run_until_all_tasks_finish), and
/// [`cancel_all`](Self::cancel_all); task bodies execute synchronously and
/// sequentially on that context, never in parallel with each other.
/// [`enqueue_future`](Self::enqueue_future),
/// [`start_deferred`](Self::start_deferred), and
/// [`task_count`](Self::task_count) are the only operations safe to call
/// from other contexts.
///
/// The handle is cheaply clonable; clones drive the same scheduler, which
/// lets a resume callback create its own next suspension request.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

/// Wrapped abort invocation handed to a [`Scheduler::cancel_all_with`]
/// handler. Calling it resumes the queued task with the injected
/// cancellation error; the returned `Err` is whatever escaped the task body
/// uncaught.
pub type AbortInvocation = Box<dyn FnOnce() -> Result<(), TaskError> + Send>;

impl Scheduler {
    /// Create a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with an explicit configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                shared: Arc::new(Shared::new()),
                config,
                pool: OnceCell::new(),
            }),
        }
    }

    fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    fn pool(&self) -> &WorkerPool {
        self.inner
            .pool
            .get_or_init(|| WorkerPool::new(self.inner.config.worker_threads))
    }

    /// Current frame number. Starts at 0; only frame advancement moves it.
    pub fn current_frame(&self) -> u64 {
        self.shared().current_frame()
    }

    /// Pending resumptions plus in-flight foreign operations.
    ///
    /// Reaching zero signals that nothing is left to do. The reading is
    /// point-in-time: other contexts may still enqueue work after it.
    pub fn task_count(&self) -> usize {
        self.shared().task_count()
    }

    /// Whether a [`cancel_all`](Self::cancel_all) pass is currently running.
    pub fn is_cancelling(&self) -> bool {
        self.shared().cancelling.load(Ordering::Acquire)
    }

    /// Insert a resumption `delay` frames from now. Safe from any context,
    /// concurrently with frame advancement.
    pub fn enqueue_future<F>(&self, resume: F, delay: u64)
    where
        F: FnOnce(Wake) -> Result<(), TaskError> + Send + 'static,
    {
        self.shared().enqueue(Box::new(resume), delay);
    }

    /// Suspension request that resumes on the next frame.
    pub fn next(&self) -> SuspensionRequest {
        SuspensionRequest::new(Arc::clone(self.shared()), 1)
    }

    /// Suspension request that resumes `frames` frames from now.
    ///
    /// `frames` must be at least 1; delay 0 is reserved for bridge
    /// completions.
    pub fn delay(&self, frames: u64) -> Result<SuspensionRequest, SchedulerError> {
        if frames == 0 {
            return Err(SchedulerError::InvalidDelay(frames));
        }
        Ok(SuspensionRequest::new(Arc::clone(self.shared()), frames))
    }

    /// Run `entry` synchronously on the calling context, returning its value
    /// as soon as it finishes or reaches its first suspension point.
    pub fn start_immediately<F, R>(&self, entry: F) -> R
    where
        F: FnOnce() -> R,
    {
        trace!(frame = self.current_frame(), "starting task immediately");
        entry()
    }

    /// Schedule `entry` to begin on the next frame without running anything
    /// now. Safe from any context; this is how an external execution context
    /// injects new work.
    pub fn start_deferred<F>(&self, entry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        trace!(frame = self.current_frame(), "deferring task start");
        self.enqueue_future(
            move |wake| match wake {
                Wake::Frame => {
                    entry();
                    Ok(())
                }
                // The entry never started, so there is no task body to catch
                // the abort; report it uncaught.
                Wake::Cancelled(err) => Err(err),
            },
            1,
        );
    }

    /// Start `operation` on the worker pool and return the bridge the
    /// waiting task registers its resumption with.
    ///
    /// The bridged resumption always runs during a later
    /// [`run_next_frame`](Self::run_next_frame) or
    /// [`run_until_all_tasks_finish`](Self::run_until_all_tasks_finish) call
    /// on the owning context, never on the worker. Errors inside
    /// `operation` are the embedder's to surface through its own
    /// task-failure channel.
    pub fn run_task<F>(&self, operation: F) -> ExternalBridge
    where
        F: FnOnce() + Send + 'static,
    {
        debug!(frame = self.current_frame(), "launching foreign operation");
        self.shared().add_external();
        let bridge = ExternalBridge::new(Arc::clone(self.shared()));
        let completer = bridge.completer();
        self.pool().execute(Box::new(move || {
            operation();
            completer.fire();
        }));
        bridge
    }

    /// Advance one frame and drain every resumption due at or below it, in
    /// `(target frame, insertion order)` order.
    ///
    /// The queue head is re-checked after every invocation, so resumptions
    /// enqueued mid-drain for the current frame (bridge completions, delay-0
    /// work) run within the same call. An `Err` from a resumption is
    /// propagated, never swallowed.
    pub fn run_next_frame(&self) -> Result<(), TaskError> {
        let shared = self.shared();
        let frame = shared.frame.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(frame, "advancing frame");
        loop {
            let entry = shared.queue.lock().pop_due(frame);
            match entry {
                Some(entry) => (entry.resume)(Wake::Frame)?,
                None => return Ok(()),
            }
        }
    }

    /// Ignore frame gating and run everything to completion, fast-forwarding
    /// the frame counter to each popped entry's target frame.
    ///
    /// Blocks while foreign operations are in flight so their bridged
    /// resumptions (and any deferred cleanup inside suspended computations)
    /// still run. Returns once the queue is empty and no foreign work
    /// remains; `task_count` is 0 at that point.
    pub fn run_until_all_tasks_finish(&self) -> Result<(), TaskError> {
        let shared = self.shared();
        while let Some(entry) = shared.pop_blocking(false) {
            shared.frame.fetch_max(entry.target_frame, Ordering::AcqRel);
            (entry.resume)(Wake::Frame)?;
        }
        Ok(())
    }

    /// Abort every queued resumption instead of resuming it.
    ///
    /// First blocks until in-flight foreign operations drain (they cannot be
    /// forcibly stopped here; cancel them independently beforehand), then
    /// pops every pending entry — including entries the pass itself enqueues
    /// — and invokes it with a freshly constructed error from `make_error`,
    /// raised at the task's suspension point. A cancellation error the task
    /// does not catch is discarded; any other error surfacing from a
    /// resumption is a teardown defect and propagates.
    pub fn cancel_all<E>(&self, make_error: E) -> Result<(), TaskError>
    where
        E: Fn() -> anyhow::Error,
    {
        self.cancel_all_with(make_error, |invoke, cancel| match invoke() {
            Ok(()) => Ok(()),
            Err(err) if err.is(&cancel) => Ok(()),
            Err(err) => Err(err),
        })
    }

    /// Like [`cancel_all`](Self::cancel_all), but routes each wrapped
    /// invocation through `on_uncaught` together with the injected
    /// cancellation error. The handler runs the invocation and decides what
    /// to do with an uncaught cancellation; returning `Err` aborts the pass
    /// and propagates to the caller.
    pub fn cancel_all_with<E, H>(&self, make_error: E, mut on_uncaught: H) -> Result<(), TaskError>
    where
        E: Fn() -> anyhow::Error,
        H: FnMut(AbortInvocation, TaskError) -> Result<(), TaskError>,
    {
        let shared = self.shared();
        shared.cancelling.store(true, Ordering::Release);
        let result = self.cancel_all_inner(&make_error, &mut on_uncaught);
        shared.cancelling.store(false, Ordering::Release);
        result
    }

    fn cancel_all_inner(
        &self,
        make_error: &dyn Fn() -> anyhow::Error,
        on_uncaught: &mut dyn FnMut(AbortInvocation, TaskError) -> Result<(), TaskError>,
    ) -> Result<(), TaskError> {
        let shared = self.shared();
        // Popping waits for the external count to reach zero before handing
        // out entries, so bridged resumptions are aborted like the rest.
        while let Some(entry) = shared.pop_blocking(true) {
            debug!(
                target_frame = entry.target_frame,
                "aborting queued resumption"
            );
            let cancel = TaskError::new(make_error());
            let injected = cancel.clone();
            let resume = entry.resume;
            on_uncaught(
                Box::new(move || resume(Wake::Cancelled(injected))),
                cancel,
            )?;
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
