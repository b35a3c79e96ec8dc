//! Worker pool for foreign operations.
//!
//! Foreign operations handed to `Scheduler::run_task` must not run on the
//! scheduler's owning context; this fixed pool of named threads runs them
//! and lets their bridges hand completions back through the frame queue.

use crossbeam::channel::{self, Sender};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send>;

/// Fixed pool of worker threads fed through an unbounded channel.
///
/// Dropping the pool closes the channel; workers drain what is left and are
/// joined.
pub(crate) struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` threads named `framestep-worker-N`.
    pub(crate) fn new(worker_count: usize) -> Self {
        let (job_tx, job_rx) = channel::unbounded::<Job>();

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("framestep-worker-{}", id))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        Self {
            job_tx: Some(job_tx),
            handles,
        }
    }

    /// Hand a job to the pool.
    pub(crate) fn execute(&self, job: Job) {
        if let Some(tx) = &self.job_tx {
            // The receivers live as long as the pool, so this cannot fail.
            let _ = tx.send(job);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's recv loop.
        self.job_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
