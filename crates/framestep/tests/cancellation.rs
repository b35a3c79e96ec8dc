//! Integration tests for the bulk-cancellation protocol.

use anyhow::anyhow;
use crossbeam::channel;
use framestep::{Scheduler, Task, TaskError, TaskState, Wake};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Suspend `task` for `frames`, failing its handle if cancelled.
fn suspend_task(scheduler: &Scheduler, task: &Task<u32>, frames: u64) {
    let handle = task.clone();
    scheduler
        .delay(frames)
        .unwrap()
        .register(move |wake| match wake {
            Wake::Frame => {
                handle.complete(0).unwrap();
                Ok(())
            }
            Wake::Cancelled(err) => {
                let _ = handle.fail(err.clone());
                Err(err)
            }
        });
}

#[test]
fn test_cancel_all_fails_suspended_task_with_abort_error() {
    let scheduler = Scheduler::new();
    let task = Task::new();
    suspend_task(&scheduler, &task, 5);

    scheduler.cancel_all(|| anyhow!("scene torn down")).unwrap();

    assert_eq!(task.state(), TaskState::Failed);
    assert_eq!(task.failure().unwrap().to_string(), "scene torn down");
    assert_eq!(scheduler.task_count(), 0);
    assert!(!scheduler.is_cancelling());
}

#[test]
fn test_cancel_all_constructs_a_fresh_error_per_resumption() {
    let scheduler = Scheduler::new();
    let first = Task::new();
    let second = Task::new();
    suspend_task(&scheduler, &first, 2);
    suspend_task(&scheduler, &second, 4);

    scheduler.cancel_all(|| anyhow!("aborted")).unwrap();

    let first_err = first.failure().unwrap();
    let second_err = second.failure().unwrap();
    assert!(!first_err.is(&second_err));
}

#[test]
fn test_cancel_all_with_handler_observes_uncaught_aborts() {
    let scheduler = Scheduler::new();
    let first = Task::new();
    let second = Task::new();
    suspend_task(&scheduler, &first, 1);
    suspend_task(&scheduler, &second, 8);

    let mut uncaught = 0u32;
    scheduler
        .cancel_all_with(
            || anyhow!("aborted"),
            |invoke, cancel| match invoke() {
                Ok(()) => Ok(()),
                Err(err) if err.is(&cancel) => {
                    uncaught += 1;
                    Ok(())
                }
                Err(err) => Err(err),
            },
        )
        .unwrap();

    assert_eq!(uncaught, 2);
    assert_eq!(scheduler.task_count(), 0);
}

#[test]
fn test_task_may_catch_its_cancellation_and_clean_up() {
    let scheduler = Scheduler::new();
    let task = Task::new();
    let cleaned_up = Arc::new(AtomicBool::new(false));

    let handle = task.clone();
    let cleanup = Arc::clone(&cleaned_up);
    scheduler.delay(5).unwrap().register(move |wake| match wake {
        Wake::Frame => {
            handle.complete(1).unwrap();
            Ok(())
        }
        Wake::Cancelled(_) => {
            // The task body catches the abort, runs its cleanup, and
            // finishes on its own terms.
            cleanup.store(true, Ordering::SeqCst);
            handle.complete(0).unwrap();
            Ok(())
        }
    });

    scheduler.cancel_all(|| anyhow!("aborted")).unwrap();

    assert!(cleaned_up.load(Ordering::SeqCst));
    assert_eq!(task.state(), TaskState::Completed);
    assert_eq!(scheduler.task_count(), 0);
}

#[test]
fn test_unrelated_error_during_teardown_is_fatal() {
    let scheduler = Scheduler::new();
    let defect = TaskError::msg("state corrupted during unwind");

    let thrown = defect.clone();
    scheduler.delay(2).unwrap().register(move |wake| match wake {
        Wake::Frame => Ok(()),
        Wake::Cancelled(_) => Err(thrown),
    });

    let err = scheduler.cancel_all(|| anyhow!("aborted")).unwrap_err();
    assert!(err.is(&defect));
}

#[test]
fn test_cancellation_drains_entries_enqueued_by_the_pass_itself() {
    let scheduler = Scheduler::new();
    let aborted = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&aborted);
    let chained = scheduler.clone();
    scheduler.delay(1).unwrap().register(move |wake| match wake {
        Wake::Frame => Ok(()),
        Wake::Cancelled(err) => {
            log.lock().push("outer");
            // Cleanup work scheduled mid-cancellation must itself be
            // drained before cancel_all returns.
            let inner_log = Arc::clone(&log);
            chained.enqueue_future(
                move |wake| match wake {
                    Wake::Frame => Ok(()),
                    Wake::Cancelled(err) => {
                        inner_log.lock().push("inner");
                        Err(err)
                    }
                },
                3,
            );
            Err(err)
        }
    });

    scheduler.cancel_all(|| anyhow!("aborted")).unwrap();

    assert_eq!(*aborted.lock(), vec!["outer", "inner"]);
    assert_eq!(scheduler.task_count(), 0);
}

#[test]
fn test_cancel_all_waits_for_foreign_operations_to_drain() {
    let scheduler = Scheduler::new();
    let task = Task::new();

    let (release_tx, release_rx) = channel::bounded::<()>(1);
    let bridge = scheduler.run_task(move || {
        release_rx.recv().unwrap();
    });

    let handle = task.clone();
    bridge
        .register(move |wake| match wake {
            Wake::Frame => {
                handle.complete(1).unwrap();
                Ok(())
            }
            Wake::Cancelled(err) => {
                let _ = handle.fail(err.clone());
                Err(err)
            }
        })
        .unwrap();

    // Release the foreign operation from another thread while cancel_all
    // blocks on the external count.
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();
    });

    scheduler.cancel_all(|| anyhow!("aborted")).unwrap();
    releaser.join().unwrap();

    assert_eq!(task.state(), TaskState::Failed);
    assert_eq!(scheduler.task_count(), 0);
}

#[test]
fn test_cancelled_deferred_entry_never_runs() {
    let scheduler = Scheduler::new();
    let entered = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&entered);
    scheduler.start_deferred(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    scheduler.cancel_all(|| anyhow!("aborted")).unwrap();

    assert_eq!(entered.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.task_count(), 0);
}
