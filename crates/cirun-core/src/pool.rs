//! Bounded worker pool for job instances.
//!
//! Instances share nothing, so workers just pull the next index from an atomic
//! counter. Results come back over a channel to the calling thread, which
//! hands each one to a callback as it arrives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use crate::executor::{ExecutionResult, Executor};
use crate::matrix::JobInstance;

/// Run every instance with up to `workers` at a time. Returns results in
/// instance order regardless of completion order.
pub fn run_all<F>(
    executor: &Executor,
    instances: &[JobInstance],
    workers: usize,
    mut on_result: F,
) -> Vec<ExecutionResult>
where
    F: FnMut(&ExecutionResult),
{
    let workers = workers.clamp(1, instances.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, ExecutionResult)>();

    let mut slots: Vec<Option<ExecutionResult>> = vec![None; instances.len()];

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(instance) = instances.get(i) else {
                    break;
                };
                tracing::debug!(worker, job = instance.number, "picked up job");
                if tx.send((i, executor.run(instance))).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (i, result) in rx {
            on_result(&result);
            slots[i] = Some(result);
        }
    });

    slots.into_iter().flatten().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
