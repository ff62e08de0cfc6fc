//! A fixed-size worker pool over a shared task queue.
//!
//! Workers block on a condition variable, pop tasks one at a time and park
//! results under a separate lock, so submission never contends with result
//! collection. The pool is meant for batch jobs whose reduction is
//! commutative: results arrive in completion order, not submission order.
//!
//! Key characteristics:
//! - Unbounded queue, `submit` never blocks
//! - `close` wakes every worker; they drain the queue and exit
//! - A shared stop flag, checked once per task, abandons pending work
//!   without tearing down mid-task
//! - Lock poisoning is absorbed, a panicking task cannot wedge the pool

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::debug;

/// Fixed worker threads consuming a shared queue of tasks.
pub struct WorkerPool<T, R> {
    shared: Arc<Shared<T, R>>,
    workers: Vec<JoinHandle<()>>,
}

struct Shared<T, R> {
    queue: Mutex<Queue<T>>,
    available: Condvar,
    results: Mutex<Vec<R>>,
    stop: Arc<AtomicBool>,
}

struct Queue<T> {
    tasks: VecDeque<T>,
    closed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One worker per available core, keeping one core free for the
/// submitting thread.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get().saturating_sub(1).max(1))
}

impl<T, R> WorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Spawns `workers` threads (at least one) running `job` on each task.
    pub fn new<F>(workers: usize, job: F) -> Self
    where
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        Self::with_stop_flag(workers, Arc::new(AtomicBool::new(false)), job)
    }

    /// Like [`WorkerPool::new`], with an externally owned stop flag.
    ///
    /// Setting the flag (from a signal handler, another thread, anywhere)
    /// makes every worker exit after its current task and leaves pending
    /// tasks unprocessed.
    pub fn with_stop_flag<F>(workers: usize, stop: Arc<AtomicBool>, job: F) -> Self
    where
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            results: Mutex::new(Vec::new()),
            stop,
        });
        let job = Arc::new(job);
        let workers = (0..workers.max(1))
            .map(|_| {
                let shared = Arc::clone(&shared);
                let job = Arc::clone(&job);
                thread::spawn(move || worker_loop(&shared, job.as_ref()))
            })
            .collect();
        Self { shared, workers }
    }

    /// Queues a task and wakes one worker. Tasks submitted after
    /// [`WorkerPool::close`] are dropped.
    pub fn submit(&self, task: T) {
        {
            let mut queue = lock(&self.shared.queue);
            if queue.closed {
                return;
            }
            queue.tasks.push_back(task);
        }
        self.shared.available.notify_one();
    }

    /// Closes the queue and wakes every worker; they exit once it drains.
    pub fn close(&self) {
        lock(&self.shared.queue).closed = true;
        self.shared.available.notify_all();
    }

    /// Raises the stop flag and wakes every worker. Pending tasks are
    /// abandoned; running tasks finish.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        self.shared.available.notify_all();
    }

    /// Closes the queue, waits for every worker and returns the results in
    /// completion order.
    pub fn join(self) -> Vec<R> {
        self.close();
        let Self { shared, workers } = self;
        for worker in workers {
            let _ = worker.join();
        }
        match Arc::try_unwrap(shared) {
            Ok(shared) => shared
                .results
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            // Unreachable once every worker has exited, but harmless.
            Err(shared) => std::mem::take(&mut *lock(&shared.results)),
        }
    }
}

fn worker_loop<T, R, F>(shared: &Shared<T, R>, job: &F)
where
    F: Fn(T) -> R,
{
    loop {
        let task = {
            let mut queue = lock(&shared.queue);
            loop {
                if shared.stop.load(Ordering::Relaxed) {
                    debug!("worker stopping with {} tasks pending", queue.tasks.len());
                    return;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.closed {
                    return;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        let result = job(task);
        lock(&shared.results).push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_task_is_processed_once() {
        let pool = WorkerPool::new(4, |n: u64| n * n);
        for n in 0..100 {
            pool.submit(n);
        }
        let mut results = pool.join();
        results.sort_unstable();
        let expected: Vec<u64> = (0..100).map(|n| n * n).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_sum_is_submission_order_independent() {
        let pool = WorkerPool::new(3, |n: u64| n);
        for n in (0..50).rev() {
            pool.submit(n);
        }
        let total: u64 = pool.join().into_iter().sum();
        assert_eq!(total, 49 * 50 / 2);
    }

    #[test]
    fn test_submissions_after_close_are_dropped() {
        let pool = WorkerPool::new(2, |n: u64| n);
        pool.submit(1);
        pool.close();
        pool.submit(2);
        assert_eq!(pool.join(), vec![1]);
    }

    #[test]
    fn test_stop_abandons_pending_tasks() {
        let stop = Arc::new(AtomicBool::new(true));
        let pool = WorkerPool::with_stop_flag(2, Arc::clone(&stop), |n: u64| n);
        for n in 0..1000 {
            pool.submit(n);
        }
        // The flag was already raised, so workers exit without popping.
        assert!(pool.join().is_empty());
    }

    #[test]
    fn test_zero_workers_still_runs_on_one() {
        let pool = WorkerPool::new(0, |n: u64| n + 1);
        pool.submit(41);
        assert_eq!(pool.join(), vec![42]);
    }

    #[test]
    fn test_default_workers_is_positive() {
        assert!(default_workers() >= 1);
    }
}
