//! Fixed-size worker pool with three submission primitives: offload,
//! queue, and schedule (spec.md §4.4).
//!
//! The job queue and its reschedule protocol are modelled as a mutex-guarded
//! `VecDeque` with a condition variable (spec.md §9's explicit design
//! note), matching the teacher's own preference for `parking_lot`
//! synchronization primitives over hand-rolled spinlocks.

mod job;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

pub use job::JobOutcome;
use job::Job;

/// A future-like handle for [`PoolWorker::queue`].
///
/// Backed by a one-shot channel; `recv` blocks until the submitted callable
/// has run.
pub struct JobHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Block until the job's result is available.
    pub fn recv(self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Block up to `timeout` for the job's result.
    pub fn recv_timeout(self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// A future-like source of a single value, used by [`PoolWorker::schedule`].
///
/// Mirrors the `shared future` the spec describes: a value that becomes
/// ready exactly once, observable by repeated non-blocking polls.
pub struct SharedFuture<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedFuture<T> {
    /// A future with no value yet.
    pub fn pending() -> (Self, SharedFutureSetter<T>) {
        let inner = Arc::new(Mutex::new(None));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SharedFutureSetter { inner },
        )
    }

    /// A future that is already resolved.
    pub fn ready(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(value))),
        }
    }

    /// Non-blocking poll: `Some` once resolved, consuming the value.
    fn try_take(&self) -> Option<T> {
        self.inner.lock().take()
    }
}

/// The write side of a [`SharedFuture`].
pub struct SharedFutureSetter<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> SharedFutureSetter<T> {
    /// Resolve the paired future.
    pub fn resolve(self, value: T) {
        *self.inner.lock() = Some(value);
    }
}

/// Errors from pool submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// `schedule` was called on a pool with zero workers: there is no
    /// worker to poll the future (spec.md §4.4 invariant).
    #[error("schedule requires at least one worker")]
    NoWorkers,
}

struct Shared {
    queue: Mutex<std::collections::VecDeque<Job>>,
    not_empty: Condvar,
    terminating: AtomicBool,
    pending: AtomicUsize,
}

/// A fixed pool of worker threads draining a shared job queue.
///
/// `PoolWorker::new(0)` runs every submission synchronously on the
/// submitter's thread (spec.md §4.4) and rejects [`PoolWorker::schedule`].
pub struct PoolWorker {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl PoolWorker {
    /// Spawn a pool of `n` worker threads. `n == 0` means synchronous
    /// execution on the submitter's thread.
    pub fn new(n: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(std::collections::VecDeque::new()),
            not_empty: Condvar::new(),
            terminating: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
        });

        let workers = (0..n)
            .map(|i| {
                let shared = Arc::clone(&shared);
                // Thread creation failure is treated as an unrecoverable
                // environment fault, same as `std::thread::spawn` itself.
                #[allow(clippy::expect_used)]
                std::thread::Builder::new()
                    .name(format!("pool-worker-{i}"))
                    .spawn(move || worker_loop(shared))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        Self {
            shared,
            workers,
            size: n,
        }
    }

    /// Number of worker threads backing this pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fire-and-forget: run `f` on a worker thread (or synchronously if
    /// `size() == 0`), discarding its return value.
    pub fn offload<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.size == 0 {
            f();
            return;
        }
        self.push(Job::once(move || {
            f();
            JobOutcome::Done
        }));
    }

    /// Run `f` on a worker thread (or synchronously if `size() == 0`) and
    /// return a handle that resolves to its return value.
    pub fn queue<T, F>(&self, f: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        if self.size == 0 {
            let _ = tx.send(f());
            return JobHandle { rx };
        }
        self.push(Job::once(move || {
            let _ = tx.send(f());
            JobOutcome::Done
        }));
        JobHandle { rx }
    }

    /// Run `f(value)` once `future` resolves. The job polls the future with
    /// a bounded wait and reschedules itself until it is ready; it runs at
    /// most once.
    ///
    /// Fails with [`PoolError::NoWorkers`] if `size() == 0`.
    pub fn schedule<T, F>(&self, f: F, future: SharedFuture<T>) -> Result<(), PoolError>
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        if self.size == 0 {
            return Err(PoolError::NoWorkers);
        }
        let mut f = Some(f);
        self.push(Job::new(move || match future.try_take() {
            Some(value) => {
                if let Some(f) = f.take() {
                    f(value);
                }
                JobOutcome::Done
            }
            None => JobOutcome::Reschedule,
        }));
        Ok(())
    }

    /// Like [`PoolWorker::schedule`], but spreads a resolved tuple future as
    /// positional arguments.
    pub fn schedule_with_apply<A, B, F>(&self, f: F, future: SharedFuture<(A, B)>) -> Result<(), PoolError>
    where
        A: Send + 'static,
        B: Send + 'static,
        F: FnOnce(A, B) + Send + 'static,
    {
        self.schedule(move |(a, b)| f(a, b), future)
    }

    fn push(&self, job: Job) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        self.shared.queue.lock().push_back(job);
        self.shared.not_empty.notify_one();
    }
}

impl Drop for PoolWorker {
    fn drop(&mut self) {
        // Await drain: block until the queue has been fully worked off,
        // then signal termination and join every worker.
        while self.shared.pending.load(Ordering::SeqCst) > 0 {
            std::thread::yield_now();
        }
        self.shared.terminating.store(true, Ordering::SeqCst);
        self.shared.not_empty.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    break Some(job);
                }
                if shared.terminating.load(Ordering::SeqCst) {
                    break None;
                }
                shared.not_empty.wait(&mut queue);
            }
        };
        let Some(mut job) = job else { break };
        match job.run() {
            JobOutcome::Done => {
                shared.pending.fetch_sub(1, Ordering::SeqCst);
            }
            JobOutcome::Reschedule => {
                // Yield to other jobs before re-queuing, per spec.md §4.4.
                std::thread::yield_now();
                shared.queue.lock().push_back(job);
                shared.not_empty.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn offload_runs_effect_before_drop_returns() {
        let pool = PoolWorker::new(2);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.offload(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn queue_resolves_to_callable_return_value() {
        let pool = PoolWorker::new(2);
        let handle = pool.queue(|| 2 + 2);
        assert_eq!(handle.recv(), Some(4));
    }

    #[test]
    fn schedule_does_not_run_until_future_resolves() {
        let pool = PoolWorker::new(1);
        let (future, setter) = SharedFuture::pending();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = Arc::clone(&ran);
        pool.schedule(move |v: u32| {
            assert_eq!(v, 7);
            ran2.store(true, Ordering::SeqCst);
        }, future)
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(!ran.load(Ordering::SeqCst));

        setter.resolve(7);
        std::thread::sleep(Duration::from_millis(200));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn schedule_rejects_zero_worker_pool() {
        let pool = PoolWorker::new(0);
        let future = SharedFuture::ready(1u32);
        let err = pool.schedule(|_| {}, future).unwrap_err();
        assert_eq!(err, PoolError::NoWorkers);
    }

    #[test]
    fn zero_worker_pool_runs_offload_and_queue_synchronously() {
        let pool = PoolWorker::new(0);
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = Arc::clone(&ran);
        pool.offload(move || ran2.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));

        let handle = pool.queue(|| 42);
        assert_eq!(handle.recv(), Some(42));
    }

    #[test]
    fn destroying_an_idle_pool_completes_promptly() {
        let pool = PoolWorker::new(4);
        drop(pool);
    }
}
