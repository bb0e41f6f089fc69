use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::debug;

pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// Fixed-size pool of background scaling workers.
///
/// Jobs are never cancelled: once submitted, a job always runs to
/// completion, even if the resource it was derived from is disposed
/// mid-flight — the result simply ends up unreachable. Backpressure comes
/// from the frame-budget admission gate plus the caller checking
/// [`WorkerPool::outstanding`] against its in-flight cap, not from this
/// queue, which is unbounded.
pub(crate) struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<thread::JoinHandle<()>>,
    outstanding: Arc<(Mutex<usize>, Condvar)>,
}

fn lock(mutex: &Mutex<usize>) -> MutexGuard<'_, usize> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl WorkerPool {
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        let outstanding = Arc::new((Mutex::new(0usize), Condvar::new()));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx = rx.clone();
            let outstanding = Arc::clone(&outstanding);
            let handle = thread::Builder::new()
                .name(format!("retex-scale-{i}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        task();
                        let (count, cond) = &*outstanding;
                        *lock(count) -= 1;
                        cond.notify_all();
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            workers: handles,
            outstanding,
        })
    }

    pub fn submit(&self, task: Task) {
        let (count, _) = &*self.outstanding;
        *lock(count) += 1;
        if let Some(tx) = &self.tx {
            if tx.send(task).is_err() {
                // Workers are gone; roll the accounting back.
                *lock(count) -= 1;
                debug!("scaling pool has shut down, dropping job");
            }
        }
    }

    /// Jobs queued or currently running.
    pub fn outstanding(&self) -> usize {
        *lock(&self.outstanding.0)
    }

    /// Blocks until no jobs are queued or running, or the timeout elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (count, cond) = &*self.outstanding;
        let mut n = lock(count);
        while *n > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = match cond.wait_timeout(n, deadline - now) {
                Ok(r) => r,
                Err(poisoned) => poisoned.into_inner(),
            };
            n = guard;
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker finish its current job and
        // exit; pending jobs still drain first.
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
