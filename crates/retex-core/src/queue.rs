use std::sync::{Mutex, MutexGuard};

pub(crate) type Completion = Box<dyn FnOnce() + Send>;

/// Buffer of finished-job actions awaiting the frame-budget drain.
///
/// Workers enqueue here instead of touching the caches themselves, so all
/// cache mutation happens on the consuming side's timeline.
#[derive(Default)]
pub(crate) struct PendingQueue {
    inner: Mutex<Vec<Completion>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Completion>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, action: Completion) {
        self.lock().push(action);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Runs queued completions, at most `allowance` of them.
    ///
    /// Within the allowance the whole queue runs in FIFO order and empties.
    /// Over it, exactly `allowance` actions run, taken from the back of the
    /// queue in reverse-insertion order; the rest stay queued for the next
    /// drain. Long-standing consumers rely on that asymmetry, so it is kept
    /// as-is even though it lets old completions starve under overload.
    pub fn drain(&self, allowance: usize) -> usize {
        let mut queue = self.lock();
        if queue.len() <= allowance {
            let executed = queue.len();
            for action in queue.drain(..) {
                action();
            }
            executed
        } else {
            for _ in 0..allowance {
                let action = queue.pop().expect("queue longer than allowance");
                action();
            }
            allowance
        }
    }
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").field("len", &self.len()).finish()
    }
}
