//! Shared/exclusive lock with in-place promotion.
//!
//! The structural cache's lookup path holds a shared guard and must be able
//! to evict a stale entry it just found. Releasing and re-acquiring would
//! open a window for another writer to interleave, so the shared guard can
//! *promote* to exclusive without letting go: mark the promotion, wait for
//! the other readers to drain, become the writer.
//!
//! At most one promotion may be in flight. The cache layer runs a
//! single-writer-at-a-time discipline, so a second concurrent promoter is a
//! programming error and asserts rather than blocks.

use std::cell::UnsafeCell;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
    promoting: bool,
}

pub struct SharedLock<T> {
    state: Mutex<LockState>,
    cond: Condvar,
    value: UnsafeCell<T>,
}

impl<T: Default> Default for SharedLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for SharedLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SharedLock")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .field("promoting", &state.promoting)
            .finish()
    }
}

// Readers hand out `&T` and the writer `&mut T`, with exclusion enforced by
// `state`; the usual RwLock bounds apply.
unsafe impl<T: Send> Send for SharedLock<T> {}
unsafe impl<T: Send + Sync> Sync for SharedLock<T> {}

impl<T> SharedLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
            value: UnsafeCell::new(value),
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, LockState>) -> MutexGuard<'a, LockState> {
        match self.cond.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut state = self.state();
        while state.writer || state.promoting {
            state = self.wait(state);
        }
        state.readers += 1;
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.state();
        while state.writer || state.promoting || state.readers > 0 {
            state = self.wait(state);
        }
        state.writer = true;
        WriteGuard { lock: self }
    }
}

pub struct ReadGuard<'a, T> {
    lock: &'a SharedLock<T>,
}

impl<'a, T> ReadGuard<'a, T> {
    /// Promotes this shared guard to exclusive without releasing.
    ///
    /// Blocks until the remaining readers drain. Panics if another promotion
    /// is already in flight; the caller's locking discipline must make that
    /// impossible.
    pub fn promote(self) -> WriteGuard<'a, T> {
        let this = ManuallyDrop::new(self);
        let lock = this.lock;

        let mut state = lock.state();
        assert!(
            !state.promoting,
            "concurrent promotion violates the single-writer discipline"
        );
        state.promoting = true;
        while state.readers > 1 {
            state = lock.wait(state);
        }
        state.readers -= 1;
        state.promoting = false;
        state.writer = true;
        drop(state);

        WriteGuard { lock }
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.lock.state();
        state.readers -= 1;
        drop(state);
        self.lock.cond.notify_all();
    }
}

pub struct WriteGuard<'a, T> {
    lock: &'a SharedLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.lock.state();
        state.writer = false;
        drop(state);
        self.lock.cond.notify_all();
    }
}
