use std::sync::{Mutex, MutexGuard, Weak};

use hashbrown::HashMap;

use crate::fingerprint::Fingerprint;
use crate::record::ScaledRecord;

/// Global fingerprint-keyed table for cross-resource content sharing.
///
/// Holds weak references only; the structural cache owns the records. A
/// lookup that finds a dead slot evicts it lazily. Contention is expected to
/// be low, so a coarse mutex keeps this simple.
#[derive(Debug, Default)]
pub(crate) struct ContentCache {
    map: Mutex<HashMap<u64, Weak<ScaledRecord>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Weak<ScaledRecord>>> {
        match self.map.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn lookup(&self, fingerprint: Fingerprint) -> Option<std::sync::Arc<ScaledRecord>> {
        let mut map = self.lock();
        match map.get(&fingerprint.raw()) {
            Some(weak) => match weak.upgrade() {
                Some(record) => Some(record),
                None => {
                    map.remove(&fingerprint.raw());
                    None
                }
            },
            None => None,
        }
    }

    pub fn insert(&self, fingerprint: Fingerprint, record: &std::sync::Arc<ScaledRecord>) {
        self.lock()
            .insert(fingerprint.raw(), std::sync::Arc::downgrade(record));
    }

    pub fn purge_all(&self) {
        self.lock().clear();
    }

    /// Raw slot count, dead entries included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
