use std::sync::Arc;

use hashbrown::HashMap;
use tracing::debug;

use crate::record::{RecordState, ScaledRecord};
use crate::sync::SharedLock;
use crate::texture::TextureId;

/// Outcome of a structural-cache lookup.
#[derive(Clone, Debug)]
pub(crate) enum Lookup {
    /// A finished record serves this key; draw from it.
    Ready(Arc<ScaledRecord>),
    /// A record exists but is still scaling; draw from the original and do
    /// not schedule a duplicate job.
    Pending,
    Miss,
}

#[derive(Debug)]
enum Table {
    /// One entry per resource; the region key is ignored.
    Whole(HashMap<TextureId, Arc<ScaledRecord>>),
    /// Sprite mode: many independently upscaled sub-rectangles per sheet,
    /// keyed by region geometry.
    Sprite(HashMap<TextureId, HashMap<u64, Arc<ScaledRecord>>>),
}

enum Hit {
    Miss,
    Stale,
    Ready(Arc<ScaledRecord>),
    Pending,
}

/// Per-resource fast path from region key to the record serving it.
///
/// This table owns the strong reference to every record it serves; purging a
/// resource's entries releases the records whose only strong referrer was
/// that entry. Lookups hold a shared lock and promote it in place when they
/// run into a stale (discarded) entry to evict.
#[derive(Debug)]
pub(crate) struct StructuralCache {
    table: SharedLock<Table>,
}

impl StructuralCache {
    pub fn new(desprite: bool) -> Self {
        let table = if desprite {
            Table::Sprite(HashMap::new())
        } else {
            Table::Whole(HashMap::new())
        };
        Self {
            table: SharedLock::new(table),
        }
    }

    pub fn lookup(&self, id: TextureId, key: u64) -> Lookup {
        let guard = self.table.read();
        let hit = match &*guard {
            Table::Whole(map) => classify(map.get(&id)),
            Table::Sprite(map) => classify(map.get(&id).and_then(|inner| inner.get(&key))),
        };

        match hit {
            Hit::Miss => Lookup::Miss,
            Hit::Ready(record) => Lookup::Ready(record),
            Hit::Pending => Lookup::Pending,
            Hit::Stale => {
                // Evict without releasing the lock; see SharedLock.
                let mut table = guard.promote();
                match &mut *table {
                    Table::Whole(map) => {
                        map.remove(&id);
                    }
                    Table::Sprite(map) => {
                        if let Some(inner) = map.get_mut(&id) {
                            inner.remove(&key);
                            if inner.is_empty() {
                                map.remove(&id);
                            }
                        }
                    }
                }
                debug!(%id, "evicted stale cache entry");
                Lookup::Miss
            }
        }
    }

    /// Installs `record` as the one record serving `(id, key)`. Replaces any
    /// previous record for the key, keeping at most one reachable per key.
    pub fn insert(&self, id: TextureId, key: u64, record: Arc<ScaledRecord>) {
        let mut table = self.table.write();
        match &mut *table {
            Table::Whole(map) => {
                map.insert(id, record);
            }
            Table::Sprite(map) => {
                map.entry(id).or_default().insert(key, record);
            }
        }
    }

    pub fn remove(&self, id: TextureId, key: u64) {
        let mut table = self.table.write();
        match &mut *table {
            Table::Whole(map) => {
                map.remove(&id);
            }
            Table::Sprite(map) => {
                if let Some(inner) = map.get_mut(&id) {
                    inner.remove(&key);
                    if inner.is_empty() {
                        map.remove(&id);
                    }
                }
            }
        }
    }

    /// Drops every entry for `id`, returning how many were removed.
    /// Idempotent: purging an absent resource removes nothing.
    pub fn purge(&self, id: TextureId) -> usize {
        let mut table = self.table.write();
        let removed = match &mut *table {
            Table::Whole(map) => map.remove(&id).map_or(0, |_| 1),
            Table::Sprite(map) => map.remove(&id).map_or(0, |inner| inner.len()),
        };
        if removed > 0 {
            debug!(%id, removed, "purged structural entries");
        }
        removed
    }

    /// Drops every entry whose record matches `pred`.
    pub fn purge_matching(&self, pred: impl Fn(&ScaledRecord) -> bool) -> usize {
        let mut table = self.table.write();
        let mut removed = 0;
        match &mut *table {
            Table::Whole(map) => {
                map.retain(|_, record| {
                    let keep = !pred(record);
                    if !keep {
                        removed += 1;
                    }
                    keep
                });
            }
            Table::Sprite(map) => {
                map.retain(|_, inner| {
                    inner.retain(|_, record| {
                        let keep = !pred(record);
                        if !keep {
                            removed += 1;
                        }
                        keep
                    });
                    !inner.is_empty()
                });
            }
        }
        removed
    }

    pub fn purge_all(&self) -> usize {
        let mut table = self.table.write();
        match &mut *table {
            Table::Whole(map) => {
                let n = map.len();
                map.clear();
                n
            }
            Table::Sprite(map) => {
                let n = map.values().map(HashMap::len).sum();
                map.clear();
                n
            }
        }
    }

    /// Total entry count across all resources.
    pub fn len(&self) -> usize {
        let table = self.table.read();
        match &*table {
            Table::Whole(map) => map.len(),
            Table::Sprite(map) => map.values().map(HashMap::len).sum(),
        }
    }

    /// All live records, for diagnostics.
    pub fn dump(&self) -> Vec<Arc<ScaledRecord>> {
        let table = self.table.read();
        match &*table {
            Table::Whole(map) => map.values().cloned().collect(),
            Table::Sprite(map) => map
                .values()
                .flat_map(|inner| inner.values().cloned())
                .collect(),
        }
    }
}

fn classify(entry: Option<&Arc<ScaledRecord>>) -> Hit {
    match entry {
        None => Hit::Miss,
        Some(record) if record.state() == RecordState::Discarded => Hit::Stale,
        Some(record) if record.is_ready() => Hit::Ready(Arc::clone(record)),
        Some(_) => Hit::Pending,
    }
}
