use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::texture::{TextureId, TextureSource};

/// Side-cache of full-resource pixel snapshots.
///
/// Fingerprinting and job input both work from an immutable byte copy rather
/// than the live, possibly-mutating host resource. The copy is captured once
/// per resource and then kept in sync with host-side writes by
/// [`SnapshotCache::apply_write`]: a write the snapshot can absorb is patched
/// in place, anything else purges the snapshot so the next request re-reads.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    map: Mutex<HashMap<TextureId, Arc<[u8]>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TextureId, Arc<[u8]>>> {
        match self.map.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the cached snapshot, reading the resource once on a miss.
    ///
    /// A failed or short read purges any stale entry and surfaces as
    /// [`CoreError::PixelRead`].
    pub fn get_or_capture(&self, source: &dyn TextureSource) -> Result<Arc<[u8]>> {
        let id = source.id();
        if let Some(existing) = self.lock().get(&id) {
            return Ok(Arc::clone(existing));
        }

        let bytes = read_all(source)?;
        let snapshot: Arc<[u8]> = bytes.into();
        self.lock().insert(id, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Applies a host-side partial pixel write.
    ///
    /// - full coverage (offset 0, at least snapshot-sized): replace
    /// - span fully inside the snapshot: patch that byte range
    /// - no snapshot, zero-length claim, or overhanging span: purge
    pub fn apply_write(&self, id: TextureId, offset: usize, data: &[u8]) {
        if data.is_empty() {
            self.purge(id);
            return;
        }

        let mut map = self.lock();
        let Some(existing) = map.get(&id) else {
            return;
        };
        let len = existing.len();

        if offset == 0 && data.len() >= len {
            map.insert(id, data[..len].to_vec().into());
            return;
        }

        match offset.checked_add(data.len()) {
            Some(end) if end <= len => {
                // Patch into a fresh copy; in-flight jobs keep the old bytes.
                let mut patched = existing.to_vec();
                patched[offset..end].copy_from_slice(data);
                map.insert(id, patched.into());
            }
            _ => {
                debug!(%id, offset, len = data.len(), "write exceeds snapshot, purging");
                map.remove(&id);
            }
        }
    }

    pub fn purge(&self, id: TextureId) {
        self.lock().remove(&id);
    }

    pub fn purge_all(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    pub fn contains(&self, id: TextureId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Reads the resource's full pixel contents, validating the length.
pub(crate) fn read_all(source: &dyn TextureSource) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    source.read_pixels(&mut bytes).map_err(|reason| {
        warn!(name = source.name(), %reason, "pixel readback failed");
        CoreError::PixelRead {
            name: source.name().to_owned(),
            reason,
        }
    })?;

    let expected =
        source.width() as usize * source.height() as usize * source.format().bytes_per_texel();
    if bytes.len() != expected {
        return Err(CoreError::PixelRead {
            name: source.name().to_owned(),
            reason: format!("expected {expected} bytes, host produced {}", bytes.len()),
        });
    }
    Ok(bytes)
}
