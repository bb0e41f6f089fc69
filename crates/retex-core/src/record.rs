use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use retex_resample::{ScaleOutput, WrapFlags};
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::geom::Bounds;
use crate::stats::CacheStats;
use crate::texture::TextureId;

/// Lifecycle of a cached upscale result.
///
/// `Created → Scaling → Ready` on the happy path, `→ Discarded` when the
/// algorithm declines. Records are installed into the caches while still
/// `Scaling` so concurrent requesters converge on the same in-flight record
/// instead of issuing duplicate jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordState {
    Created,
    Scaling,
    Ready,
    Discarded,
}

#[derive(Debug)]
struct RecordInner {
    state: RecordState,
    output: Option<Output>,
    scale: (f32, f32),
    wrap: WrapFlags,
    padding: (u32, u32),
    byte_size: u64,
}

#[derive(Debug)]
struct Output {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

/// One (possibly in-progress) upscaled variant of a resource region.
///
/// Owns its output buffer exclusively. The back-reference to the origin is a
/// plain [`TextureId`] — identity for cache bookkeeping, never something that
/// keeps the host resource alive.
#[derive(Debug)]
pub struct ScaledRecord {
    source: TextureId,
    name: String,
    region: Bounds,
    is_sprite: bool,
    fingerprint: Fingerprint,
    original_size: (u32, u32),
    requested_scale: u8,
    /// Fast-path flag mirroring `state == Ready`, readable without the lock.
    ready: AtomicBool,
    inner: Mutex<RecordInner>,
    stats: Arc<CacheStats>,
}

impl ScaledRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        source: TextureId,
        name: String,
        region: Bounds,
        is_sprite: bool,
        fingerprint: Fingerprint,
        original_size: (u32, u32),
        requested_scale: u8,
        stats: Arc<CacheStats>,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            name,
            region,
            is_sprite,
            fingerprint,
            original_size,
            requested_scale,
            ready: AtomicBool::new(false),
            inner: Mutex::new(RecordInner {
                state: RecordState::Created,
                output: None,
                scale: (1.0, 1.0),
                wrap: WrapFlags::empty(),
                padding: (0, 0),
                byte_size: 0,
            }),
            stats,
        })
    }

    fn lock(&self) -> MutexGuard<'_, RecordInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn source(&self) -> TextureId {
        self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> Bounds {
        self.region
    }

    pub fn is_sprite(&self) -> bool {
        self.is_sprite
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn original_size(&self) -> (u32, u32) {
        self.original_size
    }

    pub fn requested_scale(&self) -> u8 {
        self.requested_scale
    }

    pub fn state(&self) -> RecordState {
        self.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Achieved per-axis scale factors. Meaningful once `Ready`.
    pub fn scale(&self) -> (f32, f32) {
        self.lock().scale
    }

    /// Wrap addressing the algorithm actually honoured.
    pub fn wrap(&self) -> WrapFlags {
        self.lock().wrap
    }

    pub fn padding(&self) -> (u32, u32) {
        self.lock().padding
    }

    pub fn byte_size(&self) -> u64 {
        self.lock().byte_size
    }

    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.lock().output.as_ref().map(|o| (o.width, o.height))
    }

    /// Runs `f` over the output pixels, if any.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let inner = self.lock();
        inner.output.as_ref().map(|o| f(&o.pixels))
    }

    /// `Created → Scaling`: the job has been admitted.
    pub(crate) fn begin_scaling(&self) {
        let mut inner = self.lock();
        debug_assert_eq!(inner.state, RecordState::Created, "record scaled twice");
        inner.state = RecordState::Scaling;
    }

    /// `Scaling → Ready`: attach the output and compute achieved scale.
    ///
    /// With `clamp_dimension` set, an axis whose pre-clamp scaled dimension
    /// would exceed the ceiling reports a scale factor of 1 (no upscale on
    /// that axis); the other axis keeps its computed ratio.
    pub(crate) fn finish(&self, output: ScaleOutput, clamp_dimension: Option<u32>) {
        let mut inner = self.lock();
        if inner.state != RecordState::Scaling {
            debug!(
                name = self.name.as_str(),
                state = ?inner.state,
                "dropping completion for a record no longer scaling"
            );
            return;
        }

        let (orig_w, orig_h) = self.original_size;
        let mut scale = (
            output.width as f32 / orig_w as f32,
            output.height as f32 / orig_h as f32,
        );
        if let Some(clamp) = clamp_dimension {
            let target = self.requested_scale as u64;
            if orig_w as u64 * target > clamp as u64 {
                scale.0 = 1.0;
            }
            if orig_h as u64 * target > clamp as u64 {
                scale.1 = 1.0;
            }
        }

        let byte_size = output.pixels.len() as u64;
        inner.scale = scale;
        inner.wrap = output.wrap;
        inner.padding = output.padding;
        inner.byte_size = byte_size;
        inner.output = Some(Output {
            pixels: output.pixels,
            width: output.width,
            height: output.height,
        });
        inner.state = RecordState::Ready;
        drop(inner);

        self.ready.store(true, Ordering::Release);
        self.stats.add_output_bytes(byte_size);
        self.stats.inc_records_finalized();

        if self.is_sprite {
            debug!(name = self.name.as_str(), region = ?self.region, "hd sprite ready");
        } else {
            debug!(name = self.name.as_str(), "hd spritesheet ready");
        }
    }

    /// Terminal transition; no output is retained.
    pub(crate) fn discard(&self) {
        let mut inner = self.lock();
        if inner.state == RecordState::Ready {
            debug_assert!(false, "discard called on a ready record");
            return;
        }
        inner.state = RecordState::Discarded;
        inner.output = None;
    }
}

impl Drop for ScaledRecord {
    fn drop(&mut self) {
        let byte_size = match self.inner.get_mut() {
            Ok(inner) => inner.byte_size,
            Err(poisoned) => poisoned.into_inner().byte_size,
        };
        if byte_size > 0 {
            self.stats.sub_output_bytes(byte_size);
        }
    }
}
