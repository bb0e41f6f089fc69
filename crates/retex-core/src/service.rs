use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hashbrown::HashMap;
use retex_resample::{PixelFormat, ScaleInput, ScaleOutput, Upscaler, WrapFlags};
use tracing::{debug, info, warn};

use crate::budget::FrameBudget;
use crate::config::Config;
use crate::dedup::ContentCache;
use crate::error::{CoreError, Result};
use crate::fingerprint;
use crate::geom::Bounds;
use crate::pool::WorkerPool;
use crate::queue::PendingQueue;
use crate::record::{RecordState, ScaledRecord};
use crate::snapshot::{self, SnapshotCache};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::structural::{Lookup, StructuralCache};
use crate::texture::{TextureId, TextureSource};

/// What a draw should sample from.
#[derive(Clone, Debug)]
pub enum Resolved {
    /// A finished upscaled variant serves this request.
    Scaled(Arc<ScaledRecord>),
    /// Draw from the original resource (rejected, deferred, or still
    /// scaling).
    Original,
}

impl Resolved {
    pub fn record(&self) -> Option<&Arc<ScaledRecord>> {
        match self {
            Self::Scaled(record) => Some(record),
            Self::Original => None,
        }
    }

    pub fn is_original(&self) -> bool {
        matches!(self, Self::Original)
    }
}

/// Output-byte footprint of one resource's cached records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceBytes {
    pub id: TextureId,
    pub name: String,
    pub records: usize,
    pub bytes: u64,
}

/// Diagnostic dump: counters plus per-resource byte totals.
#[derive(Clone, Debug)]
pub struct StatsDump {
    pub counters: StatsSnapshot,
    pub structural_entries: usize,
    pub dedup_slots: usize,
    pub snapshot_entries: usize,
    pub pending_completions: usize,
    pub total_output_bytes: u64,
    pub per_resource: Vec<ResourceBytes>,
}

/// The texture upscale cache pipeline.
///
/// One value owns everything: both caches, the snapshot side-cache, the
/// frame budget, the pending-completion queue, the worker pool and the
/// algorithm. The render-loop driver constructs it, calls
/// [`begin_frame`](Self::begin_frame) / [`resolve`](Self::resolve) /
/// [`present`](Self::present) per frame, and forwards resource disposal and
/// partial-write events. Caches are process-lifetime and in-memory only.
pub struct ScaleService {
    config: Config,
    upscaler: Arc<dyn Upscaler>,
    structural: StructuralCache,
    dedup: ContentCache,
    snapshots: SnapshotCache,
    budget: Mutex<FrameBudget>,
    pending: Arc<PendingQueue>,
    pool: Option<WorkerPool>,
    stats: Arc<CacheStats>,
    /// Effective integer scale requested from the algorithm.
    scale: u8,
    /// Output-dimension ceiling, when the size-clamp policy is active.
    clamp: Option<u32>,
}

struct ScaleJob {
    record: Arc<ScaledRecord>,
    snapshot: Arc<[u8]>,
    extent: (u32, u32),
    format: PixelFormat,
    sample: Bounds,
    is_sprite: bool,
    scale: u8,
    wrap: WrapFlags,
    allow_padding: bool,
}

impl ScaleService {
    pub fn new(config: Config, upscaler: Arc<dyn Upscaler>) -> Result<Self> {
        if config.resample.scale == 0 {
            return Err(CoreError::InvalidConfig("resample.scale must be >= 1"));
        }
        if config.resample.restrict_size && config.resample.clamp_dimension == 0 {
            return Err(CoreError::InvalidConfig(
                "resample.clamp_dimension must be > 0 when restrict_size is set",
            ));
        }
        if config.async_scaling.enabled {
            if config.async_scaling.max_in_flight == 0 {
                return Err(CoreError::InvalidConfig(
                    "async_scaling.max_in_flight must be >= 1",
                ));
            }
            if config.async_scaling.max_loads_per_frame == 0 {
                return Err(CoreError::InvalidConfig(
                    "async_scaling.max_loads_per_frame must be >= 1",
                ));
            }
        }

        let pool = if config.async_scaling.enabled {
            Some(WorkerPool::new(config.async_scaling.max_in_flight)?)
        } else {
            None
        };

        let scale = config.resample.scale.min(config.resample.max_scale);
        let clamp = config
            .resample
            .restrict_size
            .then_some(config.resample.clamp_dimension);

        Ok(Self {
            structural: StructuralCache::new(config.resample.desprite),
            dedup: ContentCache::new(),
            snapshots: SnapshotCache::new(),
            budget: Mutex::new(FrameBudget::new(config.async_scaling.budget_per_frame_texels)),
            pending: Arc::new(PendingQueue::new()),
            pool,
            stats: Arc::new(CacheStats::new()),
            scale,
            clamp,
            config,
            upscaler,
        })
    }

    fn budget(&self) -> MutexGuard<'_, FrameBudget> {
        match self.budget.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resets the per-frame texel budget. Call at the top of each frame.
    pub fn begin_frame(&self) {
        self.budget().begin_frame();
    }

    /// Frame boundary: drain finished jobs (up to the configured allowance)
    /// and reset the budget for the next frame.
    ///
    /// When same-frame consumption is disabled and this frame admitted a
    /// job, the drain is skipped until the next present.
    pub fn present(&self) {
        let drain = {
            let budget = self.budget();
            self.config.async_scaling.can_fetch_and_load_same_frame
                || !budget.scheduled_this_frame()
        };
        if drain {
            self.pending
                .drain(self.config.async_scaling.max_loads_per_frame);
        }
        self.budget().begin_frame();
    }

    /// Completion actions waiting for a drain.
    pub fn pending_completions(&self) -> usize {
        self.pending.len()
    }

    /// Blocks until no scaling jobs are queued or running. Completions may
    /// still be waiting in the pending queue afterwards; they run at the
    /// next drain.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        match &self.pool {
            Some(pool) => pool.wait_idle(timeout),
            None => true,
        }
    }

    /// Resolves one draw request to either a finished upscaled record or
    /// the original resource.
    ///
    /// `region` is the drawn sub-rectangle, if any; `wrap` is the wrap
    /// addressing the current draw state asked for. Never blocks on
    /// background work: a request whose record is still scaling falls back
    /// to the original.
    ///
    /// Must be driven by a single render/control thread; the stale-entry
    /// eviction path assumes one upgrader at a time.
    pub fn resolve(
        &self,
        source: &dyn TextureSource,
        region: Option<Bounds>,
        wrap: WrapFlags,
    ) -> Resolved {
        if !self.config.resample.enabled {
            return Resolved::Original;
        }

        let id = source.id();
        let (width, height) = (source.width(), source.height());
        let format = source.format();

        // Entry rejection: requests the pipeline will never serve.
        if width as u64 * height as u64 == 0 {
            self.stats.inc_rejected();
            return Resolved::Original;
        }
        if !format.resample_legal() {
            debug!(name = source.name(), ?format, "format not resample-legal");
            self.stats.inc_rejected();
            return Resolved::Original;
        }
        if width < self.config.resample.min_dimension || height < self.config.resample.min_dimension
        {
            self.stats.inc_rejected();
            return Resolved::Original;
        }
        if self.config.resample.ignore_unnamed && source.name().is_empty() {
            self.stats.inc_rejected();
            return Resolved::Original;
        }

        let full = Bounds::of_extent(width, height);
        let request = region.unwrap_or(full).clamp_to(width, height);
        if request.area() == 0 {
            self.stats.inc_rejected();
            return Resolved::Original;
        }

        let key = if self.config.resample.desprite {
            request.geometry_key()
        } else {
            0
        };

        // Fast path: the structural cache answers most draws.
        match self.structural.lookup(id, key) {
            Lookup::Ready(record) => {
                self.stats.inc_structural_hits();
                return Resolved::Scaled(record);
            }
            Lookup::Pending => {
                self.stats.inc_pending_hits();
                return Resolved::Original;
            }
            Lookup::Miss => {}
        }
        self.stats.inc_misses();

        let is_sprite = self.config.resample.desprite && !request.covers(width, height);
        let sample = if is_sprite { request } else { full };

        let asynchronous = self.config.async_scaling.enabled;
        if asynchronous {
            if sample.area() < self.config.async_scaling.minimum_size_texels {
                self.stats.inc_rejected();
                return Resolved::Original;
            }
            // In-flight cap, then the per-frame texel budget. The budget is
            // charged for the whole resource since that is what a snapshot
            // reads.
            if let Some(pool) = &self.pool {
                if pool.outstanding() >= self.config.async_scaling.max_in_flight {
                    self.stats.inc_deferred();
                    return Resolved::Original;
                }
            }
            if !self.budget().try_admit(width as i64 * height as i64) {
                self.stats.inc_deferred();
                return Resolved::Original;
            }
        }

        // Snapshot the pixels. A failed read force-purges the side-cache and
        // retries uncached; if that read succeeds the request proceeds
        // without content-dedup benefit.
        let (snapshot, dedup_usable) = match self.snapshots.get_or_capture(source) {
            Ok(snapshot) => (snapshot, self.config.cache.enable_content_dedup),
            Err(err) => {
                self.snapshots.purge(id);
                match snapshot::read_all(source) {
                    Ok(bytes) => {
                        warn!(name = source.name(), %err, "snapshot purged, proceeding without dedup");
                        (Arc::<[u8]>::from(bytes), false)
                    }
                    Err(err) => {
                        warn!(name = source.name(), %err, "pixel readback failed, using original");
                        self.stats.inc_rejected();
                        return Resolved::Original;
                    }
                }
            }
        };

        let print = fingerprint::of_region(&snapshot, width, height, format, &sample);

        // Cross-resource sharing: identical content converges on one record.
        if dedup_usable {
            if let Some(existing) = self.dedup.lookup(print) {
                if existing.state() != RecordState::Discarded {
                    debug!(name = source.name(), fingerprint = %print, "sharing cached record");
                    self.stats.inc_dedup_hits();
                    self.structural.insert(id, key, Arc::clone(&existing));
                    return if existing.is_ready() {
                        Resolved::Scaled(existing)
                    } else {
                        Resolved::Original
                    };
                }
            }
        }

        let used = self.stats.output_bytes();
        if used >= self.config.cache.max_output_bytes {
            warn!(
                used,
                ceiling = self.config.cache.max_output_bytes,
                "over the configured output-memory ceiling"
            );
        }

        let original_size = (sample.width, sample.height);
        let record = ScaledRecord::new(
            id,
            source.name().to_owned(),
            sample,
            is_sprite,
            print,
            original_size,
            self.scale,
            Arc::clone(&self.stats),
        );

        // Install before the job runs so concurrent requesters converge on
        // this in-flight record instead of issuing duplicates.
        self.structural.insert(id, key, Arc::clone(&record));
        if dedup_usable {
            self.dedup.insert(print, &record);
        }
        record.begin_scaling();
        self.stats.inc_jobs_spawned();

        let wrap = if self.config.resample.enable_wrapped_addressing {
            wrap
        } else {
            WrapFlags::empty()
        };
        let job = ScaleJob {
            record: Arc::clone(&record),
            snapshot,
            extent: (width, height),
            format,
            sample,
            is_sprite,
            scale: self.scale,
            wrap,
            allow_padding: self.config.resample.allow_padding && is_sprite,
        };

        if asynchronous {
            let upscaler = Arc::clone(&self.upscaler);
            let stats = Arc::clone(&self.stats);
            let pending = Arc::clone(&self.pending);
            let clamp = self.clamp;
            self.budget().note_scheduled();
            if let Some(pool) = &self.pool {
                pool.submit(Box::new(move || {
                    if let Some((record, output)) = execute(job, upscaler.as_ref(), &stats) {
                        pending.push(Box::new(move || record.finish(output, clamp)));
                    }
                }));
            }
            // Same-frame consumption: drain earlier completions right here
            // instead of waiting for present.
            if self.config.async_scaling.can_fetch_and_load_same_frame {
                self.pending
                    .drain(self.config.async_scaling.max_loads_per_frame);
            }
            Resolved::Original
        } else {
            // Inline mode: the whole pipeline runs in this call.
            if let Some((record, output)) = execute(job, self.upscaler.as_ref(), &self.stats) {
                record.finish(output, self.clamp);
            }
            if record.is_ready() {
                Resolved::Scaled(record)
            } else {
                Resolved::Original
            }
        }
    }

    /// The host disposed a resource: purge its structural entries and its
    /// pixel snapshot. An in-flight job for it still runs to completion;
    /// its result just has nowhere left to be looked up from. Idempotent.
    pub fn notify_disposed(&self, id: TextureId) {
        let removed = self.structural.purge(id);
        self.snapshots.purge(id);
        if removed > 0 {
            info!(%id, removed, "resource disposed, cache entries purged");
        }
    }

    /// The host wrote a byte span of a resource's pixels.
    pub fn notify_partial_write(&self, id: TextureId, offset: usize, data: &[u8]) {
        self.snapshots.apply_write(id, offset, data);
    }

    /// Drops the one structural entry serving `(resource, region)`, leaving
    /// the resource's other regions and its snapshot alone. The record is
    /// released once nothing else references it.
    pub fn invalidate(&self, source: &dyn TextureSource, region: Option<Bounds>) {
        let full = Bounds::of_extent(source.width(), source.height());
        let request = region
            .unwrap_or(full)
            .clamp_to(source.width(), source.height());
        let key = if self.config.resample.desprite {
            request.geometry_key()
        } else {
            0
        };
        self.structural.remove(source.id(), key);
    }

    /// Clears both caches, the snapshot side-cache and every cached record.
    pub fn purge_all(&self) {
        let removed = self.structural.purge_all();
        self.dedup.purge_all();
        self.snapshots.purge_all();
        info!(removed, "all caches purged");
    }

    /// Clears structural entries whose resource display name contains
    /// `tag` (e.g. a seasonal variant). Returns how many were removed.
    pub fn purge_by_tag(&self, tag: &str) -> usize {
        let removed = self.structural.purge_matching(|record| record.name().contains(tag));
        if removed > 0 {
            info!(tag, removed, "tagged cache entries purged");
        }
        removed
    }

    /// Entry counts, byte totals and per-resource footprints.
    pub fn dump_stats(&self) -> StatsDump {
        let mut by_resource: HashMap<TextureId, ResourceBytes> = HashMap::new();
        for record in self.structural.dump() {
            let entry = by_resource
                .entry(record.source())
                .or_insert_with(|| ResourceBytes {
                    id: record.source(),
                    name: record.name().to_owned(),
                    records: 0,
                    bytes: 0,
                });
            entry.records += 1;
            entry.bytes += record.byte_size();
        }
        let mut per_resource: Vec<ResourceBytes> = by_resource.into_values().collect();
        per_resource.sort_by_key(|entry| entry.id);

        StatsDump {
            counters: self.stats.snapshot(),
            structural_entries: self.structural.len(),
            dedup_slots: self.dedup.len(),
            snapshot_entries: self.snapshots.len(),
            pending_completions: self.pending.len(),
            total_output_bytes: self.stats.output_bytes(),
            per_resource,
        }
    }
}

impl std::fmt::Debug for ScaleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaleService")
            .field("structural_entries", &self.structural.len())
            .field("pending_completions", &self.pending.len())
            .field("output_bytes", &self.stats.output_bytes())
            .finish()
    }
}

/// Runs one scaling job. Returns the output to finalize, or `None` when the
/// algorithm declined and the record was discarded.
fn execute(
    job: ScaleJob,
    upscaler: &dyn Upscaler,
    stats: &CacheStats,
) -> Option<(Arc<ScaledRecord>, ScaleOutput)> {
    let pixels = sample_pixels(&job.snapshot, job.extent, job.format, &job.sample);
    let input = ScaleInput {
        pixels: &pixels,
        width: job.sample.width,
        height: job.sample.height,
        format: job.format,
        scale: job.scale,
        wrap: job.wrap,
        is_region: job.is_sprite,
        allow_padding: job.allow_padding,
    };

    match upscaler.upscale(&input) {
        Ok(output) => {
            stats.inc_jobs_completed();
            Some((job.record, output))
        }
        Err(err) => {
            debug!(name = job.record.name(), %err, "resample declined");
            job.record.discard();
            stats.inc_jobs_discarded();
            None
        }
    }
}

/// Extracts the sampled region's bytes from a full-resource snapshot.
fn sample_pixels<'a>(
    snapshot: &'a Arc<[u8]>,
    extent: (u32, u32),
    format: PixelFormat,
    sample: &Bounds,
) -> std::borrow::Cow<'a, [u8]> {
    if sample.covers(extent.0, extent.1) {
        return std::borrow::Cow::Borrowed(&snapshot[..]);
    }

    let bpt = format.bytes_per_texel();
    let stride = extent.0 as usize * bpt;
    let row_len = sample.width as usize * bpt;
    let x_off = sample.x as usize * bpt;

    let mut out = Vec::with_capacity(row_len * sample.height as usize);
    for row in sample.y..sample.y + sample.height {
        let start = row as usize * stride + x_off;
        out.extend_from_slice(&snapshot[start..start + row_len]);
    }
    std::borrow::Cow::Owned(out)
}
