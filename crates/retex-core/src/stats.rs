use std::sync::atomic::{AtomicU64, Ordering};

/// Telemetry counters for the cache pipeline.
///
/// Cheap to update on the render thread and on workers; reads are
/// unsynchronized and approximate by design — diagnostics only.
#[derive(Debug, Default)]
pub struct CacheStats {
    structural_hits: AtomicU64,
    pending_hits: AtomicU64,
    misses: AtomicU64,
    rejected: AtomicU64,
    deferred: AtomicU64,
    dedup_hits: AtomicU64,
    jobs_spawned: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_discarded: AtomicU64,
    records_finalized: AtomicU64,

    /// Gauge: bytes currently held by `Ready` output buffers.
    output_bytes: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_structural_hits(&self) {
        self.structural_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_pending_hits(&self) {
        self.pending_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dedup_hits(&self) {
        self.dedup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_jobs_spawned(&self) {
        self.jobs_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_jobs_discarded(&self) {
        self.jobs_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_records_finalized(&self) {
        self.records_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_output_bytes(&self, bytes: u64) {
        self.output_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn sub_output_bytes(&self, bytes: u64) {
        self.output_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub fn output_bytes(&self) -> u64 {
        self.output_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            structural_hits: self.structural_hits.load(Ordering::Relaxed),
            pending_hits: self.pending_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            jobs_spawned: self.jobs_spawned.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_discarded: self.jobs_discarded.load(Ordering::Relaxed),
            records_finalized: self.records_finalized.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`], suitable for logging/telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub structural_hits: u64,
    pub pending_hits: u64,
    pub misses: u64,
    pub rejected: u64,
    pub deferred: u64,
    pub dedup_hits: u64,
    pub jobs_spawned: u64,
    pub jobs_completed: u64,
    pub jobs_discarded: u64,
    pub records_finalized: u64,
    pub output_bytes: u64,
}
