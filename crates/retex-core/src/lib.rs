//! Texture upscale cache and asynchronous resampling pipeline.
//!
//! A render loop draws from host-owned bitmap resources. This crate sits
//! between the two and serves higher-resolution variants computed by a
//! pluggable resampler ([`retex_resample::Upscaler`]) without blocking the
//! render thread:
//!
//! - [`ScaleService`]: the owning façade — `begin_frame` / `resolve` /
//!   `present`, disposal and partial-write notifications, admin surface
//! - structural cache: per-resource fast path from a region key to the
//!   record currently serving it (whole-resource or per-sprite addressing)
//! - content-dedup cache: fingerprint-keyed table letting unrelated
//!   resources with identical pixels share one upscaled result
//! - frame budget: per-frame texel quota gating new background work, with a
//!   bounded drain of finished jobs at present time
//! - [`ScaledRecord`]: the cached result entity and its
//!   `Created → Scaling → Ready | Discarded` lifecycle
//!
//! The pixel algorithm, draw-call interception, sampler patching, config
//! persistence and memory-pressure handling are collaborators, not part of
//! this crate. Caches live for the process; nothing is persisted.

mod budget;
mod config;
#[cfg(test)]
mod proptests;
mod dedup;
mod error;
mod fingerprint;
mod geom;
mod pool;
mod queue;
mod record;
mod service;
mod snapshot;
mod stats;
mod structural;
mod sync;
mod texture;

pub use config::{AsyncConfig, CacheConfig, Config, ResampleConfig};
pub use error::{CoreError, Result};
pub use fingerprint::Fingerprint;
pub use geom::Bounds;
pub use record::{RecordState, ScaledRecord};
pub use service::{Resolved, ResourceBytes, ScaleService, StatsDump};
pub use stats::{CacheStats, StatsSnapshot};
pub use texture::{TextureId, TextureSource};

pub use retex_resample::{PixelFormat, ScaleInput, ScaleOutput, Upscaler, WrapFlags};
