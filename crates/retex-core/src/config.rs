use serde::{Deserialize, Serialize};

/// Resample-policy knobs: what gets upscaled and how far.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    /// Master switch; when off, `resolve` always falls back to the original.
    pub enabled: bool,
    /// Integer scale factor requested from the algorithm.
    pub scale: u8,
    /// Upper bound on `scale`.
    pub max_scale: u8,
    /// Resources with either dimension below this are left alone.
    pub min_dimension: u32,
    /// Sprite mode: treat each drawn sub-rectangle as an independently
    /// cacheable unit instead of upscaling whole sheets.
    pub desprite: bool,
    /// Whether wrapped addressing may be requested from the algorithm.
    pub enable_wrapped_addressing: bool,
    /// Whether the algorithm may pad sprite edges.
    pub allow_padding: bool,
    /// Skip resources with an empty display name.
    pub ignore_unnamed: bool,
    /// When set, output dimensions above `clamp_dimension` force that axis's
    /// effective scale factor back to 1.
    pub restrict_size: bool,
    /// Per-axis output dimension ceiling used by `restrict_size`.
    pub clamp_dimension: u32,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 2,
            max_scale: 5,
            min_dimension: 4,
            desprite: true,
            enable_wrapped_addressing: true,
            allow_padding: true,
            ignore_unnamed: false,
            restrict_size: false,
            clamp_dimension: 4096,
        }
    }
}

/// Background-scaling knobs: admission budget and completion drain rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncConfig {
    /// When off, the whole pipeline runs inline in `resolve` and a request
    /// can return its upscaled result the same call.
    pub enabled: bool,
    /// Allow completions to be consumed in the same frame that admitted new
    /// work; when off, a frame that admitted a job skips its present-time
    /// drain.
    pub can_fetch_and_load_same_frame: bool,
    /// Maximum completion actions executed per drain.
    pub max_loads_per_frame: usize,
    /// Sampled regions below this texel count are not worth a job.
    pub minimum_size_texels: u64,
    /// Texel budget available to new admissions each frame.
    pub budget_per_frame_texels: i64,
    /// Worker-pool size, and the cap on queued-plus-running jobs past which
    /// admissions are deferred.
    pub max_in_flight: usize,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            can_fetch_and_load_same_frame: true,
            max_loads_per_frame: 2,
            minimum_size_texels: 0,
            budget_per_frame_texels: 2 * 256 * 256,
            max_in_flight: 4,
        }
    }
}

/// Cache-behaviour knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Content-fingerprint dedup across resources.
    pub enable_content_dedup: bool,
    /// Soft ceiling on total upscaled output bytes. Exceeding it is logged,
    /// never enforced.
    pub max_output_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_content_dedup: true,
            max_output_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resample: ResampleConfig,
    pub async_scaling: AsyncConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// A configuration that runs every request inline, for deterministic
    /// callers (tests, capture tools).
    pub fn synchronous() -> Self {
        Self {
            async_scaling: AsyncConfig {
                enabled: false,
                ..AsyncConfig::default()
            },
            ..Self::default()
        }
    }
}
