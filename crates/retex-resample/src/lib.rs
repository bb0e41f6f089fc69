//! The resampling seam consumed by `retex-core`.
//!
//! The cache pipeline treats the upscale algorithm as a black box behind the
//! [`Upscaler`] trait: it hands the algorithm an immutable pixel snapshot and
//! consumes whatever comes back. This crate defines that contract plus the
//! pieces an implementation typically needs:
//!
//! - [`PixelFormat`]: the formats the pipeline knows how to sample
//! - [`WrapFlags`]: per-axis wrap addressing, requested and achieved
//! - [`ScaleInput`] / [`ScaleOutput`]: the job payload and its result
//! - [`NearestUpscaler`]: reference nearest-neighbour implementation
//! - [`wrap::detect`]: edge-tiling heuristic used to decide whether wrapped
//!   addressing can actually be honoured

mod nearest;
pub mod wrap;

pub use nearest::NearestUpscaler;

use bitflags::bitflags;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResampleError>;

/// Pixel layouts a resource can carry.
///
/// Only [`PixelFormat::Rgba8`] is resample-legal; the other variants exist so
/// the entry rejection path is observable rather than a compile-time fiction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Alpha8,
}

impl PixelFormat {
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Alpha8 => 1,
        }
    }

    /// Whether the resample pipeline accepts this format at all.
    pub const fn resample_legal(self) -> bool {
        matches!(self, Self::Rgba8)
    }
}

bitflags! {
    /// Per-axis wrapped-addressing flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WrapFlags: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
    }
}

/// One resample request: an immutable sampled region plus scaling intent.
///
/// `pixels` is exactly `width * height * format.bytes_per_texel()` bytes; the
/// caller has already extracted sub-regions row-wise, so implementations never
/// see the enclosing sheet.
#[derive(Clone, Copy, Debug)]
pub struct ScaleInput<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Requested integer scale factor, >= 1.
    pub scale: u8,
    /// Wrap addressing the draw state asked for. Implementations may honour
    /// fewer axes than requested, never more.
    pub wrap: WrapFlags,
    /// True when the input is a sub-rectangle of a larger sheet.
    pub is_region: bool,
    /// Whether the implementation may emit edge padding around the output.
    pub allow_padding: bool,
}

impl ScaleInput<'_> {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel()
    }
}

/// A finished resample: owned output pixels plus what was actually honoured.
#[derive(Clone, Debug)]
pub struct ScaleOutput {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Wrap axes the implementation actually honoured.
    pub wrap: WrapFlags,
    /// Padding texels added on each axis (total, both sides).
    pub padding: (u32, u32),
}

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("input region has zero area ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },

    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(PixelFormat),

    #[error("pixel buffer length {actual} does not match {width}x{height} {format:?} (expected {expected})")]
    BufferMismatch {
        actual: usize,
        expected: usize,
        width: u32,
        height: u32,
        format: PixelFormat,
    },

    #[error("scale factor {0} is out of range")]
    BadScale(u8),

    #[error("scaled dimensions overflow ({width}x{height} at {scale}x)")]
    DimensionOverflow { width: u32, height: u32, scale: u8 },
}

/// The upscale algorithm itself.
///
/// Implementations must be pure with respect to the input: the same
/// [`ScaleInput`] always yields the same output. They run on background
/// workers, so `Send + Sync` is part of the contract.
pub trait Upscaler: Send + Sync {
    fn upscale(&self, input: &ScaleInput<'_>) -> Result<ScaleOutput>;

    /// Short human-readable name used in diagnostics.
    fn name(&self) -> &'static str;
}

pub(crate) fn validate(input: &ScaleInput<'_>) -> Result<()> {
    if input.width == 0 || input.height == 0 {
        return Err(ResampleError::ZeroArea {
            width: input.width,
            height: input.height,
        });
    }
    if !input.format.resample_legal() {
        return Err(ResampleError::UnsupportedFormat(input.format));
    }
    if input.scale == 0 {
        return Err(ResampleError::BadScale(input.scale));
    }
    let expected = input.expected_len();
    if input.pixels.len() != expected {
        return Err(ResampleError::BufferMismatch {
            actual: input.pixels.len(),
            expected,
            width: input.width,
            height: input.height,
            format: input.format,
        });
    }
    Ok(())
}
