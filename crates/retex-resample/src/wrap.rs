//! Edge-tiling detection for wrapped addressing.
//!
//! A draw may request wrapped addressing on either axis, but honouring it on a
//! resampled texture only makes sense when the source edges actually tile;
//! otherwise the scaler would blend unrelated texels across the seam. The
//! heuristic here compares the two opposite edges texel by texel and accepts
//! the axis when enough of the visible pairs match.

use crate::{PixelFormat, WrapFlags};

/// Tuning knobs for [`detect`].
#[derive(Clone, Copy, Debug)]
pub struct WrapDetect {
    /// Fraction of visible edge pairs that must match for an axis to count
    /// as tiling.
    pub edge_threshold: f32,
    /// Texels at or below this alpha are ignored entirely.
    pub alpha_threshold: u8,
    /// Maximum per-channel delta for two edge texels to count as matching.
    pub channel_tolerance: u8,
}

impl Default for WrapDetect {
    fn default() -> Self {
        Self {
            edge_threshold: 0.4,
            alpha_threshold: 1,
            channel_tolerance: 16,
        }
    }
}

/// Returns the axes on which the image tiles, limited to `requested`.
pub fn detect(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    requested: WrapFlags,
    params: &WrapDetect,
) -> WrapFlags {
    if requested.is_empty() || format != PixelFormat::Rgba8 || width == 0 || height == 0 {
        return WrapFlags::empty();
    }

    let mut out = WrapFlags::empty();
    if requested.contains(WrapFlags::X) && axis_tiles(pixels, width, height, true, params) {
        out |= WrapFlags::X;
    }
    if requested.contains(WrapFlags::Y) && axis_tiles(pixels, width, height, false, params) {
        out |= WrapFlags::Y;
    }
    out
}

fn axis_tiles(pixels: &[u8], width: u32, height: u32, horizontal: bool, params: &WrapDetect) -> bool {
    let stride = width as usize * 4;
    let pairs = if horizontal { height } else { width };

    let mut visible = 0u32;
    let mut matched = 0u32;
    for i in 0..pairs {
        let (a, b) = if horizontal {
            // First and last column of row i.
            let row = i as usize * stride;
            (row, row + (width as usize - 1) * 4)
        } else {
            // First and last row of column i.
            let col = i as usize * 4;
            (col, (height as usize - 1) * stride + col)
        };
        let ta = &pixels[a..a + 4];
        let tb = &pixels[b..b + 4];
        if ta[3] <= params.alpha_threshold && tb[3] <= params.alpha_threshold {
            continue;
        }
        visible += 1;
        let tol = params.channel_tolerance;
        if ta
            .iter()
            .zip(tb)
            .all(|(x, y)| x.abs_diff(*y) <= tol)
        {
            matched += 1;
        }
    }

    // A fully transparent edge tiles trivially.
    if visible == 0 {
        return true;
    }
    matched as f32 / visible as f32 >= params.edge_threshold
}
