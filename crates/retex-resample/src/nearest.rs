//! Reference nearest-neighbour upscaler.

use crate::wrap::{self, WrapDetect};
use crate::{validate, Result, ResampleError, ScaleInput, ScaleOutput, Upscaler};

/// Integer nearest-neighbour duplication.
///
/// Not a quality target: this exists so the cache pipeline has a real,
/// deterministic algorithm to sequence in tests and demos. It honours a wrap
/// axis only when [`wrap::detect`] agrees the source edge tiles, and never
/// pads.
#[derive(Debug)]
pub struct NearestUpscaler {
    detect: WrapDetect,
}

impl NearestUpscaler {
    pub fn new() -> Self {
        Self {
            detect: WrapDetect::default(),
        }
    }

    pub fn with_detection(detect: WrapDetect) -> Self {
        Self { detect }
    }
}

impl Default for NearestUpscaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Upscaler for NearestUpscaler {
    fn upscale(&self, input: &ScaleInput<'_>) -> Result<ScaleOutput> {
        validate(input)?;

        let scale = input.scale as u32;
        let out_w = input
            .width
            .checked_mul(scale)
            .ok_or(ResampleError::DimensionOverflow {
                width: input.width,
                height: input.height,
                scale: input.scale,
            })?;
        let out_h = input
            .height
            .checked_mul(scale)
            .ok_or(ResampleError::DimensionOverflow {
                width: input.width,
                height: input.height,
                scale: input.scale,
            })?;

        let bpt = input.format.bytes_per_texel();
        let src_stride = input.width as usize * bpt;
        let dst_stride = out_w as usize * bpt;

        let mut pixels = vec![0u8; dst_stride * out_h as usize];
        for sy in 0..input.height as usize {
            // Build one scaled row, then duplicate it vertically.
            let src_row = &input.pixels[sy * src_stride..(sy + 1) * src_stride];
            let dst_base = sy * scale as usize * dst_stride;
            {
                let row = &mut pixels[dst_base..dst_base + dst_stride];
                for sx in 0..input.width as usize {
                    let texel = &src_row[sx * bpt..(sx + 1) * bpt];
                    for dx in 0..scale as usize {
                        let off = (sx * scale as usize + dx) * bpt;
                        row[off..off + bpt].copy_from_slice(texel);
                    }
                }
            }
            for dy in 1..scale as usize {
                let (done, rest) = pixels.split_at_mut(dst_base + dy * dst_stride);
                rest[..dst_stride].copy_from_slice(&done[dst_base..dst_base + dst_stride]);
            }
        }

        let wrap = wrap::detect(
            input.pixels,
            input.width,
            input.height,
            input.format,
            input.wrap,
            &self.detect,
        );

        Ok(ScaleOutput {
            pixels,
            width: out_w,
            height: out_h,
            wrap,
            padding: (0, 0),
        })
    }

    fn name(&self) -> &'static str {
        "nearest"
    }
}
