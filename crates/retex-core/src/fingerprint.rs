use retex_resample::PixelFormat;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

use crate::geom::Bounds;

/// Content hash of a sampled pixel region.
///
/// Two requests with equal fingerprints are treated as content-identical
/// regardless of which resource they came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hashes the `region` rows of a full-resource snapshot.
///
/// `snapshot` holds the complete resource (`extent_w` x `extent_h`); the
/// region must already be clamped to that extent. Whole-resource regions hash
/// the buffer in one shot.
pub(crate) fn of_region(
    snapshot: &[u8],
    extent_w: u32,
    extent_h: u32,
    format: PixelFormat,
    region: &Bounds,
) -> Fingerprint {
    if region.covers(extent_w, extent_h) {
        return Fingerprint(xxh3_64(snapshot));
    }

    let bpt = format.bytes_per_texel();
    let stride = extent_w as usize * bpt;
    let row_len = region.width as usize * bpt;
    let x_off = region.x as usize * bpt;

    let mut hasher = Xxh3::new();
    for row in region.y..region.y + region.height {
        let start = row as usize * stride + x_off;
        hasher.update(&snapshot[start..start + row_len]);
    }
    Fingerprint(hasher.digest())
}
