use xxhash_rust::xxh3::xxh3_64;

/// A sub-rectangle of a resource, in texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole of a `width` x `height` resource.
    pub const fn of_extent(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub const fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Whether this rectangle is exactly the whole resource.
    pub const fn covers(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }

    /// Shrinks any right/bottom overhang so the rectangle fits the resource.
    /// An origin outside the resource collapses to zero extent.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let mut out = *self;
        if out.x >= width || out.y >= height {
            out.width = 0;
            out.height = 0;
            return out;
        }
        if out.right() > width as u64 {
            out.width = width - out.x;
        }
        if out.bottom() > height as u64 {
            out.height = height - out.y;
        }
        out
    }

    /// Structural-cache key for sprite-mode addressing. Derived from the
    /// rectangle's geometry only, never its pixel content.
    pub fn geometry_key(&self) -> u64 {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.x.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.y.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.width.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.height.to_le_bytes());
        xxh3_64(&bytes)
    }
}
