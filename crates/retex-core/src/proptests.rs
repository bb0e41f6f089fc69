//! Property tests for the snapshot side-cache's patch-or-purge rules,
//! checked against a trivial reference model.

use std::sync::Mutex;

use proptest::prelude::*;
use retex_resample::PixelFormat;

use crate::snapshot::SnapshotCache;
use crate::texture::{TextureId, TextureSource};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 8;
const BYTES: usize = (WIDTH * HEIGHT * 4) as usize;

#[derive(Debug, Clone)]
enum Op {
    Capture,
    Write { offset: usize, data: Vec<u8> },
    Purge,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let write = (0usize..BYTES + 64, 0usize..=96).prop_map(|(offset, len)| Op::Write {
        offset,
        data: vec![0xC3; len],
    });
    // Full-coverage and overhanging writes both need to show up often.
    let full = (BYTES..BYTES + 32).prop_map(|len| Op::Write {
        offset: 0,
        data: (0..len).map(|i| i as u8).collect(),
    });
    prop_oneof![
        3 => Just(Op::Capture),
        4 => write,
        1 => full,
        1 => Just(Op::Purge),
    ]
}

struct Backing {
    id: TextureId,
    pixels: Mutex<Vec<u8>>,
}

impl TextureSource for Backing {
    fn id(&self) -> TextureId {
        self.id
    }
    fn width(&self) -> u32 {
        WIDTH
    }
    fn height(&self) -> u32 {
        HEIGHT
    }
    fn format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }
    fn name(&self) -> &str {
        "proptest"
    }
    fn read_pixels(&self, out: &mut Vec<u8>) -> std::result::Result<(), String> {
        out.clear();
        out.extend_from_slice(&self.pixels.lock().unwrap());
        Ok(())
    }
}

/// The reference model: what the cached snapshot must contain, if present.
fn model_apply(model: &mut Option<Vec<u8>>, offset: usize, data: &[u8]) {
    if data.is_empty() {
        *model = None;
        return;
    }
    let Some(snapshot) = model.as_mut() else {
        return;
    };
    let len = snapshot.len();
    if offset == 0 && data.len() >= len {
        *snapshot = data[..len].to_vec();
    } else if offset.checked_add(data.len()).is_some_and(|end| end <= len) {
        snapshot[offset..offset + data.len()].copy_from_slice(data);
    } else {
        *model = None;
    }
}

proptest! {
    #[test]
    fn snapshot_cache_matches_the_model(ops in proptest::collection::vec(op_strategy(), 1..48)) {
        let cache = SnapshotCache::new();
        let backing = Backing {
            id: TextureId::new(1),
            pixels: Mutex::new((0..BYTES).map(|i| (i as u8).wrapping_mul(7)).collect()),
        };
        let mut model: Option<Vec<u8>> = None;

        for op in ops {
            match op {
                Op::Capture => {
                    let snapshot = cache.get_or_capture(&backing).unwrap();
                    let expected = model.get_or_insert_with(|| backing.pixels.lock().unwrap().clone());
                    prop_assert_eq!(&snapshot[..], &expected[..]);
                }
                Op::Write { offset, data } => {
                    // The host mutates its copy (where the span fits) and
                    // reports the write either way.
                    {
                        let mut pixels = backing.pixels.lock().unwrap();
                        if let Some(end) = offset.checked_add(data.len()) {
                            if end <= pixels.len() {
                                pixels[offset..end].copy_from_slice(&data);
                            } else if offset == 0 && data.len() >= pixels.len() {
                                let len = pixels.len();
                                pixels.copy_from_slice(&data[..len]);
                            }
                        }
                    }
                    cache.apply_write(backing.id, offset, &data);
                    model_apply(&mut model, offset, &data);
                }
                Op::Purge => {
                    cache.purge(backing.id);
                    model = None;
                }
            }
            prop_assert_eq!(cache.contains(backing.id), model.is_some());
        }
    }
}
