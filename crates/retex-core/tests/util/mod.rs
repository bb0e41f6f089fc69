//! Shared fixtures for the service-level tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use retex_core::{Config, PixelFormat, ScaleService, TextureId, TextureSource};
use retex_resample::{NearestUpscaler, ResampleError, ScaleInput, ScaleOutput, Upscaler};

/// Host-side bitmap double: mutable backing store plus read accounting.
pub struct TestTexture {
    id: TextureId,
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Mutex<Vec<u8>>,
    pub reads: AtomicUsize,
    pub fail_reads: AtomicBool,
}

impl TestTexture {
    pub fn new(id: u64, name: &str, width: u32, height: u32, seed: u8) -> Self {
        let pixels = (0..width as usize * height as usize * 4)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect();
        Self::with_pixels(id, name, width, height, pixels)
    }

    pub fn with_pixels(id: u64, name: &str, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            id: TextureId::new(id),
            name: name.to_owned(),
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels: Mutex::new(pixels),
            reads: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn texture_id(&self) -> TextureId {
        self.id
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Host-side write into the backing store. The caller still has to
    /// forward the span via `ScaleService::notify_partial_write`.
    pub fn write(&self, offset: usize, data: &[u8]) {
        let mut pixels = self.pixels.lock().unwrap();
        pixels[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.lock().unwrap().clone()
    }
}

impl TextureSource for TestTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_pixels(&self, out: &mut Vec<u8>) -> Result<(), String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err("simulated readback failure".to_owned());
        }
        out.clear();
        out.extend_from_slice(&self.pixels.lock().unwrap());
        Ok(())
    }
}

/// An upscaler that always declines.
pub struct DecliningUpscaler;

impl Upscaler for DecliningUpscaler {
    fn upscale(&self, input: &ScaleInput<'_>) -> Result<ScaleOutput, ResampleError> {
        Err(ResampleError::ZeroArea {
            width: input.width,
            height: input.height,
        })
    }

    fn name(&self) -> &'static str {
        "declining"
    }
}

/// Wraps the reference scaler behind a gate so tests can hold jobs open.
pub struct GatedUpscaler {
    inner: NearestUpscaler,
    gate: crossbeam_channel::Receiver<()>,
}

impl GatedUpscaler {
    pub fn new() -> (Self, crossbeam_channel::Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                inner: NearestUpscaler::new(),
                gate: rx,
            },
            tx,
        )
    }
}

impl Upscaler for GatedUpscaler {
    fn upscale(&self, input: &ScaleInput<'_>) -> Result<ScaleOutput, ResampleError> {
        let _ = self.gate.recv();
        self.inner.upscale(input)
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn sync_service() -> ScaleService {
    sync_service_with(|_| {})
}

pub fn sync_service_with(tweak: impl FnOnce(&mut Config)) -> ScaleService {
    init_tracing();
    let mut config = Config::synchronous();
    tweak(&mut config);
    ScaleService::new(config, Arc::new(NearestUpscaler::new())).unwrap()
}

pub fn async_service_with(tweak: impl FnOnce(&mut Config)) -> ScaleService {
    init_tracing();
    let mut config = Config::default();
    tweak(&mut config);
    ScaleService::new(config, Arc::new(NearestUpscaler::new())).unwrap()
}
