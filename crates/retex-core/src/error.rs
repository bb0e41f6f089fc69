use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Hard failures of the cache pipeline.
///
/// Entry rejections (zero area, illegal format, budget exhaustion, ...) are
/// not errors: `resolve` reports them by falling back to the original
/// resource. This enum covers the cases where something the pipeline relies
/// on actually failed.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Reading pixel data back from the host resource failed.
    ///
    /// Carries a `String` because the failure originates behind the
    /// [`crate::TextureSource`] boundary and has no structured form here.
    #[error("failed to read pixels from {name:?}: {reason}")]
    PixelRead { name: String, reason: String },

    #[error("failed to spawn scaling worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
