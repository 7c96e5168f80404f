//! Error types for the filter preview pipeline
//!
//! Three families, matching where an error is allowed to travel:
//! - `FilterError` - invalid calls, returned immediately at the call site
//! - `GpuError` - backend failures, caught inside the render thread
//! - `CaptureError` - what a save or render-job callback receives on failure

use thiserror::Error;

pub type FilterResult<T> = Result<T, FilterError>;
pub type GpuResult<T> = Result<T, GpuError>;

/// Contract violations detected when a caller hands us something invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("unsupported effect `{0}`")]
    UnsupportedEffect(String),

    #[error("effect `{effect}` has no parameter `{key}`")]
    UnknownParameter { effect: String, key: String },

    #[error("render job scale must be a finite number > 0, got {0}")]
    InvalidScale(f32),

    #[error("render job id must not be empty")]
    EmptyJobId,
}

/// Failures raised by a `GpuBackend`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GpuError {
    /// Reading pixels back from a framebuffer failed (driver/context error,
    /// out-of-bounds region, failed buffer mapping).
    #[error("pixel read failed: {0}")]
    Read(String),

    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: u64 },

    #[error("unknown texture {0}")]
    UnknownTexture(u32),

    #[error("unknown effect handle {0}")]
    UnknownEffect(u32),

    #[error("effect `{0}` is not provided by this backend")]
    UnsupportedEffect(String),

    #[error("device error: {0}")]
    Device(String),
}

impl GpuError {
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}

/// Why a capture (save or render job) produced no image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("graphics read error: {0}")]
    GraphicsRead(String),

    #[error("out of memory allocating a {width}x{height} capture buffer")]
    OutOfMemory { width: u32, height: u32 },

    /// The GPU ran out of memory while rendering the request.
    #[error("GPU out of memory allocating {bytes} bytes")]
    GpuOutOfMemory { bytes: u64 },

    /// The job's effect could not be instantiated or applied.
    #[error("effect failed: {0}")]
    Effect(GpuError),

    /// The callback was dropped before it could be serviced.
    #[error("capture request was cancelled")]
    Cancelled,
}

impl From<GpuError> for CaptureError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::Read(msg) => CaptureError::GraphicsRead(msg),
            GpuError::OutOfMemory { bytes } => CaptureError::GpuOutOfMemory { bytes },
            other => CaptureError::Effect(other),
        }
    }
}
