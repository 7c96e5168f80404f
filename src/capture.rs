//! Reading rendered frames back into CPU memory

use image::RgbaImage;

use crate::error::CaptureError;
use crate::gpu::backend::{GpuBackend, ReadTarget};
use crate::pixel;

/// Row order of the framebuffer being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Rows are bottom-up and must be flipped (visible surface).
    BottomUp,
    /// Rows already match image order (off-screen targets).
    TopDown,
}

impl Orientation {
    pub fn of(target: ReadTarget) -> Self {
        match target {
            ReadTarget::Surface => Orientation::BottomUp,
            ReadTarget::Texture(_) => Orientation::TopDown,
        }
    }
}

/// A captured frame with ARGB8888 pixels (`0xAARRGGBB`), rows top-down.
#[derive(Clone, PartialEq, Eq)]
pub struct ArgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl ArgbImage {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Convert back to an RGBA byte image for display or encoding.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for &argb in &self.pixels {
            bytes.extend_from_slice(&[
                (argb >> 16) as u8,
                (argb >> 8) as u8,
                argb as u8,
                (argb >> 24) as u8,
            ]);
        }
        // Length is width * height * 4 by construction
        RgbaImage::from_raw(self.width, self.height, bytes)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

// Pixel dumps are useless in logs
impl std::fmt::Debug for ArgbImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgbImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Read a rectangle of `target` and return it as an ARGB image.
///
/// Pixel-read failures come back as `CaptureError::GraphicsRead` and buffer
/// allocation failures as `CaptureError::OutOfMemory`. Nothing here panics,
/// so a failed capture never takes the render loop down with it.
pub fn capture_region<B: GpuBackend + ?Sized>(
    gpu: &mut B,
    target: ReadTarget,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<ArgbImage, CaptureError> {
    let out_of_memory = CaptureError::OutOfMemory { width, height };
    let len = (width as usize).checked_mul(height as usize).ok_or_else(|| out_of_memory.clone())?;
    let mut pixels: Vec<u32> = Vec::new();
    pixels.try_reserve_exact(len).map_err(|_| out_of_memory)?;
    pixels.resize(len, 0);

    gpu.read_pixels(target, x, y, width, height, &mut pixels)
        .map_err(|err| {
            tracing::warn!(?target, width, height, %err, "framebuffer read failed");
            CaptureError::from(err)
        })?;

    match Orientation::of(target) {
        Orientation::BottomUp => {
            pixel::convert_rgba_to_argb_and_flip(&mut pixels, width as usize, height as usize)
        }
        Orientation::TopDown => pixel::convert_rgba_to_argb(&mut pixels),
    }

    Ok(ArgbImage { width, height, pixels })
}
