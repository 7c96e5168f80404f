//! Source image and the two texture slots
//!
//! Slot 0 holds the most recently uploaded source image, slot 1 the most
//! recent effect output. Slot 1 is only meaningful right after an effect has
//! been applied.

use std::sync::Arc;

use image::RgbaImage;

use crate::error::{GpuError, GpuResult};
use crate::gpu::backend::{GpuBackend, TextureFilter, TextureId};

#[derive(Debug)]
pub struct TextureManager {
    source: Option<Arc<RgbaImage>>,
    needs_texture_reload: bool,
    renderer_ready: bool,
    /// Filled one at a time so a failed allocation keeps the slot already made
    slots: [Option<TextureId>; 2],
    width: u32,
    height: u32,
    filter: TextureFilter,
}

impl TextureManager {
    pub fn new(filter: TextureFilter) -> Self {
        Self {
            source: None,
            needs_texture_reload: false,
            renderer_ready: false,
            slots: [None; 2],
            width: 0,
            height: 0,
            filter,
        }
    }

    /// Replace the source image. Handing over the same `Arc` again is a
    /// no-op; any other image schedules a re-upload.
    ///
    /// Returns whether anything changed.
    pub fn set_source_image(&mut self, image: Arc<RgbaImage>) -> bool {
        if let Some(current) = &self.source {
            if Arc::ptr_eq(current, &image) {
                return false;
            }
        }
        self.source = Some(image);
        self.needs_texture_reload = true;
        true
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn needs_texture_reload(&self) -> bool {
        self.needs_texture_reload
    }

    pub fn is_initialized(&self) -> bool {
        self.renderer_ready && self.slots.iter().all(Option::is_some)
    }

    /// Make sure both slots exist and slot 0 holds the current source.
    ///
    /// Called once per frame before anything else touches the GPU. On the
    /// first call this also initializes the renderer.
    pub fn ensure_ready<B: GpuBackend + ?Sized>(&mut self, gpu: &mut B) -> GpuResult<[TextureId; 2]> {
        if !self.renderer_ready {
            gpu.init_renderer()?;
            self.renderer_ready = true;
        }

        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some(gpu.create_texture()?);
                // Initial upload
                self.needs_texture_reload = true;
            }
        }
        let slots = match self.slots {
            [Some(source), Some(output)] => [source, output],
            _ => return Err(GpuError::device("texture slots missing after allocation")),
        };

        if self.needs_texture_reload {
            self.reload(gpu, slots[0])?;
            self.needs_texture_reload = false;
        }

        Ok(slots)
    }

    fn reload<B: GpuBackend + ?Sized>(&mut self, gpu: &mut B, texture: TextureId) -> GpuResult<()> {
        let Some(image) = &self.source else {
            return Ok(());
        };
        gpu.upload_texture(texture, image, self.filter)?;
        self.width = image.width();
        self.height = image.height();
        tracing::debug!(width = self.width, height = self.height, "uploaded source texture");
        Ok(())
    }

    /// Dimensions of the last uploaded image
    pub fn image_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
