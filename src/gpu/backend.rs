//! The boundary between the render-job scheduler and the graphics stack
//!
//! Everything behind `GpuBackend` is owned by the render thread: texture ids
//! and effect handles are plain numbers that only mean something to the
//! backend that issued them.

use image::RgbaImage;

use crate::error::GpuResult;

/// Handle of a texture allocated by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle of an effect instance created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle(pub u32);

/// Sampling mode used when a texture is read by an effect or presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

/// Where a pixel read comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    /// The visible surface. Rows are stored bottom-up.
    Surface,
    /// An off-screen render target. Rows are stored top-down.
    Texture(TextureId),
}

/// Graphics operations the filter pipeline consumes.
///
/// All methods are called from the render thread only.
pub trait GpuBackend {
    /// One-time renderer setup (pipelines, samplers). Called before anything
    /// else on the first frame.
    fn init_renderer(&mut self) -> GpuResult<()>;

    fn create_texture(&mut self) -> GpuResult<TextureId>;

    /// Upload `image` into `texture`, resizing it to the image dimensions and
    /// configuring filtering with clamp-to-edge wrapping.
    fn upload_texture(&mut self, texture: TextureId, image: &RgbaImage, filter: TextureFilter) -> GpuResult<()>;

    fn create_effect(&mut self, name: &str) -> GpuResult<EffectHandle>;

    fn set_effect_parameter(&mut self, effect: EffectHandle, key: &str, value: f32) -> GpuResult<()>;

    /// Run `effect` reading `input` and writing `output`, sized to the
    /// given viewport.
    fn apply_effect(
        &mut self,
        effect: EffectHandle,
        input: TextureId,
        width: u32,
        height: u32,
        output: TextureId,
    ) -> GpuResult<()>;

    fn release_effect(&mut self, effect: EffectHandle);

    /// Draw `texture` onto the visible surface.
    fn render_texture(&mut self, texture: TextureId) -> GpuResult<()>;

    /// Size of the visible surface in pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Read a rectangle of `target` in RGBA/unsigned-byte format.
    ///
    /// `out` holds `width * height` words; each word is the four bytes of one
    /// pixel in little-endian order.
    fn read_pixels(
        &mut self,
        target: ReadTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        out: &mut [u32],
    ) -> GpuResult<()>;
}
