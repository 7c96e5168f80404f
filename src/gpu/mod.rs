/// GPU side of the filter pipeline
///
/// Architecture:
/// - `backend.rs` - the `GpuBackend` trait the scheduler drives
/// - `shaders.rs` - WGSL source for the effect and present passes
/// - `pipeline.rs` - wgpu implementation of `GpuBackend`
///
/// The scheduler only ever talks to `GpuBackend`, so tests run against an
/// in-memory backend instead of a device.

pub mod backend;
pub mod pipeline;
pub mod shaders;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{EffectHandle, GpuBackend, ReadTarget, TextureFilter, TextureId};
pub use pipeline::WgpuBackend;
