//! GPU filter previews for a photo editor
//!
//! A dedicated render thread keeps a source image on screen through a
//! persistent effect, and in between renders one-off preview jobs (one per
//! frame, in submission order) that are read back as ARGB images. Saving
//! captures the visible surface the same way.
//!
//! Start with [`PhotoEditor`], or drive a [`FilterController`] with your own
//! [`gpu::GpuBackend`].

pub mod capture;
pub mod color;
pub mod config;
pub mod editor;
pub mod error;
pub mod gpu;
pub mod pixel;
pub mod render;
pub mod state;

pub use capture::ArgbImage;
pub use config::{PreviewConfig, RenderMode};
pub use editor::{PhotoEditor, PhotoEditorBuilder};
pub use error::{CaptureError, FilterError, GpuError};
pub use render::{FilterController, FilterSurface, RenderJob};
pub use state::{CustomEffect, EffectSpec, PhotoFilter};
