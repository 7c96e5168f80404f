//! Application-facing editor handle
//!
//! `PhotoEditor` bundles a `FilterController` with the render thread that
//! drives it and exposes the editing operations under their user-facing
//! names.

use std::future::Future;
use std::sync::Arc;

use image::RgbaImage;

use crate::config::PreviewConfig;
use crate::error::{CaptureError, FilterResult, GpuResult};
use crate::gpu::{GpuBackend, WgpuBackend};
use crate::render::{
    Dispatcher, FilterController, FilterSurface, ImmediateDispatcher, JobResult, RenderJob, SaveResult,
    TokioDispatcher,
};
use crate::state::EffectSpec;

#[derive(Default)]
pub struct PhotoEditorBuilder {
    config: Option<PreviewConfig>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl PhotoEditorBuilder {
    pub fn config(mut self, config: PreviewConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Where job and save callbacks run. Defaults to the current tokio
    /// runtime, or inline on the render thread outside of one.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Start the editor on a wgpu device.
    pub fn build(self) -> std::io::Result<PhotoEditor> {
        let config = self.config.clone().unwrap_or_default();
        self.build_with(move || pollster::block_on(WgpuBackend::new(&config)))
    }

    /// Start the editor on a custom backend, created on the render thread.
    pub fn build_with<B, F>(self, make_backend: F) -> std::io::Result<PhotoEditor>
    where
        B: GpuBackend + 'static,
        F: FnOnce() -> GpuResult<B> + Send + 'static,
    {
        let config = self.config.unwrap_or_default();
        let dispatcher = self.dispatcher.unwrap_or_else(|| match TokioDispatcher::current() {
            Some(dispatcher) => Arc::new(dispatcher),
            None => {
                tracing::debug!("no tokio runtime, callbacks run on the render thread");
                Arc::new(ImmediateDispatcher)
            }
        });

        let controller = Arc::new(FilterController::new(&config, dispatcher));
        let surface = FilterSurface::spawn(controller, config.render_mode, make_backend)?;
        Ok(PhotoEditor { config, surface })
    }
}

pub struct PhotoEditor {
    config: PreviewConfig,
    surface: FilterSurface,
}

impl PhotoEditor {
    pub fn builder() -> PhotoEditorBuilder {
        PhotoEditorBuilder::default()
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<FilterController> {
        self.surface.controller()
    }

    pub fn set_source_image(&self, image: Arc<RgbaImage>) {
        self.controller().set_source_image(image);
    }

    /// Queue a filter preview; its result goes to the job's callback.
    pub fn create_filter_preview(&self, job: RenderJob) -> FilterResult<()> {
        self.controller().submit_render_job(job)
    }

    /// Queue a filter preview at the configured thumbnail scale.
    pub fn filter_preview(
        &self,
        id: impl Into<String>,
        effect: impl Into<EffectSpec>,
    ) -> FilterResult<impl Future<Output = JobResult> + Send + 'static> {
        self.controller()
            .render_preview_async(id, effect, self.config.preview_scale)
    }

    pub fn cancel_filter_preview(&self, id: &str) -> usize {
        self.controller().cancel_render_job(id)
    }

    pub fn set_filter_effect(&self, effect: impl Into<EffectSpec>) -> FilterResult<()> {
        self.controller().set_persistent_effect(effect)
    }

    pub fn remove_filter(&self) {
        self.controller().remove_effect();
    }

    pub fn save_filter(&self, callback: impl FnOnce(SaveResult) + Send + 'static) {
        self.controller().request_save(callback);
    }

    pub fn save_async(&self) -> impl Future<Output = Result<crate::capture::ArgbImage, CaptureError>> + Send + 'static {
        self.controller().save_async()
    }

    /// Stop the render thread. Waiting previews and saves fail with
    /// `CaptureError::Cancelled`. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.surface.shutdown();
    }
}
