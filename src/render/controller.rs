//! The per-frame protocol of the filter surface
//!
//! Each frame, under one lock covering the whole frame:
//! 1. Nothing to draw without a source image.
//! 2. Make sure textures are allocated and slot 0 is current.
//! 3. Render at most one queued job through a one-shot effect, capture it
//!    off-screen and schedule its callback.
//! 4. Re-render the persistent frame (rebuilding the persistent effect if
//!    needed) onto the visible surface.
//! 5. Capture the surface if a save was requested.
//! 6. Ask for another frame right away while jobs remain.
//!
//! Callbacks are posted to the dispatcher after the lock is released.

use std::future::Future;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;

use super::dispatch::{Dispatcher, Task};
use super::effect::EffectApplicator;
use super::queue::{JobResult, QueuedJob, RenderJob, RenderJobQueue};
use super::surface::RenderWaker;
use super::texture::TextureManager;
use crate::capture::{capture_region, ArgbImage};
use crate::config::PreviewConfig;
use crate::error::{CaptureError, FilterResult};
use crate::gpu::backend::{GpuBackend, ReadTarget, TextureId};
use crate::state::EffectSpec;

pub type SaveResult = Result<ArgbImage, CaptureError>;
pub type SaveCallback = Box<dyn FnOnce(SaveResult) + Send + 'static>;

/// What a call to `draw_frame` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No source image yet.
    Idle,
    /// Texture setup failed; nothing was drawn this frame.
    Skipped,
    Rendered {
        /// Id of the job processed this frame, if any
        job: Option<String>,
        /// Whether a save request was serviced
        saved: bool,
        /// Jobs still waiting after this frame
        pending_jobs: usize,
    },
}

/// State shared between callers and the render thread.
struct FrameState {
    textures: TextureManager,
    effects: EffectApplicator,
    jobs: RenderJobQueue,
    /// One-shot save request; taken when serviced
    save_request: Option<SaveCallback>,
}

pub struct FilterController {
    state: Mutex<FrameState>,
    waker: RenderWaker,
    dispatcher: Arc<dyn Dispatcher>,
}

impl FilterController {
    pub fn new(config: &PreviewConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            state: Mutex::new(FrameState {
                textures: TextureManager::new(config.texture_filter),
                effects: EffectApplicator::new(),
                jobs: RenderJobQueue::new(),
                save_request: None,
            }),
            waker: RenderWaker::new(),
            dispatcher,
        }
    }

    /// Wake-up signal the render thread waits on.
    pub fn waker(&self) -> &RenderWaker {
        &self.waker
    }

    pub fn request_render(&self) {
        self.waker.request_render();
    }

    /// Replace the source image. Passing the same `Arc` again does nothing.
    pub fn set_source_image(&self, image: Arc<RgbaImage>) {
        let changed = self.state.lock().textures.set_source_image(image);
        if changed {
            self.request_render();
        }
    }

    /// Set the effect the visible surface keeps showing.
    ///
    /// Unsupported effects and unknown parameters are rejected here, at the
    /// call site, and leave the current effect untouched.
    pub fn set_persistent_effect(&self, spec: impl Into<EffectSpec>) -> FilterResult<()> {
        let recipe = spec.into().resolve()?;
        self.state.lock().effects.schedule_effect(recipe);
        self.request_render();
        Ok(())
    }

    /// Stop applying any persistent effect.
    pub fn remove_effect(&self) {
        self.state.lock().effects.schedule_effect(None);
        self.request_render();
    }

    /// Capture the next persistent frame and hand it to `callback`.
    ///
    /// A newer request replaces an older one that has not been serviced;
    /// the replaced callback receives `CaptureError::Cancelled`.
    pub fn request_save(&self, callback: impl FnOnce(SaveResult) + Send + 'static) {
        let replaced = self.state.lock().save_request.replace(Box::new(callback));
        if let Some(previous) = replaced {
            self.dispatcher.post(Box::new(move || previous(Err(CaptureError::Cancelled))));
        }
        self.request_render();
    }

    /// `request_save` as a future.
    pub fn save_async(&self) -> impl Future<Output = SaveResult> + Send + 'static {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.request_save(move |result| {
            let _ = tx.send(result);
        });
        async move { rx.await.unwrap_or(Err(CaptureError::Cancelled)) }
    }

    /// Queue a render job. Invalid jobs are rejected immediately.
    pub fn submit_render_job(&self, job: RenderJob) -> FilterResult<()> {
        let id = job.id().to_string();
        self.state.lock().jobs.submit(job)?;
        tracing::debug!(job = %id, "render job submitted");
        self.request_render();
        Ok(())
    }

    /// Queue a job and get its result as a future. Cancelling the job
    /// resolves the future with `CaptureError::Cancelled`.
    pub fn render_preview_async(
        &self,
        id: impl Into<String>,
        effect: impl Into<EffectSpec>,
        scale: f32,
    ) -> FilterResult<impl Future<Output = JobResult> + Send + 'static> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.submit_render_job(RenderJob::new(id, effect, scale, move |_, result| {
            let _ = tx.send(result);
        }))?;
        Ok(async move { rx.await.unwrap_or(Err(CaptureError::Cancelled)) })
    }

    /// Drop every waiting job with this id. Jobs already being rendered are
    /// not affected. Returns how many jobs were removed.
    pub fn cancel_render_job(&self, id: &str) -> usize {
        let removed = self.state.lock().jobs.cancel(id);
        if removed > 0 {
            tracing::debug!(job = %id, removed, "render job cancelled");
        }
        removed
    }

    pub fn pending_jobs(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_save_pending(&self) -> bool {
        self.state.lock().save_request.is_some()
    }

    pub fn needs_effect_reload(&self) -> bool {
        self.state.lock().effects.needs_effect_reload()
    }

    /// Run one frame. Must be called from the render thread only.
    pub fn draw_frame<B: GpuBackend + ?Sized>(&self, gpu: &mut B) -> FrameOutcome {
        let mut deliveries: Vec<Task> = Vec::new();

        let outcome = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            if !state.textures.has_source() {
                return FrameOutcome::Idle;
            }

            match state.textures.ensure_ready(gpu) {
                Ok([source, output]) => {
                    let job = state
                        .jobs
                        .take_next()
                        .map(|job| draw_job_frame(state, gpu, job, source, output, &mut deliveries));
                    let saved = draw_persistent_frame(state, gpu, source, output, &mut deliveries);
                    FrameOutcome::Rendered {
                        job,
                        saved,
                        pending_jobs: state.jobs.len(),
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "texture setup failed, skipping frame");
                    FrameOutcome::Skipped
                }
            }
        };

        for task in deliveries {
            self.dispatcher.post(task);
        }

        if let FrameOutcome::Rendered { pending_jobs, .. } = outcome {
            if pending_jobs > 0 {
                // Drain the queue without waiting for the next redraw tick
                self.request_render();
            }
        }
        outcome
    }

    /// Fail everything still waiting (jobs and save) with `error`.
    pub fn abandon_pending(&self, error: CaptureError) {
        let (jobs, save) = {
            let mut state = self.state.lock();
            let jobs: Vec<QueuedJob> = std::iter::from_fn(|| state.jobs.take_next()).collect();
            (jobs, state.save_request.take())
        };
        for job in jobs {
            let err = error.clone();
            let QueuedJob { id, on_complete, .. } = job;
            self.dispatcher.post(Box::new(move || on_complete(id, Err(err))));
        }
        if let Some(callback) = save {
            let err = error.clone();
            self.dispatcher.post(Box::new(move || callback(Err(err))));
        }
    }

    /// Release GPU-side effect state before the backend goes away.
    pub fn release<B: GpuBackend + ?Sized>(&self, gpu: &mut B) {
        self.state.lock().effects.release(gpu);
    }
}

/// Render one job through a one-shot effect and capture it off-screen.
fn draw_job_frame<B: GpuBackend + ?Sized>(
    state: &mut FrameState,
    gpu: &mut B,
    job: QueuedJob,
    source: TextureId,
    output: TextureId,
    deliveries: &mut Vec<Task>,
) -> String {
    let (image_width, image_height) = state.textures.image_size();
    let (width, height) = job.viewport(image_width, image_height);

    let result: JobResult = EffectApplicator::apply_one_shot(gpu, &job.recipe, source, width, height, output, |gpu| {
        capture_region(gpu, ReadTarget::Texture(output), 0, 0, width, height)
    })
    .map_err(CaptureError::from)
    .and_then(|captured| captured);

    // Slot 1 now holds the job's output; rebuild the persistent effect
    state.effects.mark_for_reload();

    match &result {
        Ok(_) => tracing::debug!(job = %job.id, width, height, "render job captured"),
        Err(err) => tracing::warn!(job = %job.id, %err, "render job failed"),
    }

    let QueuedJob { id, on_complete, .. } = job;
    let job_id = id.clone();
    deliveries.push(Box::new(move || on_complete(id, result)));
    job_id
}

/// Draw the persistent frame to the surface and service a pending save.
/// Returns whether a save was serviced.
fn draw_persistent_frame<B: GpuBackend + ?Sized>(
    state: &mut FrameState,
    gpu: &mut B,
    source: TextureId,
    output: TextureId,
    deliveries: &mut Vec<Task>,
) -> bool {
    if state.effects.needs_effect_reload() {
        if let Err(err) = state.effects.materialize_pending_effect(gpu) {
            tracing::warn!(%err, "persistent effect could not be built");
        }
    }

    let (width, height) = state.textures.image_size();
    let shown = match state.effects.apply(gpu, source, width, height, output) {
        Ok(true) => output,
        Ok(false) => source,
        Err(err) => {
            tracing::warn!(%err, "persistent effect failed, showing source");
            source
        }
    };

    let rendered = gpu.render_texture(shown);
    if let Err(err) = &rendered {
        tracing::warn!(%err, "persistent frame not rendered");
    }

    let Some(callback) = state.save_request.take() else {
        return false;
    };

    let result = match rendered {
        Ok(()) => {
            let (surface_width, surface_height) = gpu.surface_size();
            capture_region(gpu, ReadTarget::Surface, 0, 0, surface_width, surface_height)
        }
        Err(err) => Err(err.into()),
    };
    deliveries.push(Box::new(move || callback(result)));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::fake::{Call, FakeBackend};
    use crate::render::dispatch::ImmediateDispatcher;
    use crate::state::{CustomEffect, PhotoFilter};

    type Log = Arc<Mutex<Vec<(String, Result<(u32, u32), CaptureError>)>>>;

    fn controller() -> FilterController {
        FilterController::new(&PreviewConfig::default(), Arc::new(ImmediateDispatcher))
    }

    fn with_source(width: u32, height: u32) -> FilterController {
        let controller = controller();
        controller.set_source_image(Arc::new(RgbaImage::new(width, height)));
        controller
    }

    fn recording_job(id: &str, effect: impl Into<EffectSpec>, scale: f32, log: &Log) -> RenderJob {
        let log = Arc::clone(log);
        RenderJob::new(id, effect, scale, move |id, result| {
            log.lock().push((id, result.map(|img| img.dimensions())));
        })
    }

    fn completed_ids(log: &Log) -> Vec<String> {
        log.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    #[test]
    fn test_idle_without_source() {
        let controller = controller();
        let mut gpu = FakeBackend::new(8, 8);

        assert_eq!(controller.draw_frame(&mut gpu), FrameOutcome::Idle);
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn test_job_delivers_scaled_image() {
        let controller = with_source(100, 100);
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();

        controller
            .submit_render_job(recording_job("j1", PhotoFilter::Sepia, 0.5, &log))
            .unwrap();
        let outcome = controller.draw_frame(&mut gpu);

        assert_eq!(
            outcome,
            FrameOutcome::Rendered {
                job: Some("j1".to_string()),
                saved: false,
                pending_jobs: 0
            }
        );
        assert_eq!(*log.lock(), vec![("j1".to_string(), Ok((50, 50)))]);
    }

    #[test]
    fn test_job_output_comes_from_its_effect() {
        let controller = with_source(4, 4);
        let mut gpu = FakeBackend::new(8, 8);
        let (tx, rx) = std::sync::mpsc::channel();

        controller
            .submit_render_job(RenderJob::new("neg", PhotoFilter::Negative, 1.0, move |_, result| {
                let _ = tx.send(result);
            }))
            .unwrap();
        controller.draw_frame(&mut gpu);

        let image = rx.recv().unwrap().unwrap();
        let [r, g, b, a] = FakeBackend::effect_marker("negative");
        let expected = u32::from_be_bytes([a, r, g, b]);
        assert!(image.pixels.iter().all(|&p| p == expected));
    }

    #[test]
    fn test_jobs_complete_in_fifo_order_one_per_frame() {
        let controller = with_source(20, 10);
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();

        for id in ["a", "b", "c"] {
            controller
                .submit_render_job(recording_job(id, PhotoFilter::Grayscale, 1.0, &log))
                .unwrap();
        }

        for expected in 1..=3 {
            controller.draw_frame(&mut gpu);
            assert_eq!(log.lock().len(), expected);
        }
        assert_eq!(completed_ids(&log), vec!["a", "b", "c"]);
        assert_eq!(controller.pending_jobs(), 0);
    }

    #[test]
    fn test_persistent_frame_rendered_between_jobs() {
        let controller = with_source(16, 16);
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();
        for id in ["a", "b"] {
            controller
                .submit_render_job(recording_job(id, PhotoFilter::Sepia, 0.25, &log))
                .unwrap();
        }

        controller.draw_frame(&mut gpu);
        controller.draw_frame(&mut gpu);

        // Job applies are the scaled (4x4) ones
        let sequence: Vec<&str> = gpu
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::Apply { width: 4, .. } => Some("job"),
                Call::Render(_) => Some("render"),
                _ => None,
            })
            .collect();
        assert_eq!(sequence, vec!["job", "render", "job", "render"]);
    }

    #[test]
    fn test_remaining_jobs_request_another_frame() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();
        controller.submit_render_job(recording_job("a", PhotoFilter::Sepia, 1.0, &log)).unwrap();
        controller.submit_render_job(recording_job("b", PhotoFilter::Sepia, 1.0, &log)).unwrap();

        // Drain requests made by setters
        controller.waker().take_request();
        controller.draw_frame(&mut gpu);
        assert!(controller.waker().take_request());

        controller.draw_frame(&mut gpu);
        assert!(!controller.waker().take_request());
    }

    #[test]
    fn test_cancel_before_frame_skips_job() {
        let controller = with_source(100, 100);
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();

        controller.submit_render_job(recording_job("j1", PhotoFilter::Sepia, 0.5, &log)).unwrap();
        controller.submit_render_job(recording_job("j2", PhotoFilter::Sepia, 0.5, &log)).unwrap();
        assert_eq!(controller.cancel_render_job("j1"), 1);

        controller.draw_frame(&mut gpu);
        controller.draw_frame(&mut gpu);

        assert_eq!(completed_ids(&log), vec!["j2"]);
    }

    #[test]
    fn test_cancel_from_callback_after_dequeue_has_no_effect() {
        let controller = Arc::new(with_source(10, 10));
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();

        let inner = Arc::clone(&controller);
        let cancelled = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&cancelled);
        controller
            .submit_render_job(RenderJob::new("j1", PhotoFilter::Sepia, 1.0, move |id, _| {
                // Already dequeued: nothing left to remove
                *seen.lock() = Some(inner.cancel_render_job(&id));
            }))
            .unwrap();
        controller.submit_render_job(recording_job("j2", PhotoFilter::Sepia, 1.0, &log)).unwrap();

        controller.draw_frame(&mut gpu);
        assert_eq!(*cancelled.lock(), Some(0));
        assert_eq!(controller.pending_jobs(), 1);
    }

    #[test]
    fn test_job_does_not_leak_into_persistent_effect() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(8, 8);
        let log: Log = Default::default();
        controller.set_persistent_effect(PhotoFilter::Sepia).unwrap();
        controller.draw_frame(&mut gpu);

        controller.submit_render_job(recording_job("j", PhotoFilter::Negative, 1.0, &log)).unwrap();
        gpu.clear_calls();
        controller.draw_frame(&mut gpu);

        let created: Vec<String> = gpu
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateEffect { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        // One-shot negative, then the persistent sepia rebuilt
        assert_eq!(created, vec!["negative", "sepia"]);
        assert!(!controller.needs_effect_reload());
        assert_eq!(gpu.live_effects(), 1);
    }

    #[test]
    fn test_persistent_effect_decides_rendered_slot() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(8, 8);

        controller.draw_frame(&mut gpu);
        controller.set_persistent_effect(PhotoFilter::Grayscale).unwrap();
        controller.draw_frame(&mut gpu);
        controller.remove_effect();
        controller.draw_frame(&mut gpu);

        let rendered: Vec<TextureId> = gpu
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Render(texture) => Some(texture),
                _ => None,
            })
            .collect();
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[0], rendered[2]);
        assert_ne!(rendered[0], rendered[1]);
        assert_eq!(gpu.live_effects(), 0);
    }

    #[test]
    fn test_unsupported_effect_rejected_at_call_site() {
        let controller = with_source(10, 10);
        let err = controller
            .set_persistent_effect(CustomEffect::new("oil_paint"))
            .unwrap_err();
        assert_eq!(err, crate::error::FilterError::UnsupportedEffect("oil_paint".to_string()));
        assert!(!controller.needs_effect_reload());
    }

    #[test]
    fn test_save_serviced_exactly_once() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(6, 4);
        let saves = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&saves);
        controller.request_save(move |result| sink.lock().push(result.map(|img| img.dimensions())));
        assert!(controller.is_save_pending());

        let first = controller.draw_frame(&mut gpu);
        assert!(matches!(first, FrameOutcome::Rendered { saved: true, .. }));
        assert!(!controller.is_save_pending());

        let second = controller.draw_frame(&mut gpu);
        assert!(matches!(second, FrameOutcome::Rendered { saved: false, .. }));
        assert_eq!(*saves.lock(), vec![Ok((6, 4))]);
    }

    #[test]
    fn test_replaced_save_is_cancelled() {
        let controller = with_source(10, 10);
        let results = Arc::new(Mutex::new(Vec::new()));

        for tag in ["old", "new"] {
            let sink = Arc::clone(&results);
            controller.request_save(move |result| sink.lock().push((tag, result.is_ok())));
        }
        controller.draw_frame(&mut FakeBackend::new(2, 2));

        assert_eq!(*results.lock(), vec![("old", false), ("new", true)]);
    }

    #[test]
    fn test_failed_capture_keeps_loop_alive() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(4, 4);
        let log: Log = Default::default();
        controller.submit_render_job(recording_job("bad", PhotoFilter::Sepia, 1.0, &log)).unwrap();
        controller.submit_render_job(recording_job("good", PhotoFilter::Sepia, 1.0, &log)).unwrap();

        gpu.fail_reads(true);
        controller.draw_frame(&mut gpu);
        gpu.fail_reads(false);
        controller.draw_frame(&mut gpu);

        let log = log.lock();
        assert!(matches!(log[0], (_, Err(CaptureError::GraphicsRead(_)))));
        assert_eq!(log[1], ("good".to_string(), Ok((10, 10))));
    }

    #[test]
    fn test_effect_failure_reported_to_job() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(4, 4);
        gpu.fail_effect("posterize");
        let log: Log = Default::default();

        controller.submit_render_job(recording_job("p", PhotoFilter::Posterize, 1.0, &log)).unwrap();
        controller.draw_frame(&mut gpu);

        assert!(matches!(log.lock()[0], (_, Err(CaptureError::Effect(_)))));
    }

    #[test]
    fn test_gpu_out_of_memory_reported_to_job() {
        let controller = with_source(10, 10);
        let mut gpu = FakeBackend::new(4, 4);
        let log: Log = Default::default();
        controller.submit_render_job(recording_job("big", PhotoFilter::Sepia, 2.0, &log)).unwrap();
        controller.submit_render_job(recording_job("next", PhotoFilter::Sepia, 1.0, &log)).unwrap();

        gpu.exhaust_memory(true);
        controller.draw_frame(&mut gpu);
        gpu.exhaust_memory(false);
        controller.draw_frame(&mut gpu);

        let log = log.lock();
        assert_eq!(log[0], ("big".to_string(), Err(CaptureError::GpuOutOfMemory { bytes: 20 * 20 * 4 })));
        assert_eq!(log[1], ("next".to_string(), Ok((10, 10))));
    }

    #[test]
    fn test_new_source_reuploads_once() {
        let controller = controller();
        let mut gpu = FakeBackend::new(4, 4);
        let image = Arc::new(RgbaImage::new(5, 5));

        controller.set_source_image(Arc::clone(&image));
        controller.draw_frame(&mut gpu);
        controller.set_source_image(Arc::clone(&image));
        controller.draw_frame(&mut gpu);
        controller.set_source_image(Arc::new(RgbaImage::new(5, 5)));
        controller.draw_frame(&mut gpu);

        let uploads = gpu.calls().iter().filter(|c| matches!(c, Call::Upload { .. })).count();
        assert_eq!(uploads, 2);
    }

    #[test]
    fn test_abandon_fails_waiting_requests() {
        let controller = with_source(10, 10);
        let log: Log = Default::default();
        controller.submit_render_job(recording_job("j", PhotoFilter::Sepia, 1.0, &log)).unwrap();
        let saved = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&saved);
        controller.request_save(move |result| *sink.lock() = Some(result.is_err()));

        controller.abandon_pending(CaptureError::Cancelled);

        assert_eq!(*log.lock(), vec![("j".to_string(), Err(CaptureError::Cancelled))]);
        assert_eq!(*saved.lock(), Some(true));
        assert_eq!(controller.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn test_async_preview_and_cancellation() {
        let controller = with_source(40, 20);
        let kept = controller.render_preview_async("kept", PhotoFilter::Vignette, 0.5).unwrap();
        let dropped = controller.render_preview_async("dropped", PhotoFilter::Vignette, 0.5).unwrap();
        controller.cancel_render_job("dropped");

        let mut gpu = FakeBackend::new(4, 4);
        controller.draw_frame(&mut gpu);

        assert_eq!(kept.await.unwrap().dimensions(), (20, 10));
        assert_eq!(dropped.await.unwrap_err(), CaptureError::Cancelled);
    }
}
