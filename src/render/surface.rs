//! Dedicated render thread
//!
//! The GPU backend is created on, used on and dropped on one thread. Other
//! threads only touch the controller and wake the loop through a
//! `RenderWaker`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::controller::FilterController;
use crate::config::RenderMode;
use crate::error::{CaptureError, GpuResult};
use crate::gpu::backend::GpuBackend;

/// "Please draw a frame" flag shared with the render thread.
#[derive(Clone, Default)]
pub struct RenderWaker {
    inner: Arc<WakerInner>,
}

#[derive(Default)]
struct WakerInner {
    requested: Mutex<bool>,
    cond: Condvar,
}

impl RenderWaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_render(&self) {
        *self.inner.requested.lock() = true;
        self.inner.cond.notify_one();
    }

    /// Clear and return the pending request without blocking.
    pub fn take_request(&self) -> bool {
        std::mem::take(&mut *self.inner.requested.lock())
    }

    /// Block until a frame is requested or `timeout` passes. Returns whether
    /// a request was consumed.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut requested = self.inner.requested.lock();
        if !*requested {
            match timeout {
                Some(timeout) => {
                    let _ = self.inner.cond.wait_for(&mut requested, timeout);
                }
                None => {
                    while !*requested {
                        self.inner.cond.wait(&mut requested);
                    }
                }
            }
        }
        std::mem::take(&mut *requested)
    }
}

impl std::fmt::Debug for RenderWaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWaker")
            .field("requested", &*self.inner.requested.lock())
            .finish()
    }
}

/// Owns the render thread driving a `FilterController`.
pub struct FilterSurface {
    controller: Arc<FilterController>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FilterSurface {
    /// Start the render thread. `make_backend` runs on that thread; if it
    /// fails, everything already waiting is failed with the error.
    pub fn spawn<B, F>(controller: Arc<FilterController>, mode: RenderMode, make_backend: F) -> std::io::Result<Self>
    where
        B: GpuBackend + 'static,
        F: FnOnce() -> GpuResult<B> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let controller = Arc::clone(&controller);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("filter-render".to_string())
                .spawn(move || run_render_loop(controller, mode, make_backend, running))?
        };

        tracing::info!(?mode, "render thread started");
        Ok(Self {
            controller,
            running,
            thread: Some(thread),
        })
    }

    pub fn controller(&self) -> &Arc<FilterController> {
        &self.controller
    }

    pub fn request_render(&self) {
        self.controller.request_render();
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the render thread and wait for it. Waiting jobs and saves are
    /// failed with `CaptureError::Cancelled`.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        self.controller.request_render();
        if thread.join().is_err() {
            tracing::error!("render thread panicked");
            self.controller.abandon_pending(CaptureError::Cancelled);
        }
        tracing::info!("render thread stopped");
    }
}

impl Drop for FilterSurface {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_render_loop<B, F>(controller: Arc<FilterController>, mode: RenderMode, make_backend: F, running: Arc<AtomicBool>)
where
    B: GpuBackend,
    F: FnOnce() -> GpuResult<B>,
{
    let mut gpu = match make_backend() {
        Ok(gpu) => gpu,
        Err(err) => {
            tracing::error!(%err, "failed to create GPU backend");
            controller.abandon_pending(CaptureError::Effect(err));
            return;
        }
    };

    let waker = controller.waker().clone();
    let timeout = mode.idle_timeout();
    // Pick up anything requested before the thread started
    let mut requested = true;

    while running.load(Ordering::SeqCst) {
        if requested || timeout.is_some() {
            let outcome = controller.draw_frame(&mut gpu);
            tracing::trace!(?outcome, "frame");
        }
        requested = waker.wait(timeout);
    }

    controller.release(&mut gpu);
    controller.abandon_pending(CaptureError::Cancelled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviewConfig;
    use crate::error::GpuError;
    use crate::gpu::fake::{Call, FakeBackend};
    use crate::render::dispatch::ImmediateDispatcher;
    use crate::render::queue::RenderJob;
    use crate::state::PhotoFilter;
    use image::RgbaImage;
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    fn controller() -> Arc<FilterController> {
        Arc::new(FilterController::new(&PreviewConfig::default(), Arc::new(ImmediateDispatcher)))
    }

    fn submit(controller: &FilterController, id: &str, tx: mpsc::Sender<(String, Result<(u32, u32), CaptureError>)>) {
        controller
            .submit_render_job(RenderJob::new(id, PhotoFilter::Sepia, 0.5, move |id, result| {
                let _ = tx.send((id, result.map(|image| image.dimensions())));
            }))
            .unwrap();
    }

    #[test]
    fn test_wait_times_out_without_request() {
        let waker = RenderWaker::new();
        assert!(!waker.wait(Some(Duration::from_millis(5))));

        waker.request_render();
        assert!(waker.wait(Some(Duration::from_millis(5))));
        assert!(!waker.take_request());
    }

    #[test]
    fn test_wait_wakes_from_other_thread() {
        let waker = RenderWaker::new();
        let remote = waker.clone();
        let handle = std::thread::spawn(move || remote.wait(None));

        waker.request_render();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_render_thread_completes_jobs() {
        let controller = controller();
        controller.set_source_image(Arc::new(RgbaImage::new(64, 32)));
        let gpu = FakeBackend::new(8, 8);
        let calls = gpu.call_log();
        let mut surface = FilterSurface::spawn(Arc::clone(&controller), RenderMode::WhenDirty, move || Ok(gpu)).unwrap();

        let (tx, rx) = mpsc::channel();
        submit(&controller, "a", tx.clone());
        submit(&controller, "b", tx);

        let first = rx.recv_timeout(WAIT).unwrap();
        let second = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(first, ("a".to_string(), Ok((32, 16))));
        assert_eq!(second.0, "b");

        surface.shutdown();
        assert!(!surface.is_running());
        let calls = calls.lock();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::InitRenderer)).count(), 1);
        assert!(calls.iter().any(|c| matches!(c, Call::Render(_))));
    }

    #[test]
    fn test_backend_failure_fails_waiting_jobs() {
        let controller = controller();
        let (tx, rx) = mpsc::channel();
        submit(&controller, "orphan", tx);

        let _surface = FilterSurface::spawn(Arc::clone(&controller), RenderMode::WhenDirty, || {
            Err::<FakeBackend, _>(GpuError::device("no adapter"))
        })
        .unwrap();

        let (id, result) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(id, "orphan");
        assert!(matches!(result, Err(CaptureError::Effect(GpuError::Device(_)))));
    }

    #[test]
    fn test_shutdown_cancels_jobs_without_source() {
        let controller = controller();
        let mut surface = FilterSurface::spawn(
            Arc::clone(&controller),
            RenderMode::Continuous { interval_ms: 1 },
            || Ok(FakeBackend::new(4, 4)),
        )
        .unwrap();

        let (tx, rx) = mpsc::channel();
        submit(&controller, "stuck", tx);
        surface.shutdown();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("stuck".to_string(), Err(CaptureError::Cancelled)));
    }
}
