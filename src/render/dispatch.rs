//! Handing results back to the caller's side
//!
//! Job and save callbacks are never run on the render thread. The
//! controller posts them to a `Dispatcher`, which plays the role of a UI
//! thread's message loop.

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    fn post(&self, task: Task);
}

/// Runs tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    handle: tokio::runtime::Handle,
}

impl TokioDispatcher {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Dispatcher for the runtime we are currently running on, if any.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Dispatcher for TokioDispatcher {
    fn post(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }
}

/// Runs tasks right away on whichever thread posts them.
///
/// The controller only posts after releasing its frame lock, so callbacks may
/// call back into the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn post(&self, task: Task) {
        task();
    }
}
