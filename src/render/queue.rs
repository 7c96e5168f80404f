//! Pending one-off render jobs
//!
//! FIFO: insertion order is render order. A job leaves the queue exactly
//! once, either taken for rendering or cancelled while still waiting.
//! The queue lives inside the controller's frame lock, so it needs no
//! locking of its own.

use std::collections::VecDeque;

use crate::capture::ArgbImage;
use crate::color::EffectKind;
use crate::error::{CaptureError, FilterError, FilterResult};
use crate::state::{EffectRecipe, EffectSpec};

pub type JobResult = Result<ArgbImage, CaptureError>;

/// Called once with the job id and its result.
pub type JobCallback = Box<dyn FnOnce(String, JobResult) + Send + 'static>;

/// A request to render the source image through `effect` at `scale` and
/// hand the captured image to `on_complete`.
pub struct RenderJob {
    id: String,
    effect: EffectSpec,
    scale: f32,
    on_complete: JobCallback,
}

impl RenderJob {
    pub fn new(
        id: impl Into<String>,
        effect: impl Into<EffectSpec>,
        scale: f32,
        on_complete: impl FnOnce(String, JobResult) + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            effect: effect.into(),
            scale,
            on_complete: Box::new(on_complete),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn effect(&self) -> &EffectSpec {
        &self.effect
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Check the job's contract and resolve its effect. A job without an
    /// effect renders the source through the identity effect.
    fn prepare(self) -> FilterResult<QueuedJob> {
        if self.id.is_empty() {
            return Err(FilterError::EmptyJobId);
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(FilterError::InvalidScale(self.scale));
        }
        let recipe = self.effect.resolve()?.unwrap_or(EffectRecipe {
            kind: EffectKind::Identity,
            params: Vec::new(),
        });
        Ok(QueuedJob {
            id: self.id,
            recipe,
            scale: self.scale,
            on_complete: self.on_complete,
        })
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("id", &self.id)
            .field("effect", &self.effect)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// A validated job waiting in the queue.
pub struct QueuedJob {
    pub id: String,
    pub recipe: EffectRecipe,
    pub scale: f32,
    pub on_complete: JobCallback,
}

impl QueuedJob {
    /// Viewport for an image of `width` x `height`, never smaller than 1x1
    pub fn viewport(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled = |v: u32| ((v as f32 * self.scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }
}

#[derive(Default)]
pub struct RenderJobQueue {
    jobs: VecDeque<QueuedJob>,
}

impl RenderJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append `job` at the tail.
    pub fn submit(&mut self, job: RenderJob) -> FilterResult<()> {
        let job = job.prepare()?;
        self.jobs.push_back(job);
        Ok(())
    }

    /// Remove and return the oldest job.
    pub fn take_next(&mut self) -> Option<QueuedJob> {
        self.jobs.pop_front()
    }

    /// Remove every waiting job with this id. Returns how many were removed.
    pub fn cancel(&mut self, id: &str) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| job.id != id);
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.id.as_str())
    }
}

impl std::fmt::Debug for RenderJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
