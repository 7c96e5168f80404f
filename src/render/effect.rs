//! Persistent and one-shot effect lifetimes
//!
//! The persistent effect is what the visible surface keeps showing. Setters
//! only record the wanted recipe and raise `needs_effect_reload`; the GPU
//! instance is rebuilt on the render thread right before it is applied.
//! One-shot effects for render jobs never touch that state.

use crate::error::GpuResult;
use crate::gpu::backend::{EffectHandle, GpuBackend, TextureId};
use crate::state::EffectRecipe;

#[derive(Debug, Default)]
pub struct EffectApplicator {
    /// Recipe the persistent effect should be built from. `None` = no effect.
    pending: Option<EffectRecipe>,
    current: Option<EffectHandle>,
    needs_effect_reload: bool,
}

impl EffectApplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a new persistent effect, or its removal with `None`.
    pub fn schedule_effect(&mut self, recipe: Option<EffectRecipe>) {
        self.pending = recipe;
        self.needs_effect_reload = true;
    }

    /// Force the persistent effect to be rebuilt before its next use.
    pub fn mark_for_reload(&mut self) {
        self.needs_effect_reload = true;
    }

    pub fn needs_effect_reload(&self) -> bool {
        self.needs_effect_reload
    }

    pub fn pending(&self) -> Option<&EffectRecipe> {
        self.pending.as_ref()
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// Release the current instance and build the scheduled one.
    ///
    /// Clears the reload flag even when instantiation fails; the frame then
    /// shows the unfiltered source until the effect is scheduled again.
    pub fn materialize_pending_effect<B: GpuBackend + ?Sized>(&mut self, gpu: &mut B) -> GpuResult<()> {
        self.needs_effect_reload = false;

        if let Some(current) = self.current.take() {
            gpu.release_effect(current);
        }

        if let Some(recipe) = &self.pending {
            let handle = instantiate(gpu, recipe)?;
            tracing::debug!(effect = recipe.kind.name(), "materialized persistent effect");
            self.current = Some(handle);
        }
        Ok(())
    }

    /// Apply the persistent effect from `input` into `output`. Returns
    /// whether an effect ran.
    pub fn apply<B: GpuBackend + ?Sized>(
        &self,
        gpu: &mut B,
        input: TextureId,
        width: u32,
        height: u32,
        output: TextureId,
    ) -> GpuResult<bool> {
        match self.current {
            Some(effect) => {
                gpu.apply_effect(effect, input, width, height, output)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Create a throwaway instance of `recipe`, apply it, hand the backend to
    /// `read` while the output is fresh, then release the instance.
    ///
    /// The instance is released on every path, including failures.
    pub fn apply_one_shot<B, R>(
        gpu: &mut B,
        recipe: &EffectRecipe,
        input: TextureId,
        width: u32,
        height: u32,
        output: TextureId,
        read: impl FnOnce(&mut B) -> R,
    ) -> GpuResult<R>
    where
        B: GpuBackend + ?Sized,
    {
        let effect = instantiate(gpu, recipe)?;
        let result = match gpu.apply_effect(effect, input, width, height, output) {
            Ok(()) => Ok(read(gpu)),
            Err(err) => Err(err),
        };
        gpu.release_effect(effect);
        result
    }

    /// Drop the GPU instance, e.g. when the render thread shuts down.
    pub fn release<B: GpuBackend + ?Sized>(&mut self, gpu: &mut B) {
        if let Some(current) = self.current.take() {
            gpu.release_effect(current);
        }
        self.needs_effect_reload = self.pending.is_some();
    }
}

/// Create the named effect and set its parameters in the order supplied.
fn instantiate<B: GpuBackend + ?Sized>(gpu: &mut B, recipe: &EffectRecipe) -> GpuResult<EffectHandle> {
    let effect = gpu.create_effect(recipe.kind.name())?;
    for (key, value) in &recipe.params {
        if let Err(err) = gpu.set_effect_parameter(effect, key, *value) {
            gpu.release_effect(effect);
            return Err(err);
        }
    }
    Ok(effect)
}
