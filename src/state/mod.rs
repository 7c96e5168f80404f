//! Editing state types shared between the UI side and the render thread
//!
//! - Effect descriptions and built-in filters (effect.rs)

pub mod effect;

pub use effect::{CustomEffect, EffectRecipe, EffectSpec, PhotoFilter, PreparedEffect};
