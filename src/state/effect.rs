//! What the caller asks to be rendered
//!
//! `EffectSpec` is a plain value: it can cross threads freely and is only
//! turned into GPU objects on the render thread.

use std::sync::Arc;

use crate::color::EffectKind;
use crate::error::{FilterError, FilterResult};

/// Built-in filters with preset parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoFilter {
    None,
    AutoFix,
    BlackWhite,
    Brightness,
    Contrast,
    CrossProcess,
    Documentary,
    FillLight,
    FlipHorizontal,
    FlipVertical,
    Grayscale,
    Lomish,
    Negative,
    Posterize,
    Saturate,
    Sepia,
    Temperature,
    Tint,
    Vignette,
}

impl PhotoFilter {
    pub const ALL: [PhotoFilter; 19] = [
        PhotoFilter::None,
        PhotoFilter::AutoFix,
        PhotoFilter::BlackWhite,
        PhotoFilter::Brightness,
        PhotoFilter::Contrast,
        PhotoFilter::CrossProcess,
        PhotoFilter::Documentary,
        PhotoFilter::FillLight,
        PhotoFilter::FlipHorizontal,
        PhotoFilter::FlipVertical,
        PhotoFilter::Grayscale,
        PhotoFilter::Lomish,
        PhotoFilter::Negative,
        PhotoFilter::Posterize,
        PhotoFilter::Saturate,
        PhotoFilter::Sepia,
        PhotoFilter::Temperature,
        PhotoFilter::Tint,
        PhotoFilter::Vignette,
    ];

    /// Human readable name for UI labels
    pub fn label(self) -> &'static str {
        match self {
            PhotoFilter::None => "Original",
            PhotoFilter::AutoFix => "Auto Fix",
            PhotoFilter::BlackWhite => "Black & White",
            PhotoFilter::Brightness => "Brightness",
            PhotoFilter::Contrast => "Contrast",
            PhotoFilter::CrossProcess => "Cross Process",
            PhotoFilter::Documentary => "Documentary",
            PhotoFilter::FillLight => "Fill Light",
            PhotoFilter::FlipHorizontal => "Flip Horizontal",
            PhotoFilter::FlipVertical => "Flip Vertical",
            PhotoFilter::Grayscale => "Grayscale",
            PhotoFilter::Lomish => "Lomish",
            PhotoFilter::Negative => "Negative",
            PhotoFilter::Posterize => "Posterize",
            PhotoFilter::Saturate => "Saturate",
            PhotoFilter::Sepia => "Sepia",
            PhotoFilter::Temperature => "Temperature",
            PhotoFilter::Tint => "Tint",
            PhotoFilter::Vignette => "Vignette",
        }
    }

    /// The engine effect and preset parameters behind this filter.
    /// `None` has no effect at all.
    pub fn recipe(self) -> Option<EffectRecipe> {
        let (kind, params): (EffectKind, &[(&str, f32)]) = match self {
            PhotoFilter::None => return None,
            PhotoFilter::AutoFix => (EffectKind::AutoFix, &[("scale", 0.5)]),
            PhotoFilter::BlackWhite => (EffectKind::BlackWhite, &[("black", 0.1), ("white", 0.7)]),
            PhotoFilter::Brightness => (EffectKind::Brightness, &[("brightness", 2.0)]),
            PhotoFilter::Contrast => (EffectKind::Contrast, &[("contrast", 1.4)]),
            PhotoFilter::CrossProcess => (EffectKind::CrossProcess, &[]),
            PhotoFilter::Documentary => (EffectKind::Documentary, &[]),
            PhotoFilter::FillLight => (EffectKind::FillLight, &[("strength", 0.8)]),
            PhotoFilter::FlipHorizontal => (EffectKind::FlipHorizontal, &[]),
            PhotoFilter::FlipVertical => (EffectKind::FlipVertical, &[]),
            PhotoFilter::Grayscale => (EffectKind::Grayscale, &[]),
            PhotoFilter::Lomish => (EffectKind::Lomish, &[]),
            PhotoFilter::Negative => (EffectKind::Negative, &[]),
            PhotoFilter::Posterize => (EffectKind::Posterize, &[]),
            PhotoFilter::Saturate => (EffectKind::Saturate, &[("scale", 0.5)]),
            PhotoFilter::Sepia => (EffectKind::Sepia, &[]),
            PhotoFilter::Temperature => (EffectKind::Temperature, &[("scale", 0.9)]),
            PhotoFilter::Tint => (EffectKind::Tint, &[("tint", 0.6)]),
            PhotoFilter::Vignette => (EffectKind::Vignette, &[("scale", 0.5)]),
        };
        Some(EffectRecipe {
            kind,
            params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
    }
}

/// A named effect with caller-supplied parameters, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEffect {
    name: String,
    params: Vec<(String, f32)>,
}

impl CustomEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: f32) -> Self {
        self.params.push((key.into(), value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[(String, f32)] {
        &self.params
    }

    /// Resolve the name and check every parameter key.
    pub fn prepare(&self) -> FilterResult<EffectRecipe> {
        let kind = EffectKind::from_name(&self.name)
            .ok_or_else(|| FilterError::UnsupportedEffect(self.name.clone()))?;
        for (key, _) in &self.params {
            if !kind.accepts(key) {
                return Err(FilterError::UnknownParameter {
                    effect: self.name.clone(),
                    key: key.clone(),
                });
            }
        }
        Ok(EffectRecipe {
            kind,
            params: self.params.clone(),
        })
    }
}

/// A validated effect: which engine effect to create and the parameters to
/// set on it, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRecipe {
    pub kind: EffectKind,
    pub params: Vec<(String, f32)>,
}

/// An effect validated ahead of time and cheap to clone into many jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedEffect(Arc<EffectRecipe>);

impl PreparedEffect {
    pub fn recipe(&self) -> &EffectRecipe {
        &self.0
    }
}

impl From<EffectRecipe> for PreparedEffect {
    fn from(recipe: EffectRecipe) -> Self {
        Self(Arc::new(recipe))
    }
}

/// Any effect the pipeline can render.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EffectSpec {
    #[default]
    None,
    Named(PhotoFilter),
    Custom(CustomEffect),
    Prebuilt(PreparedEffect),
}

impl EffectSpec {
    /// Validate the effect and resolve it to the recipe the render thread
    /// instantiates. `Ok(None)` means "no effect".
    pub fn resolve(&self) -> FilterResult<Option<EffectRecipe>> {
        match self {
            EffectSpec::None => Ok(None),
            EffectSpec::Named(filter) => Ok(filter.recipe()),
            EffectSpec::Custom(custom) => custom.prepare().map(Some),
            EffectSpec::Prebuilt(prepared) => Ok(Some(prepared.recipe().clone())),
        }
    }

    /// Validate once and keep the result for reuse.
    pub fn prepare(&self) -> FilterResult<Option<PreparedEffect>> {
        Ok(self.resolve()?.map(PreparedEffect::from))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, EffectSpec::None | EffectSpec::Named(PhotoFilter::None))
    }
}

impl From<PhotoFilter> for EffectSpec {
    fn from(filter: PhotoFilter) -> Self {
        EffectSpec::Named(filter)
    }
}

impl From<CustomEffect> for EffectSpec {
    fn from(custom: CustomEffect) -> Self {
        EffectSpec::Custom(custom)
    }
}
