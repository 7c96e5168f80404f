//! Effect catalog and color transforms
//!
//! Every built-in effect is expressed as an affine color transform
//! (3x3 matrix + offset) plus a handful of spatial/tone extras the shader
//! understands (vignette, posterize, fill light, flips). Composing effects
//! means composing the affine parts.

use cgmath::{Matrix3, Vector3};

/// Rec. 709 luma weights
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Classic sepia tone matrix (row-major)
const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Effects the engine knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Identity,
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

impl EffectKind {
    pub const ALL: [EffectKind; 19] = [
        EffectKind::Identity,
        EffectKind::AutoFix,
        EffectKind::BlackWhite,
        EffectKind::Brightness,
        EffectKind::Contrast,
        EffectKind::CrossProcess,
        EffectKind::Documentary,
        EffectKind::FillLight,
        EffectKind::FlipHorizontal,
        EffectKind::FlipVertical,
        EffectKind::Grayscale,
        EffectKind::Lomish,
        EffectKind::Negative,
        EffectKind::Posterize,
        EffectKind::Saturate,
        EffectKind::Sepia,
        EffectKind::Temperature,
        EffectKind::Tint,
        EffectKind::Vignette,
    ];

    /// Name used by `create_effect`
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Identity => "identity",
            EffectKind::AutoFix => "auto_fix",
            EffectKind::BlackWhite => "black_white",
            EffectKind::Brightness => "brightness",
            EffectKind::Contrast => "contrast",
            EffectKind::CrossProcess => "cross_process",
            EffectKind::Documentary => "documentary",
            EffectKind::FillLight => "fill_light",
            EffectKind::FlipHorizontal => "flip_horizontal",
            EffectKind::FlipVertical => "flip_vertical",
            EffectKind::Grayscale => "grayscale",
            EffectKind::Lomish => "lomish",
            EffectKind::Negative => "negative",
            EffectKind::Posterize => "posterize",
            EffectKind::Saturate => "saturate",
            EffectKind::Sepia => "sepia",
            EffectKind::Temperature => "temperature",
            EffectKind::Tint => "tint",
            EffectKind::Vignette => "vignette",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Parameters this effect accepts, with their defaults.
    pub fn parameters(self) -> &'static [(&'static str, f32)] {
        match self {
            EffectKind::AutoFix => &[("scale", 0.5)],
            EffectKind::BlackWhite => &[("black", 0.0), ("white", 1.0)],
            EffectKind::Brightness => &[("brightness", 1.0)],
            EffectKind::Contrast => &[("contrast", 1.0)],
            EffectKind::FillLight => &[("strength", 0.5)],
            EffectKind::Posterize => &[("levels", 8.0)],
            EffectKind::Saturate => &[("scale", 0.0)],
            EffectKind::Temperature => &[("scale", 0.5)],
            EffectKind::Tint => &[("tint", 0.0)],
            EffectKind::Vignette => &[("scale", 0.5)],
            _ => &[],
        }
    }

    pub fn accepts(self, key: &str) -> bool {
        self.parameters().iter().any(|(name, _)| *name == key)
    }

    /// Build the transform for this effect. Later entries in `params` win
    /// over earlier ones; missing keys fall back to defaults.
    pub fn transform(self, params: &[(String, f32)]) -> ColorTransform {
        let param = |key: &str| -> f32 {
            params
                .iter()
                .rev()
                .find(|(name, _)| name == key)
                .map(|(_, value)| *value)
                .or_else(|| {
                    self.parameters()
                        .iter()
                        .find(|(name, _)| *name == key)
                        .map(|(_, value)| *value)
                })
                .unwrap_or(0.0)
        };

        match self {
            EffectKind::Identity => ColorTransform::identity(),
            EffectKind::AutoFix => {
                let amount = 1.0 + 0.3 * param("scale").clamp(0.0, 1.0);
                ColorTransform::saturation(amount).then(&ColorTransform::contrast(amount))
            }
            EffectKind::BlackWhite => {
                let black = param("black");
                let white = param("white");
                ColorTransform::grayscale().then(&ColorTransform::levels(black, white))
            }
            EffectKind::Brightness => ColorTransform::scale(param("brightness")),
            EffectKind::Contrast => ColorTransform::contrast(param("contrast")),
            EffectKind::CrossProcess => ColorTransform {
                matrix: diagonal(1.1, 1.05, 0.85),
                offset: Vector3::new(0.0, 0.0, 0.08),
                ..ColorTransform::identity()
            },
            EffectKind::Documentary => ColorTransform {
                vignette: 0.5,
                ..ColorTransform::grayscale().then(&ColorTransform::contrast(1.2))
            },
            EffectKind::FillLight => ColorTransform {
                fill_light: param("strength").clamp(0.0, 1.0),
                ..ColorTransform::identity()
            },
            EffectKind::FlipHorizontal => ColorTransform {
                flip_x: true,
                ..ColorTransform::identity()
            },
            EffectKind::FlipVertical => ColorTransform {
                flip_y: true,
                ..ColorTransform::identity()
            },
            EffectKind::Grayscale => ColorTransform::grayscale(),
            EffectKind::Lomish => ColorTransform {
                vignette: 0.8,
                ..ColorTransform::saturation(1.3).then(&ColorTransform::contrast(1.2))
            },
            EffectKind::Negative => ColorTransform {
                matrix: diagonal(-1.0, -1.0, -1.0),
                offset: Vector3::new(1.0, 1.0, 1.0),
                ..ColorTransform::identity()
            },
            EffectKind::Posterize => ColorTransform {
                posterize_levels: param("levels").max(2.0),
                ..ColorTransform::identity()
            },
            EffectKind::Saturate => ColorTransform::saturation(1.0 + param("scale").clamp(-1.0, 1.0)),
            EffectKind::Sepia => ColorTransform {
                matrix: rows(SEPIA[0], SEPIA[1], SEPIA[2]),
                ..ColorTransform::identity()
            },
            EffectKind::Temperature => {
                // 0.5 is neutral, 0.0 cold, 1.0 warm
                let warmth = (param("scale").clamp(0.0, 1.0) - 0.5) * 2.0;
                ColorTransform {
                    matrix: diagonal(1.0 + 0.2 * warmth, 1.0, 1.0 - 0.2 * warmth),
                    ..ColorTransform::identity()
                }
            }
            EffectKind::Tint => {
                // Positive pushes magenta, negative pushes green
                let tint = param("tint").clamp(-1.0, 1.0);
                ColorTransform {
                    matrix: diagonal(1.0 + 0.1 * tint, 1.0 - 0.2 * tint, 1.0 + 0.1 * tint),
                    ..ColorTransform::identity()
                }
            }
            EffectKind::Vignette => ColorTransform {
                vignette: param("scale").clamp(0.0, 1.0),
                ..ColorTransform::identity()
            },
        }
    }
}

/// Affine color transform plus the extras the effect shader applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    pub matrix: Matrix3<f32>,
    pub offset: Vector3<f32>,
    /// 0 disables the vignette
    pub vignette: f32,
    /// 0 disables posterization
    pub posterize_levels: f32,
    /// 0 disables the shadow lift
    pub fill_light: f32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl ColorTransform {
    pub fn identity() -> Self {
        Self {
            matrix: diagonal(1.0, 1.0, 1.0),
            offset: Vector3::new(0.0, 0.0, 0.0),
            vignette: 0.0,
            posterize_levels: 0.0,
            fill_light: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }

    pub fn scale(factor: f32) -> Self {
        Self {
            matrix: diagonal(factor, factor, factor),
            ..Self::identity()
        }
    }

    /// Contrast around mid grey
    pub fn contrast(factor: f32) -> Self {
        let shift = 0.5 * (1.0 - factor);
        Self {
            matrix: diagonal(factor, factor, factor),
            offset: Vector3::new(shift, shift, shift),
            ..Self::identity()
        }
    }

    pub fn grayscale() -> Self {
        Self {
            matrix: rows(LUMA, LUMA, LUMA),
            ..Self::identity()
        }
    }

    /// Mix between luma (0.0) and the original color (1.0); above 1.0
    /// oversaturates.
    pub fn saturation(amount: f32) -> Self {
        let gray = rows(LUMA, LUMA, LUMA);
        Self {
            matrix: gray * (1.0 - amount) + diagonal(amount, amount, amount),
            ..Self::identity()
        }
    }

    /// Remap `black..white` to `0..1`
    pub fn levels(black: f32, white: f32) -> Self {
        let range = (white - black).max(0.0001);
        let gain = 1.0 / range;
        Self {
            matrix: diagonal(gain, gain, gain),
            offset: Vector3::new(-black * gain, -black * gain, -black * gain),
            ..Self::identity()
        }
    }

    /// `self` followed by `next`. Extras from `next` override when set.
    pub fn then(&self, next: &ColorTransform) -> ColorTransform {
        ColorTransform {
            matrix: next.matrix * self.matrix,
            offset: next.matrix * self.offset + next.offset,
            vignette: if next.vignette > 0.0 { next.vignette } else { self.vignette },
            posterize_levels: if next.posterize_levels > 0.0 {
                next.posterize_levels
            } else {
                self.posterize_levels
            },
            fill_light: if next.fill_light > 0.0 { next.fill_light } else { self.fill_light },
            flip_x: self.flip_x ^ next.flip_x,
            flip_y: self.flip_y ^ next.flip_y,
        }
    }

    /// Apply the affine part on the CPU (reference for the shader).
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let out = self.matrix * Vector3::new(rgb[0], rgb[1], rgb[2]) + self.offset;
        [out.x, out.y, out.z]
    }

    /// Matrix rows with the offset in `w`, the layout the shader expects.
    pub fn rows_with_offset(&self) -> [[f32; 4]; 3] {
        let m = &self.matrix;
        // cgmath is column-major: m[col][row]
        [
            [m.x.x, m.y.x, m.z.x, self.offset.x],
            [m.x.y, m.y.y, m.z.y, self.offset.y],
            [m.x.z, m.y.z, m.z.z, self.offset.z],
        ]
    }
}

fn diagonal(r: f32, g: f32, b: f32) -> Matrix3<f32> {
    Matrix3::new(r, 0.0, 0.0, 0.0, g, 0.0, 0.0, 0.0, b)
}

/// Build a matrix from rows (cgmath constructors take columns)
fn rows(r0: [f32; 3], r1: [f32; 3], r2: [f32; 3]) -> Matrix3<f32> {
    Matrix3::from_cols(
        Vector3::new(r0[0], r1[0], r2[0]),
        Vector3::new(r0[1], r1[1], r2[1]),
        Vector3::new(r0[2], r1[2], r2[2]),
    )
}
