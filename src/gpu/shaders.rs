/// WGSL shader code for the filter pipeline
///
/// Two passes share one bind group layout (texture, sampler, uniforms):
/// - `EFFECT_SHADER` runs an effect from one texture into another. Output
///   rows are in image order (top-down).
/// - `PRESENT_SHADER` draws a texture onto the visible surface. The surface
///   is stored bottom-up, so the vertex stage maps the top of clip space to
///   the bottom of the image.

/// Effect pass
///
/// Applies, in order:
/// 1. Optional flips (texture coordinate mirroring)
/// 2. The affine color transform (3x3 matrix with offset in `w`)
/// 3. Fill light (shadow lift)
/// 4. Posterization
/// 5. Vignette
pub const EFFECT_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
}

// Full-screen triangle, no vertex buffers
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32(i32(vertex_index & 1u) * 4 - 1);
    let y = f32(i32(vertex_index >> 1u) * 4 - 1);

    output.clip_position = vec4<f32>(x, -y, 0.0, 1.0);
    output.tex_coords = vec2<f32>((x + 1.0) * 0.5, (y + 1.0) * 0.5);
    return output;
}

// Must match GpuEffectParams (80 bytes)
struct EffectParams {
    row0: vec4<f32>,
    row1: vec4<f32>,
    row2: vec4<f32>,
    vignette: f32,
    posterize_levels: f32,
    fill_light: f32,
    padding0: f32,
    flip: vec2<f32>,
    padding1: vec2<f32>,
}

@group(0) @binding(0)
var input_texture: texture_2d<f32>;

@group(0) @binding(1)
var input_sampler: sampler;

@group(0) @binding(2)
var<uniform> params: EffectParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    // flip components are 0.0 or 1.0
    let uv = mix(input.tex_coords, vec2<f32>(1.0) - input.tex_coords, params.flip);
    let texel = textureSample(input_texture, input_sampler, uv);

    let rgb = vec4<f32>(texel.rgb, 1.0);
    var color = vec3<f32>(dot(params.row0, rgb), dot(params.row1, rgb), dot(params.row2, rgb));

    if params.fill_light > 0.0 {
        let luma = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
        let lift = params.fill_light * (1.0 - luma) * (1.0 - luma) * 0.5;
        color = color + vec3<f32>(lift);
    }

    if params.posterize_levels >= 2.0 {
        let steps = params.posterize_levels - 1.0;
        color = floor(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)) * steps + 0.5) / steps;
    }

    if params.vignette > 0.0 {
        let d = distance(input.tex_coords, vec2<f32>(0.5)) * 1.4142;
        color = color * (1.0 - params.vignette * smoothstep(0.3, 1.0, d));
    }

    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), texel.a);
}
"#;

/// Present pass: sample a texture across the whole surface, bottom row first.
pub const PRESENT_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32(i32(vertex_index & 1u) * 4 - 1);
    let y = f32(i32(vertex_index >> 1u) * 4 - 1);

    // Not negated: the first stored row is the bottom of the image
    output.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    output.tex_coords = vec2<f32>((x + 1.0) * 0.5, (y + 1.0) * 0.5);
    return output;
}

@group(0) @binding(0)
var input_texture: texture_2d<f32>;

@group(0) @binding(1)
var input_sampler: sampler;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(input_texture, input_sampler, input.tex_coords);
}
"#;
