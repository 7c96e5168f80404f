/// wgpu implementation of `GpuBackend`
///
/// This module manages all the wgpu boilerplate:
/// - Device and queue initialization
/// - Texture slots and uploads
/// - Effect and present pipelines sharing one bind group layout
/// - The visible surface (an Rgba8Unorm render target)
/// - Pixel readback through a mapped buffer

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;
use wgpu::util::DeviceExt;

use std::collections::HashMap;

use image::RgbaImage;

use super::backend::{EffectHandle, GpuBackend, ReadTarget, TextureFilter, TextureId};
use crate::color::{ColorTransform, EffectKind};
use crate::config::PreviewConfig;
use crate::error::{GpuError, GpuResult};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Effect uniforms in a GPU-friendly format
/// Must match the WGSL struct layout with proper alignment
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuEffectParams {
    row0: [f32; 4],
    row1: [f32; 4],
    row2: [f32; 4],
    vignette: f32,
    posterize_levels: f32,
    fill_light: f32,
    _padding0: f32,
    flip: [f32; 2],
    _padding1: [f32; 2],
}

impl From<&ColorTransform> for GpuEffectParams {
    fn from(transform: &ColorTransform) -> Self {
        let [row0, row1, row2] = transform.rows_with_offset();
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        Self {
            row0,
            row1,
            row2,
            vignette: transform.vignette,
            posterize_levels: transform.posterize_levels,
            fill_light: transform.fill_light,
            _padding0: 0.0,
            flip: [flag(transform.flip_x), flag(transform.flip_y)],
            _padding1: [0.0; 2],
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    filter: TextureFilter,
}

/// Effects are cheap to describe, so an instance is just its settings;
/// the uniforms are computed when it is applied.
struct EffectInstance {
    kind: EffectKind,
    params: Vec<(String, f32)>,
}

/// Objects created by `init_renderer`
struct Pipelines {
    effect: wgpu::RenderPipeline,
    present: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
}

impl Pipelines {
    fn sampler(&self, filter: TextureFilter) -> &wgpu::Sampler {
        match filter {
            TextureFilter::Linear => &self.linear_sampler,
            TextureFilter::Nearest => &self.nearest_sampler,
        }
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Option<Pipelines>,
    surface: GpuTexture,
    textures: HashMap<TextureId, GpuTexture>,
    effects: HashMap<EffectHandle, EffectInstance>,
    next_id: u32,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("surface", &(self.surface.width, self.surface.height))
            .field("textures", &self.textures.len())
            .field("effects", &self.effects.len())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Request an adapter and device and allocate the visible surface.
    ///
    /// Pipelines are built later, by `init_renderer`.
    pub async fn new(config: &PreviewConfig) -> GpuResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GpuError::device("no suitable GPU adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Filter Preview Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::device(format!("failed to create device: {e}")))?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU device ready");

        let width = config.surface_width.max(1);
        let height = config.surface_height.max(1);
        let surface = allocate(&device, "Visible Surface", width, height, TextureFilter::Linear);

        Ok(Self {
            device,
            queue,
            pipelines: None,
            surface,
            textures: HashMap::new(),
            effects: HashMap::new(),
            next_id: 1,
        })
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn pipelines(&self) -> GpuResult<&Pipelines> {
        self.pipelines
            .as_ref()
            .ok_or_else(|| GpuError::device("renderer not initialized"))
    }

    fn texture(&self, id: TextureId) -> GpuResult<&GpuTexture> {
        self.textures.get(&id).ok_or(GpuError::UnknownTexture(id.0))
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    fn scoped<R>(&self, bytes: u64, f: impl FnOnce() -> R) -> GpuResult<R> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if out_of_memory.is_some() {
            return Err(GpuError::OutOfMemory { bytes });
        }
        if let Some(err) = validation {
            return Err(GpuError::device(err.to_string()));
        }
        Ok(result)
    }

    fn bind_group(&self, pipelines: &Pipelines, input: &GpuTexture) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Filter Bind Group"),
            layout: &pipelines.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(pipelines.sampler(input.filter)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: pipelines.uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Draw a full-screen triangle with `pipeline` from `input` into `target`.
    fn draw(
        &self,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        target: &GpuTexture,
        label: &str,
    ) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

impl GpuBackend for WgpuBackend {
    fn init_renderer(&mut self) -> GpuResult<()> {
        if self.pipelines.is_some() {
            return Ok(());
        }

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Filter Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Filter Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, source: &str| {
            let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None, // Present pass winds the other way
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
        };

        let (effect, present) = self.scoped(0, || {
            (
                build("Effect Pipeline", super::shaders::EFFECT_SHADER),
                build("Present Pipeline", super::shaders::PRESENT_SHADER),
            )
        })?;

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Effect Params Uniform Buffer"),
            contents: bytemuck::cast_slice(&[GpuEffectParams::from(&ColorTransform::identity())]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = |label: &str, filter: wgpu::FilterMode| {
            self.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("Linear Sampler", wgpu::FilterMode::Linear);
        let nearest_sampler = sampler("Nearest Sampler", wgpu::FilterMode::Nearest);

        self.pipelines = Some(Pipelines {
            effect,
            present,
            bind_group_layout,
            uniform_buffer,
            linear_sampler,
            nearest_sampler,
        });
        tracing::debug!("renderer initialized");
        Ok(())
    }

    fn create_texture(&mut self) -> GpuResult<TextureId> {
        let id = TextureId(self.next());
        let texture = allocate(&self.device, "Texture Slot", 1, 1, TextureFilter::Linear);
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn upload_texture(&mut self, texture: TextureId, image: &RgbaImage, filter: TextureFilter) -> GpuResult<()> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(GpuError::device("cannot upload an empty image"));
        }
        self.texture(texture)?;

        let bytes = u64::from(width) * u64::from(height) * 4;
        let slot = self.scoped(bytes, || {
            let slot = allocate(&self.device, "Source Texture", width, height, filter);
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &slot.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                extent(width, height),
            );
            slot
        })?;
        self.textures.insert(texture, slot);
        Ok(())
    }

    fn create_effect(&mut self, name: &str) -> GpuResult<EffectHandle> {
        let kind = EffectKind::from_name(name).ok_or_else(|| GpuError::UnsupportedEffect(name.to_string()))?;
        let handle = EffectHandle(self.next());
        self.effects.insert(
            handle,
            EffectInstance {
                kind,
                params: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn set_effect_parameter(&mut self, effect: EffectHandle, key: &str, value: f32) -> GpuResult<()> {
        let instance = self.effects.get_mut(&effect).ok_or(GpuError::UnknownEffect(effect.0))?;
        instance.params.push((key.to_string(), value));
        Ok(())
    }

    fn apply_effect(
        &mut self,
        effect: EffectHandle,
        input: TextureId,
        width: u32,
        height: u32,
        output: TextureId,
    ) -> GpuResult<()> {
        if input == output {
            return Err(GpuError::device("effect input and output must differ"));
        }
        let instance = self.effects.get(&effect).ok_or(GpuError::UnknownEffect(effect.0))?;
        let params = GpuEffectParams::from(&instance.kind.transform(&instance.params));
        let filter = self.texture(input)?.filter;

        // Reallocate the target to the viewport size
        let current = self.texture(output)?;
        if (current.width, current.height) != (width, height) {
            let bytes = u64::from(width) * u64::from(height) * 4;
            let resized = self.scoped(bytes, || allocate(&self.device, "Effect Output", width, height, filter))?;
            self.textures.insert(output, resized);
        }

        let pipelines = self.pipelines()?;
        let source = self.texture(input)?;
        let target = self.texture(output)?;
        self.scoped(0, || {
            self.queue
                .write_buffer(&pipelines.uniform_buffer, 0, bytemuck::cast_slice(&[params]));
            let bind_group = self.bind_group(pipelines, source);
            self.draw(&pipelines.effect, &bind_group, target, "Effect Pass");
        })
    }

    fn release_effect(&mut self, effect: EffectHandle) {
        self.effects.remove(&effect);
    }

    fn render_texture(&mut self, texture: TextureId) -> GpuResult<()> {
        let pipelines = self.pipelines()?;
        let source = self.texture(texture)?;
        self.scoped(0, || {
            let bind_group = self.bind_group(pipelines, source);
            self.draw(&pipelines.present, &bind_group, &self.surface, "Present Pass");
        })
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }

    fn read_pixels(
        &mut self,
        target: ReadTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        out: &mut [u32],
    ) -> GpuResult<()> {
        let source = match target {
            ReadTarget::Surface => &self.surface,
            ReadTarget::Texture(id) => self
                .textures
                .get(&id)
                .ok_or_else(|| GpuError::read(format!("no framebuffer for texture {}", id.0)))?,
        };
        if width == 0 || height == 0 {
            return Ok(());
        }
        if x + width > source.width || y + height > source.height {
            return Err(GpuError::read("region outside framebuffer"));
        }
        if out.len() < (width as usize) * (height as usize) {
            return Err(GpuError::read("output buffer too small"));
        }

        // Rows in a copy buffer must be 256-byte aligned
        let bytes_per_row = width * 4;
        let padded_bytes_per_row = (bytes_per_row + 255) & !255;
        let buffer_size = u64::from(padded_bytes_per_row) * u64::from(height);

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::read("readback callback dropped"))?
            .map_err(|e| GpuError::read(format!("buffer map failed: {e}")))?;

        {
            let data = buffer_slice.get_mapped_range();
            for (row, dst) in out.chunks_exact_mut(width as usize).take(height as usize).enumerate() {
                let start = row * padded_bytes_per_row as usize;
                let src = &data[start..start + bytes_per_row as usize];
                for (word, px) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    *word = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                }
            }
        }
        output_buffer.unmap();
        Ok(())
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Every slot can be sampled, rendered into, uploaded to and read back.
fn allocate(device: &wgpu::Device, label: &str, width: u32, height: u32, filter: TextureFilter) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        width,
        height,
        filter,
    }
}
