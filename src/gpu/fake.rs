//! Recording backend for tests
//!
//! Keeps textures as plain word buffers, logs every call, and fills effect
//! output with a marker so tests can tell which effect produced a frame.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;

use super::backend::{EffectHandle, GpuBackend, ReadTarget, TextureFilter, TextureId};
use crate::error::{GpuError, GpuResult};
use crate::pixel::pack_rgba_bytes;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InitRenderer,
    CreateTexture(TextureId),
    Upload { texture: TextureId, width: u32, height: u32 },
    CreateEffect { name: String, handle: EffectHandle },
    SetParameter { handle: EffectHandle, key: String, value: f32 },
    Apply { handle: EffectHandle, width: u32, height: u32 },
    Release(EffectHandle),
    Render(TextureId),
    Read { target: ReadTarget, width: u32, height: u32 },
}

struct FakeTexture {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

pub struct FakeBackend {
    surface_width: u32,
    surface_height: u32,
    surface: Vec<u32>,
    textures: HashMap<TextureId, FakeTexture>,
    effects: HashMap<EffectHandle, String>,
    failing_effects: HashSet<String>,
    fail_reads: bool,
    out_of_memory: bool,
    /// Remaining successful `create_texture` calls; `None` = unlimited
    texture_budget: Option<usize>,
    next_id: u32,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeBackend {
    pub fn new(surface_width: u32, surface_height: u32) -> Self {
        Self {
            surface_width,
            surface_height,
            surface: vec![0; (surface_width * surface_height) as usize],
            textures: HashMap::new(),
            effects: HashMap::new(),
            failing_effects: HashSet::new(),
            fail_reads: false,
            out_of_memory: false,
            texture_budget: None,
            next_id: 1,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the call log, readable from other threads.
    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every effect output allocation run out of memory.
    pub fn exhaust_memory(&mut self, exhausted: bool) {
        self.out_of_memory = exhausted;
    }

    pub fn set_texture_budget(&mut self, budget: Option<usize>) {
        self.texture_budget = budget;
    }

    pub fn fail_effect(&mut self, name: &str) {
        self.failing_effects.insert(name.to_string());
    }

    pub fn live_effects(&self) -> usize {
        self.effects.len()
    }

    pub fn fill_texture(&mut self, texture: TextureId, width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| pack_rgba_bytes(f(x, y)))
            .collect();
        self.textures.insert(texture, FakeTexture { width, height, pixels });
    }

    /// Fill the surface in stored (bottom-up) row order.
    pub fn fill_surface(&mut self, f: impl Fn(u32, u32) -> [u8; 4]) {
        for y in 0..self.surface_height {
            for x in 0..self.surface_width {
                self.surface[(y * self.surface_width + x) as usize] = pack_rgba_bytes(f(x, y));
            }
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Marker color an effect writes: red channel = name length.
    pub fn effect_marker(name: &str) -> [u8; 4] {
        [name.len() as u8, 0x10, 0x20, 0xFF]
    }
}

impl GpuBackend for FakeBackend {
    fn init_renderer(&mut self) -> GpuResult<()> {
        self.record(Call::InitRenderer);
        Ok(())
    }

    fn create_texture(&mut self) -> GpuResult<TextureId> {
        match self.texture_budget {
            Some(0) => return Err(GpuError::OutOfMemory { bytes: 4 }),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        let id = TextureId(self.next());
        self.textures.insert(id, FakeTexture { width: 0, height: 0, pixels: Vec::new() });
        self.record(Call::CreateTexture(id));
        Ok(id)
    }

    fn upload_texture(&mut self, texture: TextureId, image: &RgbaImage, _filter: TextureFilter) -> GpuResult<()> {
        let slot = self.textures.get_mut(&texture).ok_or(GpuError::UnknownTexture(texture.0))?;
        slot.width = image.width();
        slot.height = image.height();
        slot.pixels = image.pixels().map(|p| pack_rgba_bytes(p.0)).collect();
        self.record(Call::Upload {
            texture,
            width: image.width(),
            height: image.height(),
        });
        Ok(())
    }

    fn create_effect(&mut self, name: &str) -> GpuResult<EffectHandle> {
        if self.failing_effects.contains(name) {
            return Err(GpuError::UnsupportedEffect(name.to_string()));
        }
        let handle = EffectHandle(self.next());
        self.effects.insert(handle, name.to_string());
        self.record(Call::CreateEffect {
            name: name.to_string(),
            handle,
        });
        Ok(handle)
    }

    fn set_effect_parameter(&mut self, effect: EffectHandle, key: &str, value: f32) -> GpuResult<()> {
        if !self.effects.contains_key(&effect) {
            return Err(GpuError::UnknownEffect(effect.0));
        }
        self.record(Call::SetParameter {
            handle: effect,
            key: key.to_string(),
            value,
        });
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
        let name = self.effects.get(&effect).ok_or(GpuError::UnknownEffect(effect.0))?.clone();
        if !self.textures.contains_key(&input) {
            return Err(GpuError::UnknownTexture(input.0));
        }
        if self.out_of_memory {
            return Err(GpuError::OutOfMemory {
                bytes: u64::from(width) * u64::from(height) * 4,
            });
        }
        let marker = pack_rgba_bytes(Self::effect_marker(&name));
        let out = self.textures.get_mut(&output).ok_or(GpuError::UnknownTexture(output.0))?;
        out.width = width;
        out.height = height;
        out.pixels = vec![marker; (width * height) as usize];
        self.record(Call::Apply {
            handle: effect,
            width,
            height,
        });
        Ok(())
    }

    fn release_effect(&mut self, effect: EffectHandle) {
        self.effects.remove(&effect);
        self.record(Call::Release(effect));
    }

    fn render_texture(&mut self, texture: TextureId) -> GpuResult<()> {
        let source = self.textures.get(&texture).ok_or(GpuError::UnknownTexture(texture.0))?;
        // Nearest sample, stored bottom-up like a GL default framebuffer
        if source.width > 0 && source.height > 0 {
            for sy in 0..self.surface_height {
                let image_y = self.surface_height - 1 - sy;
                let ty = image_y * source.height / self.surface_height;
                for sx in 0..self.surface_width {
                    let tx = sx * source.width / self.surface_width;
                    self.surface[(sy * self.surface_width + sx) as usize] =
                        source.pixels[(ty * source.width + tx) as usize];
                }
            }
        }
        self.record(Call::Render(texture));
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_width, self.surface_height)
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
        self.record(Call::Read { target, width, height });
        if self.fail_reads {
            return Err(GpuError::read("simulated driver failure"));
        }

        let (src_width, src_height, pixels) = match target {
            ReadTarget::Surface => (self.surface_width, self.surface_height, &self.surface),
            ReadTarget::Texture(id) => {
                let tex = self
                    .textures
                    .get(&id)
                    .ok_or_else(|| GpuError::read(format!("no framebuffer for texture {}", id.0)))?;
                (tex.width, tex.height, &tex.pixels)
            }
        };
        if x + width > src_width || y + height > src_height {
            return Err(GpuError::read("region outside framebuffer"));
        }
        for row in 0..height {
            let src = ((y + row) * src_width + x) as usize;
            let dst = (row * width) as usize;
            out[dst..dst + width as usize].copy_from_slice(&pixels[src..src + width as usize]);
        }
        Ok(())
    }
}
