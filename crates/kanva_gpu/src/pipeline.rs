//! Draw orchestration over a [`GpuDevice`].
//!
//! The pipeline owns the three programs, elides redundant uniform and
//! blend updates, caches dash tables as textures, and wraps every
//! multi-instance draw in the depth guard that keeps self-overlapping
//! geometry from blending twice within one call.

use rustc_hash::FxHashMap;

use kanva_paint::{DashTableCache, GrowableFloatBuffer, LineCap, Transform2D};

use crate::blend::composite_mode;
use crate::device::{
    BlendConfig, BlendFactor, BlendOp, DeviceError, GpuDevice, ProgramId, StencilMode,
    TextureFormat, TextureId, UniformValue,
};
use crate::shaders::{IMAGE_PROGRAM, LINE_PROGRAM, RECT_PROGRAM};

/// Renderer limits.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Hard cap on instances per draw; batches beyond it abort the call.
    pub max_instances_per_draw: u32,
    /// Initial capacity of the instance staging buffer, in floats.
    pub staging_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_instances_per_draw: 65536,
            staging_capacity: 4096,
        }
    }
}

pub struct RasterPipeline<D: GpuDevice> {
    device: D,
    rect: ProgramId,
    line: ProgramId,
    image: ProgramId,
    width: u32,
    height: u32,
    uniform_cache: FxHashMap<(u32, &'static str), UniformValue>,
    blend: Option<BlendConfig>,
    /// Set by the `copy` composite operation: clear the target before
    /// every draw.
    clear_before_draw: bool,
    dash_encoder: DashTableCache,
    dash_textures: FxHashMap<String, (TextureId, f32)>,
    solid_dash: TextureId,
    config: PipelineConfig,
    /// Staging area for the per-draw instance stream.
    staging: GrowableFloatBuffer,
}

impl<D: GpuDevice> RasterPipeline<D> {
    pub fn new(device: D, width: u32, height: u32) -> Result<Self, DeviceError> {
        Self::with_config(device, width, height, PipelineConfig::default())
    }

    pub fn with_config(
        mut device: D,
        width: u32,
        height: u32,
        config: PipelineConfig,
    ) -> Result<Self, DeviceError> {
        let rect = device.create_program(&RECT_PROGRAM)?;
        let line = device.create_program(&LINE_PROGRAM)?;
        let image = device.create_program(&IMAGE_PROGRAM)?;
        // One solid cell; strokes without a dash pattern sample this.
        let solid_dash = device.create_texture(TextureFormat::R8, 1, 1, &[0])?;
        device.viewport(width, height);
        device.set_blend(BlendConfig::premultiplied_over());
        Ok(Self {
            device,
            rect,
            line,
            image,
            width,
            height,
            uniform_cache: FxHashMap::default(),
            blend: Some(BlendConfig::premultiplied_over()),
            clear_before_draw: false,
            dash_encoder: DashTableCache::new(),
            dash_textures: FxHashMap::default(),
            solid_dash,
            config,
            staging: GrowableFloatBuffer::with_capacity(config.staging_capacity),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.device.viewport(width, height);
        // Cached canvas_size values are stale for every program now.
        self.uniform_cache.clear();
    }

    /// Installs the blend state for a composite operation. Returns false
    /// for unknown or inexpressible names, leaving the previous state in
    /// place.
    pub fn apply_composite(&mut self, op: &str) -> bool {
        match composite_mode(op) {
            Some(mode) => {
                self.apply_blend(mode.blend);
                self.clear_before_draw = mode.clear_first;
                true
            }
            None => {
                tracing::warn!(op, "unsupported composite operation, blend state unchanged");
                false
            }
        }
    }

    fn apply_blend(&mut self, blend: BlendConfig) {
        if self.blend != Some(blend) {
            self.device.set_blend(blend);
            self.blend = Some(blend);
        }
    }

    /// Sets a uniform unless the program already holds that value.
    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &'static str,
        value: UniformValue,
    ) -> Result<(), DeviceError> {
        let key = (program.0, name);
        if self.uniform_cache.get(&key) == Some(&value) {
            return Ok(());
        }
        self.device.set_uniform(program, name, value)?;
        self.uniform_cache.insert(key, value);
        Ok(())
    }

    fn canvas_size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// Depth-guarded instanced draw. Fragments all land at one depth, so
    /// after a depth clear each pixel passes the less-than test exactly
    /// once no matter how many instances cover it.
    fn draw_guarded(
        &mut self,
        program: ProgramId,
        texture: Option<TextureId>,
        data: &[f32],
        instances: u32,
    ) -> Result<(), DeviceError> {
        if instances > self.config.max_instances_per_draw {
            return Err(DeviceError::BatchOverflow {
                instances,
                max: self.config.max_instances_per_draw,
            });
        }
        if self.clear_before_draw {
            self.device.clear_color([0.0, 0.0, 0.0, 0.0]);
        }
        self.staging.reset();
        self.staging.push_slice(data);
        self.device.clear_depth();
        self.device.set_depth_test(true);
        let result =
            self.device
                .draw_instanced(program, texture, self.staging.data(), instances);
        self.device.set_depth_test(false);
        result
    }

    /// Fills pre-transformed quads with one premultiplied color.
    pub fn fill_quads(&mut self, corners: &[f32], color: [f32; 4]) -> Result<(), DeviceError> {
        if corners.is_empty() {
            return Ok(());
        }
        let size = UniformValue::Vec2(self.canvas_size());
        self.set_uniform(self.rect, "canvas_size", size)?;
        self.set_uniform(self.rect, "color", UniformValue::Vec4(color))?;
        let instances = (corners.len() / 8) as u32;
        self.draw_guarded(self.rect, None, corners, instances)
    }

    /// Strokes device-space segments as per-segment quads.
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_segments(
        &mut self,
        segments: &[f32],
        color: [f32; 4],
        width: f32,
        cap: LineCap,
        dash: &[f32],
        dash_offset: f32,
        transform: &Transform2D,
    ) -> Result<(), DeviceError> {
        if segments.is_empty() {
            return Ok(());
        }
        let (dash_texture, period) = self.dash_texture(dash)?;
        let size = UniformValue::Vec2(self.canvas_size());
        self.set_uniform(self.line, "transform", UniformValue::Mat3(transform.to_mat3()))?;
        self.set_uniform(self.line, "canvas_size", size)?;
        self.set_uniform(self.line, "color", UniformValue::Vec4(color))?;
        self.set_uniform(
            self.line,
            "line_info",
            UniformValue::Vec4([width, cap.encode(), period, dash_offset]),
        )?;
        let instances = (segments.len() / 4) as u32;
        self.draw_guarded(self.line, Some(dash_texture), segments, instances)
    }

    /// Blits a texture sub-rectangle onto one device-space quad.
    pub fn draw_texture(
        &mut self,
        texture: TextureId,
        corners: &[f32; 8],
        src_rect: [f32; 4],
        alpha: f32,
    ) -> Result<(), DeviceError> {
        let size = UniformValue::Vec2(self.canvas_size());
        self.set_uniform(self.image, "canvas_size", size)?;
        self.set_uniform(self.image, "src_rect", UniformValue::Vec4(src_rect))?;
        self.set_uniform(
            self.image,
            "tint",
            UniformValue::Vec4([alpha, alpha, alpha, alpha]),
        )?;
        if self.clear_before_draw {
            self.device.clear_color([0.0, 0.0, 0.0, 0.0]);
        }
        self.device
            .draw_instanced(self.image, Some(texture), corners, 1)
    }

    /// Writes a texture onto one quad with blending and stencil bypassed,
    /// replacing the covered pixels outright. The caller reinstates the
    /// clip test afterwards if one is active.
    pub fn put_texture(
        &mut self,
        texture: TextureId,
        corners: &[f32; 8],
        src_rect: [f32; 4],
    ) -> Result<(), DeviceError> {
        self.device.set_stencil(StencilMode::Disabled);
        self.device
            .set_blend(BlendConfig::uniform(BlendOp::Add, BlendFactor::One, BlendFactor::Zero));
        let size = UniformValue::Vec2(self.canvas_size());
        self.set_uniform(self.image, "canvas_size", size)?;
        self.set_uniform(self.image, "src_rect", UniformValue::Vec4(src_rect))?;
        self.set_uniform(self.image, "tint", UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]))?;
        let result = self.device.draw_instanced(self.image, Some(texture), corners, 1);
        if let Some(blend) = self.blend {
            self.device.set_blend(blend);
        }
        result
    }

    /// Reinstates the stencil test after a bypassing write.
    pub fn restore_clip_test(&mut self) {
        self.device.set_stencil(StencilMode::TestEqualOne);
    }

    /// Stencils a quad region and routes subsequent draws through it.
    /// A new clip replaces any previous one.
    pub fn clip_quads(&mut self, corners: &[f32]) -> Result<(), DeviceError> {
        self.device.set_stencil(StencilMode::Disabled);
        self.device.clear_stencil();
        if corners.is_empty() {
            // Empty region: leave the test on so nothing passes.
            self.device.set_stencil(StencilMode::TestEqualOne);
            return Ok(());
        }
        self.device.set_color_mask(false);
        self.device.set_stencil(StencilMode::WriteReplace);
        let size = UniformValue::Vec2(self.canvas_size());
        self.set_uniform(self.rect, "canvas_size", size)?;
        let instances = (corners.len() / 8) as u32;
        let result = self.device.draw_instanced(self.rect, None, corners, instances);
        self.device.set_color_mask(true);
        self.device.set_stencil(StencilMode::TestEqualOne);
        result
    }

    /// Drops the active clip.
    pub fn unclip(&mut self) {
        self.device.set_stencil(StencilMode::Disabled);
    }

    /// Whole-target clear to transparent black, bypassing blend state.
    pub fn clear(&mut self) {
        self.device.clear_color([0.0, 0.0, 0.0, 0.0]);
    }

    fn dash_texture(&mut self, pattern: &[f32]) -> Result<(TextureId, f32), DeviceError> {
        if pattern.is_empty() {
            return Ok((self.solid_dash, 0.0));
        }
        let key = DashTableCache::key_for(pattern);
        if let Some(entry) = self.dash_textures.get(&key) {
            return Ok(*entry);
        }
        let table = self.dash_encoder.get_or_encode(pattern).clone();
        let texture = self.device.create_texture(
            TextureFormat::R8,
            table.cells.len() as u32,
            1,
            &table.cells,
        )?;
        self.dash_textures.insert(key, (texture, table.period));
        Ok((texture, table.period))
    }

    pub fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, DeviceError> {
        self.device.read_pixels(x, y, width, height)
    }
}
