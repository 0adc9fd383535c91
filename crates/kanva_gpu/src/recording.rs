//! A journaling [`GpuDevice`] for tests.
//!
//! Every call is appended to a command log, and each draw additionally
//! snapshots the dynamic state it ran under, so tests can assert on
//! ordering, state, and instance payloads without a GPU.

use rustc_hash::FxHashMap;

use crate::device::{
    BlendConfig, DeviceError, GpuDevice, ProgramDesc, ProgramId, StencilMode, TextureFormat,
    TextureId, UniformKind, UniformValue,
};

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    CreateProgram {
        label: &'static str,
    },
    SetUniform {
        program: &'static str,
        name: String,
        value: UniformValue,
    },
    CreateTexture {
        texture: TextureId,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    UpdateTexture {
        texture: TextureId,
        data: Vec<u8>,
    },
    DeleteTexture {
        texture: TextureId,
    },
    SetBlend(BlendConfig),
    SetColorMask(bool),
    SetDepthTest(bool),
    SetStencil(StencilMode),
    ClearColor([f32; 4]),
    ClearDepth,
    ClearStencil,
    Viewport {
        width: u32,
        height: u32,
    },
    Draw(DrawRecord),
    ReadPixels {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// A draw call plus the dynamic state that was live when it was issued.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: &'static str,
    pub texture: Option<TextureId>,
    pub instances: u32,
    pub data: Vec<f32>,
    pub blend: BlendConfig,
    pub depth_test: bool,
    pub stencil: StencilMode,
    pub color_mask: bool,
    /// Uniform values of the drawn program at draw time.
    pub uniforms: FxHashMap<String, UniformValue>,
}

struct ProgramState {
    desc: ProgramDesc,
    uniforms: FxHashMap<String, UniformValue>,
}

pub struct RecordingDevice {
    pub commands: Vec<RecordedCommand>,
    programs: Vec<ProgramState>,
    live_textures: FxHashMap<TextureId, (TextureFormat, u32, u32)>,
    next_texture: u32,
    blend: Option<BlendConfig>,
    depth_test: bool,
    stencil: StencilMode,
    color_mask: bool,
    /// Bytes handed back by `read_pixels`, settable by tests.
    pub readback: Option<Vec<u8>>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            programs: Vec::new(),
            live_textures: FxHashMap::default(),
            next_texture: 0,
            blend: None,
            depth_test: false,
            stencil: StencilMode::Disabled,
            color_mask: true,
            readback: None,
        }
    }

    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::Draw(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn draws_for(&self, program: &str) -> Vec<&DrawRecord> {
        self.draws()
            .into_iter()
            .filter(|d| d.program == program)
            .collect()
    }

    pub fn uniform_sets(&self, name: &str) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetUniform { name: n, .. } if n == name))
            .count()
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    fn matches_kind(value: &UniformValue, kind: UniformKind) -> bool {
        matches!(
            (value, kind),
            (UniformValue::F32(_), UniformKind::F32)
                | (UniformValue::Vec2(_), UniformKind::Vec2)
                | (UniformValue::Vec4(_), UniformKind::Vec4)
                | (UniformValue::Mat3(_), UniformKind::Mat3)
        )
    }
}

impl GpuDevice for RecordingDevice {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(ProgramState {
            desc: *desc,
            uniforms: FxHashMap::default(),
        });
        self.commands
            .push(RecordedCommand::CreateProgram { label: desc.label });
        Ok(id)
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), DeviceError> {
        let state = &mut self.programs[program.0 as usize];
        let decl = state
            .desc
            .uniforms
            .iter()
            .find(|u| u.name == name)
            .ok_or_else(|| DeviceError::UnknownUniform {
                program: state.desc.label,
                name: name.to_owned(),
            })?;
        if !Self::matches_kind(&value, decl.kind) {
            return Err(DeviceError::UniformShape {
                name: name.to_owned(),
            });
        }
        state.uniforms.insert(name.to_owned(), value);
        self.commands.push(RecordedCommand::SetUniform {
            program: state.desc.label,
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<TextureId, DeviceError> {
        let expected = (width * height * format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(DeviceError::BadTextureData {
                got: data.len(),
                expected,
            });
        }
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.live_textures.insert(id, (format, width, height));
        self.commands.push(RecordedCommand::CreateTexture {
            texture: id,
            format,
            width,
            height,
            data: data.to_vec(),
        });
        Ok(id)
    }

    fn update_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), DeviceError> {
        let (format, width, height) = self
            .live_textures
            .get(&texture)
            .copied()
            .ok_or(DeviceError::UnknownTexture)?;
        let expected = (width * height * format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(DeviceError::BadTextureData {
                got: data.len(),
                expected,
            });
        }
        self.commands.push(RecordedCommand::UpdateTexture {
            texture,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.live_textures.remove(&texture);
        self.commands.push(RecordedCommand::DeleteTexture { texture });
    }

    fn set_blend(&mut self, blend: BlendConfig) {
        self.blend = Some(blend);
        self.commands.push(RecordedCommand::SetBlend(blend));
    }

    fn set_color_mask(&mut self, enabled: bool) {
        self.color_mask = enabled;
        self.commands.push(RecordedCommand::SetColorMask(enabled));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
        self.commands.push(RecordedCommand::SetDepthTest(enabled));
    }

    fn set_stencil(&mut self, mode: StencilMode) {
        self.stencil = mode;
        self.commands.push(RecordedCommand::SetStencil(mode));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.commands.push(RecordedCommand::ClearColor(color));
    }

    fn clear_depth(&mut self) {
        self.commands.push(RecordedCommand::ClearDepth);
    }

    fn clear_stencil(&mut self) {
        self.commands.push(RecordedCommand::ClearStencil);
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.commands
            .push(RecordedCommand::Viewport { width, height });
    }

    fn draw_instanced(
        &mut self,
        program: ProgramId,
        texture: Option<TextureId>,
        data: &[f32],
        instances: u32,
    ) -> Result<(), DeviceError> {
        let state = &self.programs[program.0 as usize];
        let stride = state.desc.floats_per_instance;
        if data.len() % stride as usize != 0 || data.len() != (stride * instances) as usize {
            return Err(DeviceError::BadInstanceStream {
                len: data.len(),
                stride,
            });
        }
        self.commands.push(RecordedCommand::Draw(DrawRecord {
            program: state.desc.label,
            texture,
            instances,
            data: data.to_vec(),
            blend: self.blend.unwrap_or_else(BlendConfig::premultiplied_over),
            depth_test: self.depth_test,
            stencil: self.stencil,
            color_mask: self.color_mask,
            uniforms: state.uniforms.clone(),
        }));
        Ok(())
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, DeviceError> {
        self.commands.push(RecordedCommand::ReadPixels {
            x,
            y,
            width,
            height,
        });
        Ok(self
            .readback
            .clone()
            .unwrap_or_else(|| vec![0; (width * height * 4) as usize]))
    }
}
