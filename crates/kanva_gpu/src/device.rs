//! The device abstraction the raster pipeline draws through.
//!
//! [`GpuDevice`] is a thin, stateful command surface: programs with named
//! uniforms, dynamic blend/depth/stencil state, and per-draw instance
//! streams. [`crate::wgpu_device::WgpuDevice`] realizes it on wgpu;
//! [`crate::recording::RecordingDevice`] journals it for tests.

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Scalar shapes a uniform can hold. Mat3 is column-major.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    Vec2,
    Vec4,
    Mat3,
}

/// A named uniform slot. Slots are packed into one uniform buffer in
/// declaration order with std140-style alignment.
#[derive(Clone, Copy, Debug)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

/// A linkable program: WGSL source plus its uniform and instance layout.
#[derive(Clone, Copy, Debug)]
pub struct ProgramDesc {
    pub label: &'static str,
    pub shader: &'static str,
    pub uniforms: &'static [UniformDecl],
    pub floats_per_instance: u32,
    /// Number of sampled textures the fragment stage binds (0 or 1).
    pub texture_slots: u32,
    /// Whether the texture is read through a filtering sampler rather
    /// than `textureLoad`.
    pub texture_filtering: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    ReverseSubtract,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Full separate-channel blend equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendConfig {
    pub color_op: BlendOp,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_op: BlendOp,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
}

impl BlendConfig {
    /// Same op and factors on both channels.
    pub const fn uniform(op: BlendOp, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            color_op: op,
            color_src: src,
            color_dst: dst,
            alpha_op: op,
            alpha_src: src,
            alpha_dst: dst,
        }
    }

    /// Same op on both channels, distinct factors per channel.
    pub const fn separate(
        op: BlendOp,
        color_src: BlendFactor,
        color_dst: BlendFactor,
        alpha_src: BlendFactor,
        alpha_dst: BlendFactor,
    ) -> Self {
        Self {
            color_op: op,
            color_src,
            color_dst,
            alpha_op: op,
            alpha_src,
            alpha_dst,
        }
    }

    /// Premultiplied source-over, the reset state.
    pub const fn premultiplied_over() -> Self {
        Self::uniform(BlendOp::Add, BlendFactor::One, BlendFactor::OneMinusSrcAlpha)
    }
}

/// Stencil modes the clip sequence cycles through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilMode {
    Disabled,
    /// Always pass, write the reference value 1.
    WriteReplace,
    /// Always pass, bitwise invert the existing value.
    WriteInvert,
    /// Pass only where the stored value equals 1, no writes.
    TestEqualOne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    Rgba8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no compatible gpu adapter available")]
    AdapterUnavailable,

    #[error("device request failed: {0}")]
    DeviceRequest(String),

    #[error("program {program:?} has no uniform named {name:?}")]
    UnknownUniform { program: &'static str, name: String },

    #[error("uniform {name:?} set with mismatched shape")]
    UniformShape { name: String },

    #[error("instance stream length {len} is not a multiple of {stride} floats")]
    BadInstanceStream { len: usize, stride: u32 },

    #[error("batch of {instances} instances exceeds the configured limit of {max}")]
    BatchOverflow { instances: u32, max: u32 },

    #[error("texture data is {got} bytes, expected {expected}")]
    BadTextureData { got: usize, expected: usize },

    #[error("unknown texture handle")]
    UnknownTexture,

    #[error("readback failed: {0}")]
    Readback(String),
}

/// Stateful draw surface with GL-flavored dynamic state.
///
/// Blend, depth, stencil, and color-mask settings persist across draws
/// until changed. Instance data is streamed per draw; the device owns no
/// long-lived vertex buffers.
pub trait GpuDevice {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError>;

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), DeviceError>;

    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<TextureId, DeviceError>;

    fn update_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), DeviceError>;

    fn delete_texture(&mut self, texture: TextureId);

    fn set_blend(&mut self, blend: BlendConfig);

    /// Toggles all four color channels at once; the clip sequence draws
    /// with them off.
    fn set_color_mask(&mut self, enabled: bool);

    fn set_depth_test(&mut self, enabled: bool);

    fn set_stencil(&mut self, mode: StencilMode);

    fn clear_color(&mut self, color: [f32; 4]);

    fn clear_depth(&mut self);

    fn clear_stencil(&mut self);

    fn viewport(&mut self, width: u32, height: u32);

    /// Streams `data` as instance records and draws a 4-vertex triangle
    /// strip per instance under the current dynamic state.
    fn draw_instanced(
        &mut self,
        program: ProgramId,
        texture: Option<TextureId>,
        data: &[f32],
        instances: u32,
    ) -> Result<(), DeviceError>;

    /// Reads back an RGBA8 rectangle of the render target, rows top-down.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32)
        -> Result<Vec<u8>, DeviceError>;
}
