//! GPU-backed Canvas2D-style rendering.
//!
//! The crate is split along the seam between drawing semantics and the
//! GPU: [`Canvas2d`] owns the Canvas2D programming model and compiles
//! paths into instanced quad geometry, the [`RasterPipeline`] turns that
//! geometry into draws with the right blend, depth, and stencil state,
//! and the [`GpuDevice`] trait hides which backend executes them.
//! [`WgpuDevice`] is the production backend; [`RecordingDevice`] journals
//! every call for tests.
//!
//! ```no_run
//! use kanva_gpu::{Canvas2d, WgpuDevice};
//!
//! let device = WgpuDevice::new(640, 480)?;
//! let mut canvas = Canvas2d::new(device, 640, 480)?;
//! canvas.set_fill_style("#36c");
//! canvas.fill_rect(10.0, 10.0, 100.0, 50.0)?;
//! # Ok::<(), kanva_gpu::CanvasError>(())
//! ```

pub mod blend;
pub mod context;
pub mod device;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod recording;
pub mod shaders;
pub mod texture_cache;
pub mod wgpu_device;

pub use blend::{composite_mode, CompositeMode};
pub use context::Canvas2d;
pub use device::{
    BlendConfig, BlendFactor, BlendOp, DeviceError, GpuDevice, ProgramDesc, ProgramId,
    StencilMode, TextureFormat, TextureId, UniformDecl, UniformKind, UniformValue,
};
pub use error::CanvasError;
pub use fallback::{FallbackBitmap, FallbackRenderer, NullFallback, TextMetrics};
pub use pipeline::{PipelineConfig, RasterPipeline};
pub use recording::{DrawRecord, RecordedCommand, RecordingDevice};
pub use texture_cache::{BitmapImage, ImageSource, TextureCache};
pub use wgpu_device::WgpuDevice;

pub use kanva_paint::{FillRule, LineCap, LineJoin, Transform2D};
