//! CPU-side geometry and paint state for the kanva Canvas2D-on-GPU shim.
//!
//! This crate owns everything that happens before a draw touches the GPU:
//! path recording and fast-path classification, the affine transform and
//! paint-state stack, dash-pattern encoding, color parsing, and the float
//! staging buffer used to batch vertex data.
//!
//! It deliberately has no GPU dependency so it can be tested in isolation;
//! `kanva_gpu` consumes the derived geometry views.

pub mod buffer;
pub mod color;
pub mod dash;
pub mod error;
pub mod path;
pub mod state;
pub mod stroke;
pub mod transform;

pub use buffer::GrowableFloatBuffer;
pub use color::parse_color;
pub use dash::{encode_dash_table, DashTable, DashTableCache};
pub use error::PaintError;
pub use path::{LineGeometry, Path, PathCommand, Point, RecordedOp};
pub use state::{FillRule, LineCap, LineJoin, PaintState, StateStack};
pub use stroke::joins_renderable;
pub use transform::Transform2D;
