//! Software fallback seam.
//!
//! Paths the fast pipeline cannot draw (curves, non-rect fills,
//! unrenderable join configurations) are handed to a [`FallbackRenderer`]
//! as their recorded op log plus the drawing state. A renderer that can
//! rasterize returns an RGBA bitmap which the context composites back
//! through the normal image path; text goes through the same seam.

use kanva_paint::{FillRule, PaintState, RecordedOp};

/// A premultiplied RGBA bitmap plus its placement in device pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackBitmap {
    pub width: u32,
    pub height: u32,
    pub x: f32,
    pub y: f32,
    pub pixels: Vec<u8>,
}

/// Horizontal metrics for a text run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
}

pub trait FallbackRenderer {
    /// Rasterize a filled path from its op log, or `None` if unhandled.
    fn fill_path(
        &mut self,
        ops: &[RecordedOp],
        state: &PaintState,
        rule: FillRule,
    ) -> Option<FallbackBitmap>;

    /// Rasterize a stroked path from its op log, or `None` if unhandled.
    fn stroke_path(&mut self, ops: &[RecordedOp], state: &PaintState) -> Option<FallbackBitmap>;

    /// Rasterize a text run with the state's font attributes, positioned
    /// so the bitmap lands at the given anchor.
    fn raster_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        state: &PaintState,
        stroke: bool,
    ) -> Option<FallbackBitmap>;

    fn measure_text(&mut self, text: &str, state: &PaintState) -> TextMetrics;
}

/// Fallback of last resort: draws nothing and reports every miss.
#[derive(Debug, Default)]
pub struct NullFallback;

impl FallbackRenderer for NullFallback {
    fn fill_path(
        &mut self,
        ops: &[RecordedOp],
        _state: &PaintState,
        _rule: FillRule,
    ) -> Option<FallbackBitmap> {
        tracing::error!(op_count = ops.len(), "fill fallback unimplemented, path dropped");
        None
    }

    fn stroke_path(&mut self, ops: &[RecordedOp], _state: &PaintState) -> Option<FallbackBitmap> {
        tracing::error!(
            op_count = ops.len(),
            "stroke fallback unimplemented, path dropped"
        );
        None
    }

    fn raster_text(
        &mut self,
        text: &str,
        _x: f32,
        _y: f32,
        _state: &PaintState,
        _stroke: bool,
    ) -> Option<FallbackBitmap> {
        tracing::error!(text, "text fallback unimplemented, run dropped");
        None
    }

    fn measure_text(&mut self, text: &str, _state: &PaintState) -> TextMetrics {
        tracing::error!(text, "text fallback unimplemented, measuring as zero width");
        TextMetrics::default()
    }
}
