//! Integration tests for the drawing context over the journaling device
//!
//! These tests verify that:
//! - Rect-only paths fill through the instanced quad program
//! - Paths the quad pipeline cannot draw reach the fallback seam
//! - Stroke feasibility routes between quads and fallback correctly
//! - State save/restore reaches the blend and stencil hardware state

use std::cell::RefCell;
use std::rc::Rc;

use kanva_gpu::{
    BlendFactor, BlendOp, Canvas2d, FallbackBitmap, FallbackRenderer, FillRule, LineCap,
    LineJoin, RecordedCommand, RecordingDevice, StencilMode, TextMetrics, UniformValue,
};
use kanva_paint::{PaintState, RecordedOp};

#[derive(Default)]
struct FallbackLog {
    fills: usize,
    strokes: usize,
    texts: usize,
}

/// Counts fallback hits and never produces a bitmap.
struct CountingFallback(Rc<RefCell<FallbackLog>>);

impl FallbackRenderer for CountingFallback {
    fn fill_path(
        &mut self,
        _ops: &[RecordedOp],
        _state: &PaintState,
        _rule: FillRule,
    ) -> Option<FallbackBitmap> {
        self.0.borrow_mut().fills += 1;
        None
    }

    fn stroke_path(&mut self, _ops: &[RecordedOp], _state: &PaintState) -> Option<FallbackBitmap> {
        self.0.borrow_mut().strokes += 1;
        None
    }

    fn raster_text(
        &mut self,
        _text: &str,
        _x: f32,
        _y: f32,
        _state: &PaintState,
        _stroke: bool,
    ) -> Option<FallbackBitmap> {
        self.0.borrow_mut().texts += 1;
        None
    }

    fn measure_text(&mut self, text: &str, _state: &PaintState) -> TextMetrics {
        TextMetrics {
            width: text.len() as f32 * 8.0,
        }
    }
}

fn canvas() -> Canvas2d<RecordingDevice> {
    Canvas2d::new(RecordingDevice::new(), 200, 100).unwrap()
}

fn canvas_with_log() -> (Canvas2d<RecordingDevice>, Rc<RefCell<FallbackLog>>) {
    let log = Rc::new(RefCell::new(FallbackLog::default()));
    let fallback = Box::new(CountingFallback(Rc::clone(&log)));
    let canvas =
        Canvas2d::with_fallback(RecordingDevice::new(), 200, 100, fallback).unwrap();
    (canvas, log)
}

#[test]
fn test_rect_path_fill_draws_instanced_quads() {
    let mut c = canvas();
    c.set_fill_style("#ff0000");
    c.begin_path();
    c.rect(10.0, 10.0, 30.0, 20.0);
    c.rect(50.0, 10.0, 30.0, 20.0);
    c.fill(FillRule::NonZero).unwrap();

    let draws = c.device().draws_for("rect");
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instances, 2);
    assert_eq!(
        &draws[0].data[..8],
        &[10.0, 10.0, 40.0, 10.0, 10.0, 30.0, 40.0, 30.0]
    );
    assert_eq!(
        draws[0].uniforms.get("color"),
        Some(&UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
    );
}

#[test]
fn test_fill_respects_transform_at_record_time() {
    let mut c = canvas();
    c.translate(100.0, 0.0);
    c.begin_path();
    c.rect(0.0, 0.0, 10.0, 10.0);
    // Moving the transform afterwards must not move recorded geometry.
    c.translate(-100.0, 0.0);
    c.fill(FillRule::NonZero).unwrap();

    let draws = c.device().draws_for("rect");
    assert_eq!(draws[0].data[0], 100.0);
}

#[test]
fn test_global_alpha_scales_fill_color() {
    let mut c = canvas();
    c.set_fill_style("#ffffff");
    c.set_global_alpha(0.5);
    c.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap();

    let draws = c.device().draws_for("rect");
    assert_eq!(
        draws[0].uniforms.get("color"),
        Some(&UniformValue::Vec4([0.5, 0.5, 0.5, 0.5]))
    );
}

#[test]
fn test_curved_path_goes_to_fallback() {
    let (mut c, log) = canvas_with_log();
    c.begin_path();
    c.arc(50.0, 50.0, 20.0, 0.0, 3.0, false);
    c.fill(FillRule::NonZero).unwrap();

    assert_eq!(log.borrow().fills, 1);
    assert!(c.device().draws().is_empty());
}

#[test]
fn test_even_odd_fill_goes_to_fallback() {
    let (mut c, log) = canvas_with_log();
    c.begin_path();
    c.rect(0.0, 0.0, 50.0, 50.0);
    c.fill(FillRule::EvenOdd).unwrap();

    assert_eq!(log.borrow().fills, 1);
}

#[test]
fn test_polyline_fill_goes_to_fallback() {
    let (mut c, log) = canvas_with_log();
    c.begin_path();
    c.move_to(0.0, 0.0);
    c.line_to(50.0, 0.0);
    c.line_to(25.0, 40.0);
    c.close_path();
    c.fill(FillRule::NonZero).unwrap();

    assert_eq!(log.borrow().fills, 1);
}

#[test]
fn test_jointless_stroke_draws_line_quads() {
    let mut c = canvas();
    c.set_stroke_style("#00ff00");
    c.set_line_width(4.0);
    c.begin_path();
    c.move_to(0.0, 0.0);
    c.line_to(100.0, 0.0);
    c.stroke().unwrap();

    let draws = c.device().draws_for("line");
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].data, vec![0.0, 0.0, 100.0, 0.0]);
    let Some(UniformValue::Vec4(info)) = draws[0].uniforms.get("line_info") else {
        panic!("line_info not set");
    };
    assert_eq!(info[0], 4.0);
}

#[test]
fn test_butt_joined_stroke_goes_to_fallback() {
    let (mut c, log) = canvas_with_log();
    c.begin_path();
    c.move_to(0.0, 0.0);
    c.line_to(50.0, 0.0);
    c.line_to(50.0, 50.0);
    c.stroke().unwrap();

    assert_eq!(log.borrow().strokes, 1);
    assert!(c.device().draws_for("line").is_empty());
}

#[test]
fn test_round_round_joined_stroke_stays_on_gpu() {
    let (mut c, log) = canvas_with_log();
    c.set_line_cap(LineCap::Round);
    c.set_line_join(LineJoin::Round);
    c.begin_path();
    c.move_to(0.0, 0.0);
    c.line_to(50.0, 0.0);
    c.line_to(80.0, 40.0);
    c.stroke().unwrap();

    assert_eq!(log.borrow().strokes, 0);
    assert_eq!(c.device().draws_for("line")[0].instances, 2);
}

#[test]
fn test_square_miter_right_angles_stays_on_gpu() {
    let (mut c, log) = canvas_with_log();
    c.set_line_cap(LineCap::Square);
    c.begin_path();
    c.rect(10.0, 10.0, 40.0, 40.0);
    c.stroke().unwrap();

    assert_eq!(log.borrow().strokes, 0);
    // Four edges, closing edge included.
    assert_eq!(c.device().draws_for("line")[0].instances, 4);
}

#[test]
fn test_square_miter_skewed_rect_goes_to_fallback() {
    let (mut c, log) = canvas_with_log();
    c.set_line_cap(LineCap::Square);
    c.transform(1.0, 0.0, 0.5, 1.0, 0.0, 0.0);
    c.begin_path();
    c.rect(10.0, 10.0, 40.0, 40.0);
    c.stroke().unwrap();

    assert_eq!(log.borrow().strokes, 1);
}

#[test]
fn test_stroke_rect_does_not_disturb_current_path() {
    let mut c = canvas();
    c.begin_path();
    c.rect(0.0, 0.0, 10.0, 10.0);
    c.set_line_cap(LineCap::Round);
    c.set_line_join(LineJoin::Round);
    c.stroke_rect(50.0, 50.0, 20.0, 20.0).unwrap();
    c.fill(FillRule::NonZero).unwrap();

    let fills = c.device().draws_for("rect");
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].data[0], 0.0);
}

#[test]
fn test_save_restore_round_trips_transform_and_styles() {
    let mut c = canvas();
    c.set_fill_style("#abcdef");
    c.translate(7.0, 3.0);
    let before = c.get_transform();
    c.save();
    c.rotate(1.2);
    c.scale(2.0, 0.5);
    c.set_fill_style("#000000");
    c.restore().unwrap();

    assert_eq!(c.get_transform(), before);
    assert_eq!(c.fill_style(), "#abcdef");
}

#[test]
fn test_fill_rect_emits_device_pixel_block() {
    let mut c = Canvas2d::new(RecordingDevice::new(), 100, 100).unwrap();
    c.set_fill_style("#fff");
    c.fill_rect(10.0, 10.0, 20.0, 20.0).unwrap();

    let draws = c.device().draws_for("rect");
    assert_eq!(draws.len(), 1);
    assert_eq!(
        draws[0].data,
        vec![10.0, 10.0, 30.0, 10.0, 10.0, 30.0, 30.0, 30.0]
    );
    assert_eq!(
        draws[0].uniforms.get("color"),
        Some(&UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]))
    );
    assert_eq!(draws[0].blend.color_src, BlendFactor::One);
    assert_eq!(draws[0].blend.color_dst, BlendFactor::OneMinusSrcAlpha);
    assert!(draws[0].depth_test);
}

#[test]
fn test_unknown_composite_operation_keeps_attribute() {
    let mut c = canvas();
    c.set_global_composite_operation("lighter");
    c.set_global_composite_operation("multiply");
    assert_eq!(c.global_composite_operation(), "lighter");
}

#[test]
fn test_composite_restored_with_state() {
    let mut c = canvas();
    c.save();
    c.set_global_composite_operation("lighter");
    c.restore().unwrap();
    assert_eq!(c.global_composite_operation(), "source-over");

    c.fill_rect(0.0, 0.0, 5.0, 5.0).unwrap();
    let draws = c.device().draws_for("rect");
    assert_eq!(draws[0].blend.color_dst, BlendFactor::OneMinusSrcAlpha);
}

#[test]
fn test_clear_rect_subtracts_then_restores_blend() {
    let mut c = canvas();
    c.set_global_composite_operation("lighter");
    c.clear_rect(10.0, 10.0, 20.0, 20.0).unwrap();

    let draws = c.device().draws_for("rect");
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].blend.color_op, BlendOp::ReverseSubtract);
    assert_eq!(
        draws[0].uniforms.get("color"),
        Some(&UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]))
    );

    // The composite operation in force before the clear comes back.
    c.fill_rect(50.0, 50.0, 5.0, 5.0).unwrap();
    let draws = c.device().draws_for("rect");
    assert_eq!(draws[1].blend.color_dst, BlendFactor::One);
}

#[test]
fn test_clip_then_restore_drops_stencil() {
    let mut c = canvas();
    c.save();
    c.begin_path();
    c.rect(0.0, 0.0, 50.0, 50.0);
    c.clip().unwrap();
    c.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap();

    let fills = c.device().draws_for("rect");
    let clipped = fills.last().unwrap();
    assert_eq!(clipped.stencil, StencilMode::TestEqualOne);

    c.restore().unwrap();
    c.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap();
    let fills = c.device().draws_for("rect");
    assert_eq!(fills.last().unwrap().stencil, StencilMode::Disabled);
}

#[test]
fn test_non_rect_clip_is_ignored() {
    let mut c = canvas();
    c.begin_path();
    c.move_to(0.0, 0.0);
    c.line_to(50.0, 0.0);
    c.line_to(25.0, 40.0);
    c.clip().unwrap();

    c.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap();
    let fills = c.device().draws_for("rect");
    assert_eq!(fills.last().unwrap().stencil, StencilMode::Disabled);
}

#[test]
fn test_dashed_stroke_uploads_table_and_sets_period() {
    let mut c = canvas();
    c.set_line_dash(&[4.0, 2.0]);
    c.begin_path();
    c.move_to(0.0, 0.0);
    c.line_to(60.0, 0.0);
    c.stroke().unwrap();

    let uploaded = c.device().commands.iter().any(|cmd| {
        matches!(cmd, RecordedCommand::CreateTexture { data, .. } if data == &vec![0, 0, 0, 0, 1, 1])
    });
    assert!(uploaded);

    let draws = c.device().draws_for("line");
    let Some(UniformValue::Vec4(info)) = draws[0].uniforms.get("line_info") else {
        panic!("line_info not set");
    };
    assert_eq!(info[2], 6.0);
}

#[test]
fn test_put_image_data_bypasses_blending_and_cleans_up() {
    let mut c = canvas();
    c.set_global_composite_operation("lighter");
    let pixels = vec![255u8; 4 * 4 * 4];
    c.put_image_data(&pixels, 4, 4, 10, 10).unwrap();

    let draws = c.device().draws_for("image");
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].blend.color_src, BlendFactor::One);
    assert_eq!(draws[0].blend.color_dst, BlendFactor::Zero);
    assert_eq!(draws[0].stencil, StencilMode::Disabled);
    // Transient texture freed; only the solid dash texture survives.
    assert_eq!(c.device().live_texture_count(), 1);
}

#[test]
fn test_put_image_data_rejects_short_buffer() {
    let mut c = canvas();
    assert!(c.put_image_data(&[0u8; 8], 4, 4, 0, 0).is_err());
}

#[test]
fn test_fill_text_routes_through_fallback() {
    let (mut c, log) = canvas_with_log();
    c.fill_text("hello", 10.0, 20.0).unwrap();
    assert_eq!(log.borrow().texts, 1);
    assert_eq!(c.measure_text("hello").width, 40.0);
}

#[test]
fn test_reset_returns_to_defaults_and_clears() {
    let mut c = canvas();
    c.set_fill_style("#123456");
    c.set_global_composite_operation("lighter");
    c.begin_path();
    c.rect(0.0, 0.0, 10.0, 10.0);
    c.reset();

    assert_eq!(c.fill_style(), "#000");
    assert_eq!(c.global_composite_operation(), "source-over");
    assert!(c
        .device()
        .commands
        .iter()
        .any(|cmd| matches!(cmd, RecordedCommand::ClearColor(_))));
    c.fill(FillRule::NonZero).unwrap();
    assert!(c.device().draws_for("rect").is_empty());
}

#[test]
fn test_resize_reinitializes_viewport_and_state() {
    let mut c = canvas();
    c.set_fill_style("#123456");
    c.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap();
    c.resize(200, 50).unwrap();

    assert_eq!((c.width(), c.height()), (200, 50));
    assert_eq!(c.fill_style(), "#000");
    assert!(c
        .device()
        .commands
        .iter()
        .any(|cmd| matches!(cmd, RecordedCommand::Viewport { width: 200, height: 50 })));

    // The stale canvas_size from before the resize must not be reused.
    c.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap();
    let draws = c.device().draws_for("rect");
    let Some(UniformValue::Vec2(size)) = draws.last().unwrap().uniforms.get("canvas_size") else {
        panic!("canvas_size not set");
    };
    assert_eq!(*size, [200.0, 50.0]);

    assert!(c.resize(0, 50).is_err());
}

#[test]
fn test_get_image_data_sizes_buffer() {
    let mut c = canvas();
    let data = c.get_image_data(0, 0, 8, 4).unwrap();
    assert_eq!(data.len(), 8 * 4 * 4);
}
