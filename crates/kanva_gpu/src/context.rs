//! The retained drawing context.
//!
//! [`Canvas2d`] carries the Canvas2D programming model: a current path,
//! a save/restore state stack, string-typed paint styles, and the usual
//! draw verbs. Everything it can express as instanced quads goes through
//! the [`RasterPipeline`]; everything else is handed to the
//! [`FallbackRenderer`] as a recorded op log and composited back as a
//! bitmap if the fallback produces one.

use kanva_paint::{
    joins_renderable, FillRule, LineCap, LineGeometry, LineJoin, PaintState, Path, PathCommand,
    RecordedOp, StateStack, Transform2D,
};

use crate::device::{GpuDevice, TextureFormat};
use crate::error::CanvasError;
use crate::fallback::{FallbackBitmap, FallbackRenderer, NullFallback, TextMetrics};
use crate::pipeline::RasterPipeline;
use crate::texture_cache::{ImageSource, TextureCache};

pub struct Canvas2d<D: GpuDevice> {
    pipeline: RasterPipeline<D>,
    states: StateStack,
    path: Path,
    fallback: Box<dyn FallbackRenderer>,
    textures: TextureCache,
    /// Quad corners of each active clip, outermost first, so restore can
    /// re-establish the enclosing region.
    clip_regions: Vec<Vec<f32>>,
}

impl<D: GpuDevice> Canvas2d<D> {
    pub fn new(device: D, width: u32, height: u32) -> Result<Self, CanvasError> {
        Self::with_fallback(device, width, height, Box::new(NullFallback))
    }

    pub fn with_fallback(
        device: D,
        width: u32,
        height: u32,
        fallback: Box<dyn FallbackRenderer>,
    ) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::BadDimensions { width, height });
        }
        Ok(Self {
            pipeline: RasterPipeline::new(device, width, height)?,
            states: StateStack::new(),
            path: Path::new(),
            fallback,
            textures: TextureCache::new(),
            clip_regions: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pipeline.size().0
    }

    pub fn height(&self) -> u32 {
        self.pipeline.size().1
    }

    pub fn device(&self) -> &D {
        self.pipeline.device()
    }

    fn state(&self) -> &PaintState {
        self.states.current()
    }

    // === Path construction ===

    pub fn begin_path(&mut self) {
        self.path = Path::new();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        let t = self.state().transform;
        self.path.move_to(x, y, &t);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        let t = self.state().transform;
        self.path.line_to(x, y, &t);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let t = self.state().transform;
        self.path.rect(x, y, w, h, &t);
    }

    pub fn close_path(&mut self) {
        let t = self.state().transform;
        self.path.close_path(&t);
    }

    pub fn arc(
        &mut self,
        x: f32,
        y: f32,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
    ) {
        if ![x, y, radius, start_angle, end_angle]
            .iter()
            .all(|v| v.is_finite())
        {
            return;
        }
        let t = self.state().transform;
        self.path.curve(
            PathCommand::Arc {
                x,
                y,
                radius,
                start_angle,
                end_angle,
                anticlockwise,
            },
            &t,
        );
    }

    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) {
        if ![x1, y1, x2, y2, radius].iter().all(|v| v.is_finite()) {
            return;
        }
        let t = self.state().transform;
        self.path
            .curve(PathCommand::ArcTo { x1, y1, x2, y2, radius }, &t);
    }

    pub fn quadratic_curve_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        if ![cx, cy, x, y].iter().all(|v| v.is_finite()) {
            return;
        }
        let t = self.state().transform;
        self.path
            .curve(PathCommand::QuadraticCurveTo { cx, cy, x, y }, &t);
    }

    pub fn bezier_curve_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        if ![c1x, c1y, c2x, c2y, x, y].iter().all(|v| v.is_finite()) {
            return;
        }
        let t = self.state().transform;
        self.path.curve(
            PathCommand::BezierCurveTo {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            },
            &t,
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        x: f32,
        y: f32,
        radius_x: f32,
        radius_y: f32,
        rotation: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
    ) {
        if ![x, y, radius_x, radius_y, rotation, start_angle, end_angle]
            .iter()
            .all(|v| v.is_finite())
        {
            return;
        }
        let t = self.state().transform;
        self.path.curve(
            PathCommand::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                rotation,
                start_angle,
                end_angle,
                anticlockwise,
            },
            &t,
        );
    }

    // === Painting the current path ===

    pub fn fill(&mut self, rule: FillRule) -> Result<(), CanvasError> {
        if self.path.is_empty() {
            return Ok(());
        }
        if rule == FillRule::NonZero {
            if let Some(corners) = self.path.rect_geometry() {
                let color = self.state().effective_fill_color();
                return Ok(self.pipeline.fill_quads(&corners, color)?);
            }
        }
        let ops: Vec<RecordedOp> = self.path.ops().to_vec();
        let bitmap = self.fallback.fill_path(&ops, self.states.current(), rule);
        self.composite_bitmap(bitmap)
    }

    pub fn stroke(&mut self) -> Result<(), CanvasError> {
        if self.path.is_empty() {
            return Ok(());
        }
        match self.path.line_geometry() {
            Some(geo) => {
                let ops: Vec<RecordedOp> = self.path.ops().to_vec();
                self.stroke_geometry(geo, &ops)
            }
            None => {
                let ops: Vec<RecordedOp> = self.path.ops().to_vec();
                let bitmap = self.fallback.stroke_path(&ops, self.states.current());
                self.composite_bitmap(bitmap)
            }
        }
    }

    fn stroke_geometry(
        &mut self,
        geo: LineGeometry,
        ops: &[RecordedOp],
    ) -> Result<(), CanvasError> {
        if geo.segments.is_empty() {
            return Ok(());
        }
        let state = self.states.current();
        if geo.has_joins
            && !joins_renderable(state.line_cap, state.line_join, geo.all_right_angles)
        {
            let bitmap = self.fallback.stroke_path(ops, self.states.current());
            return self.composite_bitmap(bitmap);
        }
        let color = state.effective_stroke_color();
        let width = state.line_width;
        let cap = state.line_cap;
        let dash = state.line_dash.clone();
        let dash_offset = state.line_dash_offset;
        let transform = state.transform;
        Ok(self.pipeline.stroke_segments(
            &geo.segments,
            color,
            width,
            cap,
            &dash,
            dash_offset,
            &transform,
        )?)
    }

    /// Installs the current path as the clip region. Only rect-only paths
    /// can be stenciled; anything else leaves the clip unchanged.
    pub fn clip(&mut self) -> Result<(), CanvasError> {
        let Some(corners) = self.path.rect_geometry() else {
            tracing::warn!("non-rectangular clip unsupported, clip unchanged");
            return Ok(());
        };
        self.pipeline.clip_quads(&corners)?;
        self.clip_regions.push(corners);
        self.states.current_mut().clip_depth = self.clip_regions.len() as u32;
        Ok(())
    }

    // === Rect shorthands ===

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<(), CanvasError> {
        let Some(corners) = self.transformed_rect(x, y, w, h) else {
            return Ok(());
        };
        let color = self.state().effective_fill_color();
        Ok(self.pipeline.fill_quads(&corners, color)?)
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<(), CanvasError> {
        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return Ok(());
        }
        let t = self.state().transform;
        let mut outline = Path::new();
        outline.rect(x, y, w, h, &t);
        let ops: Vec<RecordedOp> = outline.ops().to_vec();
        match outline.line_geometry() {
            Some(geo) => self.stroke_geometry(geo, &ops),
            None => Ok(()),
        }
    }

    /// Forces the covered pixels back to transparent black regardless of
    /// the current composite operation.
    pub fn clear_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<(), CanvasError> {
        let Some(corners) = self.transformed_rect(x, y, w, h) else {
            return Ok(());
        };
        self.pipeline.apply_composite("destination-out");
        let result = self.pipeline.fill_quads(&corners, [1.0, 1.0, 1.0, 1.0]);
        let op = self.state().composite_op.clone();
        self.pipeline.apply_composite(&op);
        Ok(result?)
    }

    fn transformed_rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<Vec<f32>> {
        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return None;
        }
        let t = &self.state().transform;
        let mut corners = Vec::with_capacity(8);
        for (px, py) in [(x, y), (x + w, y), (x, y + h), (x + w, y + h)] {
            let p = t.apply_point(px, py);
            corners.push(p.x);
            corners.push(p.y);
        }
        Some(corners)
    }

    // === State stack ===

    pub fn save(&mut self) {
        self.states.save();
    }

    pub fn restore(&mut self) -> Result<(), CanvasError> {
        let Some(popped) = self.states.restore() else {
            return Ok(());
        };
        let current_depth = self.state().clip_depth;
        if popped.clip_depth > current_depth {
            self.clip_regions.truncate(current_depth as usize);
            match self.clip_regions.last() {
                Some(region) => {
                    let region = region.clone();
                    self.pipeline.clip_quads(&region)?;
                }
                None => self.pipeline.unclip(),
            }
        }
        if popped.composite_op != self.state().composite_op {
            let op = self.state().composite_op.clone();
            self.pipeline.apply_composite(&op);
        }
        Ok(())
    }

    /// Drops the whole state stack, the current path, any clip, and the
    /// target contents.
    pub fn reset(&mut self) {
        self.states.reset();
        self.path = Path::new();
        self.clip_regions.clear();
        self.pipeline.unclip();
        self.pipeline.apply_composite("source-over");
        self.pipeline.clear();
    }

    /// Adopts new backing-surface dimensions. Must be called when the
    /// surface is resized, before any further drawing; the viewport is
    /// reinitialized and everything else behaves as [`Self::reset`].
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::BadDimensions { width, height });
        }
        self.pipeline.resize(width, height);
        self.reset();
        Ok(())
    }

    // === Transforms ===

    pub fn translate(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            let s = self.states.current_mut();
            s.transform = s.transform.multiply(&Transform2D::translation(x, y));
        }
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            let s = self.states.current_mut();
            s.transform = s.transform.multiply(&Transform2D::scaling(x, y));
        }
    }

    pub fn rotate(&mut self, radians: f32) {
        if radians.is_finite() {
            let s = self.states.current_mut();
            s.transform = s.transform.multiply(&Transform2D::rotation(radians));
        }
    }

    pub fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        if ![a, b, c, d, e, f].iter().all(|v| v.is_finite()) {
            return;
        }
        let s = self.states.current_mut();
        s.transform = s.transform.multiply(&Transform2D::new(a, b, c, d, e, f));
    }

    pub fn set_transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        if ![a, b, c, d, e, f].iter().all(|v| v.is_finite()) {
            return;
        }
        self.states.current_mut().transform = Transform2D::new(a, b, c, d, e, f);
    }

    pub fn reset_transform(&mut self) {
        self.states.current_mut().transform = Transform2D::identity();
    }

    pub fn get_transform(&self) -> Transform2D {
        self.state().transform
    }

    // === Paint attributes ===

    /// Unparseable styles are ignored, keeping the previous value.
    pub fn set_fill_style(&mut self, style: &str) {
        if let Err(err) = self.states.current_mut().set_fill_style(style) {
            tracing::warn!(%err, "fill style ignored");
        }
    }

    pub fn fill_style(&self) -> &str {
        &self.state().fill_style
    }

    pub fn set_stroke_style(&mut self, style: &str) {
        if let Err(err) = self.states.current_mut().set_stroke_style(style) {
            tracing::warn!(%err, "stroke style ignored");
        }
    }

    pub fn stroke_style(&self) -> &str {
        &self.state().stroke_style
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.states.current_mut().set_global_alpha(alpha);
    }

    pub fn global_alpha(&self) -> f32 {
        self.state().global_alpha
    }

    /// Unknown operations are ignored; the attribute keeps its old value
    /// and the blend state stays consistent with it.
    pub fn set_global_composite_operation(&mut self, op: &str) {
        if self.pipeline.apply_composite(op) {
            self.states.current_mut().composite_op = op.to_owned();
        }
    }

    pub fn global_composite_operation(&self) -> &str {
        &self.state().composite_op
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.states.current_mut().set_line_width(width);
    }

    pub fn line_width(&self) -> f32 {
        self.state().line_width
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.states.current_mut().line_cap = cap;
    }

    pub fn line_cap(&self) -> LineCap {
        self.state().line_cap
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.states.current_mut().line_join = join;
    }

    pub fn line_join(&self) -> LineJoin {
        self.state().line_join
    }

    pub fn set_miter_limit(&mut self, limit: f32) {
        if limit.is_finite() && limit > 0.0 {
            self.states.current_mut().miter_limit = limit;
        }
    }

    pub fn miter_limit(&self) -> f32 {
        self.state().miter_limit
    }

    pub fn set_line_dash(&mut self, pattern: &[f32]) {
        self.states.current_mut().set_line_dash(pattern);
    }

    pub fn line_dash(&self) -> &[f32] {
        &self.state().line_dash
    }

    pub fn set_line_dash_offset(&mut self, offset: f32) {
        if offset.is_finite() {
            self.states.current_mut().line_dash_offset = offset;
        }
    }

    pub fn line_dash_offset(&self) -> f32 {
        self.state().line_dash_offset
    }

    pub fn set_font(&mut self, font: &str) {
        self.states.current_mut().font = font.to_owned();
    }

    pub fn font(&self) -> &str {
        &self.state().font
    }

    pub fn set_text_align(&mut self, align: &str) {
        self.states.current_mut().text_align = align.to_owned();
    }

    pub fn set_text_baseline(&mut self, baseline: &str) {
        self.states.current_mut().text_baseline = baseline.to_owned();
    }

    // === Text ===

    pub fn fill_text(&mut self, text: &str, x: f32, y: f32) -> Result<(), CanvasError> {
        self.draw_text(text, x, y, false)
    }

    pub fn stroke_text(&mut self, text: &str, x: f32, y: f32) -> Result<(), CanvasError> {
        self.draw_text(text, x, y, true)
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, stroke: bool) -> Result<(), CanvasError> {
        if text.is_empty() || !x.is_finite() || !y.is_finite() {
            return Ok(());
        }
        let bitmap = self
            .fallback
            .raster_text(text, x, y, self.states.current(), stroke);
        self.composite_bitmap(bitmap)
    }

    pub fn measure_text(&mut self, text: &str) -> TextMetrics {
        self.fallback.measure_text(text, self.states.current())
    }

    // === Images and pixels ===

    pub fn draw_image(
        &mut self,
        source: &dyn ImageSource,
        dx: f32,
        dy: f32,
    ) -> Result<(), CanvasError> {
        let (w, h) = source.size();
        self.draw_image_sub(source, 0.0, 0.0, w as f32, h as f32, dx, dy, w as f32, h as f32)
    }

    pub fn draw_image_rect(
        &mut self,
        source: &dyn ImageSource,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
    ) -> Result<(), CanvasError> {
        let (w, h) = source.size();
        self.draw_image_sub(source, 0.0, 0.0, w as f32, h as f32, dx, dy, dw, dh)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_sub(
        &mut self,
        source: &dyn ImageSource,
        sx: f32,
        sy: f32,
        sw: f32,
        sh: f32,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
    ) -> Result<(), CanvasError> {
        if ![sx, sy, sw, sh, dx, dy, dw, dh].iter().all(|v| v.is_finite()) {
            return Ok(());
        }
        let (tw, th) = source.size();
        if tw == 0 || th == 0 || sw <= 0.0 || sh <= 0.0 {
            return Ok(());
        }
        let texture = self
            .textures
            .get_or_upload(self.pipeline.device_mut(), source)?;
        let Some(corners) = self.transformed_rect(dx, dy, dw, dh) else {
            return Ok(());
        };
        let corners: [f32; 8] = [
            corners[0], corners[1], corners[2], corners[3], corners[4], corners[5], corners[6],
            corners[7],
        ];
        let src_rect = [
            sx / tw as f32,
            sy / th as f32,
            (sx + sw) / tw as f32,
            (sy + sh) / th as f32,
        ];
        let alpha = self.state().global_alpha;
        Ok(self.pipeline.draw_texture(texture, &corners, src_rect, alpha)?)
    }

    /// Writes raw premultiplied RGBA pixels at a device position,
    /// bypassing transform, clip, alpha, and the composite operation.
    pub fn put_image_data(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        dx: u32,
        dy: u32,
    ) -> Result<(), CanvasError> {
        let expected = (width * height * 4) as usize;
        if pixels.len() != expected {
            return Err(CanvasError::BadPixelData {
                got: pixels.len(),
                expected,
                width,
                height,
            });
        }
        let texture =
            self.pipeline
                .device_mut()
                .create_texture(TextureFormat::Rgba8, width, height, pixels)?;
        let (x, y, w, h) = (dx as f32, dy as f32, width as f32, height as f32);
        let corners = [x, y, x + w, y, x, y + h, x + w, y + h];
        let result = self.pipeline.put_texture(texture, &corners, [0.0, 0.0, 1.0, 1.0]);
        if self.state().clip_depth > 0 {
            self.pipeline.restore_clip_test();
        }
        self.pipeline.device_mut().delete_texture(texture);
        Ok(result?)
    }

    /// Reads back a rectangle of the target as raw premultiplied RGBA.
    pub fn get_image_data(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, CanvasError> {
        Ok(self.pipeline.read_pixels(x, y, width, height)?)
    }

    fn composite_bitmap(&mut self, bitmap: Option<FallbackBitmap>) -> Result<(), CanvasError> {
        let Some(bitmap) = bitmap else {
            return Ok(());
        };
        if bitmap.width == 0 || bitmap.height == 0 {
            return Ok(());
        }
        let texture = self.pipeline.device_mut().create_texture(
            TextureFormat::Rgba8,
            bitmap.width,
            bitmap.height,
            &bitmap.pixels,
        )?;
        let (x, y) = (bitmap.x, bitmap.y);
        let (w, h) = (bitmap.width as f32, bitmap.height as f32);
        let corners = [x, y, x + w, y, x, y + h, x + w, y + h];
        let result = self
            .pipeline
            .draw_texture(texture, &corners, [0.0, 0.0, 1.0, 1.0], 1.0);
        self.pipeline.device_mut().delete_texture(texture);
        Ok(result?)
    }
}
