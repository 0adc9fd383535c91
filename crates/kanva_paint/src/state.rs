//! Drawing state and the save/restore stack.

use std::str::FromStr;

use smallvec::SmallVec;

use crate::color::parse_color;
use crate::error::PaintError;
use crate::transform::Transform2D;

/// How stroke endpoints are finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    /// Shader-side encoding of the cap mode.
    pub fn encode(self) -> f32 {
        match self {
            LineCap::Butt => 0.0,
            LineCap::Round => 1.0,
            LineCap::Square => 2.0,
        }
    }
}

impl FromStr for LineCap {
    type Err = PaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "butt" => Ok(LineCap::Butt),
            "round" => Ok(LineCap::Round),
            "square" => Ok(LineCap::Square),
            _ => Err(PaintError::BadLineCap(s.to_owned())),
        }
    }
}

/// How stroke corners are joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl FromStr for LineJoin {
    type Err = PaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "miter" => Ok(LineJoin::Miter),
            "round" => Ok(LineJoin::Round),
            "bevel" => Ok(LineJoin::Bevel),
            _ => Err(PaintError::BadLineJoin(s.to_owned())),
        }
    }
}

/// Winding rule for fills. Only `NonZero` paths take the fast fill; the
/// distinction matters to the fallback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FromStr for FillRule {
    type Err = PaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nonzero" => Ok(FillRule::NonZero),
            "evenodd" => Ok(FillRule::EvenOdd),
            _ => Err(PaintError::BadFillRule(s.to_owned())),
        }
    }
}

/// The full drawable state captured by `save()` and restored by `restore()`.
///
/// Colors are kept both as the accepted source string (so style getters
/// echo back what was set) and as a parsed premultiplied RGBA value.
#[derive(Clone, Debug, PartialEq)]
pub struct PaintState {
    pub fill_style: String,
    pub fill_color: [f32; 4],
    pub stroke_style: String,
    pub stroke_color: [f32; 4],
    pub global_alpha: f32,
    pub composite_op: String,
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub line_dash: Vec<f32>,
    pub line_dash_offset: f32,
    pub font: String,
    pub text_align: String,
    pub text_baseline: String,
    pub transform: Transform2D,
    /// Depth of active stencil clips, so restore knows when the last one
    /// goes out of scope.
    pub clip_depth: u32,
}

impl Default for PaintState {
    fn default() -> Self {
        let black = parse_color("#000").unwrap_or([0.0, 0.0, 0.0, 1.0]);
        Self {
            fill_style: "#000".to_owned(),
            fill_color: black,
            stroke_style: "#000".to_owned(),
            stroke_color: black,
            global_alpha: 1.0,
            composite_op: "source-over".to_owned(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            line_dash: Vec::new(),
            line_dash_offset: 0.0,
            font: "10px sans-serif".to_owned(),
            text_align: "start".to_owned(),
            text_baseline: "alphabetic".to_owned(),
            transform: Transform2D::identity(),
            clip_depth: 0,
        }
    }
}

impl PaintState {
    /// Fill color with global alpha applied, premultiplied on all channels.
    pub fn effective_fill_color(&self) -> [f32; 4] {
        scale_color(self.fill_color, self.global_alpha)
    }

    /// Stroke color with global alpha applied, premultiplied on all channels.
    pub fn effective_stroke_color(&self) -> [f32; 4] {
        scale_color(self.stroke_color, self.global_alpha)
    }

    /// Invalid style strings leave the state untouched.
    pub fn set_fill_style(&mut self, style: &str) -> Result<(), PaintError> {
        self.fill_color = parse_color(style)?;
        self.fill_style = style.to_owned();
        Ok(())
    }

    pub fn set_stroke_style(&mut self, style: &str) -> Result<(), PaintError> {
        self.stroke_color = parse_color(style)?;
        self.stroke_style = style.to_owned();
        Ok(())
    }

    /// Out-of-range alpha is ignored, matching the attribute contract.
    pub fn set_global_alpha(&mut self, alpha: f32) {
        if (0.0..=1.0).contains(&alpha) {
            self.global_alpha = alpha;
        }
    }

    /// Zero, negative, or non-finite widths are ignored.
    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.line_width = width;
        }
    }

    /// Odd-length patterns are concatenated with themselves; any negative
    /// or non-finite entry voids the whole call.
    pub fn set_line_dash(&mut self, pattern: &[f32]) {
        if pattern.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return;
        }
        let mut dash = pattern.to_vec();
        if dash.len() % 2 == 1 {
            dash.extend_from_slice(pattern);
        }
        self.line_dash = dash;
    }
}

fn scale_color(color: [f32; 4], alpha: f32) -> [f32; 4] {
    [
        color[0] * alpha,
        color[1] * alpha,
        color[2] * alpha,
        color[3] * alpha,
    ]
}

/// Save/restore stack. The live state sits on top; the stack is never
/// empty and a restore at depth one is ignored.
#[derive(Clone, Debug)]
pub struct StateStack {
    stack: SmallVec<[PaintState; 4]>,
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStack {
    pub fn new() -> Self {
        let mut stack = SmallVec::new();
        stack.push(PaintState::default());
        Self { stack }
    }

    pub fn current(&self) -> &PaintState {
        self.stack.last().unwrap_or_else(|| unreachable!())
    }

    pub fn current_mut(&mut self) -> &mut PaintState {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn save(&mut self) {
        let snapshot = self.current().clone();
        self.stack.push(snapshot);
    }

    /// Pops to the previous snapshot. Returns the popped state so the
    /// caller can compare clip depths, or `None` if the stack was at its
    /// base already.
    pub fn restore(&mut self) -> Option<PaintState> {
        if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        }
    }

    /// Drops every snapshot and resets the live state to defaults.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(PaintState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_matches_initial_attributes() {
        let state = PaintState::default();
        assert_eq!(state.fill_style, "#000");
        assert_eq!(state.fill_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(state.composite_op, "source-over");
        assert_eq!(state.line_width, 1.0);
        assert_eq!(state.line_cap, LineCap::Butt);
        assert_eq!(state.line_join, LineJoin::Miter);
        assert_eq!(state.miter_limit, 10.0);
        assert_eq!(state.font, "10px sans-serif");
        assert!(state.transform.is_identity());
    }

    #[test]
    fn test_invalid_style_preserves_previous() {
        let mut state = PaintState::default();
        state.set_fill_style("#ff0000").unwrap();
        assert!(state.set_fill_style("not-a-color").is_err());
        assert_eq!(state.fill_style, "#ff0000");
        assert_eq!(state.fill_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_global_alpha_scales_all_channels() {
        let mut state = PaintState::default();
        state.set_fill_style("#ffffff").unwrap();
        state.set_global_alpha(0.5);
        assert_eq!(state.effective_fill_color(), [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_out_of_range_alpha_ignored() {
        let mut state = PaintState::default();
        state.set_global_alpha(1.5);
        assert_eq!(state.global_alpha, 1.0);
        state.set_global_alpha(-0.1);
        assert_eq!(state.global_alpha, 1.0);
        state.set_global_alpha(f32::NAN);
        assert_eq!(state.global_alpha, 1.0);
    }

    #[test]
    fn test_line_width_rejects_nonpositive() {
        let mut state = PaintState::default();
        state.set_line_width(0.0);
        state.set_line_width(-2.0);
        state.set_line_width(f32::INFINITY);
        assert_eq!(state.line_width, 1.0);
        state.set_line_width(3.5);
        assert_eq!(state.line_width, 3.5);
    }

    #[test]
    fn test_odd_dash_pattern_doubled() {
        let mut state = PaintState::default();
        state.set_line_dash(&[5.0, 10.0, 15.0]);
        assert_eq!(state.line_dash, vec![5.0, 10.0, 15.0, 5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_negative_dash_entry_voids_call() {
        let mut state = PaintState::default();
        state.set_line_dash(&[4.0, 2.0]);
        state.set_line_dash(&[4.0, -2.0]);
        assert_eq!(state.line_dash, vec![4.0, 2.0]);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut stack = StateStack::new();
        stack.current_mut().set_fill_style("#ff0000").unwrap();
        stack.save();
        stack.current_mut().set_fill_style("#00ff00").unwrap();
        stack.current_mut().line_width = 9.0;
        let popped = stack.restore().unwrap();
        assert_eq!(popped.fill_style, "#00ff00");
        assert_eq!(stack.current().fill_style, "#ff0000");
        assert_eq!(stack.current().line_width, 1.0);
    }

    #[test]
    fn test_restore_at_base_is_noop() {
        let mut stack = StateStack::new();
        assert!(stack.restore().is_none());
        assert_eq!(stack.current().fill_style, "#000");
    }

    #[test]
    fn test_cap_join_rule_parsing() {
        assert_eq!("round".parse::<LineCap>().unwrap(), LineCap::Round);
        assert_eq!("bevel".parse::<LineJoin>().unwrap(), LineJoin::Bevel);
        assert_eq!("evenodd".parse::<FillRule>().unwrap(), FillRule::EvenOdd);
        assert!("ROUND".parse::<LineCap>().is_err());
    }
}
