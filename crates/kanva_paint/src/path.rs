//! Path recording and fast-path classification
//!
//! A [`Path`] records every construction call twice: as an op log (with the
//! transform active at call time) so a rejected path can be replayed into
//! the software fallback, and as a flat list of device-space line segments
//! from which the two fast-geometry views are derived.
//!
//! Points are transformed by the active matrix when they are recorded, so
//! the derived geometry is device-ready and a path never mixes transforms.
//!
//! The moment any curve operation is recorded the segment list is dropped
//! and the path is uncompilable for the rest of its life; only the op log
//! keeps growing.

use smallvec::SmallVec;

use crate::transform::Transform2D;

/// A device-space 2D point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A recorded path-construction call, in caller coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo {
        x: f32,
        y: f32,
    },
    LineTo {
        x: f32,
        y: f32,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
    ClosePath,
    Arc {
        x: f32,
        y: f32,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
    },
    ArcTo {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        radius: f32,
    },
    QuadraticCurveTo {
        cx: f32,
        cy: f32,
        x: f32,
        y: f32,
    },
    BezierCurveTo {
        c1x: f32,
        c1y: f32,
        c2x: f32,
        c2y: f32,
        x: f32,
        y: f32,
    },
    Ellipse {
        x: f32,
        y: f32,
        radius_x: f32,
        radius_y: f32,
        rotation: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
    },
}

/// An op-log entry: the call plus a snapshot of the transform that was
/// active when it was made, for fallback replay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedOp {
    pub command: PathCommand,
    pub transform: Transform2D,
}

/// Line-only derived view of a path: one (x0, y0, x1, y1) record per
/// connected segment, plus the join tags the stroke feasibility check needs.
#[derive(Clone, Debug, PartialEq)]
pub struct LineGeometry {
    pub segments: Vec<f32>,
    pub has_joins: bool,
    pub all_right_angles: bool,
}

impl LineGeometry {
    pub fn segment_count(&self) -> usize {
        self.segments.len() / 4
    }
}

/// Ordered sequence of subpaths with derived fast-path classification.
#[derive(Clone, Debug)]
pub struct Path {
    ops: SmallVec<[RecordedOp; 16]>,
    /// Device-space point pairs, one pair per segment. `None` once a curve
    /// call has made the path uncompilable.
    lines: Option<Vec<Point>>,
    rect_only: bool,
    has_joins: bool,
    subpath_begin: Option<Point>,
    subpath_cur: Option<Point>,
    segments_in_subpath: usize,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    pub fn new() -> Self {
        Self {
            ops: SmallVec::new(),
            lines: Some(Vec::new()),
            rect_only: true,
            has_joins: false,
            subpath_begin: None,
            subpath_cur: None,
            segments_in_subpath: 0,
        }
    }

    /// The full call log, for fallback replay.
    pub fn ops(&self) -> &[RecordedOp] {
        &self.ops
    }

    /// False once any curve operation has been recorded.
    pub fn is_compilable(&self) -> bool {
        self.lines.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    // === Recording ===

    pub fn move_to(&mut self, x: f32, y: f32, transform: &Transform2D) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.record(PathCommand::MoveTo { x, y }, transform);
        self.rect_only = false;
        if self.lines.is_some() {
            self.move_point(transform.apply_point(x, y));
        }
    }

    pub fn line_to(&mut self, x: f32, y: f32, transform: &Transform2D) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.record(PathCommand::LineTo { x, y }, transform);
        self.rect_only = false;
        if self.lines.is_some() {
            self.line_point(transform.apply_point(x, y));
        }
    }

    /// Adds a closed rectangle subpath followed by a fresh zero-length
    /// subpath at the origin corner.
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, transform: &Transform2D) {
        if !x.is_finite() || !y.is_finite() || !w.is_finite() || !h.is_finite() {
            return;
        }
        self.record(PathCommand::Rect { x, y, w, h }, transform);
        if self.lines.is_none() {
            return;
        }
        let p0 = transform.apply_point(x, y);
        let p1 = transform.apply_point(x + w, y);
        let p2 = transform.apply_point(x + w, y + h);
        let p3 = transform.apply_point(x, y + h);
        self.move_point(p0);
        self.line_point(p1);
        self.line_point(p2);
        self.line_point(p3);
        // Mark the subpath closed, then begin a new one at the origin corner.
        self.line_point(p0);
        self.move_point(p0);
    }

    /// No-op without a subpath; otherwise connects back to the subpath's
    /// first point and starts a new subpath there.
    pub fn close_path(&mut self, transform: &Transform2D) {
        self.record(PathCommand::ClosePath, transform);
        if self.lines.is_none() {
            return;
        }
        let Some(begin) = self.subpath_begin else {
            return;
        };
        self.line_point(begin);
        self.move_point(begin);
    }

    /// Record a curve call. Irreversibly disables the fast-geometry views;
    /// the op log still grows so the fallback can replay the path.
    pub fn curve(&mut self, command: PathCommand, transform: &Transform2D) {
        self.record(command, transform);
        if self.lines.take().is_some() {
            tracing::debug!(?command, "path uncompilable: curve operation recorded");
        }
    }

    fn record(&mut self, command: PathCommand, transform: &Transform2D) {
        self.ops.push(RecordedOp {
            command,
            transform: *transform,
        });
    }

    fn move_point(&mut self, p: Point) {
        self.subpath_begin = Some(p);
        self.subpath_cur = Some(p);
        self.segments_in_subpath = 0;
    }

    fn line_point(&mut self, p: Point) {
        let cur = match self.subpath_cur {
            Some(cur) => cur,
            None => {
                self.move_point(p);
                return;
            }
        };
        if self.segments_in_subpath > 0 {
            self.has_joins = true;
        }
        if let Some(lines) = self.lines.as_mut() {
            lines.push(cur);
            lines.push(p);
        }
        self.subpath_cur = Some(p);
        self.segments_in_subpath += 1;
    }

    // === Derived views ===

    /// Rectangle-instance geometry in triangle-strip order, or `None` if the
    /// path is not rect-only.
    ///
    /// Each rectangle emits its four corners as (x,y), (x+w,y), (x,y+h),
    /// (x+w,y+h): the third and fourth corners are deliberately swapped
    /// relative to call order so a 4-vertex strip does not self-intersect.
    pub fn rect_geometry(&self) -> Option<Vec<f32>> {
        let lines = self.lines.as_ref()?;
        if !self.rect_only {
            return None;
        }
        // A rect contributes exactly four segments (eight points).
        debug_assert_eq!(lines.len() % 8, 0);
        let mut out = Vec::with_capacity(lines.len());
        for quad in lines.chunks_exact(8) {
            for corner in [quad[0], quad[2], quad[6], quad[4]] {
                out.push(corner.x);
                out.push(corner.y);
            }
        }
        Some(out)
    }

    /// Per-segment stroke geometry, or `None` if the path is uncompilable.
    pub fn line_geometry(&self) -> Option<LineGeometry> {
        let lines = self.lines.as_ref()?;
        let mut segments = Vec::with_capacity(lines.len() * 2);
        for pair in lines.chunks_exact(2) {
            segments.extend_from_slice(&[pair[0].x, pair[0].y, pair[1].x, pair[1].y]);
        }
        Some(LineGeometry {
            segments,
            has_joins: self.has_joins,
            all_right_angles: self.all_right_angles(lines),
        })
    }

    /// True when every join between connected segments is 90 degrees.
    ///
    /// Checked against the actual device-space directions, so a rect under
    /// a skew or non-uniform scale is correctly not right-angled.
    fn all_right_angles(&self, lines: &[Point]) -> bool {
        let count = lines.len() / 2;
        let seg = |i: usize| (lines[2 * i], lines[2 * i + 1]);
        let mut run_start = 0;
        for i in 0..count {
            let next = i + 1;
            if next < count && seg(i).1 == seg(next).0 {
                if !right_angled(seg(i), seg(next)) {
                    return false;
                }
            } else {
                // End of a run. A closed run has one more join where the
                // last segment wraps back onto the first.
                if seg(i).1 == seg(run_start).0 && !right_angled(seg(i), seg(run_start)) {
                    return false;
                }
                run_start = next;
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn segment_points(&self) -> Option<&[Point]> {
        self.lines.as_deref()
    }
}

fn right_angled(a: (Point, Point), b: (Point, Point)) -> bool {
    const EPS: f32 = 1e-4;
    let d0 = Point::new(a.1.x - a.0.x, a.1.y - a.0.y);
    let d1 = Point::new(b.1.x - b.0.x, b.1.y - b.0.y);
    let l0 = (d0.x * d0.x + d0.y * d0.y).sqrt();
    let l1 = (d1.x * d1.x + d1.y * d1.y).sqrt();
    if l0 == 0.0 || l1 == 0.0 {
        return true; // degenerate segment, no visible corner
    }
    let dot = (d0.x * d1.x + d0.y * d1.y) / (l0 * l1);
    dot.abs() <= EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: Transform2D = Transform2D::identity();

    #[test]
    fn test_rect_closes_subpath_and_restarts_at_origin_corner() {
        let mut path = Path::new();
        path.rect(10.0, 10.0, 20.0, 20.0, &ID);

        let points = path.segment_points().unwrap();
        // Four segments, closing edge included.
        assert_eq!(points.len(), 8);
        assert_eq!(points[7], Point::new(10.0, 10.0));
        // Fresh zero-length subpath at the origin corner.
        assert_eq!(path.subpath_begin, Some(Point::new(10.0, 10.0)));
        assert_eq!(path.subpath_cur, path.subpath_begin);
        assert_eq!(path.segments_in_subpath, 0);
    }

    #[test]
    fn test_rect_geometry_strip_order_swap() {
        let mut path = Path::new();
        path.rect(1.0, 2.0, 10.0, 20.0, &ID);
        let geo = path.rect_geometry().unwrap();
        assert_eq!(
            geo,
            vec![
                1.0, 2.0, // (x, y)
                11.0, 2.0, // (x+w, y)
                1.0, 22.0, // (x, y+h): third corner swapped in
                11.0, 22.0, // (x+w, y+h)
            ]
        );
    }

    #[test]
    fn test_rect_geometry_applies_transform() {
        let mut path = Path::new();
        let t = Transform2D::translation(5.0, -5.0);
        path.rect(0.0, 0.0, 2.0, 2.0, &t);
        let geo = path.rect_geometry().unwrap();
        assert_eq!(geo, vec![5.0, -5.0, 7.0, -5.0, 5.0, -3.0, 7.0, -3.0]);
    }

    #[test]
    fn test_move_line_disqualifies_rect_only() {
        let mut path = Path::new();
        path.rect(0.0, 0.0, 1.0, 1.0, &ID);
        path.move_to(5.0, 5.0, &ID);
        assert!(path.rect_geometry().is_none());
        assert!(path.line_geometry().is_some());
    }

    #[test]
    fn test_line_to_without_subpath_acts_as_move_to() {
        let mut path = Path::new();
        path.line_to(3.0, 4.0, &ID);
        assert_eq!(path.segment_points().unwrap().len(), 0);
        path.line_to(5.0, 4.0, &ID);
        let geo = path.line_geometry().unwrap();
        assert_eq!(geo.segments, vec![3.0, 4.0, 5.0, 4.0]);
        assert!(!geo.has_joins);
    }

    #[test]
    fn test_second_segment_sets_has_joins() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0, &ID);
        path.line_to(10.0, 0.0, &ID);
        assert!(!path.line_geometry().unwrap().has_joins);
        path.line_to(10.0, 10.0, &ID);
        let geo = path.line_geometry().unwrap();
        assert!(geo.has_joins);
        assert!(geo.all_right_angles);
    }

    #[test]
    fn test_oblique_join_not_right_angled() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0, &ID);
        path.line_to(10.0, 0.0, &ID);
        path.line_to(20.0, 5.0, &ID);
        assert!(!path.line_geometry().unwrap().all_right_angles);
    }

    #[test]
    fn test_skewed_rect_not_right_angled() {
        let mut path = Path::new();
        let skew = Transform2D::new(1.0, 0.0, 0.5, 1.0, 0.0, 0.0);
        path.rect(0.0, 0.0, 10.0, 10.0, &skew);
        let geo = path.line_geometry().unwrap();
        assert!(geo.has_joins);
        assert!(!geo.all_right_angles);
    }

    #[test]
    fn test_closing_join_collinear_with_first_segment_not_right_angled() {
        // Every corner along the way is 90 degrees, but the closing edge
        // runs straight into the first segment, a 180-degree join at the
        // start point.
        let mut path = Path::new();
        path.move_to(0.0, 0.0, &ID);
        path.line_to(-10.0, 0.0, &ID);
        path.line_to(-10.0, 10.0, &ID);
        path.line_to(10.0, 10.0, &ID);
        path.line_to(10.0, 0.0, &ID);
        path.close_path(&ID);
        let geo = path.line_geometry().unwrap();
        assert!(geo.has_joins);
        assert!(!geo.all_right_angles);
    }

    #[test]
    fn test_closed_rect_wrap_join_still_right_angled() {
        let mut path = Path::new();
        path.rect(0.0, 0.0, 10.0, 10.0, &ID);
        assert!(path.line_geometry().unwrap().all_right_angles);
    }

    #[test]
    fn test_non_finite_arguments_are_no_ops() {
        let mut path = Path::new();
        path.move_to(f32::NAN, 0.0, &ID);
        path.line_to(0.0, f32::INFINITY, &ID);
        path.rect(0.0, 0.0, f32::NEG_INFINITY, 1.0, &ID);
        assert!(path.is_empty());
        assert_eq!(path.segment_points().unwrap().len(), 0);
    }

    #[test]
    fn test_curve_poisons_path_permanently_and_idempotently() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0, &ID);
        path.line_to(1.0, 0.0, &ID);
        let arc = PathCommand::Arc {
            x: 0.0,
            y: 0.0,
            radius: 1.0,
            start_angle: 0.0,
            end_angle: 1.0,
            anticlockwise: false,
        };
        path.curve(arc, &ID);
        assert!(!path.is_compilable());
        assert!(path.line_geometry().is_none());
        assert!(path.rect_geometry().is_none());

        path.curve(arc, &ID);
        path.line_to(5.0, 5.0, &ID);
        assert!(!path.is_compilable());
        // The op log keeps recording for fallback replay.
        assert_eq!(path.ops().len(), 5);
    }

    #[test]
    fn test_close_path_without_subpath_is_noop() {
        let mut path = Path::new();
        path.close_path(&ID);
        assert_eq!(path.segment_points().unwrap().len(), 0);
    }

    #[test]
    fn test_close_path_connects_to_subpath_start() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0, &ID);
        path.line_to(4.0, 0.0, &ID);
        path.line_to(4.0, 3.0, &ID);
        path.close_path(&ID);
        let geo = path.line_geometry().unwrap();
        assert_eq!(geo.segment_count(), 3);
        assert_eq!(&geo.segments[8..], &[4.0, 3.0, 0.0, 0.0]);
        // New subpath begins at the old start point.
        assert_eq!(path.subpath_begin, Some(Point::new(0.0, 0.0)));
        assert_eq!(path.segments_in_subpath, 0);
    }
}
