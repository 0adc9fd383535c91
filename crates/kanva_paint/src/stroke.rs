//! Stroke feasibility under quad-per-segment rendering.

use crate::state::{LineCap, LineJoin};

/// Whether a path with joins can be stroked as independent per-segment
/// quads without visible join artifacts.
///
/// Each segment is drawn as its own quad, so joins are never constructed
/// explicitly. Two configurations happen to come out exact anyway: round
/// caps on both segment ends cover a round join of the same radius, and
/// square caps meeting at a right angle tile a 90 degree miter precisely.
/// Everything else would overlap wrongly or leave notches and must go to
/// the fallback.
pub fn joins_renderable(cap: LineCap, join: LineJoin, all_right_angles: bool) -> bool {
    match (cap, join) {
        (LineCap::Round, LineJoin::Round) => true,
        (LineCap::Square, LineJoin::Miter) => all_right_angles,
        _ => false,
    }
}
