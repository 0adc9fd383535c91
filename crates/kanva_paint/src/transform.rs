//! 2D affine transforms
//!
//! The matrix layout matches the Canvas2D `transform(a, b, c, d, e, f)`
//! convention:
//!
//! ```text
//! [ a  c  e ]
//! [ b  d  f ]
//! [ 0  0  1 ]
//! ```
//!
//! Rotation is clockwise in the canvas' top-left-origin, y-down space.

use crate::path::Point;

/// 2D affine transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Clockwise rotation by `radians` (y-down space).
    pub fn rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self * rhs`: the result applies `rhs` to a point first, then `self`.
    ///
    /// This is the composition order used by the Canvas2D `transform()`
    /// operation, which post-multiplies the current matrix. Not commutative.
    pub fn multiply(&self, rhs: &Transform2D) -> Transform2D {
        Transform2D {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    pub fn apply_point(&self, x: f32, y: f32) -> Point {
        Point::new(
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Transform a direction vector (translation ignored).
    pub fn apply_vector(&self, x: f32, y: f32) -> Point {
        Point::new(self.a * x + self.c * y, self.b * x + self.d * y)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Column-major 3x3 export for the GPU.
    pub fn to_mat3(&self) -> [f32; 9] {
        [
            self.a, self.b, 0.0, // col 0
            self.c, self.d, 0.0, // col 1
            self.e, self.f, 1.0, // col 2
        ]
    }
}
