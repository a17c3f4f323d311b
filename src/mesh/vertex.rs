//! Struct and functions for working with `Vertex`s from which facets are composed.

use crate::float_types::Real;
use nalgebra::{Point3, Vector2, Vector3};

/// A mesh vertex: position, normal and one texture coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
    pub normal: Vector3<Real>,
    pub uv: Vector2<Real>,
}

impl Default for Vertex {
    fn default() -> Self {
        Vertex::new(Point3::origin(), Vector3::zeros(), Vector2::zeros())
    }
}

impl Vertex {
    /// Create a new [`Vertex`].
    ///
    /// * `pos`    – the position in model space
    /// * `normal` – copied verbatim, it does not have to be unit length
    /// * `uv`     – texture coordinate
    pub const fn new(pos: Point3<Real>, normal: Vector3<Real>, uv: Vector2<Real>) -> Self {
        Vertex { pos, normal, uv }
    }

    /// Vertex with zero normal and texture coordinate.
    pub fn at(pos: Point3<Real>) -> Self {
        Vertex::new(pos, Vector3::zeros(), Vector2::zeros())
    }

    /// Flip vertex normal
    pub fn flip(&mut self) {
        self.normal = -self.normal;
    }

    /// Return the linear interpolation between `self` (`t = 0`) and `other` (`t = 1`).
    ///
    /// Normals and texture coordinates are interpolated as well.
    pub fn interpolate(&self, other: &Vertex, t: Real) -> Vertex {
        Vertex::new(
            self.pos + (other.pos - self.pos) * t,
            self.normal + (other.normal - self.normal) * t,
            self.uv + (other.uv - self.uv) * t,
        )
    }
}
