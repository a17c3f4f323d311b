//! Dominant-axis projection of planar polygons to 2D.

use crate::float_types::Real;
use nalgebra::{Point2, Point3, Vector3};

/// Coordinate plane a facet is flattened onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPlane {
    /// Drop x, keep (y, z)
    Yz,
    /// Drop y, keep (x, z)
    Zx,
    /// Drop z, keep (x, y)
    Xy,
}

/// Projection plane plus whether the projection mirrors the polygon's winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub plane: ProjectionPlane,
    pub opposite_winding: bool,
}

impl Projection {
    /// Pick the plane orthogonal to the largest component of `normal`.
    pub fn from_normal(normal: &Vector3<Real>) -> Self {
        let ax = normal.x.abs();
        let ay = normal.y.abs();
        let az = normal.z.abs();
        let max = ax.max(ay).max(az);
        if max == ax {
            Projection {
                plane: ProjectionPlane::Yz,
                opposite_winding: normal.x < 0.0,
            }
        } else if max == ay {
            Projection {
                plane: ProjectionPlane::Zx,
                opposite_winding: normal.y > 0.0,
            }
        } else {
            Projection {
                plane: ProjectionPlane::Xy,
                opposite_winding: normal.z < 0.0,
            }
        }
    }

    #[inline]
    pub fn project(&self, p: &Point3<Real>) -> Point2<Real> {
        match self.plane {
            ProjectionPlane::Yz => Point2::new(p.y, p.z),
            ProjectionPlane::Zx => Point2::new(p.x, p.z),
            ProjectionPlane::Xy => Point2::new(p.x, p.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_axis_selection() {
        let p = Projection::from_normal(&Vector3::new(-0.9, 0.1, 0.2));
        assert_eq!(p.plane, ProjectionPlane::Yz);
        assert!(p.opposite_winding);

        let p = Projection::from_normal(&Vector3::new(0.1, 0.9, 0.2));
        assert_eq!(p.plane, ProjectionPlane::Zx);
        assert!(p.opposite_winding);

        let p = Projection::from_normal(&Vector3::new(0.1, 0.2, 0.9));
        assert_eq!(p.plane, ProjectionPlane::Xy);
        assert!(!p.opposite_winding);
        assert_eq!(p.project(&Point3::new(1.0, 2.0, 3.0)), Point2::new(1.0, 2.0));
    }
}
