//! Partition of a mesh's bounding box with an exact facet/cell overlap test.
//!
//! Bounding boxes of noisy fracture surfaces are much larger than the
//! surfaces themselves, so this grid only lists a facet in a cell when the
//! facet polygon really crosses the (slightly fattened) cell.

use crate::accelerator::{CellCursor, SpatialAccelerator};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::mesh::{Mesh, projection::Projection};
use nalgebra::{Point2, Point3, Vector3};

const CELL_FATTENING: Real = 0.001;

/// `R × R × R` cells partitioning the indexed mesh's bounding box, cell
/// `(i, j, k)` along `(x, y, z)` stored at `i·R² + j·R + k`.
#[derive(Debug, Clone)]
pub struct PreciseGrid {
    bounds: Aabb,
    cubes: Vec<Aabb>,
    spatial_map: Vec<Vec<usize>>,
    cursor: CellCursor,
}

fn fattened(cube: &Aabb, amount: Real) -> Aabb {
    Aabb::new(cube.mins.map(|c| c - amount), cube.maxs.map(|c| c + amount))
}

/// Segment against the cube `[-0.5, 0.5]³`: slab rejection on each axis
/// followed by the three cross-axis separating tests.
fn edge_crosses_unit_cube(p1: &Vector3<Real>, p2: &Vector3<Real>) -> bool {
    let vec = p2 - p1;
    let signs = vec.map(|c| if c < 0.0 { -1.0 } else { 1.0 });
    for i in 0..3 {
        if p1[i] * signs[i] > 0.5 || p2[i] * signs[i] < -0.5 {
            return false;
        }
    }
    for i in 0..3 {
        let i1 = (i + 1) % 3;
        let i2 = (i + 2) % 3;
        let vl1 = vec[i2] * p1[i1] - vec[i1] * p1[i2];
        let vl2 = 0.5 * (vec[i2] * signs[i1] + vec[i1] * signs[i2]);
        if vl1 * vl1 > vl2 * vl2 {
            return false;
        }
    }
    true
}

#[inline]
fn crosses(a: Real, b: Real, c: Real) -> i32 {
    (b >= c) as i32 - (a >= c) as i32
}

/// Signed contribution of segment `p1 → p2` to the crossing count of the
/// upward ray from `p` in the projected plane.
fn edge_is_above_point(p1: &Point2<Real>, p2: &Point2<Real>, p: &Point2<Real>) -> i32 {
    let direction = crosses(p1.x, p2.x, p.x);
    if direction == 0 {
        return 0;
    }
    if crosses(p1.y, p2.y, p.y) != 0 {
        let d = direction as Real;
        if d * (p.x - p1.x) * (p2.y - p1.y) >= d * (p.y - p1.y) * (p2.x - p1.x) {
            return direction;
        }
    } else if p1.y > p.y {
        return direction;
    }
    0
}

fn point_in_polygon(segments: &[(Vector3<Real>, Vector3<Real>)], point: &Vector3<Real>, normal: &Vector3<Real>) -> bool {
    let projection = Projection::from_normal(normal);
    let target = projection.project(&Point3::from(*point));
    let counter: i32 = segments
        .iter()
        .map(|(a, b)| {
            edge_is_above_point(
                &projection.project(&Point3::from(*a)),
                &projection.project(&Point3::from(*b)),
                &target,
            )
        })
        .sum();
    counter != 0
}

/// Whether facet `facet` of `mesh` touches `cube` grown by `fattening`.
pub fn facet_intersects_cube(mesh: &Mesh, facet: usize, cube: &Aabb, fattening: Real) -> bool {
    let cube = fattened(cube, fattening);
    let edges = mesh.facet_edges(facet);

    // One bit per half-space "some vertex is on the inner side of this face".
    let mut inner_sides = 0u8;
    for edge in edges {
        for p in [&mesh.vertices[edge.s].pos, &mesh.vertices[edge.e].pos] {
            if cube.contains_local_point(p) {
                return true;
            }
            for axis in 0..3 {
                if p[axis] < cube.maxs[axis] {
                    inner_sides |= 1 << (2 * axis);
                }
                if p[axis] > cube.mins[axis] {
                    inner_sides |= 1 << (2 * axis + 1);
                }
            }
        }
    }
    if inner_sides != 0b11_1111 {
        return false;
    }

    let center = cube.center();
    let half = cube.half_extents();
    let rescale = Vector3::new(0.5 / half.x, 0.5 / half.y, 0.5 / half.z);
    let local = |p: &Point3<Real>| (p - center).component_mul(&rescale);
    let segments: Vec<(Vector3<Real>, Vector3<Real>)> = edges
        .iter()
        .map(|e| (local(&mesh.vertices[e.s].pos), local(&mesh.vertices[e.e].pos)))
        .collect();

    let Some(normal) = facet_plane_normal(&segments) else {
        // cannot find a plane, keep the facet
        return true;
    };

    if segments.iter().any(|(a, b)| edge_crosses_unit_cube(a, b)) {
        return true;
    }

    // The plane can still cut through the cube with every edge outside:
    // then it crosses the diagonal most aligned with the normal.
    let diagonal = normal.map(|c| if c < 0.0 { -1.0 } else { 1.0 });
    let t = segments[0].0.dot(&normal) / diagonal.dot(&normal);
    if !(-0.5..=0.5).contains(&t) {
        return false;
    }
    point_in_polygon(&segments, &(diagonal * t), &normal)
}

/// Area weighted normal of the facet's loops. Holes subtract, and runs of
/// collinear boundary points do not matter.
fn facet_plane_normal(segments: &[(Vector3<Real>, Vector3<Real>)]) -> Option<Vector3<Real>> {
    segments
        .iter()
        .fold(Vector3::zeros(), |acc, (a, b)| acc + a.cross(b))
        .try_normalize(Real::EPSILON)
}

impl PreciseGrid {
    pub fn new(mesh: &Mesh, resolution: usize) -> Self {
        let resolution = resolution.max(1);
        let bounds = if mesh.vertices.is_empty() {
            Aabb::new(Point3::origin(), Point3::origin())
        } else {
            mesh.bounding_box()
        };
        // flat meshes still get cells with volume
        let bounds = fattened(&bounds, CELL_FATTENING);
        let cell_size = bounds.extents() / resolution as Real;

        let mut cubes = Vec::with_capacity(resolution.pow(3));
        for i in 0..resolution {
            for j in 0..resolution {
                for k in 0..resolution {
                    let mins = bounds.mins
                        + Vector3::new(i as Real, j as Real, k as Real).component_mul(&cell_size);
                    cubes.push(Aabb::new(mins, mins + cell_size));
                }
            }
        }

        let mut spatial_map = vec![Vec::new(); cubes.len()];
        for facet in 0..mesh.facets.len() {
            for (cell, cube) in cubes.iter().enumerate() {
                if facet_intersects_cube(mesh, facet, cube, CELL_FATTENING) {
                    spatial_map[cell].push(facet);
                }
            }
        }

        PreciseGrid {
            bounds,
            cubes,
            spatial_map,
            cursor: CellCursor::new(mesh.facets.len()),
        }
    }
}

impl SpatialAccelerator for PreciseGrid {
    fn set_facet_state(&mut self, mesh: &Mesh, facet: usize) {
        self.cursor.restart();
        if facet_intersects_cube(mesh, facet, &self.bounds, CELL_FATTENING) {
            for (cell, cube) in self.cubes.iter().enumerate() {
                if !self.spatial_map[cell].is_empty()
                    && facet_intersects_cube(mesh, facet, cube, CELL_FATTENING)
                {
                    self.cursor.push_cell(cell);
                }
            }
        }
        self.cursor.begin();
    }

    /// Every non-empty cell of the columns over `point` whose top is not
    /// below it. Points under the grid see the whole column.
    fn set_point_state(&mut self, point: &Point3<Real>) {
        self.cursor.restart();
        for (cell, cube) in self.cubes.iter().enumerate() {
            let cube = fattened(cube, CELL_FATTENING);
            let in_column = (0..2).all(|axis| cube.mins[axis] <= point[axis] && point[axis] <= cube.maxs[axis]);
            if in_column && cube.maxs.z >= point.z && !self.spatial_map[cell].is_empty() {
                self.cursor.push_cell(cell);
            }
        }
        self.cursor.begin();
    }

    fn next_facet(&mut self) -> Option<usize> {
        self.cursor.next(&self.spatial_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accelerator::candidates;
    use crate::mesh::shapes::cuboid;

    fn unit_cell() -> Aabb {
        Aabb::new(Point3::new(-0.1, -0.1, -0.1), Point3::new(0.1, 0.1, 0.1))
    }

    #[test]
    fn test_large_facet_through_cell_is_detected() {
        // a face much larger than the cell, with no vertex or edge near it
        let slab = cuboid(&Point3::new(-5.0, -5.0, -5.0), &Point3::new(5.0, 5.0, 0.0));
        let top = 5; // +z face at z = 0
        assert!(facet_intersects_cube(&slab, top, &unit_cell(), 0.0));
        let bottom = 4; // -z face at z = -5
        assert!(!facet_intersects_cube(&slab, bottom, &unit_cell(), 0.0));
    }

    #[test]
    fn test_tilted_facet_misses_cell_corner() {
        let positions = [
            Point3::new(0.25, -3.0, -3.0),
            Point3::new(0.25, 3.0, -3.0),
            Point3::new(0.25, 0.0, 3.0),
        ];
        let mesh = Mesh::from_buffers(&positions, None, None, &[0, 1, 2]).unwrap();
        assert!(!facet_intersects_cube(&mesh, 0, &unit_cell(), 0.0));
        assert!(facet_intersects_cube(&mesh, 0, &unit_cell(), 0.2));
    }

    #[test]
    fn test_plane_normal_ignores_collinear_start() {
        let square = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        ];
        let segments: Vec<_> = (0..square.len())
            .map(|k| (square[k], square[(k + 1) % square.len()]))
            .collect();
        let normal = facet_plane_normal(&segments).unwrap();
        assert!((normal - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_edge_against_unit_cube() {
        let a = Vector3::new(-1.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 0.0, 0.0);
        assert!(edge_crosses_unit_cube(&a, &b));
        let c = Vector3::new(-1.0, 0.9, 0.0);
        let d = Vector3::new(0.0, 1.9, 0.0);
        assert!(!edge_crosses_unit_cube(&c, &d));
    }

    #[test]
    fn test_facets_outside_unit_cube_are_indexed() {
        let slab = cuboid(&Point3::new(-3.0, -3.0, -0.25), &Point3::new(3.0, 3.0, 0.25));
        let mut grid = PreciseGrid::new(&slab, 6);

        // a query face far from the origin meets the slab's +x side face
        let query = cuboid(&Point3::new(2.9, -0.1, -0.1), &Point3::new(3.5, 0.1, 0.1));
        grid.set_facet_state(&query, 0);
        let got: Vec<usize> = candidates(&mut grid).collect();
        assert!(got.contains(&1), "+x side face missing: {:?}", got);

        // points below the grid still see the faces above them
        grid.set_point_state(&Point3::new(2.5, 2.5, -10.0));
        let column: Vec<usize> = candidates(&mut grid).collect();
        assert!(column.contains(&4) && column.contains(&5), "{:?}", column);

        grid.set_point_state(&Point3::new(2.5, 2.5, 10.0));
        assert_eq!(grid.next_facet(), None);
        grid.set_point_state(&Point3::new(8.0, 0.0, 0.0));
        assert_eq!(grid.next_facet(), None);
    }

    #[test]
    fn test_grid_queries() {
        let cube = cuboid(&Point3::new(-0.4, -0.4, -0.4), &Point3::new(0.4, 0.4, 0.4));
        let mut grid = PreciseGrid::new(&cube, 4);

        grid.set_point_state(&Point3::new(0.0, 0.0, 0.0));
        let column: Vec<usize> = candidates(&mut grid).collect();
        assert!(column.contains(&5), "top face must be above the center: {:?}", column);

        grid.set_facet_state(&cube, 1);
        let got: Vec<usize> = candidates(&mut grid).collect();
        assert!(got.contains(&1));
        assert!(!got.contains(&0), "opposite face shares no cell: {:?}", got);
    }
}
