//! Uniform grid over the mesh bounds, membership by bounding box overlap.

use crate::accelerator::{CellCursor, SpatialAccelerator};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::mesh::{Mesh, weak_bounding_box_intersection};
use nalgebra::Point3;

/// `R × R × R` cells spanning the indexed mesh's bounding box, cell
/// `(x, y, z)` stored at `z·R² + y·R + x`.
///
/// A facet is listed in every cell its bounding box weakly overlaps. Point
/// queries return the whole z column above and below the point's cell.
#[derive(Debug, Clone)]
pub struct BBoxGrid {
    resolution: usize,
    cells: Vec<Aabb>,
    spatial_map: Vec<Vec<usize>>,
    cursor: CellCursor,
}

fn edge_bounds(mesh: &Mesh, facet: usize) -> Aabb {
    let mut bb = Aabb::new_invalid();
    for edge in mesh.facet_edges(facet) {
        bb.take_point(mesh.vertices[edge.s].pos);
        bb.take_point(mesh.vertices[edge.e].pos);
    }
    bb
}

impl BBoxGrid {
    pub fn new(mesh: &Mesh, resolution: usize) -> Self {
        let resolution = resolution.max(1);
        let bounds = mesh.bounding_box();
        let step = if mesh.vertices.is_empty() {
            nalgebra::Vector3::zeros()
        } else {
            (bounds.maxs - bounds.mins) / resolution as Real
        };

        let mut cells = Vec::with_capacity(resolution.pow(3));
        for z in 0..resolution {
            for y in 0..resolution {
                for x in 0..resolution {
                    let lo = Point3::new(x as Real, y as Real, z as Real);
                    let mins = bounds.mins + step.component_mul(&lo.coords);
                    let maxs = bounds.mins + step.component_mul(&(lo.coords.add_scalar(1.0)));
                    cells.push(Aabb::new(mins, maxs));
                }
            }
        }

        let mut spatial_map = vec![Vec::new(); cells.len()];
        for facet in 0..mesh.facets.len() {
            let bb = edge_bounds(mesh, facet);
            for (cell, cell_bb) in cells.iter().enumerate() {
                if weak_bounding_box_intersection(cell_bb, &bb) {
                    spatial_map[cell].push(facet);
                }
            }
        }

        BBoxGrid {
            resolution,
            cells,
            spatial_map,
            cursor: CellCursor::new(mesh.facets.len()),
        }
    }
}

impl SpatialAccelerator for BBoxGrid {
    fn set_facet_state(&mut self, mesh: &Mesh, facet: usize) {
        self.cursor.restart();
        let facet_box = edge_bounds(mesh, facet);
        for (cell, cell_bb) in self.cells.iter().enumerate() {
            if !self.spatial_map[cell].is_empty() && weak_bounding_box_intersection(cell_bb, &facet_box) {
                self.cursor.push_cell(cell);
            }
        }
        self.cursor.begin();
    }

    fn set_point_state(&mut self, point: &Point3<Real>) {
        self.cursor.restart();
        let per_slice = self.resolution * self.resolution;
        for (cell, cell_bb) in self.cells.iter().enumerate() {
            if !cell_bb.contains_local_point(point) {
                continue;
            }
            let column = cell % per_slice;
            for z in 0..self.resolution {
                let candidate = z * per_slice + column;
                if !self.spatial_map[candidate].is_empty() {
                    self.cursor.push_cell(candidate);
                }
            }
        }
        self.cursor.begin();
    }

    fn next_facet(&mut self) -> Option<usize> {
        self.cursor.next(&self.spatial_map)
    }
}
