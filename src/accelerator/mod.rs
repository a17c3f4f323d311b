//! Spatial accelerators: candidate facet queries against a mesh.
//!
//! An accelerator is a cursor. A query is started with either
//! [`SpatialAccelerator::set_facet_state`] (which facets of the indexed mesh
//! may touch this facet of another mesh) or
//! [`SpatialAccelerator::set_point_state`] (which facets may be crossed by
//! the `+z` ray leaving this point), then drained with
//! [`SpatialAccelerator::next_facet`] until it returns `None`.
//!
//! Every implementation may over-report but never under-report; they only
//! trade build cost for false positives.

use crate::float_types::Real;
use crate::mesh::Mesh;
use nalgebra::Point3;

pub mod bbox_grid;
pub mod precise_grid;
pub mod sweep;

pub use bbox_grid::BBoxGrid;
pub use precise_grid::PreciseGrid;
pub use sweep::Sweep;

/// Grid resolution used when none is requested.
pub const DEFAULT_GRID_RESOLUTION: usize = 10;

pub trait SpatialAccelerator {
    /// Start a query for facets that may interact with facet `facet` of `mesh`.
    fn set_facet_state(&mut self, mesh: &Mesh, facet: usize);

    /// Start a query for facets that may be hit by the `+z` ray from `point`.
    fn set_point_state(&mut self, point: &Point3<Real>);

    /// Next candidate of the current query, `None` once exhausted.
    fn next_facet(&mut self) -> Option<usize>;
}

/// Drain the current query as an iterator.
pub fn candidates(accelerator: &mut dyn SpatialAccelerator) -> impl Iterator<Item = usize> + '_ {
    std::iter::from_fn(move || accelerator.next_facet())
}

/// Enumerates every facet, for small meshes and cutting primitives.
#[derive(Debug, Clone)]
pub struct DummyAccelerator {
    count: usize,
    current: usize,
}

impl DummyAccelerator {
    pub const fn new(count: usize) -> Self {
        DummyAccelerator { count, current: 0 }
    }

    pub fn for_mesh(mesh: &Mesh) -> Self {
        DummyAccelerator::new(mesh.facets.len())
    }
}

impl SpatialAccelerator for DummyAccelerator {
    fn set_facet_state(&mut self, _mesh: &Mesh, _facet: usize) {
        self.current = 0;
    }

    fn set_point_state(&mut self, _point: &Point3<Real>) {
        self.current = 0;
    }

    fn next_facet(&mut self) -> Option<usize> {
        if self.current < self.count {
            self.current += 1;
            Some(self.current - 1)
        } else {
            None
        }
    }
}

/// Walks the facet lists of a set of cells, reporting each facet once per
/// query.
///
/// De-duplication compares a per-facet stamp against a generation counter
/// bumped on every restart, so nothing has to be cleared between queries.
#[derive(Debug, Clone, Default)]
pub(crate) struct CellCursor {
    cell_list: Vec<usize>,
    current_cell: Option<usize>,
    current_facet: usize,
    already_got: Vec<u32>,
    generation: u32,
}

impl CellCursor {
    pub(crate) fn new(facet_count: usize) -> Self {
        CellCursor {
            already_got: vec![0; facet_count],
            ..Default::default()
        }
    }

    pub(crate) fn restart(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.already_got.iter_mut().for_each(|g| *g = 0);
            self.generation = 1;
        }
        self.cell_list.clear();
        self.current_cell = None;
        self.current_facet = 0;
    }

    pub(crate) fn push_cell(&mut self, cell: usize) {
        self.cell_list.push(cell);
    }

    pub(crate) fn begin(&mut self) {
        self.current_cell = self.cell_list.pop();
        self.current_facet = 0;
    }

    pub(crate) fn next(&mut self, spatial_map: &[Vec<usize>]) -> Option<usize> {
        while let Some(cell) = self.current_cell {
            let Some(&facet) = spatial_map[cell].get(self.current_facet) else {
                self.current_cell = self.cell_list.pop();
                self.current_facet = 0;
                continue;
            };
            self.current_facet += 1;
            if self.already_got[facet] != self.generation {
                self.already_got[facet] = self.generation;
                return Some(facet);
            }
        }
        None
    }
}
