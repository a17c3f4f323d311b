//! Per-axis sweep buckets.

use crate::accelerator::SpatialAccelerator;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::mesh::Mesh;
use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;

/// Buckets per axis.
pub const SWEEP_RESOLUTION: usize = 2048;

/// Facet boxes are grown by this factor about their center before indexing.
const BOX_SCALE: Real = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SweepEvent {
    coord: Real,
    facet: usize,
    end: bool,
}

/// Three sorted event lists (one per axis) bucketed into
/// [`SWEEP_RESOLUTION`] slots; each slot lists the facets whose grown box
/// overlaps it on that axis.
///
/// Facet queries return the facets present in the query's x, y and z slot
/// ranges. Point queries intersect the point's x and y slots. Query state
/// is tracked with a generation id, so the marker arrays are never cleared.
#[derive(Debug, Clone)]
pub struct Sweep {
    minimal: Vector3<Real>,
    rescale: Vector3<Real>,
    segments: [Vec<Vec<usize>>; 3],
    found_x: Vec<u32>,
    found_y: Vec<u32>,
    iteration: u32,
    indices: Vec<usize>,
    current: usize,
}

fn grown_facet_box(mesh: &Mesh, facet: usize) -> Aabb {
    let bb = mesh.facet_bounding_box(facet);
    let center = bb.center();
    let half = bb.half_extents() * BOX_SCALE;
    Aabb::new(center - half, center + half)
}

fn build_index(events: &[SweepEvent], offset: Real, scale: Real, blocks: &mut [Vec<usize>]) {
    let mut enabled: BTreeSet<usize> = BTreeSet::new();
    let mut last_block = 0usize;
    for event in events {
        let block = ((event.coord - offset) * scale).max(0.0) as usize;
        if block >= SWEEP_RESOLUTION {
            break;
        }
        if block != last_block {
            for slot in blocks.iter_mut().take(block + 1).skip(last_block + 1) {
                slot.extend(enabled.iter().copied());
            }
            last_block = block;
        }
        if event.end {
            enabled.remove(&event.facet);
        } else {
            blocks[last_block].push(event.facet);
            enabled.insert(event.facet);
        }
    }
}

impl Sweep {
    pub fn new(mesh: &Mesh) -> Self {
        let facet_count = mesh.facets.len();
        let mut events: [Vec<SweepEvent>; 3] = Default::default();
        for facet in 0..facet_count {
            let bb = grown_facet_box(mesh, facet);
            for (axis, list) in events.iter_mut().enumerate() {
                list.push(SweepEvent { coord: bb.mins[axis], facet, end: false });
                list.push(SweepEvent { coord: bb.maxs[axis], facet, end: true });
            }
        }

        let mut minimal = Vector3::zeros();
        let mut rescale = Vector3::zeros();
        let mut segments: [Vec<Vec<usize>>; 3] = Default::default();
        for (axis, list) in events.iter_mut().enumerate() {
            // starts before ends at equal coordinates
            list.sort_by(|a, b| a.coord.total_cmp(&b.coord).then(a.end.cmp(&b.end)));
            let (lo, hi) = match (list.first(), list.last()) {
                (Some(first), Some(last)) => (first.coord, last.coord),
                _ => (0.0, 0.0),
            };
            let extent = ((hi - lo) * 1.01).max(Real::EPSILON);
            minimal[axis] = lo;
            rescale[axis] = SWEEP_RESOLUTION as Real / extent;
            segments[axis] = vec![Vec::new(); SWEEP_RESOLUTION];
            build_index(list, lo, rescale[axis], &mut segments[axis]);
        }

        Sweep {
            minimal,
            rescale,
            segments,
            found_x: vec![0; facet_count],
            found_y: vec![0; facet_count],
            iteration: 1,
            indices: Vec::new(),
            current: 0,
        }
    }

    /// Bucket of `coord` on `axis`, `None` when outside the indexed range.
    fn bucket(&self, axis: usize, coord: Real) -> Option<usize> {
        let slot = (coord - self.minimal[axis]) * self.rescale[axis];
        if slot < 0.0 || slot >= SWEEP_RESOLUTION as Real {
            None
        } else {
            Some(slot as usize)
        }
    }

    fn bucket_range(&self, axis: usize, lo: Real, hi: Real) -> std::ops::RangeInclusive<usize> {
        let start = ((lo - self.minimal[axis]).max(0.0) * self.rescale[axis]) as usize;
        let end = ((hi - self.minimal[axis]).max(0.0) * self.rescale[axis]) as usize;
        start..=end.min(SWEEP_RESOLUTION - 1)
    }
}

impl SpatialAccelerator for Sweep {
    fn set_facet_state(&mut self, mesh: &Mesh, facet: usize) {
        self.current = 0;
        self.indices.clear();
        let bb = grown_facet_box(mesh, facet);
        let id = self.iteration;

        for slot in self.bucket_range(0, bb.mins.x, bb.maxs.x) {
            for &f in &self.segments[0][slot] {
                self.found_x[f] = id;
            }
        }
        for slot in self.bucket_range(1, bb.mins.y, bb.maxs.y) {
            for &f in &self.segments[1][slot] {
                self.found_y[f] = id;
            }
        }
        for slot in self.bucket_range(2, bb.mins.z, bb.maxs.z) {
            for &f in &self.segments[2][slot] {
                if self.found_x[f] == id && self.found_y[f] == id {
                    self.found_x[f] = id + 1;
                    self.found_y[f] = id + 1;
                    self.indices.push(f);
                }
            }
        }
        self.iteration += 2;
    }

    fn set_point_state(&mut self, point: &Point3<Real>) {
        self.current = 0;
        self.indices.clear();
        let id = self.iteration;
        self.iteration += 1;
        let (Some(xi), Some(yi)) = (self.bucket(0, point.x), self.bucket(1, point.y)) else {
            return;
        };
        for &f in &self.segments[0][xi] {
            self.found_x[f] = id;
        }
        for &f in &self.segments[1][yi] {
            if self.found_x[f] == id {
                self.indices.push(f);
            }
        }
    }

    fn next_facet(&mut self) -> Option<usize> {
        let facet = self.indices.get(self.current).copied();
        if facet.is_some() {
            self.current += 1;
        }
        facet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accelerator::{DummyAccelerator, candidates};
    use crate::mesh::shapes::{cuboid, cutting_box};
    use crate::mesh::weak_bounding_box_intersection;

    #[test]
    fn test_facet_query_superset() {
        let cube = cuboid(&Point3::new(-0.5, -0.5, -0.5), &Point3::new(0.5, 0.5, 0.5));
        let mut sweep = Sweep::new(&cube);
        let cutter = cutting_box(&Point3::new(0.0, 0.0, 0.45), &Vector3::z(), 2.0, 1);
        sweep.set_facet_state(&cutter, 0);
        let got: Vec<usize> = candidates(&mut sweep).collect();
        let query = cutter.facet_bounding_box(0);
        for facet in 0..cube.facets.len() {
            if weak_bounding_box_intersection(&query, &cube.facet_bounding_box(facet)) {
                assert!(got.contains(&facet), "missing facet {} in {:?}", facet, got);
            }
        }
        // the side faces cross the cutting plane
        for facet in [0, 1, 2, 3] {
            assert!(got.contains(&facet), "missing side facet {} in {:?}", facet, got);
        }
        let mut unique = got.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), got.len(), "duplicates in {:?}", got);
    }

    #[test]
    fn test_point_query_matches_ray_hits() {
        let cube = cuboid(&Point3::new(-0.5, -0.5, -0.5), &Point3::new(0.5, 0.5, 0.5));
        let mut sweep = Sweep::new(&cube);
        sweep.set_point_state(&Point3::new(0.1, -0.2, 0.0));
        let got: Vec<usize> = candidates(&mut sweep).collect();
        assert!(got.contains(&4) && got.contains(&5), "{:?}", got);

        sweep.set_point_state(&Point3::new(10.0, 0.0, 0.0));
        assert_eq!(sweep.next_facet(), None);

        let mut dummy = DummyAccelerator::for_mesh(&cube);
        dummy.set_point_state(&Point3::new(10.0, 0.0, 0.0));
        assert_eq!(candidates(&mut dummy).count(), cube.facets.len());
    }

    #[test]
    fn test_flat_mesh_does_not_divide_by_zero() {
        let positions = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = Mesh::from_buffers(&positions, None, None, &[0, 1, 2]).unwrap();
        let mut sweep = Sweep::new(&mesh);
        sweep.set_facet_state(&mesh, 0);
        assert_eq!(candidates(&mut sweep).collect::<Vec<_>>(), vec![0]);
    }
}
