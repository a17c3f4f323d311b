//! Mesh booleans by shadow counting.
//!
//! The evaluator never classifies against planes. Every point of one mesh is
//! classified against the other mesh by the winding number of the `+z` ray
//! leaving it, and the boundary of the result is assembled from three kinds
//! of segments:
//!
//! 1. pieces of facet-facet intersection lines,
//! 2. retained pieces of A's edges,
//! 3. retained pieces of B's edges.
//!
//! Facets of the result are the A and B facets those segments came from,
//! with their loops left for the triangulator to close.

use crate::accelerator::{DummyAccelerator, SpatialAccelerator, candidates};
use crate::errors::FractureError;
use crate::float_types::{Real, VOLUME_EPSILON, parry3d::bounding_volume::Aabb};
use crate::mesh::{Edge, EdgeWithParent, Facet, Mesh, Vertex};
use nalgebra::{Point3, Vector3};

pub(crate) mod shadowing;

use shadowing::{Crossing, edge_facet_intersection12, edge_facet_intersection21, shadowing02, shadowing20, should_swap};

/// Linear combination of the two winding numbers deciding what is kept.
///
/// A point of A is retained iff `ca + ci·w(B) > 0`, a point of B iff
/// `cb + ci·w(A) > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanConfiguration {
    pub ca: i32,
    pub cb: i32,
    pub ci: i32,
}

impl BooleanConfiguration {
    pub const fn intersection() -> Self {
        BooleanConfiguration { ca: 0, cb: 0, ci: 1 }
    }

    pub const fn union() -> Self {
        BooleanConfiguration { ca: 1, cb: 1, ci: -1 }
    }

    /// `A − B`.
    pub const fn difference() -> Self {
        BooleanConfiguration { ca: 1, cb: 0, ci: -1 }
    }

    #[inline]
    const fn inclusion_a(&self, winding: i32) -> i32 {
        self.ca + self.ci * winding
    }

    #[inline]
    const fn inclusion_b(&self, winding: i32) -> i32 {
        self.cb + self.ci * winding
    }

    #[inline]
    const fn inclusion_edge_face(&self, status: i32) -> i32 {
        self.ci * status
    }
}

/// An edge/facet crossing remembered for the retained-parts pass.
#[derive(Debug, Clone, Copy)]
struct EdgeFacetIntersection {
    edge: usize,
    status: i32,
    point: Vertex,
}

/// Open segment ends gathered while walking one facet.
///
/// `inclusion > 0` adds ends, `< 0` adds starts; each entry is repeated
/// `|inclusion|` times and the composite points track the mean travel
/// direction so that a batch can be ordered along it.
#[derive(Debug, Default)]
struct RetainedEnds<T> {
    starts: Vec<T>,
    ends: Vec<T>,
    composite_start: Vector3<Real>,
    composite_end: Vector3<Real>,
}

impl<T: Copy> RetainedEnds<T> {
    fn clear(&mut self) {
        self.starts.clear();
        self.ends.clear();
        self.reset_direction();
    }

    fn reset_direction(&mut self) {
        self.composite_start = Vector3::zeros();
        self.composite_end = Vector3::zeros();
    }

    fn push(&mut self, inclusion: i32, item: T, pos: &Point3<Real>) {
        let count = inclusion.unsigned_abs() as usize;
        if inclusion > 0 {
            self.ends.extend(std::iter::repeat_n(item, count));
            self.composite_end += pos.coords * count as Real;
        } else if inclusion < 0 {
            self.starts.extend(std::iter::repeat_n(item, count));
            self.composite_start += pos.coords * count as Real;
        }
    }

    fn is_balanced(&self) -> bool {
        self.starts.len() == self.ends.len()
    }

    /// Order entries from `from` on along the composite direction.
    fn sort_from(&mut self, from: usize, key: impl Fn(&T) -> Point3<Real>) {
        if self.ends.len().saturating_sub(from) <= 1 {
            return;
        }
        let direction = self.composite_end - self.composite_start;
        let along = |item: &T| key(item).coords.dot(&direction);
        self.starts[from..].sort_by(|a, b| along(a).total_cmp(&along(b)));
        self.ends[from..].sort_by(|a, b| along(a).total_cmp(&along(b)));
    }
}

/// Evaluates `A ∘ B` for a [`BooleanConfiguration`] and accumulates the
/// resulting boundary until [`BooleanEvaluator::create_new_mesh`] is called.
///
/// The evaluator can be reused; every `perform_*` call starts from a clean
/// state.
#[derive(Debug, Default)]
pub struct BooleanEvaluator {
    vertices: Vec<Vertex>,
    edges: Vec<EdgeWithParent>,
    /// Tags of A's facets followed by B's, indexed by edge parent.
    facet_tags: Vec<Facet>,
    intersections12: Vec<Vec<EdgeFacetIntersection>>,
    intersections21: Vec<Vec<EdgeFacetIntersection>>,
}

impl BooleanEvaluator {
    pub fn new() -> Self {
        BooleanEvaluator::default()
    }

    /// Clear every accumulated result.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.facet_tags.clear();
        self.intersections12.clear();
        self.intersections21.clear();
    }

    fn start(&mut self, mesh_a: &Mesh, mesh_b: &Mesh) {
        self.reset();
        self.facet_tags.extend_from_slice(&mesh_a.facets);
        self.facet_tags.extend_from_slice(&mesh_b.facets);
        self.intersections12.resize(mesh_a.facets.len(), Vec::new());
        self.intersections21.resize(mesh_b.facets.len(), Vec::new());
    }

    fn add_vertex(&mut self, vertex: Vertex) -> usize {
        self.vertices.push(vertex);
        self.vertices.len() - 1
    }

    fn add_edge(&mut self, s: Vertex, e: Vertex, parent: usize) {
        let s = self.add_vertex(s);
        let e = self.add_vertex(e);
        self.edges.push(EdgeWithParent::new(s, e, parent));
    }

    /// Full boolean of `mesh_a` and `mesh_b`.
    ///
    /// `accelerator_a` must index `mesh_a` and `accelerator_b` must index
    /// `mesh_b`. On an unbalanced facet the state is cleared and
    /// [`FractureError::UnbalancedBoundary`] is returned.
    pub fn perform_boolean(
        &mut self,
        mesh_a: &Mesh,
        mesh_b: &Mesh,
        accelerator_a: &mut dyn SpatialAccelerator,
        accelerator_b: &mut dyn SpatialAccelerator,
        mode: BooleanConfiguration,
    ) -> Result<(), FractureError> {
        self.start(mesh_a, mesh_b);
        let result = self
            .build_face_face_intersections(mesh_a, mesh_b, accelerator_a, mode)
            .and_then(|_| self.collect_retained_parts_from_a(mesh_a, mesh_b, accelerator_b, mode))
            .and_then(|_| self.collect_retained_parts_from_b(mesh_a, mesh_b, accelerator_a, mode));
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Boolean against a half-space proxy: only facet 0 of `mesh_b` is
    /// intersected and B's own boundary is never retained.
    pub fn perform_fast_cutting(
        &mut self,
        mesh_a: &Mesh,
        mesh_b: &Mesh,
        accelerator_b: &mut dyn SpatialAccelerator,
        mode: BooleanConfiguration,
    ) -> Result<(), FractureError> {
        self.start(mesh_a, mesh_b);
        let result = self
            .build_fast_face_face_intersection(mesh_a, mesh_b, mode)
            .and_then(|_| self.collect_retained_parts_from_a(mesh_a, mesh_b, accelerator_b, mode));
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Edge-of-A vs facet-of-B crossing, with A's edge oriented
    /// lexicographically.
    fn crossing12(mesh_a: &Mesh, edge: &Edge, mesh_b: &Mesh, facet_b: &[Edge]) -> Option<Crossing> {
        let (s, e) = (&mesh_a.vertices[edge.s], &mesh_a.vertices[edge.e]);
        if should_swap(&e.pos, &s.pos) {
            edge_facet_intersection12(e, s, &mesh_b.vertices, facet_b).map(Crossing::negated)
        } else {
            edge_facet_intersection12(s, e, &mesh_b.vertices, facet_b)
        }
    }

    fn crossing21(mesh_b: &Mesh, edge: &Edge, mesh_a: &Mesh, facet_a: &[Edge]) -> Option<Crossing> {
        let (s, e) = (&mesh_b.vertices[edge.s], &mesh_b.vertices[edge.e]);
        if should_swap(&e.pos, &s.pos) {
            edge_facet_intersection21(e, s, &mesh_a.vertices, facet_a).map(Crossing::negated)
        } else {
            edge_facet_intersection21(s, e, &mesh_a.vertices, facet_a)
        }
    }

    /// Walk the edges of `facet_a` against `facet_b`, recording crossings.
    fn intersect_a_edges(
        &mut self,
        mesh_a: &Mesh,
        facet_a: usize,
        mesh_b: &Mesh,
        facet_b: usize,
        mode: BooleanConfiguration,
        retained: &mut RetainedEnds<(Vertex, Vertex)>,
    ) {
        let b_edges = mesh_b.facet_edges(facet_b);
        for (i, edge) in mesh_a.facet_edges(facet_a).iter().enumerate() {
            let Some(crossing) = Self::crossing12(mesh_a, edge, mesh_b, b_edges) else {
                continue;
            };
            let inclusion = -mode.inclusion_edge_face(crossing.status);
            if inclusion != 0 {
                retained.push(inclusion, (crossing.on_a, crossing.on_b), &crossing.on_a.pos);
                self.intersections12[facet_a].push(EdgeFacetIntersection {
                    edge: i,
                    status: crossing.status,
                    point: crossing.on_a,
                });
            }
        }
    }

    fn intersect_b_edges(
        &mut self,
        mesh_a: &Mesh,
        facet_a: usize,
        mesh_b: &Mesh,
        facet_b: usize,
        mode: BooleanConfiguration,
        retained: &mut RetainedEnds<(Vertex, Vertex)>,
    ) {
        let a_edges = mesh_a.facet_edges(facet_a);
        for (i, edge) in mesh_b.facet_edges(facet_b).iter().enumerate() {
            let Some(crossing) = Self::crossing21(mesh_b, edge, mesh_a, a_edges) else {
                continue;
            };
            let inclusion = mode.inclusion_edge_face(crossing.status);
            if inclusion != 0 {
                retained.push(inclusion, (crossing.on_a, crossing.on_b), &crossing.on_b.pos);
                self.intersections21[facet_b].push(EdgeFacetIntersection {
                    edge: i,
                    status: crossing.status,
                    point: crossing.on_b,
                });
            }
        }
    }

    /// Turn balanced starts/ends of one facet pair into one segment on each
    /// facet. The segment on B runs the other way.
    fn emit_face_face_segments(
        &mut self,
        retained: &mut RetainedEnds<(Vertex, Vertex)>,
        facet_a: usize,
        facet_b: usize,
        b_offset: usize,
    ) -> Result<(), FractureError> {
        if !retained.is_balanced() {
            return Err(FractureError::UnbalancedBoundary { facet: facet_a });
        }
        retained.sort_from(0, |(on_a, _)| on_a.pos);
        for k in 0..retained.starts.len() {
            let (start, end) = (retained.starts[k], retained.ends[k]);
            self.add_edge(start.0, end.0, facet_a);
            self.add_edge(end.1, start.1, facet_b + b_offset);
        }
        Ok(())
    }

    fn build_face_face_intersections(
        &mut self,
        mesh_a: &Mesh,
        mesh_b: &Mesh,
        accelerator_a: &mut dyn SpatialAccelerator,
        mode: BooleanConfiguration,
    ) -> Result<(), FractureError> {
        let mut retained = RetainedEnds::default();
        for facet_b in 0..mesh_b.facets.len() {
            accelerator_a.set_facet_state(mesh_b, facet_b);
            for facet_a in candidates(accelerator_a) {
                retained.clear();
                self.intersect_a_edges(mesh_a, facet_a, mesh_b, facet_b, mode, &mut retained);
                self.intersect_b_edges(mesh_a, facet_a, mesh_b, facet_b, mode, &mut retained);
                self.emit_face_face_segments(&mut retained, facet_a, facet_b, mesh_a.facets.len())?;
            }
        }
        Ok(())
    }

    fn build_fast_face_face_intersection(
        &mut self,
        mesh_a: &Mesh,
        mesh_b: &Mesh,
        mode: BooleanConfiguration,
    ) -> Result<(), FractureError> {
        if mesh_b.facets.is_empty() {
            return Ok(());
        }
        let mut retained = RetainedEnds::default();
        for facet_a in 0..mesh_a.facets.len() {
            retained.clear();
            self.intersect_a_edges(mesh_a, facet_a, mesh_b, 0, mode, &mut retained);
            self.emit_face_face_segments(&mut retained, facet_a, 0, mesh_a.facets.len())?;
        }
        Ok(())
    }

    /// Retained boundary of one mesh's facets against the other mesh.
    ///
    /// `winding` classifies an endpoint; it is only consulted when the point
    /// lies inside the other mesh's box.
    #[allow(clippy::too_many_arguments)]
    fn collect_retained_parts(
        &mut self,
        mesh: &Mesh,
        other_box: &Aabb,
        parent_offset: usize,
        inclusion: impl Fn(i32) -> i32,
        edge_face_inclusion: impl Fn(i32) -> i32,
        intersections: &[Vec<EdgeFacetIntersection>],
        mut winding: impl FnMut(&Point3<Real>) -> i32,
    ) -> Result<(), FractureError> {
        let mut classify = |p: &Point3<Real>| {
            if other_box.contains_local_point(p) { winding(p) } else { 0 }
        };
        let mut retained: RetainedEnds<Vertex> = RetainedEnds::default();
        for (facet_id, facet) in mesh.facets.iter().enumerate() {
            retained.clear();
            for (i, edge) in mesh.edges[facet.edge_range()].iter().enumerate() {
                retained.reset_direction();
                let last = retained.ends.len();
                let (s, e) = (mesh.vertices[edge.s], mesh.vertices[edge.e]);

                retained.push(-inclusion(classify(&s.pos)), s, &s.pos);
                retained.push(inclusion(classify(&e.pos)), e, &e.pos);
                for hit in intersections[facet_id].iter().filter(|hit| hit.edge == i) {
                    retained.push(edge_face_inclusion(hit.status), hit.point, &hit.point.pos);
                }

                if !retained.is_balanced() {
                    return Err(FractureError::UnbalancedBoundary { facet: facet_id + parent_offset });
                }
                retained.sort_from(last, |v| v.pos);
            }
            for k in 0..retained.starts.len() {
                self.add_edge(retained.starts[k], retained.ends[k], facet_id + parent_offset);
            }
        }
        Ok(())
    }

    fn collect_retained_parts_from_a(
        &mut self,
        mesh_a: &Mesh,
        mesh_b: &Mesh,
        accelerator_b: &mut dyn SpatialAccelerator,
        mode: BooleanConfiguration,
    ) -> Result<(), FractureError> {
        let intersections = std::mem::take(&mut self.intersections12);
        let result = self.collect_retained_parts(
            mesh_a,
            &mesh_b.bounding_box(),
            0,
            |w| mode.inclusion_a(w),
            |s| mode.inclusion_edge_face(s),
            &intersections,
            |p| vertex_mesh_status03(p, mesh_b, accelerator_b),
        );
        self.intersections12 = intersections;
        result
    }

    fn collect_retained_parts_from_b(
        &mut self,
        mesh_a: &Mesh,
        mesh_b: &Mesh,
        accelerator_a: &mut dyn SpatialAccelerator,
        mode: BooleanConfiguration,
    ) -> Result<(), FractureError> {
        let intersections = std::mem::take(&mut self.intersections21);
        let result = self.collect_retained_parts(
            mesh_b,
            &mesh_a.bounding_box(),
            mesh_a.facets.len(),
            |w| mode.inclusion_b(w),
            |s| mode.inclusion_edge_face(s),
            &intersections,
            |p| vertex_mesh_status30(p, mesh_a, accelerator_a),
        );
        self.intersections21 = intersections;
        result
    }

    /// Assemble the accumulated boundary into a mesh.
    ///
    /// Edges are grouped by the facet they came from and each group becomes
    /// one facet carrying that facet's material, smoothing group and user
    /// data. Returns `None` when the result is empty, which includes the flat
    /// shells left behind by coincident operands (e.g. `A - A`).
    pub fn create_new_mesh(&self) -> Option<Mesh> {
        if self.edges.is_empty() {
            return None;
        }
        let mut sorted = self.edges.clone();
        sorted.sort_by_key(|edge| edge.parent);

        let mut mesh = Mesh::from_parts(self.vertices.clone(), Vec::with_capacity(sorted.len()), Vec::new());
        for group in sorted.chunk_by(|a, b| a.parent == b.parent) {
            let template = self.facet_tags.get(group[0].parent).copied().unwrap_or_default();
            mesh.push_facet(group.iter().map(|edge| Edge::new(edge.s, edge.e)), &template);
        }

        let extent = mesh.bounding_box().extents().max();
        if mesh.volume() <= VOLUME_EPSILON * extent * extent * extent {
            return None;
        }
        Some(mesh)
    }

    /// Winding number of `point` with respect to `mesh`, non-zero inside.
    ///
    /// `accelerator`, when given, must index `mesh`.
    pub fn is_point_contained_in_mesh(
        mesh: &Mesh,
        point: &Point3<Real>,
        accelerator: Option<&mut dyn SpatialAccelerator>,
    ) -> i32 {
        match accelerator {
            Some(accelerator) => vertex_mesh_status30(point, mesh, accelerator),
            None => vertex_mesh_status30(point, mesh, &mut DummyAccelerator::for_mesh(mesh)),
        }
    }
}

/// Winding of a point of A with respect to `mesh_b`.
fn vertex_mesh_status03(p: &Point3<Real>, mesh_b: &Mesh, accelerator_b: &mut dyn SpatialAccelerator) -> i32 {
    accelerator_b.set_point_state(p);
    candidates(accelerator_b)
        .map(|facet| shadowing02(p, &mesh_b.vertices, mesh_b.facet_edges(facet)).0)
        .sum()
}

/// Winding of a point of B with respect to `mesh_a`.
fn vertex_mesh_status30(p: &Point3<Real>, mesh_a: &Mesh, accelerator_a: &mut dyn SpatialAccelerator) -> i32 {
    accelerator_a.set_point_state(p);
    -candidates(accelerator_a)
        .map(|facet| shadowing20(p, &mesh_a.vertices, mesh_a.facet_edges(facet)).0)
        .sum::<i32>()
}

/// One-shot boolean with exhaustive accelerators.
pub fn boolean(mesh_a: &Mesh, mesh_b: &Mesh, mode: BooleanConfiguration) -> Result<Option<Mesh>, FractureError> {
    let mut evaluator = BooleanEvaluator::new();
    evaluator.perform_boolean(
        mesh_a,
        mesh_b,
        &mut DummyAccelerator::for_mesh(mesh_a),
        &mut DummyAccelerator::for_mesh(mesh_b),
        mode,
    )?;
    Ok(evaluator.create_new_mesh())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accelerator::{BBoxGrid, Sweep};
    use crate::mesh::shapes::{cuboid, cutting_box};

    fn unit_cube() -> Mesh {
        cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0))
    }

    fn shifted_cube() -> Mesh {
        cuboid(&Point3::new(0.5, 0.25, 0.125), &Point3::new(1.5, 1.25, 1.125))
    }

    const OVERLAP: Real = 0.5 * 0.75 * 0.875;

    #[test]
    fn test_intersection_volume() {
        let result = boolean(&unit_cube(), &shifted_cube(), BooleanConfiguration::intersection())
            .unwrap()
            .expect("cubes overlap");
        println!("intersection volume {}", result.volume());
        assert!((result.volume() - OVERLAP).abs() < 1e-6);
        let bb = result.bounding_box();
        assert!((bb.mins - Point3::new(0.5, 0.25, 0.125)).norm() < 1e-6);
        assert!((bb.maxs - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_union_and_difference_volumes() {
        let a = unit_cube();
        let b = shifted_cube();
        let union = boolean(&a, &b, BooleanConfiguration::union()).unwrap().unwrap();
        assert!((union.volume() - (2.0 - OVERLAP)).abs() < 1e-6, "union {}", union.volume());
        let difference = boolean(&a, &b, BooleanConfiguration::difference()).unwrap().unwrap();
        assert!(
            (difference.volume() - (1.0 - OVERLAP)).abs() < 1e-6,
            "difference {}",
            difference.volume()
        );
    }

    #[test]
    fn test_accelerators_agree_with_exhaustive_search() {
        let a = unit_cube();
        let b = shifted_cube();
        let mut evaluator = BooleanEvaluator::new();
        evaluator
            .perform_boolean(
                &a,
                &b,
                &mut BBoxGrid::new(&a, 4),
                &mut Sweep::new(&b),
                BooleanConfiguration::intersection(),
            )
            .unwrap();
        let accelerated = evaluator.create_new_mesh().unwrap();
        assert!((accelerated.volume() - OVERLAP).abs() < 1e-6);
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = unit_cube();
        let far = cuboid(&Point3::new(3.0, 3.0, 3.0), &Point3::new(4.0, 4.0, 4.0));
        assert!(boolean(&a, &far, BooleanConfiguration::intersection()).unwrap().is_none());
    }

    #[test]
    fn test_result_keeps_facet_tags() {
        let mut a = unit_cube();
        a.set_material_id(7);
        let mut b = shifted_cube();
        b.set_material_id(9);
        b.set_user_data(-3);
        let result = boolean(&a, &b, BooleanConfiguration::intersection()).unwrap().unwrap();
        assert!(result.facets.iter().any(|f| f.material_id == 7 && f.user_data == 0));
        assert!(result.facets.iter().any(|f| f.material_id == 9 && f.user_data == -3));
    }

    #[test]
    fn test_fast_cutting_keeps_normal_side() {
        let cube = cuboid(&Point3::new(-0.5, -0.5, -0.5), &Point3::new(0.5, 0.5, 0.5));
        let cutter = cutting_box(&Point3::new(0.0, 0.0, 0.1), &Vector3::z(), 2.0, 5);
        let mut evaluator = BooleanEvaluator::new();
        evaluator
            .perform_fast_cutting(
                &cube,
                &cutter,
                &mut DummyAccelerator::for_mesh(&cutter),
                BooleanConfiguration::intersection(),
            )
            .unwrap();
        let upper = evaluator.create_new_mesh().unwrap();
        assert!((upper.volume() - 0.4).abs() < 1e-6, "volume {}", upper.volume());
        assert!(upper.bounding_box().mins.z > 0.09);
        assert!(upper.facets.iter().any(|f| f.user_data == 5));
    }

    #[test]
    fn test_point_containment() {
        let cube = unit_cube();
        assert_ne!(BooleanEvaluator::is_point_contained_in_mesh(&cube, &Point3::new(0.5, 0.5, 0.5), None), 0);
        assert_eq!(BooleanEvaluator::is_point_contained_in_mesh(&cube, &Point3::new(2.0, 0.5, 0.5), None), 0);
        assert_eq!(BooleanEvaluator::is_point_contained_in_mesh(&cube, &Point3::new(0.5, 0.5, -1.0), None), 0);
        let mut grid = BBoxGrid::new(&cube, 3);
        assert_ne!(
            BooleanEvaluator::is_point_contained_in_mesh(&cube, &Point3::new(0.3, 0.6, 0.2), Some(&mut grid)),
            0
        );
    }
}
