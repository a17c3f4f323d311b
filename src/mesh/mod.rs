//! `Mesh` struct: vertex, edge and facet storage with a cached bounding box.

use crate::errors::FractureError;
use crate::float_types::{
    BBOX_EPSILON, Real,
    parry3d::bounding_volume::Aabb,
};
use nalgebra::{Point3, Vector2, Vector3};
use std::sync::OnceLock;

pub mod comparators;
pub mod facet;
pub mod manifold;
pub mod projection;
pub mod shapes;
pub mod vertex;

pub use facet::{
    Edge, EdgeWithParent, Facet, MATERIAL_INTERIOR, NOT_VALID_VERTEX,
    SMOOTHING_GROUP_INTERIOR, Triangle, TriangleIndexed,
};
pub use vertex::Vertex;

/// A polygonal mesh.
///
/// Facets reference contiguous runs of `edges`, edges reference `vertices`.
/// A facet's run may contain several closed loops (outer boundary and holes).
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub facets: Vec<Facet>,

    /// Lazily calculated AABB that spans `vertices`.
    pub bounding_box: OnceLock<Aabb>,
}

impl Mesh {
    pub fn new() -> Self {
        Mesh::default()
    }

    /// Build a Mesh from existing vertex, edge and facet arrays
    ///
    /// Fails when an edge references a missing vertex or a facet's edge run
    /// leaves the edge array.
    pub fn from_raw(vertices: Vec<Vertex>, edges: Vec<Edge>, facets: Vec<Facet>) -> Result<Self, FractureError> {
        let mesh = Mesh::from_parts(vertices, edges, facets);
        mesh.check_indices()?;
        Ok(mesh)
    }

    /// Same as [`Mesh::from_raw`] for arrays built consistent.
    pub(crate) fn from_parts(vertices: Vec<Vertex>, edges: Vec<Edge>, facets: Vec<Facet>) -> Self {
        Mesh {
            vertices,
            edges,
            facets,
            bounding_box: OnceLock::new(),
        }
    }

    /// Checks that every edge references existing vertices and every facet's
    /// edge run lies inside `edges`.
    pub fn check_indices(&self) -> Result<(), FractureError> {
        if let Some((index, edge)) = self
            .edges
            .iter()
            .enumerate()
            .find(|(_, e)| e.s >= self.vertices.len() || e.e >= self.vertices.len())
        {
            return Err(FractureError::InvalidMesh(format!(
                "edge {} ({} -> {}) is out of range (vertices.len = {})",
                index,
                edge.s,
                edge.e,
                self.vertices.len()
            )));
        }
        if let Some((index, facet)) = self.facets.iter().enumerate().find(|(_, f)| {
            f.first_edge
                .checked_add(f.edge_count)
                .is_none_or(|end| end > self.edges.len())
        }) {
            return Err(FractureError::InvalidMesh(format!(
                "facet {} edges {}..+{} are out of range (edges.len = {})",
                index,
                facet.first_edge,
                facet.edge_count,
                self.edges.len()
            )));
        }
        Ok(())
    }

    /// Build a triangle mesh from flat buffers.
    ///
    /// Every index triplet becomes one facet with edges `a→b`, `b→c`, `c→a`,
    /// material 0 and smoothing group -1. Missing normals or texture
    /// coordinates default to zero.
    pub fn from_buffers(
        positions: &[Point3<Real>],
        normals: Option<&[Vector3<Real>]>,
        uvs: Option<&[Vector2<Real>]>,
        indices: &[u32],
    ) -> Result<Self, FractureError> {
        if indices.len() % 3 != 0 {
            return Err(FractureError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(FractureError::InvalidMesh(format!(
                "index {} is out of range (positions.len = {})",
                bad,
                positions.len()
            )));
        }

        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let normal = normals
                    .and_then(|n| n.get(i).copied())
                    .unwrap_or_else(Vector3::zeros);
                let uv = uvs.and_then(|u| u.get(i).copied()).unwrap_or_else(Vector2::zeros);
                Vertex::new(*p, normal, uv)
            })
            .collect();

        let mut edges = Vec::with_capacity(indices.len());
        let mut facets = Vec::with_capacity(indices.len() / 3);
        for tri in indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            facets.push(Facet::new(edges.len(), 3, 0, 0, -1));
            edges.push(Edge::new(a, b));
            edges.push(Edge::new(b, c));
            edges.push(Edge::new(c, a));
        }
        Ok(Mesh::from_parts(vertices, edges, facets))
    }

    /// Build a mesh with one facet per triangle, without sharing vertices.
    pub fn from_triangles(triangles: &[Triangle]) -> Self {
        let mut mesh = Mesh::new();
        for t in triangles {
            let base = mesh.vertices.len();
            mesh.vertices.extend_from_slice(&[t.a, t.b, t.c]);
            mesh.facets.push(Facet::new(
                mesh.edges.len(),
                3,
                t.material_id,
                t.user_data,
                t.smoothing_group,
            ));
            mesh.edges.push(Edge::new(base, base + 1));
            mesh.edges.push(Edge::new(base + 1, base + 2));
            mesh.edges.push(Edge::new(base + 2, base));
        }
        mesh
    }

    /// A mesh is usable when it has vertices, edges and facets.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.edges.is_empty() && !self.facets.is_empty()
    }

    /// Returns an [`Aabb`] containing every vertex.
    ///
    /// An empty mesh yields an inverted (invalid) box.
    pub fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            if self.vertices.is_empty() {
                Aabb::new_invalid()
            } else {
                Aabb::from_points(self.vertices.iter().map(|v| &v.pos))
            }
        })
    }

    /// Invalidates object's cached bounding box.
    pub fn invalidate_bounding_box(&mut self) {
        self.bounding_box = OnceLock::new();
    }

    /// Edges of facet `index`.
    pub fn facet_edges(&self, index: usize) -> &[Edge] {
        &self.edges[self.facets[index].edge_range()]
    }

    /// Box spanning the start vertices of facet `index`.
    pub fn facet_bounding_box(&self, index: usize) -> Aabb {
        let mut bb = Aabb::new_invalid();
        for edge in self.facet_edges(index) {
            bb.take_point(self.vertices[edge.s].pos);
        }
        bb
    }

    /// Area-weighted normal of facet `index` (length is twice the area).
    pub fn facet_normal(&self, index: usize) -> Vector3<Real> {
        let edges = self.facet_edges(index);
        let Some(first) = edges.first() else {
            return Vector3::zeros();
        };
        let origin = self.vertices[first.s].pos;
        edges.iter().fold(Vector3::zeros(), |acc, edge| {
            let a = self.vertices[edge.s].pos - origin;
            let b = self.vertices[edge.e].pos - origin;
            acc + a.cross(&b)
        })
    }

    /// Enclosed volume of a closed mesh.
    pub fn volume(&self) -> Real {
        let mut volume = 0.0;
        for facet in &self.facets {
            let edges = &self.edges[facet.edge_range()];
            let Some(first) = edges.first() else {
                continue;
            };
            let origin = self.vertices[first.s].pos.coords;
            for edge in edges {
                let s = self.vertices[edge.s].pos.coords;
                let e = self.vertices[edge.e].pos.coords;
                volume += origin.dot(&s.cross(&e));
            }
        }
        (volume / 6.0).abs()
    }

    /// Replace `old_material` with `new_material` on every facet that uses it.
    pub fn replace_material_id(&mut self, old_material: i32, new_material: i32) {
        for facet in self.facets.iter_mut().filter(|f| f.material_id == old_material) {
            facet.material_id = new_material;
        }
    }

    pub fn set_material_id(&mut self, material_id: i32) {
        for facet in &mut self.facets {
            facet.material_id = material_id;
        }
    }

    pub fn set_smoothing_group(&mut self, smoothing_group: i32) {
        for facet in &mut self.facets {
            facet.smoothing_group = smoothing_group;
        }
    }

    pub fn set_user_data(&mut self, user_data: i64) {
        for facet in &mut self.facets {
            facet.user_data = user_data;
        }
    }

    /// Apply `f` to every vertex position.
    pub fn map_positions(&mut self, f: impl Fn(&Point3<Real>) -> Point3<Real>) {
        for v in &mut self.vertices {
            v.pos = f(&v.pos);
        }
        self.invalidate_bounding_box();
    }

    /// Append `other`'s geometry, keeping its facets' tags.
    pub fn append(&mut self, other: &Mesh) {
        let vertex_offset = self.vertices.len();
        let edge_offset = self.edges.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.edges.extend(
            other
                .edges
                .iter()
                .map(|e| Edge::new(e.s + vertex_offset, e.e + vertex_offset)),
        );
        self.facets.extend(other.facets.iter().map(|f| Facet {
            first_edge: f.first_edge + edge_offset,
            ..*f
        }));
        self.invalidate_bounding_box();
    }

    /// Append one facet built from `edges`, copying tags from `template`.
    pub fn push_facet(&mut self, edges: impl IntoIterator<Item = Edge>, template: &Facet) {
        let first_edge = self.edges.len();
        self.edges.extend(edges);
        self.facets.push(Facet {
            first_edge,
            edge_count: self.edges.len() - first_edge,
            ..*template
        });
    }
}

/// Box overlap with `BBOX_EPSILON` of slack on every axis.
pub fn weak_bounding_box_intersection(a: &Aabb, b: &Aabb) -> bool {
    (0..3).all(|axis| {
        a.maxs[axis] >= b.mins[axis] - BBOX_EPSILON && a.mins[axis] <= b.maxs[axis] + BBOX_EPSILON
    })
}

/// `true` when `p` lies in `bb` grown by `BBOX_EPSILON`.
pub fn point_in_bounding_box(p: &Point3<Real>, bb: &Aabb) -> bool {
    (0..3).all(|axis| p[axis] >= bb.mins[axis] - BBOX_EPSILON && p[axis] <= bb.maxs[axis] + BBOX_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Mesh {
        let positions = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let indices = [0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3];
        Mesh::from_buffers(&positions, None, None, &indices).unwrap()
    }

    #[test]
    fn test_from_buffers_layout() {
        let mesh = tetrahedron();
        assert!(mesh.is_valid());
        assert_eq!(mesh.facets.len(), 4);
        assert_eq!(mesh.edges.len(), 12);
        assert_eq!(mesh.facets[1].first_edge, 3);
        assert_eq!(mesh.facets[1].smoothing_group, -1);
        assert_eq!(mesh.facet_edges(1), &[Edge::new(0, 1), Edge::new(1, 3), Edge::new(3, 0)]);
        assert_eq!(mesh.vertices[2].normal, Vector3::zeros());
    }

    #[test]
    fn test_from_buffers_rejects_bad_indices() {
        let positions = [Point3::origin(); 3];
        assert!(Mesh::from_buffers(&positions, None, None, &[0, 1]).is_err());
        assert!(Mesh::from_buffers(&positions, None, None, &[0, 1, 3]).is_err());
    }

    #[test]
    fn test_from_raw_rejects_bad_indices() {
        let vertices = vec![Vertex::default(); 3];
        let triangle = || vec![Edge::new(0, 1), Edge::new(1, 2), Edge::new(2, 0)];

        let ok = Mesh::from_raw(vertices.clone(), triangle(), vec![Facet::new(0, 3, 0, 0, -1)]);
        assert!(ok.is_ok_and(|m| m.is_valid()));

        let mut edges = triangle();
        edges[1] = Edge::new(1, 7);
        let dangling = Mesh::from_raw(vertices.clone(), edges, vec![Facet::new(0, 3, 0, 0, -1)]);
        assert!(matches!(dangling, Err(FractureError::InvalidMesh(_))));

        let overrun = Mesh::from_raw(vertices, vec![Edge::new(0, 1)], vec![Facet::new(0, 5, 0, 0, -1)]);
        assert!(matches!(overrun, Err(FractureError::InvalidMesh(_))));
    }

    #[test]
    fn test_volume_and_bounds() {
        let mesh = tetrahedron();
        assert!((mesh.volume() - 1.0 / 6.0).abs() < 1e-12);
        let bb = mesh.bounding_box();
        assert_eq!(bb.mins, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bb.maxs, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_polygon_facet_volume_matches_triangles() {
        let cube = shapes::big_box(&Point3::origin(), 0.5);
        assert!((cube.volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_map_positions_invalidates_bounds() {
        let mut mesh = tetrahedron();
        let _ = mesh.bounding_box();
        mesh.map_positions(|p| p * 2.0);
        assert_eq!(mesh.bounding_box().maxs, Point3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_append_offsets_indices() {
        let mut a = tetrahedron();
        let b = tetrahedron();
        a.append(&b);
        assert_eq!(a.vertices.len(), 8);
        assert_eq!(a.facets[4].first_edge, 12);
        assert_eq!(a.edges[12], Edge::new(4, 6));
        assert!((a.volume() - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_weak_intersection_touching_boxes() {
        let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(Point3::new(1.1, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(weak_bounding_box_intersection(&a, &b));
        assert!(!weak_bounding_box_intersection(&a, &c));
    }
}
