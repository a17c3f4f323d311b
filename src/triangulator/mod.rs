//! Polygon mesh to triangle mesh.
//!
//! Facets coming out of the boolean evaluator are bags of edges: several
//! loops, unordered, with vertices duplicated per segment. The triangulator
//! welds them, rebuilds the loops, bridges holes into their enclosing loop
//! and ear clips the result.

use crate::float_types::Real;
use crate::mesh::comparators::{compare_vertices, positioned_mapping, weld};
use crate::mesh::{Edge, EdgeWithParent, Mesh, Triangle, TriangleIndexed, Vertex};
use hashbrown::HashMap;
use nalgebra::Vector3;

pub(crate) mod ear_clipping;

use ear_clipping::{FlatFacet, ear_clip, encloses, loop_normal, outer_polygon, serialize_loops, unite_polygons};

/// Loop of a facet with its signed doubled area.
#[derive(Debug, Clone)]
struct LoopInfo {
    area: Real,
    index: usize,
    used: bool,
}

/// Triangulates meshes and keeps the welded topology around for the
/// remesher and the island detector.
#[derive(Debug, Clone, Default)]
pub struct Triangulator {
    vertices: Vec<Vertex>,
    base_mapping: Vec<usize>,
    positioned_mapping: Vec<usize>,
    base_edges: Vec<EdgeWithParent>,
    indexed_triangles: Vec<TriangleIndexed>,
    triangles: Vec<Triangle>,
}

impl Triangulator {
    pub fn new() -> Self {
        Triangulator::default()
    }

    pub fn reset(&mut self) {
        self.vertices.clear();
        self.base_mapping.clear();
        self.positioned_mapping.clear();
        self.base_edges.clear();
        self.indexed_triangles.clear();
        self.triangles.clear();
    }

    /// Triangulate every facet of `mesh`. An invalid mesh yields no triangles.
    pub fn triangulate(&mut self, mesh: &Mesh) {
        self.reset();
        if !mesh.is_valid() {
            return;
        }
        self.prepare(mesh);

        let base_edges = std::mem::take(&mut self.base_edges);
        for group in base_edges.chunk_by(|a, b| a.parent == b.parent) {
            let edges: Vec<Edge> = group.iter().map(|e| Edge::new(e.s, e.e)).collect();
            let facet = &mesh.facets[group[0].parent];
            let first = self.indexed_triangles.len();
            self.build_polygon_and_triangulate(&edges);
            for triangle in &mut self.indexed_triangles[first..] {
                *triangle = triangle.with_tags(facet);
            }
        }
        self.base_edges = base_edges;

        self.triangles = self
            .indexed_triangles
            .iter()
            .filter(|t| t.is_valid())
            .map(|t| Triangle {
                user_data: t.user_data,
                material_id: t.material_id,
                smoothing_group: t.smoothing_group,
                ..Triangle::new(self.vertices[t.ea], self.vertices[t.eb], self.vertices[t.ec])
            })
            .collect();
        self.positioned_mapping = positioned_mapping(&self.vertices);
    }

    /// Weld vertices and collect per-facet edges. An edge and its reverse
    /// inside the same facet cancel out; degenerate edges are dropped.
    fn prepare(&mut self, mesh: &Mesh) {
        let (vertices, mapping) = weld(&mesh.vertices, compare_vertices);
        self.vertices = vertices;
        self.base_mapping = mapping;

        let mut slots: HashMap<EdgeWithParent, usize> = HashMap::new();
        let mut edges: Vec<Option<EdgeWithParent>> = Vec::new();
        for (facet_index, facet) in mesh.facets.iter().enumerate() {
            for edge in &mesh.edges[facet.edge_range()] {
                let (s, e) = (self.base_mapping[edge.s], self.base_mapping[edge.e]);
                if s == e {
                    continue;
                }
                let candidate = EdgeWithParent::new(s, e, facet_index);
                match slots.get(&EdgeWithParent::new(e, s, facet_index)) {
                    Some(&slot) => {
                        edges[slot] = match edges[slot] {
                            Some(_) => None,
                            None => Some(candidate),
                        };
                    },
                    None => {
                        slots.insert(candidate, edges.len());
                        edges.push(Some(candidate));
                    },
                }
            }
        }
        self.base_edges = edges.into_iter().flatten().collect();
    }

    fn build_polygon_and_triangulate(&mut self, edges: &[Edge]) {
        let mut loops = serialize_loops(edges);
        let mut infos: Vec<LoopInfo> = Vec::with_capacity(loops.len());
        let mut normals: Vec<Vector3<Real>> = Vec::with_capacity(loops.len());
        let mut facet_normal = Vector3::zeros();
        for (index, polygon) in loops.iter().enumerate() {
            let normal = loop_normal(&self.vertices, polygon);
            facet_normal += normal;
            normals.push(normal);
            infos.push(LoopInfo {
                area: normal.norm(),
                index,
                used: false,
            });
        }
        // loops winding against the facet are holes
        for info in &mut infos {
            if facet_normal.dot(&normals[info.index]) < 0.0 {
                info.area = -info.area;
            }
        }
        infos.sort_by(|a, b| a.area.total_cmp(&b.area));

        let flat = FlatFacet::new(&self.vertices, &facet_normal);
        for outer in 0..infos.len() {
            if infos[outer].area < 0.0 {
                continue;
            }
            let base = infos[outer].index;
            let boundary = outer_polygon(&flat, &loops[base]);
            for hole in 0..infos.len() {
                if infos[hole].area >= 0.0 || infos[hole].used || infos[hole].area.abs() > infos[outer].area {
                    continue;
                }
                let hole_loop = &loops[infos[hole].index];
                if !encloses(&flat, &boundary, hole_loop) {
                    continue;
                }
                let hole_loop = hole_loop.clone();
                if unite_polygons(&mut loops[base], &hole_loop, &flat) {
                    infos[hole].used = true;
                }
            }
            let polygon = std::mem::take(&mut loops[base]);
            self.indexed_triangles
                .extend(ear_clip(polygon, &flat).into_iter().map(|[a, b, c]| TriangleIndexed::new(a, b, c)));
        }
    }

    /// Triangles with vertex records and facet tags.
    pub fn base_mesh_triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Triangles indexing [`Triangulator::vertices`].
    pub fn base_mesh_indexed_triangles(&self) -> &[TriangleIndexed] {
        &self.indexed_triangles
    }

    /// Welded vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Welded per-facet edges that survived cancellation.
    pub fn base_mesh_edges(&self) -> &[EdgeWithParent] {
        &self.base_edges
    }

    /// Input vertex index → welded vertex index.
    pub fn base_mapping(&self) -> &[usize] {
        &self.base_mapping
    }

    /// Welded vertex index → first welded vertex with the same position.
    pub fn positioned_mapping(&self) -> &[usize] {
        &self.positioned_mapping
    }

    /// The triangulation as a mesh of independent triangles.
    pub fn to_mesh(&self) -> Mesh {
        Mesh::from_triangles(&self.triangles)
    }
}

/// Total area of a triangle list.
pub fn triangles_area(triangles: &[Triangle]) -> Real {
    triangles.iter().map(Triangle::area).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Facet;
    use crate::mesh::shapes::cuboid;
    use nalgebra::Point3;

    fn square_with_hole() -> Mesh {
        let positions = [
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (0.0, 4.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (3.0, 3.0),
            (3.0, 1.0),
        ];
        let vertices = positions
            .iter()
            .map(|&(x, y)| Vertex::new(Point3::new(x, y, 0.0), Vector3::z(), nalgebra::Vector2::zeros()))
            .collect();
        // shuffled on purpose; loops are rebuilt from the edges
        let edges = vec![
            Edge::new(5, 6),
            Edge::new(0, 1),
            Edge::new(2, 3),
            Edge::new(7, 4),
            Edge::new(1, 2),
            Edge::new(4, 5),
            Edge::new(3, 0),
            Edge::new(6, 7),
        ];
        Mesh::from_raw(vertices, edges, vec![Facet::new(0, 8, 3, 11, 2)]).unwrap()
    }

    #[test]
    fn test_cube_triangulation() {
        let cube = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0));
        let mut triangulator = Triangulator::new();
        triangulator.triangulate(&cube);
        let triangles = triangulator.base_mesh_triangles();
        assert_eq!(triangles.len(), 12);
        assert!((triangles_area(triangles) - 6.0).abs() < 1e-12);
        // winding follows the facets: outward normals
        let mesh = triangulator.to_mesh();
        assert!((mesh.volume() - 1.0).abs() < 1e-12);
        assert!(!mesh.has_open_edges());
        assert_eq!(triangulator.base_mapping().len(), cube.vertices.len());
    }

    #[test]
    fn test_hole_is_bridged() {
        let mesh = square_with_hole();
        let mut triangulator = Triangulator::new();
        triangulator.triangulate(&mesh);
        let triangles = triangulator.base_mesh_triangles();
        assert_eq!(triangles.len(), 8);
        assert!((triangles_area(triangles) - 12.0).abs() < 1e-12);
        for t in triangles {
            assert!(t.normal().z > 0.0);
            assert_eq!((t.material_id, t.user_data, t.smoothing_group), (3, 11, 2));
        }
    }

    #[test]
    fn test_opposite_edges_cancel() {
        let mut mesh = square_with_hole();
        // a slit into the facet and back out again
        mesh.edges.push(Edge::new(0, 4));
        mesh.edges.push(Edge::new(4, 0));
        mesh.facets[0].edge_count = 10;
        let mut triangulator = Triangulator::new();
        triangulator.triangulate(&mesh);
        assert_eq!(triangulator.base_mesh_edges().len(), 8);
        assert!((triangles_area(triangulator.base_mesh_triangles()) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_retriangulation_is_idempotent() {
        let cube = cuboid(&Point3::new(-1.0, 0.0, 2.0), &Point3::new(1.0, 0.5, 3.0));
        let mut first = Triangulator::new();
        first.triangulate(&cube);
        let mut second = Triangulator::new();
        second.triangulate(&first.to_mesh());
        assert_eq!(first.base_mesh_triangles().len(), second.base_mesh_triangles().len());
        let a1 = triangles_area(first.base_mesh_triangles());
        let a2 = triangles_area(second.base_mesh_triangles());
        assert!((a1 - a2).abs() < 1e-12);
    }

    #[test]
    fn test_positioned_mapping_merges_split_normals() {
        let cube = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0));
        let mut triangulator = Triangulator::new();
        triangulator.triangulate(&cube);
        // 24 vertices differing by normal, 8 distinct positions
        assert_eq!(triangulator.vertices().len(), 24);
        let mut roots: Vec<usize> = triangulator.positioned_mapping().to_vec();
        roots.sort();
        roots.dedup();
        assert_eq!(roots.len(), 8);
    }

    #[test]
    fn test_invalid_mesh_yields_nothing() {
        let mut triangulator = Triangulator::new();
        triangulator.triangulate(&Mesh::new());
        assert!(triangulator.base_mesh_triangles().is_empty());
    }
}
