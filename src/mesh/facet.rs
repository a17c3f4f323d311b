//! Edges, facets and triangles.

use crate::mesh::vertex::Vertex;

/// Material id assigned to facets created by cutting.
pub const MATERIAL_INTERIOR: i32 = 1000;

/// Smoothing group assigned to fracture surfaces.
pub const SMOOTHING_GROUP_INTERIOR: i32 = 1000;

/// Marks an edge or triangle slot that has been invalidated.
pub const NOT_VALID_VERTEX: usize = usize::MAX;

/// Directed edge between two vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub s: usize,
    pub e: usize,
}

impl Edge {
    pub const fn new(s: usize, e: usize) -> Self {
        Edge { s, e }
    }

    pub const fn reversed(&self) -> Self {
        Edge { s: self.e, e: self.s }
    }
}

/// A directed edge tagged with the facet it belongs to.
///
/// Ordered by `(parent, s, e)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeWithParent {
    pub s: usize,
    pub e: usize,
    pub parent: usize,
}

impl EdgeWithParent {
    pub const fn new(s: usize, e: usize, parent: usize) -> Self {
        EdgeWithParent { s, e, parent }
    }
}

impl PartialOrd for EdgeWithParent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeWithParent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.parent, self.s, self.e).cmp(&(other.parent, other.s, other.e))
    }
}

/// A polygonal face: a contiguous run of `edge_count` edges starting at
/// `first_edge` in the owning mesh's edge array.
///
/// The run may hold several closed loops (an outer loop plus holes).
/// `user_data` is 0 for source surfaces and a signed cutting plane id for
/// fracture surfaces; the sign tells the two sides of a cut apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Facet {
    pub first_edge: usize,
    pub edge_count: usize,
    pub user_data: i64,
    pub material_id: i32,
    pub smoothing_group: i32,
}

impl Facet {
    pub const fn new(
        first_edge: usize,
        edge_count: usize,
        material_id: i32,
        user_data: i64,
        smoothing_group: i32,
    ) -> Self {
        Facet {
            first_edge,
            edge_count,
            user_data,
            material_id,
            smoothing_group,
        }
    }

    /// Range of this facet's edges in the mesh edge array.
    pub const fn edge_range(&self) -> std::ops::Range<usize> {
        self.first_edge..self.first_edge + self.edge_count
    }
}

/// Triangle holding its vertex records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vertex,
    pub b: Vertex,
    pub c: Vertex,
    pub user_data: i64,
    pub material_id: i32,
    pub smoothing_group: i32,
}

impl Triangle {
    pub const fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Triangle {
            a,
            b,
            c,
            user_data: 0,
            material_id: 0,
            smoothing_group: 0,
        }
    }

    pub const fn vertices(&self) -> [&Vertex; 3] {
        [&self.a, &self.b, &self.c]
    }

    /// Unnormalized normal, twice the area in length.
    pub fn normal(&self) -> nalgebra::Vector3<crate::float_types::Real> {
        (self.b.pos - self.a.pos).cross(&(self.c.pos - self.a.pos))
    }

    pub fn area(&self) -> crate::float_types::Real {
        self.normal().norm() * 0.5
    }
}

/// Triangle referencing vertices by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleIndexed {
    pub ea: usize,
    pub eb: usize,
    pub ec: usize,
    pub user_data: i64,
    pub material_id: i32,
    pub smoothing_group: i32,
}

impl TriangleIndexed {
    pub const fn new(ea: usize, eb: usize, ec: usize) -> Self {
        TriangleIndexed {
            ea,
            eb,
            ec,
            user_data: 0,
            material_id: 0,
            smoothing_group: 0,
        }
    }

    pub const fn indices(&self) -> [usize; 3] {
        [self.ea, self.eb, self.ec]
    }

    /// `false` once the triangle has been collapsed away.
    pub const fn is_valid(&self) -> bool {
        self.ea != NOT_VALID_VERTEX
    }

    pub fn invalidate(&mut self) {
        self.ea = NOT_VALID_VERTEX;
    }

    /// Copy user data, material and smoothing group from a facet.
    pub const fn with_tags(mut self, facet: &Facet) -> Self {
        self.user_data = facet.user_data;
        self.material_id = facet.material_id;
        self.smoothing_group = facet.smoothing_group;
        self
    }

    pub const fn contains(&self, vertex: usize) -> bool {
        self.ea == vertex || self.eb == vertex || self.ec == vertex
    }

    /// The vertex that is neither `a` nor `b`.
    pub const fn opposite(&self, a: usize, b: usize) -> usize {
        if self.ea != a && self.ea != b {
            self.ea
        } else if self.eb != a && self.eb != b {
            self.eb
        } else {
            self.ec
        }
    }

    /// Replace every occurrence of `from` with `to`.
    pub fn replace_vertex(&mut self, from: usize, to: usize) {
        for slot in [&mut self.ea, &mut self.eb, &mut self.ec] {
            if *slot == from {
                *slot = to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_with_parent_ordering() {
        let mut edges = vec![
            EdgeWithParent::new(3, 1, 2),
            EdgeWithParent::new(0, 5, 1),
            EdgeWithParent::new(1, 0, 2),
            EdgeWithParent::new(0, 4, 1),
        ];
        edges.sort();
        assert_eq!(
            edges,
            vec![
                EdgeWithParent::new(0, 4, 1),
                EdgeWithParent::new(0, 5, 1),
                EdgeWithParent::new(1, 0, 2),
                EdgeWithParent::new(3, 1, 2),
            ]
        );
    }

    #[test]
    fn test_triangle_indexed_helpers() {
        let mut t = TriangleIndexed::new(4, 7, 9);
        assert_eq!(t.opposite(9, 4), 7);
        t.replace_vertex(7, 2);
        assert_eq!(t.indices(), [4, 2, 9]);
        assert!(t.contains(2));
        t.invalidate();
        assert!(!t.is_valid());
    }
}
