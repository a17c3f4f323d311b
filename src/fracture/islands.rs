//! Splitting chunks into their connected components.

use crate::errors::FractureError;
use crate::fracture::{ChunkId, ChunkInfo, FractureTool};
use crate::mesh::{Edge, Mesh};
use crate::triangulator::Triangulator;

/// Disjoint sets over welded vertex indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let (root_x, root_y) = (self.find(x), self.find(y));
        if root_x == root_y {
            return;
        }
        match self.rank[root_x].cmp(&self.rank[root_y]) {
            std::cmp::Ordering::Less => self.parent[root_x] = root_y,
            std::cmp::Ordering::Greater => self.parent[root_y] = root_x,
            std::cmp::Ordering::Equal => {
                self.parent[root_y] = root_x;
                self.rank[root_x] += 1;
            },
        }
    }
}

/// Component of every vertex of `mesh` that some edge uses, numbered in
/// order of first use. Vertices are connected by mesh edges and by the
/// triangulation, so holes stay attached to the loop around them.
fn vertex_components(mesh: &Mesh) -> (Vec<Option<usize>>, usize) {
    let mut triangulator = Triangulator::new();
    triangulator.triangulate(mesh);
    let (mapping, positions) = (triangulator.base_mapping(), triangulator.positioned_mapping());
    let mut sets = UnionFind::new(positions.len());
    if positions.is_empty() {
        return (vec![None; mesh.vertices.len()], 0);
    }

    for t in triangulator.base_mesh_indexed_triangles() {
        sets.union(positions[t.ea], positions[t.eb]);
        sets.union(positions[t.eb], positions[t.ec]);
    }
    let welded = |v: usize| positions[mapping[v]];
    for edge in &mesh.edges {
        sets.union(welded(edge.s), welded(edge.e));
    }

    let mut labels: Vec<Option<usize>> = vec![None; positions.len()];
    let mut components = vec![None; mesh.vertices.len()];
    let mut count = 0;
    for edge in &mesh.edges {
        for v in [edge.s, edge.e] {
            let root = sets.find(welded(v));
            let label = *labels[root].get_or_insert_with(|| {
                count += 1;
                count - 1
            });
            components[v] = Some(label);
        }
    }
    (components, count)
}

/// Split `mesh` into one mesh per component. Facets spanning several
/// components are split by edge.
fn split_components(mesh: &Mesh, components: &[Option<usize>], count: usize) -> Vec<Mesh> {
    let mut parts: Vec<Mesh> = (0..count).map(|_| Mesh::new()).collect();
    let mut local: Vec<usize> = vec![usize::MAX; mesh.vertices.len()];
    for (v, component) in components.iter().enumerate() {
        if let Some(c) = *component {
            local[v] = parts[c].vertices.len();
            parts[c].vertices.push(mesh.vertices[v]);
        }
    }

    let mut buckets: Vec<Vec<Edge>> = vec![Vec::new(); count];
    for (index, facet) in mesh.facets.iter().enumerate() {
        for edge in mesh.facet_edges(index) {
            if let Some(c) = components[edge.s] {
                buckets[c].push(Edge::new(local[edge.s], local[edge.e]));
            }
        }
        for (part, edges) in parts.iter_mut().zip(&mut buckets) {
            if !edges.is_empty() {
                part.push_facet(edges.drain(..), facet);
            }
        }
    }
    parts
}

impl FractureTool {
    /// Split a chunk into its connected components.
    ///
    /// The first component stays in the chunk; every other one becomes a new
    /// chunk with the same parent and leaf flag. Returns the number of
    /// components when the chunk was split and 0 otherwise. The source chunk
    /// is never split.
    pub fn island_detection_and_removing(&mut self, chunk_id: ChunkId) -> Result<usize, FractureError> {
        if chunk_id == 0 {
            return Ok(0);
        }
        let Some(index) = self.chunk_index(chunk_id) else {
            return Err(self.report(FractureError::InvalidChunk(chunk_id)));
        };
        let (components, count) = vertex_components(&self.chunks[index].mesh);
        if count <= 1 {
            return Ok(0);
        }

        let mut parts = split_components(&self.chunks[index].mesh, &components, count).into_iter();
        let template = self.chunks[index].clone();
        if let Some(first) = parts.next() {
            self.chunks[index].mesh = first;
            self.chunks[index].is_changed = true;
        }
        for mesh in parts {
            let chunk_id = self.next_chunk_id();
            self.chunks.push(ChunkInfo {
                mesh,
                chunk_id,
                is_changed: true,
                ..template.clone()
            });
        }
        self.post_processors.clear();
        self.logger
            .debug(&format!("chunk {} split into {} islands", chunk_id, count));
        Ok(count)
    }
}
