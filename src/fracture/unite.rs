//! Grouping neighbouring chunks under new intermediate chunks.

use crate::float_types::Real;
use crate::fracture::{ChunkId, FractureTool, SLICING_INDEXER_OFFSET};
use crate::mesh::{Edge, Mesh};
use crate::mesh::comparators::compare_points;
use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use std::collections::VecDeque;

/// Grouping passes per level.
const MAX_UNITE_ITERATIONS: usize = 32;

impl FractureTool {
    /// Bound the fan-out of the hierarchy.
    ///
    /// Walking from the deepest level up, the children of every parent with
    /// more than `max_chunks_at_level` children are grouped into clusters of
    /// at most `max_group` adjacent chunks. Each cluster becomes a new
    /// non-leaf chunk hanging between the parent and the cluster members;
    /// its mesh is the union of the members without their shared faces.
    /// Passes repeat (grouping groups) while too many chunks remain.
    pub fn unite_chunks(&mut self, max_chunks_at_level: usize, max_group: usize) {
        let max_at_level = max_chunks_at_level.max(max_group);
        if max_group < 2 {
            return;
        }
        let depths: Vec<usize> = self
            .chunks
            .iter()
            .map(|c| self.chunk_depth(c.chunk_id).unwrap_or(0))
            .collect();
        let mut children: HashMap<ChunkId, usize> = HashMap::new();
        for parent in self.chunks.iter().filter_map(|c| c.parent) {
            *children.entry(parent).or_default() += 1;
        }
        let deepest = depths.iter().copied().max().unwrap_or(0);
        let mut at_depth = vec![0usize; deepest + 1];
        for &depth in &depths {
            at_depth[depth] += 1;
        }

        let original_count = self.chunks.len();
        for level in (1..=deepest).rev() {
            if at_depth[level] < max_at_level {
                continue;
            }
            let mut group: Vec<usize> = (0..original_count)
                .filter(|&i| depths[i] == level)
                .filter(|&i| {
                    self.chunks[i]
                        .parent
                        .is_some_and(|p| children.get(&p).copied().unwrap_or(0) > max_at_level)
                })
                .collect();
            if group.is_empty() {
                continue;
            }

            let centers: Vec<Point3<Real>> = group
                .iter()
                .map(|&i| self.chunks[i].mesh.bounding_box().center())
                .collect();
            let Some(anchor) = centers.iter().min_by(|a, b| compare_points(a, b)).copied() else {
                continue;
            };
            let mut order: Vec<(Real, usize)> = centers
                .iter()
                .zip(&group)
                .map(|(c, &i)| ((c - anchor).norm(), i))
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0));
            group = order.into_iter().map(|(_, i)| i).collect();

            let mut graph = self.adjacency_graph(&group);
            let mut iteration = 0;
            while group.len() > max_at_level && iteration < MAX_UNITE_ITERATIONS {
                iteration += 1;
                let mut used = vec![false; group.len()];
                let mut united = Vec::new();
                for start in 0..group.len() {
                    if used[start] {
                        continue;
                    }
                    used[start] = true;
                    let mut members = vec![start];
                    let mut queue = VecDeque::from([start]);
                    while let Some(current) = queue.pop_front() {
                        for &next in &graph[current] {
                            if members.len() >= max_group {
                                break;
                            }
                            if !used[next] {
                                used[next] = true;
                                members.push(next);
                                queue.push_back(next);
                            }
                        }
                    }
                    if members.len() > 1 {
                        let indices: Vec<usize> = members.iter().map(|&m| group[m]).collect();
                        united.push(self.stretch_group(&indices));
                    }
                }
                if united.is_empty() {
                    break;
                }
                group = united;
                graph = self.adjacency_graph(&group);
            }
        }
        self.post_processors.clear();
    }

    /// Adjacency between the chunks at `indices`: two chunks sharing a
    /// parent are adjacent when they carry the same fracture surface.
    /// Returned lists index into `indices`.
    fn adjacency_graph(&self, indices: &[usize]) -> Vec<Vec<usize>> {
        let mut surfaces: Vec<(i64, usize)> = indices
            .iter()
            .enumerate()
            .flat_map(|(slot, &i)| {
                self.chunks[i]
                    .mesh
                    .facets
                    .iter()
                    .filter(|f| f.user_data != 0)
                    .map(move |f| (f.user_data.abs(), slot))
            })
            .collect();
        surfaces.sort_unstable();
        surfaces.dedup();

        let mut graph: Vec<Vec<usize>> = vec![Vec::new(); indices.len()];
        for shared in surfaces.chunk_by(|a, b| a.0 == b.0) {
            for (k, &(_, a)) in shared.iter().enumerate() {
                for &(_, b) in &shared[k + 1..] {
                    if a == b || self.chunks[indices[a]].parent != self.chunks[indices[b]].parent {
                        continue;
                    }
                    if !graph[a].contains(&b) {
                        graph[a].push(b);
                        graph[b].push(a);
                    }
                }
            }
        }
        graph
    }

    /// Hang the chunks at `members` below a new chunk made of their union.
    /// Returns the new chunk's index.
    fn stretch_group(&mut self, members: &[usize]) -> usize {
        let parent = self.chunks[members[0]].parent;
        let surfaces: HashSet<i64> = members
            .iter()
            .flat_map(|&i| self.chunks[i].mesh.facets.iter().map(|f| f.user_data))
            .filter(|&ud| ud != 0)
            .collect();

        let mut mesh = Mesh::new();
        for &i in members {
            let member = &self.chunks[i].mesh;
            let vertex_offset = mesh.vertices.len();
            mesh.vertices.extend_from_slice(&member.vertices);
            for (index, facet) in member.facets.iter().enumerate() {
                let ud = facet.user_data;
                let exposed = ud == 0 || !surfaces.contains(&-ud) || ud.abs() >= SLICING_INDEXER_OFFSET;
                if exposed {
                    let edges = member
                        .facet_edges(index)
                        .iter()
                        .map(|e| Edge::new(e.s + vertex_offset, e.e + vertex_offset));
                    mesh.push_facet(edges, facet);
                }
            }
        }

        let index = self.push_chunk(mesh, parent, false);
        let group_id = self.chunks[index].chunk_id;
        let ids: Vec<ChunkId> = members.iter().map(|&i| self.chunks[i].chunk_id).collect();
        for chunk in self.chunks.iter_mut().filter(|c| ids.contains(&c.chunk_id)) {
            chunk.parent = Some(group_id);
        }
        self.logger
            .debug(&format!("united {} chunks into chunk {}", members.len(), group_id));
        index
    }
}
