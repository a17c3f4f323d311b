//! Remeshing of fracture surfaces.
//!
//! [`MeshNoiser`] works on a triangle soup in which every triangle carries a
//! `user_data` tag: `0` for the original outer surface, anything else for a
//! fracture surface. Only fracture surfaces are refined and displaced; the
//! outer surface and the vertices it shares with fracture surfaces stay put.

use crate::float_types::Real;
use crate::mesh::comparators::{compare_vertices, positioned_mapping, weld};
use crate::mesh::{Edge, Triangle, TriangleIndexed, Vertex};
use crate::noise::NoiseFunction;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;

/// Number of collapse/split sweeps per target length.
const TESSELATION_ITERATIONS: usize = 15;
/// Coarsest target length of the first sweep, in unit space.
const INITIAL_EDGE_LENGTH: Real = 0.1;
/// Target length ratio between consecutive sweeps.
const SHRINK_FACTOR: Real = 0.3;
/// Graph distance added per edge when computing the noise falloff.
const FALLOFF_STEP: Real = 0.1;
/// Distance of vertices that cannot reach the outer surface.
const UNREACHABLE_DISTANCE: Real = 10000.0;
const MIN_NORMAL_LENGTH: Real = 1e-8;
const OVERLAP_TOLERANCE: Real = 1e-6;

/// Role of an edge between outer (`user_data == 0`) and fracture surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFlag {
    /// Only fracture triangles of a single surface use it.
    Internal,
    /// Shared between the outer surface and a fracture surface.
    ExternalBorder,
    /// Shared between two different fracture surfaces.
    InternalBorder,
    /// Only outer triangles use it.
    External,
    None,
}

/// Up to two triangles sharing an edge.
#[derive(Debug, Clone, Copy, Default)]
struct EdgeTriangles {
    triangles: [usize; 2],
    count: usize,
}

impl EdgeTriangles {
    fn add(&mut self, triangle: usize) {
        if self.count < 2 {
            self.triangles[self.count] = triangle;
            self.count += 1;
        }
    }

    fn replace(&mut self, from: usize, to: usize) {
        if self.count > 0 && self.triangles[0] == from {
            self.triangles[0] = to;
        } else if self.count == 2 && self.triangles[1] == from {
            self.triangles[1] = to;
        }
    }

    fn as_slice(&self) -> &[usize] {
        &self.triangles[..self.count]
    }
}

fn mark_edge(owner: i64, edge: usize, markup: &mut [EdgeFlag], last_owner: &mut [i64]) {
    match markup[edge] {
        EdgeFlag::None => {
            markup[edge] = if owner == 0 { EdgeFlag::External } else { EdgeFlag::Internal };
            last_owner[edge] = owner;
        },
        EdgeFlag::External if owner != 0 => markup[edge] = EdgeFlag::ExternalBorder,
        EdgeFlag::Internal if owner != 0 && owner != last_owner[edge] => {
            markup[edge] = EdgeFlag::InternalBorder
        },
        EdgeFlag::External => {},
        _ if owner == 0 => markup[edge] = EdgeFlag::ExternalBorder,
        _ => {},
    }
}

/// Collinear segments with overlapping extents.
fn segments_overlap(a0: &Point3<Real>, a1: &Point3<Real>, b0: &Point3<Real>, b1: &Point3<Real>) -> bool {
    for axis in 0..3 {
        let low = a0[axis].min(a1[axis]).max(b0[axis].min(b1[axis]));
        let high = a0[axis].max(a1[axis]).min(b0[axis].max(b1[axis]));
        if low > high {
            return false;
        }
    }
    let direction = a1 - a0;
    (b0 - a0).cross(&direction).norm_squared() < OVERLAP_TOLERANCE
        && (b1 - a0).cross(&direction).norm_squared() < OVERLAP_TOLERANCE
}

fn unit_or_zero(v: &Vector3<Real>) -> Vector3<Real> {
    v.try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros)
}

/// Squared falloff ramp reaching 1 at `max`.
fn falloff_function(x: Real, max: Real) -> Real {
    let t = (x / (max + 1e-6)).min(1.0);
    t * t
}

fn indexed_normal(vertices: &[Vertex], t: &TriangleIndexed) -> Vector3<Real> {
    let a = vertices[t.ea].pos;
    (vertices[t.eb].pos - a).cross(&(vertices[t.ec].pos - a))
}

/// Tessellates fracture surfaces and displaces them with noise.
///
/// Typical use: [`MeshNoiser::set_mesh`], then
/// [`MeshNoiser::tesselate_internal_surface`], optionally
/// [`MeshNoiser::apply_noise`], and read the result with [`MeshNoiser::mesh`].
#[derive(Debug, Clone)]
pub struct MeshNoiser {
    offset: Vector3<Real>,
    scale: Real,
    is_tesselated: bool,

    vertices: Vec<Vertex>,
    triangles: Vec<TriangleIndexed>,
    edges: Vec<Edge>,
    edge_map: HashMap<Edge, usize>,

    result: Vec<Triangle>,

    restricted: Vec<bool>,
    edge_flags: Vec<EdgeFlag>,
    edge_triangles: Vec<EdgeTriangles>,
    valence: Vec<usize>,
    vertex_triangles: Vec<Vec<usize>>,

    distances: Vec<Real>,
    smoothed_normals: Vec<Vector3<Real>>,
    positioned: Vec<usize>,
    graph: Vec<Vec<usize>>,
}

impl Default for MeshNoiser {
    fn default() -> Self {
        MeshNoiser {
            offset: Vector3::zeros(),
            scale: 1.0,
            is_tesselated: false,
            vertices: Vec::new(),
            triangles: Vec::new(),
            edges: Vec::new(),
            edge_map: HashMap::new(),
            result: Vec::new(),
            restricted: Vec::new(),
            edge_flags: Vec::new(),
            edge_triangles: Vec::new(),
            valence: Vec::new(),
            vertex_triangles: Vec::new(),
            distances: Vec::new(),
            smoothed_normals: Vec::new(),
            positioned: Vec::new(),
            graph: Vec::new(),
        }
    }
}

impl MeshNoiser {
    pub fn new() -> Self {
        MeshNoiser::default()
    }

    pub fn reset(&mut self) {
        *self = MeshNoiser::default();
    }

    /// Weld the triangles, build the edge table and move everything into a
    /// box of half size 1 around the origin.
    pub fn set_mesh(&mut self, triangles: &[Triangle]) {
        self.reset();
        let corners: Vec<Vertex> = triangles.iter().flat_map(|t| [t.a, t.b, t.c]).collect();
        let (vertices, mapping) = weld(&corners, compare_vertices);
        self.vertices = vertices;

        for (i, t) in triangles.iter().enumerate() {
            let (a, b, c) = (mapping[3 * i], mapping[3 * i + 1], mapping[3 * i + 2]);
            self.add_edge(a, b);
            self.add_edge(b, c);
            self.add_edge(a, c);
            self.triangles.push(TriangleIndexed {
                user_data: t.user_data,
                material_id: t.material_id,
                smoothing_group: t.smoothing_group,
                ..TriangleIndexed::new(a, b, c)
            });
        }
        self.result = triangles.to_vec();

        if let Some(first) = self.vertices.first() {
            let (mut min, mut max) = (first.pos, first.pos);
            for v in &self.vertices {
                min = min.inf(&v.pos);
                max = max.sup(&v.pos);
            }
            self.offset = nalgebra::center(&min, &max).coords;
            let half_extents = (max - min) * 0.5;
            self.scale = half_extents.max();
            if self.scale <= 0.0 {
                self.scale = 1.0;
            }
        }
        self.enter_unit_space();
    }

    fn enter_unit_space(&mut self) {
        let inverse = 1.0 / self.scale;
        for v in &mut self.vertices {
            v.pos = Point3::from((v.pos.coords - self.offset) * inverse);
        }
    }

    fn leave_unit_space(&mut self) {
        for v in &mut self.vertices {
            v.pos = Point3::from(v.pos.coords * self.scale + self.offset);
        }
    }

    fn add_edge(&mut self, s: usize, e: usize) -> usize {
        let key = if e < s { Edge::new(e, s) } else { Edge::new(s, e) };
        if let Some(&index) = self.edge_map.get(&key) {
            return index;
        }
        let index = self.edges.len();
        self.edge_map.insert(key, index);
        self.edges.push(key);
        self.edge_flags.push(EdgeFlag::Internal);
        self.edge_triangles.push(EdgeTriangles::default());
        index
    }

    fn find_edge(&self, s: usize, e: usize) -> Option<usize> {
        let key = if e < s { Edge::new(e, s) } else { Edge::new(s, e) };
        self.edge_map.get(&key).copied()
    }

    fn edge_length_squared(&self, edge: usize) -> Real {
        let Edge { s, e } = self.edges[edge];
        (self.vertices[s].pos - self.vertices[e].pos).norm_squared()
    }

    /// Refine fracture surfaces until their edges are no longer than
    /// `max_len` (model units). Outer surface triangles are left untouched.
    pub fn tesselate_internal_surface(&mut self, max_len: Real) {
        if self.triangles.is_empty() || max_len <= 0.0 {
            return;
        }
        if self.is_tesselated {
            self.enter_unit_space();
        }

        self.update_edge_triangle_info();
        self.prebuild_edge_flag_array();
        for (edge, flag) in self.edges.iter().zip(&self.edge_flags) {
            if matches!(flag, EdgeFlag::External | EdgeFlag::ExternalBorder | EdgeFlag::InternalBorder) {
                self.restricted[edge.s] = true;
                self.restricted[edge.e] = true;
            }
        }

        let target = max_len / self.scale;
        let mut current = target.max(INITIAL_EDGE_LENGTH);
        loop {
            self.tesselation_pass(current);
            if current <= target {
                break;
            }
            current = (current * SHRINK_FACTOR).max(target);
        }

        self.compute_falloff_and_normals();
        self.prebuild_tesselated_triangles();
        self.is_tesselated = true;
    }

    fn tesselation_pass(&mut self, max_len: Real) {
        let max_squared = max_len * max_len;
        let min_squared = (max_len * 0.5) * (max_len * 0.5);
        for _ in 0..TESSELATION_ITERATIONS {
            self.update_vertex_edge_info();
            for edge in 0..self.edges.len() {
                if matches!(self.edge_flags[edge], EdgeFlag::External | EdgeFlag::InternalBorder) {
                    continue;
                }
                if self.edge_length_squared(edge) < min_squared {
                    self.collapse_edge(edge);
                }
            }

            let existing = self.edges.len();
            self.update_edge_triangle_info();
            for edge in 0..existing {
                if self.edge_flags[edge] == EdgeFlag::External {
                    continue;
                }
                if self.edge_length_squared(edge) > max_squared {
                    self.divide_edge(edge);
                }
            }
        }
    }

    fn update_edge_triangle_info(&mut self) {
        self.edge_triangles.clear();
        self.edge_triangles.resize(self.edges.len(), EdgeTriangles::default());
        for i in 0..self.triangles.len() {
            let t = self.triangles[i];
            if !t.is_valid() {
                continue;
            }
            for (a, b) in [(t.ea, t.eb), (t.ea, t.ec), (t.ec, t.eb)] {
                let edge = self.add_edge(a, b);
                self.edge_triangles[edge].add(i);
            }
        }
    }

    fn update_vertex_edge_info(&mut self) {
        self.vertex_triangles.clear();
        self.vertex_triangles.resize(self.vertices.len(), Vec::new());
        for (i, t) in self.triangles.iter().enumerate() {
            if !t.is_valid() {
                continue;
            }
            for v in t.indices() {
                self.vertex_triangles[v].push(i);
            }
        }
        self.valence.clear();
        self.valence.resize(self.vertices.len(), 0);
        for (edge, users) in self.edges.iter().zip(&self.edge_triangles) {
            if users.count != 0 {
                self.valence[edge.s] += 1;
                self.valence[edge.e] += 1;
            }
        }
    }

    /// Classify every edge as external, internal or border.
    ///
    /// Edges are compared by welded position, and collinear overlapping
    /// edges share their classification, so T-junctions between fracture and
    /// outer surfaces are still recognised as borders.
    pub fn prebuild_edge_flag_array(&mut self) {
        let edge_count = self.edges.len();
        self.restricted = vec![false; self.vertices.len()];
        self.edge_flags = vec![EdgeFlag::None; edge_count];
        self.positioned = positioned_mapping(&self.vertices);

        let mut by_position: HashMap<Edge, usize> = HashMap::new();
        let mut position_based = Vec::with_capacity(edge_count);
        for (i, edge) in self.edges.iter().enumerate() {
            let (s, e) = (self.positioned[edge.s], self.positioned[edge.e]);
            let key = if e < s { Edge::new(e, s) } else { Edge::new(s, e) };
            position_based.push(*by_position.entry(key).or_insert(i));
        }

        let mut representatives: Vec<(Edge, usize)> = by_position.into_iter().collect();
        representatives.sort_unstable();
        let mut overlaps: Vec<Vec<usize>> = vec![Vec::new(); edge_count];
        for (k, &(_, first)) in representatives.iter().enumerate() {
            let a = self.edges[first];
            for &(_, second) in &representatives[k + 1..] {
                let b = self.edges[second];
                if segments_overlap(
                    &self.vertices[a.s].pos,
                    &self.vertices[a.e].pos,
                    &self.vertices[b.s].pos,
                    &self.vertices[b.e].pos,
                ) {
                    overlaps[first].push(second);
                }
            }
        }

        let mut markup = vec![EdgeFlag::None; edge_count];
        let mut last_owner = vec![0i64; edge_count];
        for t in self.triangles.iter().filter(|t| t.is_valid()) {
            for (a, b) in [(t.ea, t.eb), (t.ea, t.ec), (t.eb, t.ec)] {
                let Some(edge) = self.find_edge(a, b) else {
                    continue;
                };
                let edge = position_based[edge];
                mark_edge(t.user_data, edge, &mut markup, &mut last_owner);
                for &other in &overlaps[edge] {
                    mark_edge(t.user_data, other, &mut markup, &mut last_owner);
                }
            }
        }
        for (flag, &representative) in self.edge_flags.iter_mut().zip(&position_based) {
            *flag = markup[representative];
        }

        for t in self.triangles.iter().filter(|t| t.is_valid() && t.user_data == 0) {
            for (a, b) in [(t.ea, t.eb), (t.ec, t.eb), (t.ea, t.ec)] {
                if let Some(edge) = self.find_edge(a, b) {
                    self.edge_flags[edge] = EdgeFlag::External;
                }
            }
        }
    }

    /// Per-edge classification from the last [`MeshNoiser::prebuild_edge_flag_array`].
    pub fn edge_flags(&self) -> &[EdgeFlag] {
        &self.edge_flags
    }

    /// Merge the endpoints of edge `id`. Does nothing if both endpoints are
    /// restricted, if the merge would change topology, or if any surrounding
    /// triangle would degenerate or flip.
    fn collapse_edge(&mut self, id: usize) {
        let Edge { s: mut from, e: mut to } = self.edges[id];
        if self.restricted[from] && self.restricted[to] {
            return;
        }
        if self.valence[from] > self.valence[to] {
            std::mem::swap(&mut from, &mut to);
        }
        if self.restricted[from] {
            std::mem::swap(&mut from, &mut to);
        }

        let mut neighbors: Vec<usize> = self.vertex_triangles[from]
            .iter()
            .chain(&self.vertex_triangles[to])
            .copied()
            .filter(|&t| self.triangles[t].is_valid())
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();

        let with_edge: Vec<usize> = neighbors
            .iter()
            .copied()
            .filter(|&t| self.triangles[t].contains(from) && self.triangles[t].contains(to))
            .collect();
        if with_edge.is_empty() || with_edge.len() > 2 {
            return;
        }

        // link condition: common neighbours of both ends must span a triangle with the edge
        let ring = |center: usize| -> Vec<usize> {
            let mut ring: Vec<usize> = neighbors
                .iter()
                .filter(|&&t| self.triangles[t].contains(center))
                .flat_map(|&t| self.triangles[t].indices())
                .filter(|&v| v != from && v != to)
                .collect();
            ring.sort_unstable();
            ring.dedup();
            ring
        };
        let begin = ring(from);
        let end = ring(to);
        for v in begin.iter().filter(|v| end.binary_search(v).is_ok()) {
            let spanned = neighbors.iter().any(|&t| {
                let t = &self.triangles[t];
                t.contains(from) && t.contains(to) && t.contains(*v)
            });
            if !spanned {
                return;
            }
        }

        for &t in neighbors.iter().filter(|t| !with_edge.contains(t)) {
            let mut triangle = self.triangles[t];
            let old_normal = indexed_normal(&self.vertices, &triangle);
            triangle.replace_vertex(from, to);
            let new_normal = indexed_normal(&self.vertices, &triangle);
            if new_normal.norm() < MIN_NORMAL_LENGTH || old_normal.dot(&new_normal) < 0.0 {
                return;
            }
        }

        for &t in &with_edge {
            self.triangles[t].invalidate();
        }
        for &t in &neighbors {
            let triangle = &mut self.triangles[t];
            if triangle.is_valid() && triangle.contains(from) {
                triangle.replace_vertex(from, to);
                self.vertex_triangles[from].clear();
                self.vertex_triangles[to].push(t);
            }
        }
    }

    /// Split edge `id` at its midpoint, splitting each adjacent triangle in two.
    fn divide_edge(&mut self, id: usize) {
        let users = self.edge_triangles[id];
        if users.count == 0 {
            return;
        }
        let edge = self.edges[id];
        let snap = self.edge_flags[id];
        let on_border = matches!(snap, EdgeFlag::ExternalBorder | EdgeFlag::InternalBorder);
        let mut middle: Option<usize> = None;

        for &old in users.as_slice() {
            let triangle = self.triangles[old];
            if !triangle.is_valid() {
                continue;
            }
            let corners = triangle.indices();
            for p in 0..3 {
                let next = corners[(p + 1) % 3];
                let opposite = corners[(p + 2) % 3];
                let current = corners[p];
                if !((current == edge.s && next == edge.e) || (current == edge.e && next == edge.s)) {
                    continue;
                }
                let nv = *middle.get_or_insert_with(|| {
                    let v = self.vertices[current].interpolate(&self.vertices[next], 0.5);
                    self.vertices.push(v);
                    self.vertices.len() - 1
                });
                if nv < self.restricted.len() {
                    self.restricted[nv] = on_border;
                } else {
                    self.restricted.resize(nv, false);
                    self.restricted.push(on_border);
                }

                let first_half = self.add_edge(current, nv);
                let second_half = self.add_edge(nv, next);
                let inner = self.add_edge(nv, opposite);
                self.edge_flags[first_half] = snap;
                self.edge_flags[second_half] = snap;
                self.edge_flags[inner] = EdgeFlag::Internal;

                let created = self.triangles.len();
                self.edge_triangles[first_half].add(old);
                self.edge_triangles[second_half].add(created);
                self.edge_triangles[inner].add(old);
                self.edge_triangles[inner].add(created);

                self.triangles[old] = TriangleIndexed {
                    user_data: triangle.user_data,
                    material_id: triangle.material_id,
                    smoothing_group: triangle.smoothing_group,
                    ..TriangleIndexed::new(current, nv, opposite)
                };
                self.triangles.push(TriangleIndexed {
                    user_data: triangle.user_data,
                    material_id: triangle.material_id,
                    smoothing_group: triangle.smoothing_group,
                    ..TriangleIndexed::new(nv, next, opposite)
                });

                if let Some(moved) = self.find_edge(next, opposite) {
                    self.edge_triangles[moved].replace(old, created);
                }
                break;
            }
        }
    }

    /// Position-welded vertex graph and graph distance of every vertex to
    /// the outer surface.
    fn compute_falloff_and_normals(&mut self) {
        let n = self.vertices.len();
        self.positioned = positioned_mapping(&self.vertices);
        self.restricted.resize(n, false);

        self.graph = vec![Vec::new(); n];
        for (edge, users) in self.edges.iter().zip(&self.edge_triangles) {
            if users.count == 0 {
                continue;
            }
            let (a, b) = (self.positioned[edge.s], self.positioned[edge.e]);
            if !self.graph[a].contains(&b) {
                self.graph[a].push(b);
            }
            if !self.graph[b].contains(&a) {
                self.graph[b].push(a);
            }
        }

        self.distances = vec![UNREACHABLE_DISTANCE; n];
        let mut queue = VecDeque::new();
        for ((edge, users), flag) in self.edges.iter().zip(&self.edge_triangles).zip(&self.edge_flags) {
            if users.count != 0 && matches!(flag, EdgeFlag::External | EdgeFlag::ExternalBorder) {
                for v in [self.positioned[edge.s], self.positioned[edge.e]] {
                    self.distances[v] = 0.0;
                    queue.push_back(v);
                }
            }
        }
        while let Some(current) = queue.pop_front() {
            let distance = self.distances[current] + FALLOFF_STEP;
            for &to in &self.graph[current] {
                if distance < self.distances[to] {
                    self.distances[to] = distance;
                    queue.push_back(to);
                }
            }
        }
        for i in 0..n {
            self.distances[i] = self.distances[self.positioned[i]];
        }
    }

    fn prebuild_tesselated_triangles(&mut self) {
        self.leave_unit_space();
        self.result = self.collect_triangles(&self.vertices);
    }

    fn collect_triangles(&self, vertices: &[Vertex]) -> Vec<Triangle> {
        self.triangles
            .iter()
            .filter(|t| t.is_valid())
            .map(|t| Triangle {
                user_data: t.user_data,
                material_id: t.material_id,
                smoothing_group: t.smoothing_group,
                ..Triangle::new(vertices[t.ea], vertices[t.eb], vertices[t.ec])
            })
            .collect()
    }

    /// Displacement direction per vertex: averaged fracture surface normals,
    /// pointing out of the chunk.
    fn recalc_noise_dirs(&mut self) {
        self.smoothed_normals = vec![Vector3::zeros(); self.vertices.len()];
        for t in self.triangles.iter().filter(|t| t.is_valid() && t.user_data != 0) {
            for v in t.indices() {
                let normal = unit_or_zero(&self.vertices[v].normal);
                let slot = &mut self.smoothed_normals[self.positioned[v]];
                if t.user_data < 0 {
                    *slot += normal;
                } else {
                    *slot -= normal;
                }
            }
        }
        self.spread_normals();
    }

    fn spread_normals(&mut self) {
        for i in 0..self.smoothed_normals.len() {
            self.smoothed_normals[i] = unit_or_zero(&self.smoothed_normals[self.positioned[i]]);
        }
    }

    /// Laplacian smoothing of unrestricted vertices over the position-welded
    /// graph. Noise directions are smoothed along with the positions.
    /// Has no effect before [`MeshNoiser::tesselate_internal_surface`].
    pub fn relax(&mut self, iterations: usize, factor: Real, vertices: &mut [Vertex]) {
        if !self.is_tesselated || vertices.len() != self.graph.len() {
            return;
        }
        let mut positions = vec![Point3::origin(); vertices.len()];
        let mut normals = vec![Vector3::zeros(); vertices.len()];
        for _ in 0..iterations {
            for i in 0..vertices.len() {
                let neighbors = &self.graph[self.positioned[i]];
                if self.restricted[i] || neighbors.is_empty() {
                    positions[i] = vertices[i].pos;
                    normals[i] = self.smoothed_normals[i];
                    continue;
                }
                let weight = 1.0 / neighbors.len() as Real;
                let mut averaged = Vector3::zeros();
                let mut averaged_normal = Vector3::zeros();
                for &to in neighbors {
                    averaged += vertices[to].pos.coords;
                    averaged_normal += self.smoothed_normals[to];
                }
                let current = vertices[i].pos;
                positions[i] = current + (Point3::from(averaged * weight) - current) * factor;
                normals[i] = self.smoothed_normals[i] * (1.0 - factor) + averaged_normal * weight * factor;
            }
            for i in 0..vertices.len() {
                if self.restricted[i] {
                    continue;
                }
                vertices[i].pos = positions[i];
                self.smoothed_normals[i] = unit_or_zero(&normals[i]);
            }
        }
    }

    /// Displace fracture surface vertices along their smoothed normals by
    /// `noise`, damped near the outer surface over `falloff`. Vertices on
    /// outer or border edges never move. Requires a prior tessellation.
    pub fn apply_noise(
        &mut self,
        noise: &dyn NoiseFunction,
        falloff: Real,
        relax_iterations: usize,
        relax_factor: Real,
    ) {
        if !self.is_tesselated {
            return;
        }
        self.restricted = vec![false; self.vertices.len()];
        for ((edge, users), flag) in self.edges.iter().zip(&self.edge_triangles).zip(&self.edge_flags) {
            if users.count != 0 && matches!(flag, EdgeFlag::External | EdgeFlag::ExternalBorder) {
                self.restricted[edge.s] = true;
                self.restricted[edge.e] = true;
            }
        }

        let mut local = self.vertices.clone();
        self.recalc_noise_dirs();
        self.relax(relax_iterations, relax_factor, &mut local);

        for (i, v) in local.iter_mut().enumerate() {
            if self.restricted[i] {
                continue;
            }
            let d = noise.sample(&v.pos);
            v.pos += self.smoothed_normals[i] * (falloff_function(self.distances[i], falloff) * d);
        }

        self.smoothed_normals.fill(Vector3::zeros());
        for t in self.triangles.iter().filter(|t| t.is_valid() && t.user_data != 0) {
            let normal = unit_or_zero(&indexed_normal(&local, t));
            for v in t.indices() {
                self.smoothed_normals[self.positioned[v]] += normal;
            }
        }
        self.spread_normals();
        for t in self.triangles.iter().filter(|t| t.is_valid() && t.user_data != 0) {
            for v in t.indices() {
                local[v].normal = self.smoothed_normals[self.positioned[v]];
            }
        }

        self.result = self.collect_triangles(&local);
    }

    pub const fn is_tesselated(&self) -> bool {
        self.is_tesselated
    }

    /// Current triangles in model space. Before tessellation these are the
    /// input triangles.
    pub fn mesh(&self) -> &[Triangle] {
        &self.result
    }
}
