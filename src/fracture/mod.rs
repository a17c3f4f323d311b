//! Chunk hierarchy and the fracture operations that grow it.
//!
//! A [`FractureTool`] owns a flat list of chunks. Chunk 0 is the source mesh;
//! every fracture operation replaces a leaf chunk by (or hangs below it) the
//! pieces it was split into. All chunk meshes live in a normalized space:
//! the source is moved to the origin and scaled into the unit cube, and the
//! extraction methods restore world coordinates.

use crate::accelerator::{BBoxGrid, DEFAULT_GRID_RESOLUTION, DummyAccelerator};
use crate::boolean::{BooleanConfiguration, BooleanEvaluator};
use crate::errors::FractureError;
use crate::float_types::Real;
use crate::logging::{LogCrateLogger, Logger};
use crate::mesh::comparators::{OrderedMap, compare_vertices};
use crate::mesh::{MATERIAL_INTERIOR, Mesh, Triangle, Vertex};
use crate::noise::SimplexNoise;
use crate::noiser::MeshNoiser;
use crate::triangulator::Triangulator;
use nalgebra::{Point3, Vector3};

pub mod config;
pub mod cutout;
mod islands;
mod slicing;
mod unite;
pub mod voronoi;

pub use config::{CutoutConfiguration, NoiseConfiguration, SlicingConfiguration};
pub use cutout::{Cutout, CutoutSet};
pub use voronoi::VoronoiSitesGenerator;

/// Identifier of a chunk, stable across index shuffles.
pub type ChunkId = u32;

/// Added to plane indices of slicing surfaces so they never collide with
/// voronoi bisector indices.
pub const SLICING_INDEXER_OFFSET: i64 = 1 << 32;

/// Half size of the box every voronoi cell starts from.
pub(crate) const SITE_BOX_SIZE: Real = 4.0;
/// Extent of the half-space proxies used for cutting.
pub(crate) const CUTTING_BOX_SIZE: Real = 40.0;

/// One node of the chunk hierarchy.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    /// Geometry in the tool's normalized space.
    pub mesh: Mesh,
    pub parent: Option<ChunkId>,
    pub chunk_id: ChunkId,
    pub is_leaf: bool,
    /// Set when the chunk was created or modified since the last
    /// [`FractureTool::finalize_fracturing`].
    pub is_changed: bool,
}

/// Per chunk output of [`FractureTool::finalize_fracturing`].
#[derive(Debug, Clone, Default)]
struct ChunkPostProcessor {
    triangulator: Triangulator,
    noiser: Option<MeshNoiser>,
}

impl ChunkPostProcessor {
    fn base_mesh(&self) -> &[Triangle] {
        self.triangulator.base_mesh_triangles()
    }

    fn noised_mesh(&self) -> &[Triangle] {
        match &self.noiser {
            Some(noiser) => noiser.mesh(),
            None => self.base_mesh(),
        }
    }
}

/// Fractures a source mesh into a hierarchy of chunks.
#[derive(Debug)]
pub struct FractureTool {
    chunks: Vec<ChunkInfo>,
    post_processors: Vec<ChunkPostProcessor>,
    offset: Vector3<Real>,
    scale_factor: Real,
    plane_index_offset: i64,
    chunk_id_counter: ChunkId,
    interior_material_id: i32,
    remove_islands: bool,
    logger: Box<dyn Logger>,
}

impl Default for FractureTool {
    fn default() -> Self {
        FractureTool::with_logger(Box::new(LogCrateLogger))
    }
}

impl FractureTool {
    pub fn new() -> Self {
        FractureTool::default()
    }

    /// A tool reporting through `logger` instead of the `log` facade.
    pub fn with_logger(logger: Box<dyn Logger>) -> Self {
        FractureTool {
            chunks: Vec::new(),
            post_processors: Vec::new(),
            offset: Vector3::zeros(),
            scale_factor: 1.0,
            plane_index_offset: 1,
            chunk_id_counter: 0,
            interior_material_id: MATERIAL_INTERIOR,
            remove_islands: false,
            logger,
        }
    }

    /// Drop every chunk and restore the counters. The interior material and
    /// the island toggle are configuration and survive.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.post_processors.clear();
        self.offset = Vector3::zeros();
        self.scale_factor = 1.0;
        self.plane_index_offset = 1;
        self.chunk_id_counter = 0;
    }

    /// Install `mesh` as chunk 0.
    ///
    /// The copy is centered on its bounding box and scaled by its largest
    /// extent; every facet is marked as original surface (`user_data = 0`).
    pub fn set_source_mesh(&mut self, mesh: &Mesh) -> Result<(), FractureError> {
        if !mesh.is_valid() {
            return Err(self.report(FractureError::InvalidMesh(
                "source mesh needs vertices, edges and facets".to_string(),
            )));
        }
        if let Err(err) = mesh.check_indices() {
            return Err(self.report(err));
        }
        self.reset();
        if Self::is_mesh_contain_open_edges(mesh) {
            self.logger
                .warn("Input mesh contains open edges, it may lead to wrong fracturing results!");
        }

        let bbox = mesh.bounding_box();
        self.offset = bbox.center().coords;
        let extents = bbox.maxs - bbox.mins;
        self.scale_factor = extents.max();
        if self.scale_factor <= 0.0 {
            self.scale_factor = 1.0;
        }

        let mut source = mesh.clone();
        let (offset, inverse) = (self.offset, 1.0 / self.scale_factor);
        source.map_positions(|p| Point3::from((p.coords - offset) * inverse));
        source.set_user_data(0);

        let chunk_id = self.next_chunk_id();
        self.chunks.push(ChunkInfo {
            mesh: source,
            parent: None,
            chunk_id,
            is_leaf: true,
            is_changed: true,
        });
        self.logger.debug(&format!(
            "source mesh set: {} facets, offset {:?}, scale {}",
            mesh.facets.len(),
            self.offset,
            self.scale_factor
        ));
        Ok(())
    }

    /// Offset and scale mapping normalized chunk space back to world space:
    /// `world = local * scale + offset`.
    pub const fn transformation(&self) -> (Vector3<Real>, Real) {
        (self.offset, self.scale_factor)
    }

    pub fn set_interior_material_id(&mut self, material_id: i32) {
        self.interior_material_id = material_id;
    }

    pub const fn interior_material_id(&self) -> i32 {
        self.interior_material_id
    }

    /// Replace a material id on every chunk.
    pub fn replace_material_id(&mut self, old_material: i32, new_material: i32) {
        for chunk in &mut self.chunks {
            chunk.mesh.replace_material_id(old_material, new_material);
        }
        self.post_processors.clear();
    }

    /// Split every newly created chunk into its connected components.
    pub fn set_remove_islands(&mut self, remove_islands: bool) {
        self.remove_islands = remove_islands;
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }

    pub fn chunk_info(&self, index: usize) -> Option<&ChunkInfo> {
        self.chunks.get(index)
    }

    pub fn chunk_index(&self, chunk_id: ChunkId) -> Option<usize> {
        self.chunks.iter().position(|c| c.chunk_id == chunk_id)
    }

    pub fn chunk_id(&self, index: usize) -> Option<ChunkId> {
        self.chunks.get(index).map(|c| c.chunk_id)
    }

    /// Number of parent hops from `chunk_id` to a root.
    pub fn chunk_depth(&self, chunk_id: ChunkId) -> Option<usize> {
        let mut index = self.chunk_index(chunk_id)?;
        let mut depth = 0;
        while let Some(parent) = self.chunks[index].parent {
            index = self.chunk_index(parent)?;
            depth += 1;
        }
        Some(depth)
    }

    pub fn chunks_id_at_depth(&self, depth: usize) -> Vec<ChunkId> {
        self.chunks
            .iter()
            .filter(|c| self.chunk_depth(c.chunk_id) == Some(depth))
            .map(|c| c.chunk_id)
            .collect()
    }

    /// Whether `ancestor_id` is a strict ancestor of `chunk_id`.
    pub fn is_ancestor_for_chunk(&self, ancestor_id: ChunkId, chunk_id: ChunkId) -> bool {
        if ancestor_id == chunk_id {
            return false;
        }
        let mut current = chunk_id;
        while let Some(index) = self.chunk_index(current) {
            match self.chunks[index].parent {
                Some(parent) if parent == ancestor_id => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Remove a chunk together with all of its descendants.
    pub fn erase_chunk(&mut self, chunk_id: ChunkId) -> bool {
        self.delete_all_children_of_chunk(chunk_id);
        match self.chunk_index(chunk_id) {
            Some(index) => {
                self.chunks.swap_remove(index);
                self.post_processors.clear();
                true
            },
            None => false,
        }
    }

    /// Remove every descendant of a chunk, which becomes a leaf again.
    /// Returns whether anything was removed.
    pub fn delete_all_children_of_chunk(&mut self, chunk_id: ChunkId) -> bool {
        let doomed: Vec<usize> = (0..self.chunks.len())
            .filter(|&i| self.is_ancestor_for_chunk(chunk_id, self.chunks[i].chunk_id))
            .collect();
        for &index in doomed.iter().rev() {
            self.chunks.swap_remove(index);
        }
        if doomed.is_empty() {
            return false;
        }
        if let Some(index) = self.chunk_index(chunk_id) {
            self.chunks[index].is_leaf = true;
        }
        self.post_processors.clear();
        true
    }

    /// Triangulate every chunk. Chunks whose triangulation is empty are
    /// dropped and their children move up to the dropped chunk's parent.
    pub fn finalize_fracturing(&mut self) {
        self.post_processors = self
            .chunks
            .iter()
            .map(|chunk| {
                let mut post = ChunkPostProcessor::default();
                post.triangulator.triangulate(&chunk.mesh);
                post
            })
            .collect();

        let empty: Vec<usize> = (0..self.post_processors.len())
            .filter(|&i| self.post_processors[i].base_mesh().is_empty())
            .collect();
        for &index in empty.iter().rev() {
            let (removed, parent) = (self.chunks[index].chunk_id, self.chunks[index].parent);
            for chunk in self.chunks.iter_mut().filter(|c| c.parent == Some(removed)) {
                chunk.parent = parent;
            }
            self.post_processors.swap_remove(index);
            self.chunks.swap_remove(index);
        }
        if !empty.is_empty() {
            self.logger
                .debug(&format!("finalize: dropped {} empty chunks", empty.len()));
        }
        for chunk in &mut self.chunks {
            chunk.is_changed = false;
        }
    }

    /// Triangles of a finalized chunk in world space.
    ///
    /// `None` when the index is out of range or the tool is not finalized.
    pub fn base_mesh(&self, index: usize) -> Option<Vec<Triangle>> {
        let post = self.finalized()?.get(index)?;
        Some(self.triangles_to_world(post.base_mesh()))
    }

    /// Tessellated and noised triangles of a finalized chunk in world space,
    /// or its base mesh when no remeshing happened.
    pub fn noised_mesh(&self, index: usize) -> Option<Vec<Triangle>> {
        let post = self.finalized()?.get(index)?;
        let triangles = if self.chunks[index].chunk_id == 0 {
            post.base_mesh()
        } else {
            post.noised_mesh()
        };
        Some(self.triangles_to_world(triangles))
    }

    /// Every finalized chunk as one shared vertex buffer plus one index
    /// buffer per chunk, in world space.
    pub fn buffered_base_meshes(&self) -> (Vec<Vertex>, Vec<Vec<u32>>) {
        let meshes: Vec<&[Triangle]> = self
            .finalized()
            .unwrap_or_default()
            .iter()
            .map(ChunkPostProcessor::base_mesh)
            .collect();
        self.buffered(&meshes)
    }

    /// Like [`FractureTool::buffered_base_meshes`] with the noised meshes.
    pub fn buffered_noise_meshes(&self) -> (Vec<Vertex>, Vec<Vec<u32>>) {
        let meshes: Vec<&[Triangle]> = self
            .finalized()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, post)| {
                if self.chunks[i].chunk_id == 0 {
                    post.base_mesh()
                } else {
                    post.noised_mesh()
                }
            })
            .collect();
        self.buffered(&meshes)
    }

    /// Copy of a chunk's polygon mesh in world space.
    pub fn create_chunk_mesh(&self, chunk_id: ChunkId) -> Option<Mesh> {
        let index = self.chunk_index(chunk_id)?;
        let mut mesh = self.chunks[index].mesh.clone();
        mesh.map_positions(|p| self.to_world(p));
        Some(mesh)
    }

    /// Refine the fracture surfaces of every finalized chunk except the
    /// source until no edge is longer than `average_edge_length` (world units).
    pub fn tesselate(&mut self, average_edge_length: Real) {
        if self.finalized().is_none() {
            self.logger
                .warn("tesselate: finalize_fracturing must run first");
            return;
        }
        let target = average_edge_length / self.scale_factor;
        for (chunk, post) in self.chunks.iter().zip(&mut self.post_processors) {
            if chunk.chunk_id == 0 {
                continue;
            }
            let noiser = post.noiser.get_or_insert_with(|| {
                let mut noiser = MeshNoiser::new();
                noiser.set_mesh(post.triangulator.base_mesh_triangles());
                noiser
            });
            noiser.tesselate_internal_surface(target);
        }
    }

    /// Displace tessellated fracture surfaces with simplex noise. Amplitude
    /// and frequency are given in world units.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_noise(
        &mut self,
        amplitude: Real,
        frequency: Real,
        octaves: u32,
        falloff: Real,
        relax_iterations: usize,
        relax_factor: Real,
        seed: u64,
    ) {
        if self.finalized().is_none() {
            self.logger
                .warn("apply_noise: finalize_fracturing must run first");
            return;
        }
        let noise = SimplexNoise::new(
            amplitude / self.scale_factor,
            frequency * self.scale_factor,
            octaves.max(1),
            seed,
        );
        for (chunk, post) in self.chunks.iter().zip(&mut self.post_processors) {
            if chunk.chunk_id == 0 {
                continue;
            }
            if let Some(noiser) = post.noiser.as_mut() {
                noiser.apply_noise(&noise, falloff, relax_iterations, relax_factor);
            }
        }
    }

    /// Volume of `mesh_a ∩ mesh_b` relative to the volume of `mesh_a`.
    pub fn mesh_overlap(mesh_a: &Mesh, mesh_b: &Mesh) -> Real {
        let mut evaluator = BooleanEvaluator::new();
        let performed = evaluator.perform_boolean(
            mesh_a,
            mesh_b,
            &mut BBoxGrid::new(mesh_a, DEFAULT_GRID_RESOLUTION),
            &mut DummyAccelerator::for_mesh(mesh_b),
            BooleanConfiguration::intersection(),
        );
        let Some(result) = performed.ok().and_then(|_| evaluator.create_new_mesh()) else {
            return 0.0;
        };
        let base_volume = mesh_a.volume();
        if base_volume == 0.0 {
            return 0.0;
        }
        result.volume() / base_volume
    }

    /// Whether some undirected edge of `mesh` (after welding by position)
    /// is used an odd number of times.
    pub fn is_mesh_contain_open_edges(mesh: &Mesh) -> bool {
        mesh.has_open_edges()
    }

    fn finalized(&self) -> Option<&[ChunkPostProcessor]> {
        (!self.post_processors.is_empty() && self.post_processors.len() == self.chunks.len())
            .then_some(self.post_processors.as_slice())
    }

    fn to_world(&self, p: &Point3<Real>) -> Point3<Real> {
        Point3::from(p.coords * self.scale_factor + self.offset)
    }

    fn to_local(&self, p: &Point3<Real>) -> Point3<Real> {
        Point3::from((p.coords - self.offset) / self.scale_factor)
    }

    fn triangles_to_world(&self, triangles: &[Triangle]) -> Vec<Triangle> {
        triangles
            .iter()
            .map(|t| {
                let mut t = *t;
                t.a.pos = self.to_world(&t.a.pos);
                t.b.pos = self.to_world(&t.b.pos);
                t.c.pos = self.to_world(&t.c.pos);
                t
            })
            .collect()
    }

    fn buffered(&self, meshes: &[&[Triangle]]) -> (Vec<Vertex>, Vec<Vec<u32>>) {
        let mut mapping: OrderedMap<Vertex, u32> = OrderedMap::new(compare_vertices);
        let mut vertices = Vec::new();
        let indices = meshes
            .iter()
            .map(|triangles| {
                let mut buffer = Vec::with_capacity(triangles.len() * 3);
                for t in triangles.iter() {
                    for v in t.vertices() {
                        let index = *mapping.get_or_insert_with(*v, || {
                            vertices.push(*v);
                            (vertices.len() - 1) as u32
                        });
                        buffer.push(index);
                    }
                }
                buffer
            })
            .collect();
        for v in &mut vertices {
            v.pos = self.to_world(&v.pos);
        }
        (vertices, indices)
    }

    fn next_chunk_id(&mut self) -> ChunkId {
        let id = self.chunk_id_counter;
        self.chunk_id_counter += 1;
        id
    }

    /// Log `error` through the injected logger and hand it back.
    fn report(&self, error: FractureError) -> FractureError {
        self.logger.error(&error.to_string());
        error
    }

    /// Common entry checks of every fracture operation. Returns the index
    /// of the chunk to fracture after its previous children were removed.
    fn prepare_fracture(&mut self, chunk_id: ChunkId, replace_chunk: bool) -> Result<usize, FractureError> {
        if self.chunks.is_empty() {
            return Err(self.report(FractureError::NoSourceMesh));
        }
        if replace_chunk && chunk_id == 0 {
            return Err(self.report(FractureError::ReplaceSourceChunk));
        }
        let Some(index) = self.chunk_index(chunk_id) else {
            return Err(self.report(FractureError::InvalidChunk(chunk_id)));
        };
        if !self.chunks[index].is_leaf {
            self.delete_all_children_of_chunk(chunk_id);
        }
        self.post_processors.clear();
        self.chunk_index(chunk_id)
            .ok_or_else(|| self.report(FractureError::InvalidChunk(chunk_id)))
    }

    /// Parent the pieces of a fracture will hang from.
    fn fracture_parent(&self, index: usize, replace_chunk: bool) -> Option<ChunkId> {
        if replace_chunk {
            self.chunks[index].parent
        } else {
            Some(self.chunks[index].chunk_id)
        }
    }

    fn push_chunk(&mut self, mesh: Mesh, parent: Option<ChunkId>, is_leaf: bool) -> usize {
        let chunk_id = self.next_chunk_id();
        self.chunks.push(ChunkInfo {
            mesh,
            parent,
            chunk_id,
            is_leaf,
            is_changed: true,
        });
        self.chunks.len() - 1
    }

    /// Add `pieces` as children, retire the fractured chunk and split
    /// islands when requested.
    fn commit_fracture(
        &mut self,
        chunk_id: ChunkId,
        parent: Option<ChunkId>,
        pieces: Vec<Mesh>,
        replace_chunk: bool,
    ) -> Result<(), FractureError> {
        let created: Vec<ChunkId> = pieces
            .into_iter()
            .map(|mesh| {
                let index = self.push_chunk(mesh, parent, true);
                self.chunks[index].chunk_id
            })
            .collect();
        if let Some(index) = self.chunk_index(chunk_id) {
            self.chunks[index].is_leaf = false;
        }
        if replace_chunk {
            self.erase_chunk(chunk_id);
        }
        self.logger.debug(&format!(
            "chunk {} fractured into {} pieces",
            chunk_id,
            created.len()
        ));
        if self.remove_islands {
            for id in created {
                self.island_detection_and_removing(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use crate::logging::tests::RecordingLogger;
    use crate::mesh::shapes::cuboid;

    fn tool_with_cube() -> FractureTool {
        let mut tool = FractureTool::with_logger(Box::new(NullLogger));
        let cube = cuboid(&Point3::new(1.0, 2.0, 3.0), &Point3::new(3.0, 4.0, 5.0));
        tool.set_source_mesh(&cube).unwrap();
        tool
    }

    fn add_child(tool: &mut FractureTool, parent: ChunkId) -> ChunkId {
        let mesh = tool.chunks[0].mesh.clone();
        let index = tool.push_chunk(mesh, Some(parent), true);
        if let Some(p) = tool.chunk_index(parent) {
            tool.chunks[p].is_leaf = false;
        }
        tool.chunks[index].chunk_id
    }

    #[test]
    fn test_source_mesh_is_normalized() {
        let tool = tool_with_cube();
        let (offset, scale) = tool.transformation();
        assert_eq!(offset, Vector3::new(2.0, 3.0, 4.0));
        assert_eq!(scale, 2.0);
        let bbox = tool.chunks()[0].mesh.bounding_box();
        assert!((bbox.mins - Point3::new(-0.5, -0.5, -0.5)).norm() < 1e-12);
        assert!((bbox.maxs - Point3::new(0.5, 0.5, 0.5)).norm() < 1e-12);
        assert_eq!(tool.chunk_id(0), Some(0));
        assert!(tool.chunk_info(0).unwrap().is_leaf);
    }

    #[test]
    fn test_hierarchy_queries() {
        let mut tool = tool_with_cube();
        let a = add_child(&mut tool, 0);
        let b = add_child(&mut tool, a);
        let c = add_child(&mut tool, 0);
        assert_eq!(tool.chunk_depth(b), Some(2));
        assert_eq!(tool.chunks_id_at_depth(1), vec![a, c]);
        assert!(tool.is_ancestor_for_chunk(0, b));
        assert!(tool.is_ancestor_for_chunk(a, b));
        assert!(!tool.is_ancestor_for_chunk(c, b));
        assert!(!tool.is_ancestor_for_chunk(b, b));

        assert!(tool.erase_chunk(a));
        assert_eq!(tool.chunk_count(), 2);
        assert_eq!(tool.chunk_index(b), None);
        assert!(tool.delete_all_children_of_chunk(0));
        assert_eq!(tool.chunk_count(), 1);
        assert!(tool.chunk_info(0).unwrap().is_leaf);
        assert!(!tool.delete_all_children_of_chunk(0));
    }

    #[test]
    fn test_replacing_source_fails_and_logs() {
        let logger = RecordingLogger::default();
        let records = logger.records.clone();
        let mut tool = FractureTool::with_logger(Box::new(logger));
        tool.set_source_mesh(&cuboid(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0)))
            .unwrap();
        assert_eq!(tool.prepare_fracture(0, true), Err(FractureError::ReplaceSourceChunk));
        assert_eq!(tool.prepare_fracture(42, false), Err(FractureError::InvalidChunk(42)));
        let records = records.lock().unwrap();
        let errors: Vec<&String> = records
            .iter()
            .filter(|(level, _)| *level == log::Level::Error)
            .map(|(_, message)| message)
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("(ReplaceSourceChunk)"));
    }

    #[test]
    fn test_finalize_and_extract_world_space() {
        let mut tool = tool_with_cube();
        assert!(tool.base_mesh(0).is_none());
        tool.finalize_fracturing();
        let triangles = tool.base_mesh(0).unwrap();
        assert_eq!(triangles.len(), 12);
        let volume = Mesh::from_triangles(&triangles).volume();
        assert!((volume - 8.0).abs() < 1e-9);

        let (vertices, indices) = tool.buffered_base_meshes();
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0].len(), 36);
        assert_eq!(vertices.len(), 24);
        assert!(vertices.iter().all(|v| v.pos.x >= 1.0 - 1e-9 && v.pos.x <= 3.0 + 1e-9));

        let mesh = tool.create_chunk_mesh(0).unwrap();
        assert!((mesh.volume() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_finalize_drops_empty_chunks_and_reparents() {
        let mut tool = tool_with_cube();
        let a = add_child(&mut tool, 0);
        let b = add_child(&mut tool, a);
        let index = tool.chunk_index(a).unwrap();
        tool.chunks[index].mesh = Mesh::new();
        tool.finalize_fracturing();
        assert_eq!(tool.chunk_index(a), None);
        let b_index = tool.chunk_index(b).unwrap();
        assert_eq!(tool.chunks()[b_index].parent, Some(0));
        assert!(tool.chunks().iter().all(|c| !c.is_changed));
    }

    #[test]
    fn test_mesh_overlap() {
        let a = cuboid(&Point3::origin(), &Point3::new(2.0, 1.0, 1.0));
        let b = cuboid(&Point3::new(1.0, -1.0, -1.0), &Point3::new(3.0, 2.0, 2.0));
        assert!((FractureTool::mesh_overlap(&a, &b) - 0.5).abs() < 1e-9);
        let far = cuboid(&Point3::new(5.0, 5.0, 5.0), &Point3::new(6.0, 6.0, 6.0));
        assert_eq!(FractureTool::mesh_overlap(&a, &far), 0.0);
    }

    #[test]
    fn test_invalid_source_is_rejected() {
        let mut tool = FractureTool::with_logger(Box::new(NullLogger));
        assert!(matches!(
            tool.set_source_mesh(&Mesh::new()),
            Err(FractureError::InvalidMesh(_))
        ));
        assert_eq!(tool.prepare_fracture(0, false), Err(FractureError::NoSourceMesh));
    }

    #[test]
    fn test_source_with_dangling_indices_is_rejected() {
        let mut tool = FractureTool::with_logger(Box::new(NullLogger));
        let mut dangling = cuboid(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0));
        dangling.edges[2].e = 99;
        assert!(matches!(
            tool.set_source_mesh(&dangling),
            Err(FractureError::InvalidMesh(_))
        ));

        let mut overrun = cuboid(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0));
        overrun.facets[5].edge_count = 40;
        assert!(matches!(
            tool.set_source_mesh(&overrun),
            Err(FractureError::InvalidMesh(_))
        ));
        assert_eq!(tool.chunk_count(), 0);
    }

    #[test]
    fn test_interior_material_survives_new_source() {
        let mut tool = FractureTool::with_logger(Box::new(NullLogger));
        tool.set_interior_material_id(7);
        tool.set_source_mesh(&cuboid(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0)))
            .unwrap();
        assert_eq!(tool.interior_material_id(), 7);
        tool.reset();
        assert_eq!(tool.interior_material_id(), 7);
        assert_eq!(tool.chunk_count(), 0);
    }
}
