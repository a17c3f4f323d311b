//! Slicing: splitting a chunk by families of (optionally noisy) planes.

use crate::accelerator::{DummyAccelerator, Sweep};
use crate::boolean::{BooleanConfiguration, BooleanEvaluator};
use crate::errors::FractureError;
use crate::float_types::Real;
use crate::fracture::config::{NoiseConfiguration, SlicingConfiguration};
use crate::fracture::{CUTTING_BOX_SIZE, ChunkId, FractureTool, SLICING_INDEXER_OFFSET};
use crate::mesh::Mesh;
use crate::mesh::shapes::{cutting_box, inverse_normal_and_set_indices, noisy_cutting_box};
use crate::random::RandomGenerator;
use nalgebra::{Point3, Vector3};

/// Size of the half-space proxy of a planar slice.
const SLICING_BOX_SIZE: Real = 20.0;

impl FractureTool {
    /// Slice a chunk along x, then y, then z.
    ///
    /// Planes are spaced evenly over the chunk's bounding box and jittered
    /// by the configuration's variations. A non-zero noise amplitude switches
    /// to [`FractureTool::slicing_noisy`].
    pub fn slicing(
        &mut self,
        chunk_id: ChunkId,
        conf: &SlicingConfiguration,
        replace_chunk: bool,
        rnd: &mut dyn RandomGenerator,
    ) -> Result<(), FractureError> {
        if conf.noise.is_noisy() {
            return self.slicing_noisy(chunk_id, conf, replace_chunk, rnd);
        }
        self.slice_chunk(chunk_id, conf, replace_chunk, rnd)
    }

    /// Slicing with noise-displaced cutting surfaces and full booleans.
    pub fn slicing_noisy(
        &mut self,
        chunk_id: ChunkId,
        conf: &SlicingConfiguration,
        replace_chunk: bool,
        rnd: &mut dyn RandomGenerator,
    ) -> Result<(), FractureError> {
        let mut conf = *conf;
        if !conf.noise.is_noisy() {
            self.logger
                .warn("slicing_noisy: zero noise amplitude, cutting surfaces are flat");
        }
        conf.noise.surface_resolution = conf.noise.surface_resolution.max(1);
        self.slice_chunk(chunk_id, &conf, replace_chunk, rnd)
    }

    /// Split a chunk in two by the plane through `point` (world space) with
    /// normal `normal`. The first child lies behind the plane, the second in
    /// front of it. `noise` shapes the cutting surface like in slicing.
    pub fn cut(
        &mut self,
        chunk_id: ChunkId,
        normal: &Vector3<Real>,
        point: &Point3<Real>,
        noise: &NoiseConfiguration,
        replace_chunk: bool,
        rnd: &mut dyn RandomGenerator,
    ) -> Result<(), FractureError> {
        let Some(direction) = normal.try_normalize(0.0) else {
            return Err(self.report(FractureError::InvalidMesh("cut normal has zero length".to_string())));
        };
        let index = self.prepare_fracture(chunk_id, replace_chunk)?;
        let parent = self.fracture_parent(index, replace_chunk);
        let mesh = self.chunks[index].mesh.clone();
        let center = self.to_local(point);

        let mut evaluator = BooleanEvaluator::new();
        let (piece, rest) = self
            .split(&mut evaluator, &mesh, &center, &direction, noise, rnd)
            .map_err(|e| self.report(e))?;
        let pieces: Vec<Mesh> = piece.into_iter().chain(rest).collect();
        self.commit_fracture(chunk_id, parent, pieces, replace_chunk)
    }

    fn slice_chunk(
        &mut self,
        chunk_id: ChunkId,
        conf: &SlicingConfiguration,
        replace_chunk: bool,
        rnd: &mut dyn RandomGenerator,
    ) -> Result<(), FractureError> {
        let index = self.prepare_fracture(chunk_id, replace_chunk)?;
        let parent = self.fracture_parent(index, replace_chunk);
        let mesh = self.chunks[index].mesh.clone();
        let bbox = mesh.bounding_box();

        let mut evaluator = BooleanEvaluator::new();
        let mut pieces = vec![mesh];
        for (axis, slices) in [conf.x_slices, conf.y_slices, conf.z_slices].into_iter().enumerate() {
            let spacing = (bbox.maxs[axis] - bbox.mins[axis]) / (slices as Real + 1.0);
            let mut sliced = Vec::with_capacity(pieces.len() * (slices as usize + 1));
            for piece in pieces {
                let mut center = Point3::origin();
                center[axis] = bbox.mins[axis] + spacing;
                let mut direction = Vector3::zeros();
                direction[axis] = 1.0;

                let mut rest = Some(piece);
                for _ in 0..slices {
                    let Some(current) = rest.take() else {
                        break;
                    };
                    let jitter = Vector3::new(rnd.next_signed(), rnd.next_signed(), rnd.next_signed());
                    let tilted = direction + jitter * conf.angle_variations;
                    let (slab, remainder) = self
                        .split(&mut evaluator, &current, &center, &tilted, &conf.noise, rnd)
                        .map_err(|e| self.report(e))?;
                    sliced.extend(slab);
                    rest = remainder;
                    center[axis] += spacing + rnd.next_value() * conf.offset_variations * spacing;
                }
                sliced.extend(rest);
            }
            pieces = sliced;
        }
        self.commit_fracture(chunk_id, parent, pieces, replace_chunk)
    }

    /// Split `mesh` by the surface through `center` facing `direction`.
    /// Returns the part behind the surface and the part in front of it.
    fn split(
        &mut self,
        evaluator: &mut BooleanEvaluator,
        mesh: &Mesh,
        center: &Point3<Real>,
        direction: &Vector3<Real>,
        noise: &NoiseConfiguration,
        rnd: &mut dyn RandomGenerator,
    ) -> Result<(Option<Mesh>, Option<Mesh>), FractureError> {
        if noise.is_noisy() {
            let seed = (rnd.next_value() * u32::MAX as Real) as u64;
            let id = self.plane_index_offset;
            let mut cutter = noisy_cutting_box(
                center,
                direction,
                CUTTING_BOX_SIZE,
                &noise.surface(seed),
                id,
            );
            cutter.set_material_id(self.interior_material_id);
            let mut mesh_accelerator = Sweep::new(mesh);
            let mut cutter_accelerator = Sweep::new(&cutter);

            evaluator.perform_boolean(
                mesh,
                &cutter,
                &mut mesh_accelerator,
                &mut cutter_accelerator,
                BooleanConfiguration::difference(),
            )?;
            let behind = evaluator.create_new_mesh();
            inverse_normal_and_set_indices(&mut cutter, -id);
            self.plane_index_offset += 1;
            evaluator.perform_boolean(
                mesh,
                &cutter,
                &mut mesh_accelerator,
                &mut cutter_accelerator,
                BooleanConfiguration::intersection(),
            )?;
            Ok((behind, evaluator.create_new_mesh()))
        } else {
            let id = self.plane_index_offset + SLICING_INDEXER_OFFSET;
            let mut cutter = cutting_box(center, &-direction, SLICING_BOX_SIZE, id);
            cutter.set_material_id(self.interior_material_id);

            evaluator.perform_fast_cutting(
                mesh,
                &cutter,
                &mut DummyAccelerator::for_mesh(&cutter),
                BooleanConfiguration::intersection(),
            )?;
            let behind = evaluator.create_new_mesh();
            inverse_normal_and_set_indices(&mut cutter, -id);
            self.plane_index_offset += 1;
            evaluator.perform_fast_cutting(
                mesh,
                &cutter,
                &mut DummyAccelerator::for_mesh(&cutter),
                BooleanConfiguration::difference(),
            )?;
            Ok((behind, evaluator.create_new_mesh()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use crate::mesh::shapes::cuboid;
    use crate::random::SeededRandom;
    use crate::triangulator::Triangulator;

    fn tool_with_box(max: Point3<Real>) -> FractureTool {
        let mut tool = FractureTool::with_logger(Box::new(NullLogger));
        tool.set_source_mesh(&cuboid(&Point3::origin(), &max)).unwrap();
        tool
    }

    fn plain(x: u32, y: u32, z: u32) -> SlicingConfiguration {
        SlicingConfiguration {
            x_slices: x,
            y_slices: y,
            z_slices: z,
            ..SlicingConfiguration::default()
        }
    }

    #[test]
    fn test_single_slice_halves_box() {
        let mut tool = tool_with_box(Point3::new(2.0, 1.0, 1.0));
        let mut rnd = SeededRandom::new(1);
        tool.slicing(0, &plain(1, 0, 0), false, &mut rnd).unwrap();
        assert_eq!(tool.chunk_count(), 3);
        let (a, b) = (&tool.chunks()[1].mesh, &tool.chunks()[2].mesh);
        assert!((a.volume() - 0.125).abs() < 1e-9);
        assert!((b.volume() - 0.125).abs() < 1e-9);
        assert!(a.bounding_box().maxs.x <= 1e-9);
        assert!(b.bounding_box().mins.x >= -1e-9);
        let id = 1 + SLICING_INDEXER_OFFSET;
        assert!(a.facets.iter().any(|f| f.user_data == id));
        assert!(b.facets.iter().any(|f| f.user_data == -id));
        assert!(a
            .facets
            .iter()
            .filter(|f| f.user_data != 0)
            .all(|f| f.material_id == tool.interior_material_id()));
    }

    #[test]
    fn test_grid_slicing_conserves_volume() {
        let mut tool = tool_with_box(Point3::new(1.0, 1.0, 1.0));
        let mut rnd = SeededRandom::new(2);
        tool.slicing(0, &plain(2, 1, 1), false, &mut rnd).unwrap();
        assert_eq!(tool.chunk_count(), 1 + 12);
        let total: Real = tool.chunks()[1..].iter().map(|c| c.mesh.volume()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(tool.chunks()[1..].iter().all(|c| c.parent == Some(0) && c.is_leaf));
    }

    #[test]
    fn test_jittered_slicing_conserves_volume() {
        let mut tool = tool_with_box(Point3::new(1.0, 1.0, 1.0));
        let mut rnd = SeededRandom::new(9);
        let conf = SlicingConfiguration {
            offset_variations: 0.3,
            angle_variations: 0.2,
            ..plain(2, 2, 0)
        };
        tool.slicing(0, &conf, false, &mut rnd).unwrap();
        assert!(tool.chunk_count() > 4);
        let total: Real = tool.chunks()[1..].iter().map(|c| c.mesh.volume()).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reslicing_discards_previous_children() {
        let mut tool = tool_with_box(Point3::new(1.0, 1.0, 1.0));
        let mut rnd = SeededRandom::new(4);
        tool.slicing(0, &plain(3, 0, 0), false, &mut rnd).unwrap();
        assert_eq!(tool.chunk_count(), 5);
        tool.slicing(0, &plain(1, 0, 0), false, &mut rnd).unwrap();
        assert_eq!(tool.chunk_count(), 3);
    }

    #[test]
    fn test_cut_splits_in_two() {
        let mut tool = tool_with_box(Point3::new(1.0, 1.0, 1.0));
        let mut rnd = SeededRandom::new(0);
        tool.slicing(0, &plain(1, 0, 0), false, &mut rnd).unwrap();
        let child = tool.chunk_id(1).unwrap();
        let volume = tool.chunks()[1].mesh.volume();
        tool.cut(
            child,
            &Vector3::new(0.0, 1.0, 1.0),
            &Point3::new(0.25, 0.5, 0.5),
            &NoiseConfiguration::default(),
            true,
            &mut rnd,
        )
        .unwrap();
        assert_eq!(tool.chunk_index(child), None);
        assert_eq!(tool.chunk_count(), 4);
        let halves: Vec<&Mesh> = tool
            .chunks()
            .iter()
            .filter(|c| c.chunk_id > 2)
            .map(|c| &c.mesh)
            .collect();
        assert_eq!(halves.len(), 2);
        assert!(tool.chunks()[1..].iter().all(|c| c.parent == Some(0)));
        assert!((halves[0].volume() + halves[1].volume() - volume).abs() < 1e-9);
        assert!((halves[0].volume() - halves[1].volume()).abs() < 1e-9);
    }

    #[test]
    fn test_noisy_cut_conserves_volume() {
        let mut tool = tool_with_box(Point3::new(1.0, 1.0, 1.0));
        let mut rnd = SeededRandom::new(12);
        let noise = NoiseConfiguration {
            amplitude: 0.05,
            frequency: 2.0,
            octave_number: 2,
            surface_resolution: 8,
        };
        tool.cut(0, &Vector3::x(), &Point3::new(0.5, 0.5, 0.5), &noise, false, &mut rnd)
            .unwrap();
        assert_eq!(tool.chunk_count(), 3);
        let (a, b) = (&tool.chunks()[1].mesh, &tool.chunks()[2].mesh);
        // noisy quads are not planar, so polygon and triangle volumes drift
        // by about the noise resolution
        let triangulated_volume = |mesh: &Mesh| {
            let mut triangulator = Triangulator::new();
            triangulator.triangulate(mesh);
            triangulator.to_mesh().volume()
        };
        assert!((a.volume() + b.volume() - 1.0).abs() < 1e-2);
        assert!((triangulated_volume(a) + triangulated_volume(b) - 1.0).abs() < 1e-2);
        assert!((a.volume() - 0.5).abs() < 0.1);
        assert!(a.facets.iter().any(|f| f.user_data == 1));
        assert!(b.facets.iter().any(|f| f.user_data == -1));
    }
}
