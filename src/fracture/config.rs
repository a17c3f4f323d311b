//! Parameters of slicing and cutout fracturing.

use crate::float_types::Real;
use crate::fracture::cutout::CutoutSet;
use crate::mesh::shapes::NoisySurface;
use nalgebra::{Isometry3, Vector2};

/// Half size of the noise-displaced grid of a noisy cutting surface, in
/// normalized chunk space.
pub const NOISY_PART_SIZE: Real = 1.2;

/// Shape of a noisy cutting surface. An amplitude of zero selects plain
/// planar cuts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseConfiguration {
    pub amplitude: Real,
    pub frequency: Real,
    pub octave_number: u32,
    /// Quads per side of the displaced grid.
    pub surface_resolution: u32,
}

impl Default for NoiseConfiguration {
    fn default() -> Self {
        NoiseConfiguration {
            amplitude: 0.0,
            frequency: 1.0,
            octave_number: 1,
            surface_resolution: 1,
        }
    }
}

impl NoiseConfiguration {
    pub fn is_noisy(&self) -> bool {
        self.amplitude != 0.0
    }

    pub(crate) const fn surface(&self, seed: u64) -> NoisySurface {
        NoisySurface {
            jagged_plane_size: NOISY_PART_SIZE,
            resolution: self.surface_resolution,
            amplitude: self.amplitude,
            frequency: self.frequency,
            octaves: self.octave_number,
            seed,
        }
    }
}

/// Evenly spaced cuts along the three axes of a chunk's bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicingConfiguration {
    pub x_slices: u32,
    pub y_slices: u32,
    pub z_slices: u32,
    /// Random forward shift of each plane, relative to the spacing.
    pub offset_variations: Real,
    /// Random tilt of each plane normal.
    pub angle_variations: Real,
    pub noise: NoiseConfiguration,
}

impl Default for SlicingConfiguration {
    fn default() -> Self {
        SlicingConfiguration {
            x_slices: 1,
            y_slices: 1,
            z_slices: 1,
            offset_variations: 0.0,
            angle_variations: 0.0,
            noise: NoiseConfiguration::default(),
        }
    }
}

/// Where and how large a [`CutoutSet`] is stamped through a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoutConfiguration {
    pub cutout_set: CutoutSet,
    /// World frame of the cutout plane. Outlines live in its local xy plane
    /// and are extruded along its local z axis.
    pub transform: Isometry3<Real>,
    /// World size of the cutout set's unit square. `None` fits it to the
    /// chunk's bounding box.
    pub scale: Option<Vector2<Real>>,
}

impl CutoutConfiguration {
    pub fn new(cutout_set: CutoutSet) -> Self {
        CutoutConfiguration {
            cutout_set,
            transform: Isometry3::identity(),
            scale: None,
        }
    }
}
