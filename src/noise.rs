//! Deterministic 3D noise used to roughen fracture surfaces.

use crate::float_types::Real;
use nalgebra::Point3;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// A scalar field sampled at a position.
pub trait NoiseFunction {
    fn sample(&self, position: &Point3<Real>) -> Real;
}

impl<F: Fn(&Point3<Real>) -> Real> NoiseFunction for F {
    fn sample(&self, position: &Point3<Real>) -> Real {
        self(position)
    }
}

const GRADIENTS: [[Real; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// Fractal simplex noise.
///
/// Each octave doubles the frequency and halves the weight. The result lies
/// roughly in `[-amplitude, amplitude]`, with the same output for the same
/// `seed`.
#[derive(Debug, Clone)]
pub struct SimplexNoise {
    pub amplitude: Real,
    pub frequency: Real,
    pub octaves: u32,
    permutation: Vec<u8>,
}

impl SimplexNoise {
    pub fn new(amplitude: Real, frequency: Real, octaves: u32, seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255u8).collect();
        table.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut permutation = Vec::with_capacity(512);
        permutation.extend_from_slice(&table);
        permutation.extend_from_slice(&table);
        SimplexNoise {
            amplitude,
            frequency,
            octaves: octaves.max(1),
            permutation,
        }
    }

    #[inline]
    fn hash(&self, i: i64, j: i64, k: i64) -> usize {
        let p = &self.permutation;
        let kk = (k & 255) as usize;
        let jj = (j & 255) as usize;
        let ii = (i & 255) as usize;
        p[ii + p[jj + p[kk] as usize] as usize] as usize % GRADIENTS.len()
    }

    #[inline]
    fn corner(&self, gradient: usize, x: Real, y: Real, z: Real) -> Real {
        let t = 0.6 - x * x - y * y - z * z;
        if t < 0.0 {
            return 0.0;
        }
        let g = GRADIENTS[gradient];
        let t2 = t * t;
        t2 * t2 * (g[0] * x + g[1] * y + g[2] * z)
    }

    /// Single octave of simplex noise in `[-1, 1]`.
    pub fn simplex(&self, x: Real, y: Real, z: Real) -> Real {
        const F3: Real = 1.0 / 3.0;
        const G3: Real = 1.0 / 6.0;

        let s = (x + y + z) * F3;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let k = (z + s).floor();
        let t = (i + j + k) * G3;
        let x0 = x - (i - t);
        let y0 = y - (j - t);
        let z0 = z - (k - t);

        // which simplex of the skewed cube holds the point
        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let x1 = x0 - i1 as Real + G3;
        let y1 = y0 - j1 as Real + G3;
        let z1 = z0 - k1 as Real + G3;
        let x2 = x0 - i2 as Real + 2.0 * G3;
        let y2 = y0 - j2 as Real + 2.0 * G3;
        let z2 = z0 - k2 as Real + 2.0 * G3;
        let x3 = x0 - 1.0 + 3.0 * G3;
        let y3 = y0 - 1.0 + 3.0 * G3;
        let z3 = z0 - 1.0 + 3.0 * G3;

        let (i, j, k) = (i as i64, j as i64, k as i64);
        let n0 = self.corner(self.hash(i, j, k), x0, y0, z0);
        let n1 = self.corner(self.hash(i + i1, j + j1, k + k1), x1, y1, z1);
        let n2 = self.corner(self.hash(i + i2, j + j2, k + k2), x2, y2, z2);
        let n3 = self.corner(self.hash(i + 1, j + 1, k + 1), x3, y3, z3);

        32.0 * (n0 + n1 + n2 + n3)
    }
}

impl NoiseFunction for SimplexNoise {
    fn sample(&self, position: &Point3<Real>) -> Real {
        let mut result = 0.0;
        let mut frequency = self.frequency;
        let mut weight = 1.0;
        for _ in 0..self.octaves {
            result += weight
                * self.simplex(
                    position.x * frequency,
                    position.y * frequency,
                    position.z * frequency,
                );
            frequency *= 2.0;
            weight *= 0.5;
        }
        result * self.amplitude
    }
}
