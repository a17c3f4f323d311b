// Re-export parry for the appropriate float size
#[cfg(feature = "f64")]
pub use parry3d_f64 as parry3d;

#[cfg(feature = "f32")]
pub use parry3d;

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Lazily-initialized tolerance used by the triangulator and the cutout tracer.
/// Defaults depend on precision (`f32` vs `f64`), but can be overridden:
///  1) **Build-time**: set env var `SHARDRS_TOLERANCE` (e.g. `SHARDRS_TOLERANCE=1e-6 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    #[cfg(feature = "f32")]
    {
        1e-4
    }
    #[cfg(feature = "f64")]
    {
        1e-6
    }
}

/// Returns the current tolerance value.
/// If not set yet, it tries `SHARDRS_TOLERANCE` (parsed as the active `Real`) and
/// falls back to a precision dependent default.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("SHARDRS_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Positions closer than this (per axis) are the same vertex.
pub const POSITION_EPSILON: Real = 1e-5;

/// Normals and texture coordinates closer than this (per component) are equal.
pub const NORMAL_EPSILON: Real = 1e-3;

/// Slack used by the weak bounding box overlap test.
pub const BBOX_EPSILON: Real = 1e-5;

/// Boolean results enclosing less than this share of their bounding cube are empty.
#[cfg(feature = "f32")]
pub const VOLUME_EPSILON: Real = 1e-5;
/// Boolean results enclosing less than this share of their bounding cube are empty.
#[cfg(feature = "f64")]
pub const VOLUME_EPSILON: Real = 1e-10;

/// Sentinel magnitude for "no point found yet" searches.
pub const MAXIMUM_EXTENT: Real = 1e9;

// Pi
/// Archimedes' constant (π)
#[cfg(feature = "f32")]
pub const PI: Real = core::f32::consts::PI;
/// Archimedes' constant (π)
#[cfg(feature = "f64")]
pub const PI: Real = core::f64::consts::PI;

// Tau
/// The full circle constant (τ)
#[cfg(feature = "f32")]
pub const TAU: Real = core::f32::consts::TAU;
/// The full circle constant (τ)
#[cfg(feature = "f64")]
pub const TAU: Real = core::f64::consts::TAU;
