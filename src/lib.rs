//! A polygonal mesh **fracture** kernel: Voronoi fracturing, slicing, planar
//! cuts and image-driven cutouts, built on a winding-number mesh boolean
//! over arbitrary polygon facets.
//!
//! A [`FractureTool`](fracture::FractureTool) normalizes a source mesh, splits
//! chunks into a hierarchy of pieces, and after
//! [`finalize_fracturing`](fracture::FractureTool::finalize_fracturing)
//! hands out triangulated (optionally tessellated and noised) chunk meshes
//! in world space.
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//! - **image-io**: build cutout sets from grayscale images
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64

#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod accelerator;
pub mod boolean;
pub mod errors;
pub mod float_types;
pub mod fracture;
pub mod logging;
pub mod mesh;
pub mod noise;
pub mod noiser;
pub mod random;
pub mod triangulator;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use boolean::{BooleanConfiguration, BooleanEvaluator};
pub use errors::FractureError;
pub use fracture::{ChunkId, FractureTool};
pub use mesh::{Mesh, Vertex};
