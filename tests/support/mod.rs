//! Test support library
//! Shared fixtures and measurements for the integration tests.

use nalgebra::Point3;
use shardrs::{
    FractureTool,
    float_types::Real,
    logging::NullLogger,
    mesh::{Mesh, shapes::cuboid},
};

/// Axis aligned box between `min` and `max` as a fracture source.
pub fn tool_with_box(min: [Real; 3], max: [Real; 3]) -> FractureTool {
    let mut tool = FractureTool::with_logger(Box::new(NullLogger));
    tool.set_source_mesh(&cuboid(&Point3::from(min), &Point3::from(max)))
        .expect("a cuboid is a valid source mesh");
    tool
}

pub fn unit_cube_tool() -> FractureTool {
    tool_with_box([0.0; 3], [1.0; 3])
}

/// Centers of the eight octants of the unit cube.
pub fn octant_sites() -> Vec<Point3<Real>> {
    let mut sites = Vec::with_capacity(8);
    for x in [0.25, 0.75] {
        for y in [0.25, 0.75] {
            for z in [0.25, 0.75] {
                sites.push(Point3::new(x, y, z));
            }
        }
    }
    sites
}

/// World space meshes of every leaf chunk.
pub fn leaf_meshes(tool: &FractureTool) -> Vec<Mesh> {
    tool.chunks()
        .iter()
        .filter(|c| c.is_leaf)
        .filter_map(|c| tool.create_chunk_mesh(c.chunk_id))
        .collect()
}

/// Summed world space volume of the leaf chunks.
pub fn leaf_volume(tool: &FractureTool) -> Real {
    leaf_meshes(tool).iter().map(Mesh::volume).sum()
}

pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}
