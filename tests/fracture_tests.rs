mod support;

use nalgebra::{Isometry3, Point2, Point3, Vector2, Vector3};
use shardrs::{
    FractureError,
    float_types::{Real, parry3d::mass_properties::MassProperties},
    fracture::{CutoutConfiguration, CutoutSet, NoiseConfiguration, SlicingConfiguration, VoronoiSitesGenerator},
    mesh::shapes::cuboid,
    random::SeededRandom,
};

use crate::support::{approx_eq, leaf_meshes, leaf_volume, octant_sites, tool_with_box, unit_cube_tool};

fn slices(x: u32, y: u32, z: u32) -> SlicingConfiguration {
    SlicingConfiguration {
        x_slices: x,
        y_slices: y,
        z_slices: z,
        ..SlicingConfiguration::default()
    }
}

#[test]
fn voronoi_octants_give_eight_equal_leaves() {
    let mut tool = unit_cube_tool();
    tool.voronoi_fracturing(0, &octant_sites(), false)
        .expect("voronoi fracturing of the source");

    assert_eq!(tool.chunk_count(), 9);
    let leaves = leaf_meshes(&tool);
    assert_eq!(leaves.len(), 8);
    for mesh in &leaves {
        assert!(approx_eq(mesh.volume(), 0.125, 1e-9), "octant volume {}", mesh.volume());
        assert!(!mesh.has_open_edges(), "fracture pieces must be closed");
        let extents = mesh.bounding_box().maxs - mesh.bounding_box().mins;
        assert!(approx_eq(extents.max(), 0.5, 1e-9));
    }
    assert!(tool.chunks()[1..].iter().all(|c| c.parent == Some(0)));
    assert!(!tool.chunks()[0].is_leaf);
    assert_eq!(tool.chunks_id_at_depth(1).len(), 8);
}

#[test]
fn single_slice_splits_at_the_middle() {
    let mut tool = tool_with_box([0.0, 0.0, 0.0], [2.0, 1.0, 1.0]);
    let mut rnd = SeededRandom::new(0);
    tool.slicing(0, &slices(1, 0, 0), false, &mut rnd).unwrap();

    let mut leaves = leaf_meshes(&tool);
    assert_eq!(leaves.len(), 2);
    leaves.sort_by(|a, b| a.bounding_box().mins.x.total_cmp(&b.bounding_box().mins.x));
    assert!(approx_eq(leaves[0].bounding_box().maxs.x, 1.0, 1e-9));
    assert!(approx_eq(leaves[1].bounding_box().mins.x, 1.0, 1e-9));
    for mesh in &leaves {
        assert!(approx_eq(mesh.volume(), 1.0, 1e-9));
    }
}

#[test]
fn replacing_the_source_chunk_changes_nothing() {
    let mut tool = unit_cube_tool();
    let mut rnd = SeededRandom::new(0);
    assert_eq!(
        tool.voronoi_fracturing(0, &octant_sites(), true),
        Err(FractureError::ReplaceSourceChunk)
    );
    assert_eq!(
        tool.slicing(0, &slices(1, 1, 1), true, &mut rnd),
        Err(FractureError::ReplaceSourceChunk)
    );
    assert_eq!(tool.chunk_count(), 1);
    assert!(tool.chunks()[0].is_leaf);
}

#[test]
fn unknown_chunks_and_missing_sites_are_errors() {
    let mut tool = unit_cube_tool();
    assert_eq!(
        tool.voronoi_fracturing(5, &octant_sites(), false),
        Err(FractureError::InvalidChunk(5))
    );
    assert_eq!(
        tool.voronoi_fracturing(0, &octant_sites()[..1], false),
        Err(FractureError::NotEnoughSites(1))
    );
    assert_eq!(tool.chunk_count(), 1);
}

#[test]
fn islands_are_split_into_their_own_chunks() {
    let mut source = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0));
    source.append(&cuboid(&Point3::new(2.0, 0.0, 0.0), &Point3::new(3.0, 1.0, 1.0)));
    let mut tool = shardrs::FractureTool::with_logger(Box::new(shardrs::logging::NullLogger));
    tool.set_source_mesh(&source).unwrap();
    tool.set_remove_islands(true);

    let mut rnd = SeededRandom::new(0);
    tool.slicing(0, &slices(0, 1, 0), false, &mut rnd).unwrap();
    let leaves = leaf_meshes(&tool);
    assert_eq!(leaves.len(), 4);
    for mesh in &leaves {
        assert!(approx_eq(mesh.volume(), 0.5, 1e-9), "island volume {}", mesh.volume());
        let extents = mesh.bounding_box().maxs - mesh.bounding_box().mins;
        assert!(approx_eq(extents.x, 1.0, 1e-9));
    }
}

#[test]
fn nested_fracturing_conserves_volume() {
    let mut tool = unit_cube_tool();
    let mut rnd = SeededRandom::new(21);
    let conf = SlicingConfiguration {
        offset_variations: 0.2,
        angle_variations: 0.1,
        ..slices(1, 1, 0)
    };
    tool.slicing(0, &conf, false, &mut rnd).unwrap();
    assert!(approx_eq(leaf_volume(&tool), 1.0, 1e-6));

    let target = tool.chunk_id(1).unwrap();
    let mesh = tool.create_chunk_mesh(target).unwrap();
    let sites = {
        let mut generator = VoronoiSitesGenerator::new(&mesh, &mut rnd);
        generator.uniformly_generate_sites_in_mesh(6);
        generator.sites().to_vec()
    };
    assert_eq!(sites.len(), 6);
    tool.voronoi_fracturing(target, &sites, false).unwrap();

    assert_eq!(tool.chunk_depth(tool.chunk_id(tool.chunk_count() - 1).unwrap()), Some(2));
    assert!(approx_eq(leaf_volume(&tool), 1.0, 1e-6), "volume {}", leaf_volume(&tool));
    assert!(leaf_meshes(&tool).iter().all(|m| !m.has_open_edges()));
}

#[test]
fn fracturing_is_reproducible() {
    let run = || {
        let mut tool = unit_cube_tool();
        let mut rnd = SeededRandom::new(77);
        let conf = SlicingConfiguration {
            offset_variations: 0.3,
            angle_variations: 0.3,
            ..slices(2, 1, 1)
        };
        tool.slicing(0, &conf, false, &mut rnd).unwrap();
        leaf_meshes(&tool).iter().map(|m| m.volume()).collect::<Vec<Real>>()
    };
    assert_eq!(run(), run());

    let mut tool = unit_cube_tool();
    tool.voronoi_fracturing(0, &octant_sites(), false).unwrap();
    let first: Vec<Real> = leaf_meshes(&tool).iter().map(|m| m.volume()).collect();
    tool.voronoi_fracturing(0, &octant_sites(), false).unwrap();
    let second: Vec<Real> = leaf_meshes(&tool).iter().map(|m| m.volume()).collect();
    assert_eq!(tool.chunk_count(), 9);
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| approx_eq(*a, *b, 1e-12)));
}

#[test]
fn cut_splits_along_a_world_plane() {
    let mut tool = tool_with_box([10.0, 0.0, 0.0], [14.0, 2.0, 2.0]);
    let mut rnd = SeededRandom::new(0);
    tool.cut(
        0,
        &Vector3::new(1.0, 0.0, 0.0),
        &Point3::new(11.0, 1.0, 1.0),
        &NoiseConfiguration::default(),
        false,
        &mut rnd,
    )
    .unwrap();

    let leaves = leaf_meshes(&tool);
    assert_eq!(leaves.len(), 2);
    assert!(approx_eq(leaves[0].volume(), 4.0, 1e-9));
    assert!(approx_eq(leaves[0].bounding_box().maxs.x, 11.0, 1e-9));
    assert!(approx_eq(leaves[1].volume(), 12.0, 1e-9));

    assert!(
        tool.cut(0, &Vector3::zeros(), &Point3::origin(), &NoiseConfiguration::default(), false, &mut rnd)
            .is_err()
    );
}

#[test]
fn cutout_stamps_each_outline() {
    let mut tool = unit_cube_tool();
    let square = |cx: Real| {
        vec![
            Point2::new(cx - 0.1, -0.1),
            Point2::new(cx + 0.1, -0.1),
            Point2::new(cx + 0.1, 0.1),
            Point2::new(cx - 0.1, 0.1),
        ]
    };
    let set = CutoutSet::from_outlines(&[square(-0.25), square(0.25)]).unwrap();
    let conf = CutoutConfiguration {
        transform: Isometry3::translation(0.5, 0.5, 0.5),
        scale: Some(Vector2::new(1.0, 1.0)),
        ..CutoutConfiguration::new(set)
    };
    tool.cutout(0, &conf, false).unwrap();

    let leaves = leaf_meshes(&tool);
    assert_eq!(leaves.len(), 3);
    assert!(approx_eq(leaves[0].volume(), 0.04, 1e-9));
    assert!(approx_eq(leaves[1].volume(), 0.04, 1e-9));
    assert!(approx_eq(leaves[2].volume(), 0.92, 1e-9));
    assert!(leaves.iter().all(|m| !m.has_open_edges()));
}

#[test]
fn unite_keeps_leaves_and_bounds_fan_out() {
    let mut tool = unit_cube_tool();
    tool.voronoi_fracturing(0, &octant_sites(), false).unwrap();
    tool.unite_chunks(4, 2);

    let children_of_source = tool.chunks().iter().filter(|c| c.parent == Some(0)).count();
    assert!(children_of_source < 8);
    assert_eq!(leaf_meshes(&tool).len(), 8);
    assert!(approx_eq(leaf_volume(&tool), 1.0, 1e-9));
    for chunk in tool.chunks().iter().filter(|c| !c.is_leaf && c.chunk_id != 0) {
        let members = tool.chunks().iter().filter(|c| c.parent == Some(chunk.chunk_id)).count();
        assert_eq!(members, 2);
    }
}

#[test]
fn finalized_chunks_are_closed_triangle_meshes() {
    let mut tool = unit_cube_tool();
    tool.voronoi_fracturing(0, &octant_sites(), false).unwrap();
    tool.finalize_fracturing();

    let (vertices, indices) = tool.buffered_base_meshes();
    assert_eq!(indices.len(), tool.chunk_count());
    assert!(indices.iter().all(|buffer| buffer.len() % 3 == 0 && !buffer.is_empty()));
    assert!(indices.iter().flatten().all(|&i| (i as usize) < vertices.len()));

    for index in 1..tool.chunk_count() {
        let triangles = tool.base_mesh(index).unwrap();
        let mesh = shardrs::Mesh::from_triangles(&triangles);
        assert!(!mesh.has_open_edges());
        assert!(approx_eq(mesh.volume(), 0.125, 1e-9));
    }
}

#[test]
fn tessellation_and_noise_touch_only_fracture_surfaces() {
    let mut tool = unit_cube_tool();
    let mut rnd = SeededRandom::new(5);
    tool.slicing(0, &slices(1, 0, 0), false, &mut rnd).unwrap();
    tool.finalize_fracturing();
    let base: Vec<usize> = (0..tool.chunk_count())
        .map(|i| tool.base_mesh(i).unwrap().len())
        .collect();

    tool.tesselate(0.1);
    tool.apply_noise(0.02, 4.0, 2, 0.0, 2, 0.5, 11);
    assert_eq!(tool.noised_mesh(0).unwrap().len(), base[0]);
    for index in 1..tool.chunk_count() {
        let noised = tool.noised_mesh(index).unwrap();
        assert!(noised.len() > base[index], "chunk {index} was not refined");
        let original_faces = noised.iter().filter(|t| t.user_data == 0);
        assert!(original_faces.flat_map(|t| t.vertices()).all(|v| {
            v.pos.x.abs() < 1e-9
                || approx_eq(v.pos.x, 1.0, 1e-9)
                || v.pos.y.abs() < 1e-9
                || approx_eq(v.pos.y, 1.0, 1e-9)
                || v.pos.z.abs() < 1e-9
                || approx_eq(v.pos.z, 1.0, 1e-9)
                || approx_eq(v.pos.x, 0.5, 1e-9)
        }));
    }
}

#[test]
fn octant_mass_properties_match_their_cells() {
    let mut tool = unit_cube_tool();
    tool.voronoi_fracturing(0, &octant_sites(), false).unwrap();
    tool.finalize_fracturing();

    let (vertices, indices) = tool.buffered_base_meshes();
    let points: Vec<Point3<Real>> = vertices.iter().map(|v| v.pos).collect();
    let sites = octant_sites();
    for (index, buffer) in indices.iter().enumerate().skip(1) {
        let triangles: Vec<[u32; 3]> = buffer.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        let props = MassProperties::from_trimesh(1.0, &points, &triangles);
        assert!(approx_eq(1.0 / props.inv_mass, 0.125, 1e-9), "chunk {index}");
        assert!(
            sites.iter().any(|s| (*s - props.local_com).norm() < 1e-9),
            "center of mass {:?} is not an octant center",
            props.local_com
        );
    }
}
