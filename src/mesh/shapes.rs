//! Cutting primitives: boxes, the noisy cutting surface, extruded outlines and cones.

use crate::float_types::{Real, TAU};
use crate::mesh::{Edge, Facet, MATERIAL_INTERIOR, Mesh, Vertex};
use crate::noise::{NoiseFunction, SimplexNoise};
use nalgebra::{Isometry3, Point2, Point3, Vector2, Vector3};

/// Corner layout shared by every box primitive: four corners of the base
/// square (in tangent space `(t1, t2)`) followed by the same four lifted
/// along the normal.
const BOX_CORNERS: [(Real, Real); 4] = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)];

/// Quads of a box over [`BOX_CORNERS`], outward facing.
const BOX_FACETS: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [0, 3, 7, 4],
    [3, 2, 6, 7],
    [5, 6, 2, 1],
    [4, 5, 1, 0],
    [4, 7, 6, 5],
];

const BOX_UVS: [(Real, Real); 4] = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];

/// Two unit vectors spanning the plane orthogonal to `normal`.
///
/// `t1 × t2` points along `-normal`.
pub fn tangents(normal: &Vector3<Real>) -> (Vector3<Real>, Vector3<Real>) {
    let t1 = if normal.z.abs() < 0.9 {
        normal.cross(&Vector3::z())
    } else {
        normal.cross(&Vector3::x())
    }
    .normalize();
    let t2 = t1.cross(normal).normalize();
    (t1, t2)
}

fn push_box_facets(mesh: &mut Mesh, vertex_offset: usize, facets: &[[usize; 4]], user_data: i64) {
    for quad in facets {
        mesh.push_facet(
            (0..4).map(|k| Edge::new(quad[k] + vertex_offset, quad[(k + 1) % 4] + vertex_offset)),
            &Facet::new(0, 0, MATERIAL_INTERIOR, user_data, 0),
        );
    }
}

fn box_positions(
    point: &Point3<Real>,
    normal: &Vector3<Real>,
    t1: &Vector3<Real>,
    t2: &Vector3<Real>,
    size: Real,
    (low, high): (Real, Real),
) -> [Point3<Real>; 8] {
    let mut out = [Point3::origin(); 8];
    for (k, &(a, b)) in BOX_CORNERS.iter().enumerate() {
        let planar = t1 * a + t2 * b;
        out[k] = point + (planar + normal * low) * size;
        out[k + 4] = point + (planar + normal * high) * size;
    }
    out
}

/// Box whose facet 0 lies in the plane through `point` and which extends
/// `size` along `normal`.
///
/// Fast-cutting a mesh with this box keeps the part on the `normal` side of
/// the plane. Every facet gets material [`MATERIAL_INTERIOR`] and
/// `user_data = id`; every vertex normal is `-normal`.
pub fn cutting_box(point: &Point3<Real>, normal: &Vector3<Real>, size: Real, id: i64) -> Mesh {
    let mut mesh = Mesh::new();
    mesh.vertices = vec![Vertex::default(); 8];
    for (k, &(u, v)) in BOX_UVS.iter().enumerate() {
        mesh.vertices[k].uv = Vector2::new(u, v);
        mesh.vertices[k + 4].uv = Vector2::new(u, v);
    }
    push_box_facets(&mut mesh, 0, &BOX_FACETS, id);
    set_cutting_box(point, normal, &mut mesh, size, id);
    mesh
}

/// Move an existing [`cutting_box`] to a new plane and relabel its facets.
pub fn set_cutting_box(
    point: &Point3<Real>,
    normal: &Vector3<Real>,
    mesh: &mut Mesh,
    size: Real,
    id: i64,
) {
    let normal = normal.normalize();
    let (t1, t2) = tangents(&normal);
    let positions = box_positions(point, &normal, &t1, &t2, size, (0.0, 1.0));
    for (vertex, pos) in mesh.vertices.iter_mut().zip(positions) {
        vertex.pos = pos;
        vertex.normal = -normal;
    }
    mesh.set_user_data(id);
    mesh.invalidate_bounding_box();
}

/// Flip every vertex normal and relabel every facet with `id`.
///
/// Used to turn the "keep" side of a cutting primitive into the "discard" side.
pub fn inverse_normal_and_set_indices(mesh: &mut Mesh, id: i64) {
    for vertex in &mut mesh.vertices {
        vertex.flip();
    }
    mesh.set_user_data(id);
}

/// Axis aligned box of half size `size` centered at `point`, zero normals,
/// interior material and zero user data.
pub fn big_box(point: &Point3<Real>, size: Real) -> Mesh {
    let normal = Vector3::z();
    let (t1, t2) = tangents(&normal);
    let mut mesh = Mesh::new();
    for (k, pos) in box_positions(point, &normal, &t1, &t2, size, (-1.0, 1.0)).into_iter().enumerate() {
        let (u, v) = BOX_UVS[k % 4];
        mesh.vertices.push(Vertex::new(pos, Vector3::zeros(), Vector2::new(u, v)));
    }
    push_box_facets(&mut mesh, 0, &BOX_FACETS, 0);
    mesh
}

/// Axis aligned box between `min` and `max` with per-face normals,
/// material 0 and zero user data.
pub fn cuboid(min: &Point3<Real>, max: &Point3<Real>) -> Mesh {
    let corner = |x: usize, y: usize, z: usize| {
        Point3::new(
            if x == 0 { min.x } else { max.x },
            if y == 0 { min.y } else { max.y },
            if z == 0 { min.z } else { max.z },
        )
    };
    // (normal, corners in counter-clockwise order seen from outside)
    let faces: [(Vector3<Real>, [(usize, usize, usize); 4]); 6] = [
        (-Vector3::x(), [(0, 0, 0), (0, 0, 1), (0, 1, 1), (0, 1, 0)]),
        (Vector3::x(), [(1, 0, 0), (1, 1, 0), (1, 1, 1), (1, 0, 1)]),
        (-Vector3::y(), [(0, 0, 0), (1, 0, 0), (1, 0, 1), (0, 0, 1)]),
        (Vector3::y(), [(0, 1, 0), (0, 1, 1), (1, 1, 1), (1, 1, 0)]),
        (-Vector3::z(), [(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 0, 0)]),
        (Vector3::z(), [(0, 0, 1), (1, 0, 1), (1, 1, 1), (0, 1, 1)]),
    ];
    let mut mesh = Mesh::new();
    for (normal, corners) in faces {
        let base = mesh.vertices.len();
        for (k, &(x, y, z)) in corners.iter().enumerate() {
            let (u, v) = BOX_UVS[k];
            mesh.vertices
                .push(Vertex::new(corner(x, y, z), normal, Vector2::new(u * 0.1, v * 0.1)));
        }
        mesh.push_facet(
            (0..4).map(|k| Edge::new(base + k, base + (k + 1) % 4)),
            &Facet::new(0, 0, 0, 0, 0),
        );
    }
    mesh
}

/// Parameters of the jagged part of [`noisy_cutting_box`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisySurface {
    /// Half size of the displaced grid.
    pub jagged_plane_size: Real,
    /// Quads per side of the grid.
    pub resolution: u32,
    pub amplitude: Real,
    pub frequency: Real,
    pub octaves: u32,
    pub seed: u64,
}

/// Cutting box whose cutting face is a noise-displaced grid.
///
/// The grid covers `jagged_plane_size` around `point`; interior grid vertices
/// are displaced along `normal` by [`SimplexNoise`]. A ring facet joins the
/// grid border to a flat square of half size `size`, and the remaining five
/// faces close the box on the `normal` side. Fast cutting is not valid
/// against this mesh; use a full boolean.
pub fn noisy_cutting_box(
    point: &Point3<Real>,
    normal: &Vector3<Real>,
    size: Real,
    surface: &NoisySurface,
    id: i64,
) -> Mesh {
    let noise = SimplexNoise::new(surface.amplitude, surface.frequency, surface.octaves, surface.seed);
    let normal = normal.normalize();
    let (t1, t2) = tangents(&normal);
    let res = surface.resolution.max(1) as usize;
    let jagged = surface.jagged_plane_size;
    let row = res + 1;
    let grid_index = |i: usize, j: usize| i * row + j;

    let mut mesh = Mesh::new();
    let t1d = -t1 * 2.0 * jagged / res as Real;
    let t2d = -t2 * 2.0 * jagged / res as Real;
    let start = point + (t1 + t2) * jagged;
    for i in 0..row {
        for j in 0..row {
            let mut pos = start + t2d * i as Real + t1d * j as Real;
            if i > 0 && i < res && j > 0 && j < res {
                pos += normal * noise.sample(&pos);
            }
            let uv = Vector2::new(j as Real / res as Real, i as Real / res as Real);
            mesh.vertices.push(Vertex::new(pos, normal, uv));
        }
    }
    for i in 1..res {
        for j in 1..res {
            let center = mesh.vertices[grid_index(i, j)].pos;
            let v1 = mesh.vertices[grid_index(i + 1, j)].pos - center;
            let v2 = mesh.vertices[grid_index(i, j + 1)].pos - center;
            let v3 = mesh.vertices[grid_index(i - 1, j)].pos - center;
            let v4 = mesh.vertices[grid_index(i, j - 1)].pos - center;
            let n = v1.cross(&v2) + v2.cross(&v3) + v3.cross(&v4) + v4.cross(&v1);
            mesh.vertices[grid_index(i, j)].normal = n.try_normalize(0.0).unwrap_or(normal);
        }
    }

    let template = Facet::new(0, 0, MATERIAL_INTERIOR, id, 0);
    for i in 0..res {
        for j in 0..res {
            mesh.push_facet(
                [
                    Edge::new(grid_index(i, j), grid_index(i, j + 1)),
                    Edge::new(grid_index(i, j + 1), grid_index(i + 1, j + 1)),
                    Edge::new(grid_index(i + 1, j + 1), grid_index(i + 1, j)),
                    Edge::new(grid_index(i + 1, j), grid_index(i, j)),
                ],
                &template,
            );
        }
    }

    let offset = mesh.vertices.len();
    for (k, pos) in box_positions(point, &normal, &t1, &t2, size, (0.0, 1.0)).into_iter().enumerate() {
        let (u, v) = BOX_UVS[k % 4];
        mesh.vertices.push(Vertex::new(pos, normal, Vector2::new(u, v)));
    }

    // Ring: outer square, then the grid border walked against the quads.
    let mut border = Vec::with_capacity(4 * res);
    border.extend((0..res).map(|i| grid_index(i, 0)));
    border.extend((0..res).map(|j| grid_index(res, j)));
    border.extend((0..res).map(|i| grid_index(res - i, res)));
    border.extend((0..res).map(|j| grid_index(0, res - j)));
    let outer = (0..4).map(|k| Edge::new(offset + k, offset + (k + 1) % 4));
    let inner = (0..border.len()).map(|k| Edge::new(border[k], border[(k + 1) % border.len()]));
    mesh.push_facet(outer.chain(inner), &template);

    push_box_facets(&mut mesh, offset, &BOX_FACETS[1..], id);
    mesh
}

/// Prism over a counter-clockwise `outline`.
///
/// The outline lives in the local xy plane of `frame`; the prism spans
/// `[-depth/2, depth/2]` along local z and the top outline is scaled by
/// `top_scale` about the local origin. Every facet gets material
/// [`MATERIAL_INTERIOR`] and `user_data = id`; each facet has its own
/// vertices carrying the facet normal.
pub fn extruded_outline(
    outline: &[Point2<Real>],
    frame: &Isometry3<Real>,
    depth: Real,
    top_scale: Real,
    id: i64,
) -> Mesh {
    let n = outline.len();
    let mut mesh = Mesh::new();
    if n < 3 {
        return mesh;
    }
    let half = depth * 0.5;
    let bottom: Vec<Point3<Real>> = outline
        .iter()
        .map(|p| frame * Point3::new(p.x, p.y, -half))
        .collect();
    let top: Vec<Point3<Real>> = outline
        .iter()
        .map(|p| frame * Point3::new(p.x * top_scale, p.y * top_scale, half))
        .collect();
    let template = Facet::new(0, 0, MATERIAL_INTERIOR, id, 0);

    let push_polygon = |mesh: &mut Mesh, ring: &[Point3<Real>]| {
        let base = mesh.vertices.len();
        let origin = ring[0];
        let normal = ring
            .iter()
            .zip(ring.iter().cycle().skip(1))
            .fold(Vector3::zeros(), |acc, (a, b)| acc + (a - origin).cross(&(b - origin)));
        let normal = normal.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
        mesh.vertices
            .extend(ring.iter().map(|p| Vertex::new(*p, normal, Vector2::zeros())));
        let count = ring.len();
        mesh.push_facet(
            (0..count).map(|k| Edge::new(base + k, base + (k + 1) % count)),
            &template,
        );
    };

    let reversed_bottom: Vec<Point3<Real>> = bottom.iter().rev().copied().collect();
    push_polygon(&mut mesh, &reversed_bottom);
    push_polygon(&mut mesh, &top);
    for k in 0..n {
        let next = (k + 1) % n;
        push_polygon(&mut mesh, &[bottom[k], bottom[next], top[next], top[k]]);
    }
    mesh
}

/// Truncated cone around `axis` through `point`, `height` long, with
/// `segments` sides.
pub fn cutting_cone(
    point: &Point3<Real>,
    axis: &Vector3<Real>,
    radius_bottom: Real,
    radius_top: Real,
    height: Real,
    segments: usize,
    id: i64,
) -> Mesh {
    let segments = segments.max(3);
    let outline: Vec<Point2<Real>> = (0..segments)
        .map(|k| {
            let angle = TAU * k as Real / segments as Real;
            Point2::new(angle.cos() * radius_bottom, angle.sin() * radius_bottom)
        })
        .collect();
    let frame = frame_from_axis(point, axis);
    let top_scale = if radius_bottom > 0.0 { radius_top / radius_bottom } else { 1.0 };
    extruded_outline(&outline, &frame, height, top_scale, id)
}

/// Isometry taking local +z to `axis` and the origin to `point`.
pub fn frame_from_axis(point: &Point3<Real>, axis: &Vector3<Real>) -> Isometry3<Real> {
    let axis = axis.normalize();
    let rotation = nalgebra::UnitQuaternion::rotation_between(&Vector3::z(), &axis)
        .unwrap_or_else(|| {
            nalgebra::UnitQuaternion::from_axis_angle(&Vector3::x_axis(), crate::float_types::PI)
        });
    Isometry3::from_parts(nalgebra::Translation3::from(point.coords), rotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_under_positions(mesh: &Mesh) -> bool {
        use crate::mesh::comparators::positioned_mapping;
        let map = positioned_mapping(&mesh.vertices);
        let mut directed: Vec<(usize, usize)> =
            mesh.edges.iter().map(|e| (map[e.s], map[e.e])).collect();
        directed.sort();
        directed
            .iter()
            .all(|&(s, e)| directed.binary_search(&(e, s)).is_ok())
    }

    #[test]
    fn test_tangents_are_orthonormal() {
        for n in [Vector3::x(), Vector3::z(), Vector3::new(1.0, 2.0, 3.0).normalize()] {
            let (t1, t2) = tangents(&n);
            assert!((t1.norm() - 1.0).abs() < 1e-12);
            assert!((t2.norm() - 1.0).abs() < 1e-12);
            assert!(t1.dot(&n).abs() < 1e-12 && t2.dot(&n).abs() < 1e-12);
            assert!((t1.cross(&t2) + n).norm() < 1e-12);
        }
    }

    #[test]
    fn test_cutting_box_layout() {
        let bx = cutting_box(&Point3::new(0.0, 0.0, 1.0), &Vector3::z(), 2.0, 7);
        assert_eq!(bx.facets.len(), 6);
        assert!(bx.facets.iter().all(|f| f.user_data == 7 && f.material_id == MATERIAL_INTERIOR));
        // facet 0 lies on the plane and faces away from the box
        let n = bx.facet_normal(0).normalize();
        assert!((n + Vector3::z()).norm() < 1e-12);
        let bb = bx.bounding_box();
        assert!((bb.mins.z - 1.0).abs() < 1e-12 && (bb.maxs.z - 3.0).abs() < 1e-12);
        assert!((bx.volume() - 32.0).abs() < 1e-9);
        assert!(closed_under_positions(&bx));
    }

    #[test]
    fn test_inverse_normals() {
        let mut bx = cutting_box(&Point3::origin(), &Vector3::x(), 1.0, 3);
        inverse_normal_and_set_indices(&mut bx, -3);
        assert!(bx.vertices.iter().all(|v| (v.normal - Vector3::x()).norm() < 1e-12));
        assert!(bx.facets.iter().all(|f| f.user_data == -3));
    }

    #[test]
    fn test_big_box_and_cuboid_volumes() {
        let bb = big_box(&Point3::new(1.0, 1.0, 1.0), 2.0);
        assert!((bb.volume() - 64.0).abs() < 1e-9);
        assert!(closed_under_positions(&bb));
        let c = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 2.0, 3.0));
        assert!((c.volume() - 6.0).abs() < 1e-9);
        assert!(closed_under_positions(&c));
        for i in 0..c.facets.len() {
            let n = c.facet_normal(i).normalize();
            assert!((n - c.vertices[c.facets[i].first_edge].normal).norm() < 1e-12);
        }
    }

    #[test]
    fn test_noisy_box_is_closed() {
        let surface = NoisySurface {
            jagged_plane_size: 1.2,
            resolution: 6,
            amplitude: 0.1,
            frequency: 2.0,
            octaves: 2,
            seed: 3,
        };
        let bx = noisy_cutting_box(&Point3::origin(), &Vector3::y(), 40.0, &surface, 11);
        assert_eq!(bx.facets.len(), 36 + 1 + 5);
        assert!(closed_under_positions(&bx));
    }

    #[test]
    fn test_extruded_square_and_cone() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let prism = extruded_outline(&square, &Isometry3::identity(), 2.0, 1.0, 5);
        assert_eq!(prism.facets.len(), 6);
        assert!((prism.volume() - 2.0).abs() < 1e-9);
        assert!(closed_under_positions(&prism));
        // side facing -y
        let n = prism.facet_normal(2).normalize();
        assert!((n + Vector3::y()).norm() < 1e-12);

        let cone = cutting_cone(&Point3::origin(), &Vector3::x(), 1.0, 0.5, 2.0, 16, 1);
        assert_eq!(cone.facets.len(), 18);
        assert!(closed_under_positions(&cone));
        let bb = cone.bounding_box();
        assert!((bb.maxs.x - 1.0).abs() < 1e-9 && (bb.mins.x + 1.0).abs() < 1e-9);
    }
}
