//! Voronoi fracturing and the site generators that feed it.

use crate::accelerator::{BBoxGrid, DEFAULT_GRID_RESOLUTION, DummyAccelerator};
use crate::boolean::{BooleanConfiguration, BooleanEvaluator};
use crate::errors::FractureError;
use crate::float_types::{Real, TAU};
use crate::fracture::{CUTTING_BOX_SIZE, ChunkId, FractureTool, SITE_BOX_SIZE};
use crate::mesh::Mesh;
use crate::mesh::shapes::{big_box, cutting_box, set_cutting_box, tangents};
use crate::random::RandomGenerator;
use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Consecutive rejected samples after which site generation gives up.
pub const MAX_VORONOI_ATTEMPT_NUMBER: usize = 450;

const CLIP_EPSILON: Real = 1e-9;
const FACE_AREA_EPSILON: Real = 1e-12;

/// Face of a convex cell under construction; `plane` is the index of the
/// site whose bisector produced it.
#[derive(Debug, Clone)]
struct CellFace {
    plane: Option<usize>,
    polygon: Vec<Point3<Real>>,
}

fn polygon_area(polygon: &[Point3<Real>]) -> Real {
    let Some(origin) = polygon.first() else {
        return 0.0;
    };
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .fold(Vector3::zeros(), |acc, (a, b)| acc + (a - origin).cross(&(b - origin)))
        .norm()
        * 0.5
}

fn box_faces(center: &Point3<Real>, half: Real) -> Vec<CellFace> {
    let corner = |x: Real, y: Real, z: Real| center + Vector3::new(x, y, z) * half;
    let quads = [
        [(-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.), (1., -1., -1.)],
        [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
        [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
        [(-1., 1., -1.), (-1., 1., 1.), (1., 1., 1.), (1., 1., -1.)],
        [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
        [(1., -1., -1.), (1., 1., -1.), (1., 1., 1.), (1., -1., 1.)],
    ];
    quads
        .iter()
        .map(|quad| CellFace {
            plane: None,
            polygon: quad.iter().map(|&(x, y, z)| corner(x, y, z)).collect(),
        })
        .collect()
}

/// Clip a convex cell to `normal · x <= offset` and close it with a cap
/// tagged `plane`.
fn clip_cell(faces: Vec<CellFace>, normal: &Vector3<Real>, offset: Real, plane: usize) -> Vec<CellFace> {
    let mut clipped_faces = Vec::with_capacity(faces.len() + 1);
    let mut cap: Vec<Point3<Real>> = Vec::new();
    let side = |p: &Point3<Real>| normal.dot(&p.coords) - offset;

    for face in faces {
        let count = face.polygon.len();
        let mut polygon = Vec::with_capacity(count + 1);
        for k in 0..count {
            let (a, b) = (face.polygon[k], face.polygon[(k + 1) % count]);
            let (da, db) = (side(&a), side(&b));
            if da <= CLIP_EPSILON {
                polygon.push(a);
                if da >= -CLIP_EPSILON {
                    cap.push(a);
                }
            }
            if (da < -CLIP_EPSILON && db > CLIP_EPSILON) || (da > CLIP_EPSILON && db < -CLIP_EPSILON) {
                let p = a + (b - a) * (da / (da - db));
                polygon.push(p);
                cap.push(p);
            }
        }
        if polygon.len() >= 3 {
            clipped_faces.push(CellFace {
                plane: face.plane,
                polygon,
            });
        }
    }

    cap.sort_by(|a, b| {
        a.x.total_cmp(&b.x)
            .then(a.y.total_cmp(&b.y))
            .then(a.z.total_cmp(&b.z))
    });
    cap.dedup_by(|a, b| (*a - *b).norm() < CLIP_EPSILON);
    if cap.len() >= 3 {
        let center = Point3::from(cap.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / cap.len() as Real);
        let (t1, t2) = tangents(normal);
        cap.sort_by(|a, b| {
            let (da, db) = (a - center, b - center);
            da.dot(&t2).atan2(da.dot(&t1)).total_cmp(&db.dot(&t2).atan2(db.dot(&t1)))
        });
        clipped_faces.push(CellFace {
            plane: Some(plane),
            polygon: cap,
        });
    }
    clipped_faces
}

/// For every site, the sites whose bisector plane bounds its Voronoi cell
/// with a face of non-zero area. The relation is symmetric and each list is
/// sorted.
pub(crate) fn find_cell_neighbors(sites: &[Point3<Real>]) -> Vec<Vec<usize>> {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); sites.len()];
    for (i, site) in sites.iter().enumerate() {
        let mut faces = box_faces(site, SITE_BOX_SIZE);
        for (j, other) in sites.iter().enumerate() {
            let normal = other - site;
            if j == i || normal.norm() < CLIP_EPSILON {
                continue;
            }
            let normal = normal.normalize();
            let midpoint = nalgebra::center(site, other);
            faces = clip_cell(faces, &normal, normal.dot(&midpoint.coords), j);
        }
        for face in faces {
            match face.plane {
                Some(j) if polygon_area(&face.polygon) > FACE_AREA_EPSILON => {
                    neighbors[i].push(j);
                    neighbors[j].push(i);
                },
                _ => {},
            }
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

/// Convex cell of site `cell` as a mesh: a big box fast-cut by the bisector
/// of every neighbour. `None` when nothing is left.
fn cell_mesh(
    evaluator: &mut BooleanEvaluator,
    plane_index_offset: i64,
    cell: usize,
    sites: &[Point3<Real>],
    neighbors: &[usize],
    interior_material_id: i32,
) -> Result<Option<Mesh>, FractureError> {
    let count = sites.len() as i64;
    let mut mesh = big_box(&sites[cell], SITE_BOX_SIZE);
    mesh.set_material_id(interior_material_id);
    let mut cutter = cutting_box(&Point3::origin(), &Vector3::new(1.0, 1.0, 1.0), CUTTING_BOX_SIZE, 0);
    cutter.set_material_id(interior_material_id);

    for &neighbor in neighbors {
        let midpoint = nalgebra::center(&sites[neighbor], &sites[cell]);
        let direction = (sites[neighbor] - sites[cell]).normalize();
        let mut plane_index = count * cell.min(neighbor) as i64 + cell.max(neighbor) as i64 + plane_index_offset;
        if neighbor < cell {
            plane_index = -plane_index;
        }
        set_cutting_box(&midpoint, &-direction, &mut cutter, CUTTING_BOX_SIZE, plane_index);
        evaluator.perform_fast_cutting(
            &mesh,
            &cutter,
            &mut DummyAccelerator::for_mesh(&cutter),
            BooleanConfiguration::intersection(),
        )?;
        match evaluator.create_new_mesh() {
            Some(next) => mesh = next,
            None => return Ok(None),
        }
    }
    Ok(Some(mesh))
}

impl FractureTool {
    /// Split a chunk into the Voronoi cells of `sites` (world coordinates).
    ///
    /// Fails for the source chunk with `replace_chunk`, an unknown chunk or
    /// fewer than two sites. Existing children of the chunk are discarded.
    pub fn voronoi_fracturing(
        &mut self,
        chunk_id: ChunkId,
        sites: &[Point3<Real>],
        replace_chunk: bool,
    ) -> Result<(), FractureError> {
        self.voronoi_impl(chunk_id, sites, None, replace_chunk)
    }

    /// Voronoi fracturing with cells stretched by `scale` along the axes of
    /// `rotation`.
    pub fn voronoi_fracturing_scaled(
        &mut self,
        chunk_id: ChunkId,
        sites: &[Point3<Real>],
        scale: &Vector3<Real>,
        rotation: &UnitQuaternion<Real>,
        replace_chunk: bool,
    ) -> Result<(), FractureError> {
        self.voronoi_impl(chunk_id, sites, Some((*scale, *rotation)), replace_chunk)
    }

    fn voronoi_impl(
        &mut self,
        chunk_id: ChunkId,
        sites: &[Point3<Real>],
        stretch: Option<(Vector3<Real>, UnitQuaternion<Real>)>,
        replace_chunk: bool,
    ) -> Result<(), FractureError> {
        if sites.len() < 2 {
            return Err(self.report(FractureError::NotEnoughSites(sites.len())));
        }
        let index = self.prepare_fracture(chunk_id, replace_chunk)?;
        let parent = self.fracture_parent(index, replace_chunk);
        let mesh = self.chunks[index].mesh.clone();

        let local: Vec<Point3<Real>> = sites
            .iter()
            .map(|site| {
                let p = self.to_local(site);
                match &stretch {
                    Some((scale, rotation)) => {
                        let r = rotation.inverse_transform_point(&p);
                        Point3::new(r.x / scale.x, r.y / scale.y, r.z / scale.z)
                    },
                    None => p,
                }
            })
            .collect();
        let neighbors = find_cell_neighbors(&local);

        let mut accelerator = BBoxGrid::new(&mesh, DEFAULT_GRID_RESOLUTION);
        let mut cell_evaluator = BooleanEvaluator::new();
        let mut evaluator = BooleanEvaluator::new();
        let mut pieces = Vec::with_capacity(local.len());
        for (cell, cell_neighbors) in neighbors.iter().enumerate() {
            let cell_result = cell_mesh(
                &mut cell_evaluator,
                self.plane_index_offset,
                cell,
                &local,
                cell_neighbors,
                self.interior_material_id,
            );
            let Some(mut cell) = cell_result.map_err(|e| self.report(e))? else {
                continue;
            };
            if let Some((scale, rotation)) = &stretch {
                cell.map_positions(|p| rotation * Point3::new(p.x * scale.x, p.y * scale.y, p.z * scale.z));
            }
            evaluator
                .perform_boolean(
                    &mesh,
                    &cell,
                    &mut accelerator,
                    &mut DummyAccelerator::for_mesh(&cell),
                    BooleanConfiguration::intersection(),
                )
                .map_err(|e| self.report(e))?;
            pieces.extend(evaluator.create_new_mesh());
        }
        self.plane_index_offset += (local.len() * local.len()) as i64;
        self.commit_fracture(chunk_id, parent, pieces, replace_chunk)
    }
}

/// Generates Voronoi sites inside a mesh, optionally restricted to a
/// stencil mesh. Coordinates are those of the meshes (world space).
pub struct VoronoiSitesGenerator<'a> {
    mesh: &'a Mesh,
    accelerator: BBoxGrid,
    stencil: Option<&'a Mesh>,
    rnd: &'a mut dyn RandomGenerator,
    sites: Vec<Point3<Real>>,
}

impl<'a> VoronoiSitesGenerator<'a> {
    pub fn new(mesh: &'a Mesh, rnd: &'a mut dyn RandomGenerator) -> Self {
        VoronoiSitesGenerator {
            mesh,
            accelerator: BBoxGrid::new(mesh, DEFAULT_GRID_RESOLUTION),
            stencil: None,
            rnd,
            sites: Vec::new(),
        }
    }

    /// Switch to another mesh. Sites generated so far are discarded.
    pub fn set_base_mesh(&mut self, mesh: &'a Mesh) {
        self.sites.clear();
        self.mesh = mesh;
        self.accelerator = BBoxGrid::new(mesh, DEFAULT_GRID_RESOLUTION);
    }

    /// Only accept sites that are also inside `stencil`.
    pub fn set_stencil(&mut self, stencil: &'a Mesh) {
        self.stencil = Some(stencil);
    }

    pub fn clear_stencil(&mut self) {
        self.stencil = None;
    }

    pub fn add_site(&mut self, site: Point3<Real>) {
        self.sites.push(site);
    }

    pub fn sites(&self) -> &[Point3<Real>] {
        &self.sites
    }

    fn accepts(&mut self, p: &Point3<Real>) -> bool {
        BooleanEvaluator::is_point_contained_in_mesh(self.mesh, p, Some(&mut self.accelerator)) != 0
            && self
                .stencil
                .is_none_or(|stencil| BooleanEvaluator::is_point_contained_in_mesh(stencil, p, None) != 0)
    }

    fn random_vector(&mut self) -> Vector3<Real> {
        Vector3::new(self.rnd.next_value(), self.rnd.next_value(), self.rnd.next_value())
    }

    /// Rejection-sample `count` sites uniformly in the mesh's bounding box.
    pub fn uniformly_generate_sites_in_mesh(&mut self, count: usize) {
        let bbox = self.mesh.bounding_box();
        let extent = bbox.maxs - bbox.mins;
        let mut attempts = 0;
        let mut generated = 0;
        while generated < count && attempts < MAX_VORONOI_ATTEMPT_NUMBER {
            let p = bbox.mins + self.random_vector().component_mul(&extent);
            if self.accepts(&p) {
                self.sites.push(p);
                generated += 1;
                attempts = 0;
            } else {
                attempts += 1;
            }
        }
    }

    /// `clusters` random cluster centers, each surrounded by
    /// `sites_per_cluster` sites within `cluster_radius`.
    pub fn clustered_sites_generation(&mut self, clusters: usize, sites_per_cluster: usize, cluster_radius: Real) {
        let bbox = self.mesh.bounding_box();
        let middle = bbox.center();
        let half = bbox.half_extents();
        let mut attempts = 0;
        let mut centers = Vec::with_capacity(clusters);
        while centers.len() < clusters && attempts <= MAX_VORONOI_ATTEMPT_NUMBER {
            let r = self.random_vector().map(|v| v * 2.0 - 1.0);
            let p = middle + r.component_mul(&half);
            if self.accepts(&p) {
                centers.push(p);
                attempts = 0;
            } else {
                attempts += 1;
            }
        }

        while let Some(center) = centers.pop() {
            let mut generated = 0;
            while generated < sites_per_cluster && attempts <= MAX_VORONOI_ATTEMPT_NUMBER {
                let direction = self
                    .random_vector()
                    .map(|v| v * 2.0 - 1.0)
                    .try_normalize(0.0)
                    .unwrap_or_else(Vector3::x);
                let p = center + direction * (self.rnd.next_value() + 0.001) * cluster_radius;
                if self.accepts(&p) {
                    self.sites.push(p);
                    generated += 1;
                    attempts = 0;
                } else {
                    attempts += 1;
                }
            }
        }
    }

    /// Rejection-sample `count` sites inside the ball around `center`.
    pub fn generate_in_sphere(&mut self, count: usize, radius: Real, center: &Point3<Real>) {
        let radius_squared = radius * radius;
        let mut attempts = 0;
        let mut generated = 0;
        while generated < count && attempts < MAX_VORONOI_ATTEMPT_NUMBER {
            let offset = self.random_vector().map(|v| (v - 0.5) * 2.0 * radius);
            let p = center + offset;
            if offset.norm_squared() < radius_squared && self.accepts(&p) {
                self.sites.push(p);
                generated += 1;
                attempts = 0;
            } else {
                attempts += 1;
            }
        }
    }

    /// Remove each site inside the ball with probability `delete_probability`.
    pub fn delete_in_sphere(&mut self, radius: Real, center: &Point3<Real>, delete_probability: Real) {
        let radius_squared = radius * radius;
        let mut i = 0;
        while i < self.sites.len() {
            if (self.sites[i] - center).norm_squared() < radius_squared
                && self.rnd.next_value() <= delete_probability
            {
                self.sites.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Rings of sites around `center` in the plane orthogonal to `normal`.
    ///
    /// Ring `k` sits at radius `(k + 1) · radius / radial_steps` (rings at or
    /// beyond `radius` are skipped) and holds `angular_steps` sites, rotated
    /// by `angle_offset · k`. `variability` jitters angle and radius.
    #[allow(clippy::too_many_arguments)]
    pub fn radial_pattern(
        &mut self,
        center: &Point3<Real>,
        normal: &Vector3<Real>,
        radius: Real,
        angular_steps: usize,
        radial_steps: usize,
        angle_offset: Real,
        variability: Real,
    ) {
        if angular_steps == 0 || radial_steps == 0 {
            return;
        }
        let (t1, t2) = tangents(normal);
        let radial_step = radius / radial_steps as Real;
        let angle_step = TAU / angular_steps as Real;
        let mut ring = 0;
        let mut current_radius = radial_step;
        while current_radius < radius {
            let mut angle = angle_offset * ring as Real;
            for _ in 0..angular_steps {
                let angle_jitter = self.rnd.next_value() * variability + (1.0 - 0.5 * variability);
                let radius_jitter = self.rnd.next_value() * variability + (1.0 - 0.5 * variability);
                let direction = t1 * (angle * angle_jitter).cos() + t2 * (angle * angle_jitter).sin();
                self.sites.push(center + direction * current_radius * radius_jitter);
                angle += angle_step;
            }
            ring += 1;
            current_radius += radial_step;
        }
    }
}
