//! Cutout fracturing: stamping 2D outlines through a chunk.
//!
//! A [`CutoutSet`] is a list of closed outlines in a unit square centered on
//! the origin. [`FractureTool::cutout`] places the square on a plane in the
//! world, extrudes every outline into a prism crossing the whole chunk and
//! keeps the part of the chunk inside each prism as one child. What is left
//! outside all prisms becomes the last child.

use crate::accelerator::{BBoxGrid, DEFAULT_GRID_RESOLUTION, DummyAccelerator};
use crate::boolean::{BooleanConfiguration, BooleanEvaluator};
use crate::errors::FractureError;
use crate::float_types::Real;
use crate::fracture::config::CutoutConfiguration;
use crate::fracture::{CUTTING_BOX_SIZE, ChunkId, FractureTool};
use crate::mesh::shapes::{extruded_outline, inverse_normal_and_set_indices};
use geo::{Area, LineString, Winding, coord};
use nalgebra::{Isometry3, Point2, Point3, Translation3, Vector2, Vector3};

/// One closed outline, counter-clockwise, without a repeated end point.
#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    pub vertices: Vec<Point2<Real>>,
}

/// Outlines to stamp through a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoutSet {
    pub cutouts: Vec<Cutout>,
    /// Size of the source the outlines were traced from (pixels for
    /// bitmaps, `(1, 1)` for explicit outlines).
    pub dimensions: Vector2<Real>,
}

/// Closed ring through `points`, oriented counter-clockwise. `None` when it
/// encloses no area.
fn ccw_ring(points: &[Point2<Real>]) -> Option<LineString<Real>> {
    let mut ring: LineString<Real> = points.iter().map(|p| coord! { x: p.x, y: p.y }).collect();
    ring.close();
    if ring.0.len() < 4 {
        return None;
    }
    let polygon = geo::Polygon::new(ring, vec![]);
    if polygon.unsigned_area() <= Real::EPSILON {
        return None;
    }
    let mut ring = polygon.exterior().clone();
    ring.make_ccw_winding();
    Some(ring)
}

fn ring_to_cutout(ring: &LineString<Real>) -> Cutout {
    let mut vertices: Vec<Point2<Real>> = ring.coords().map(|c| Point2::new(c.x, c.y)).collect();
    // closed rings repeat the first point
    vertices.pop();
    Cutout { vertices }
}

impl CutoutSet {
    /// Cutout set from explicit outlines in the unit square `[-0.5, 0.5]²`.
    ///
    /// Outlines are re-oriented counter-clockwise; outlines enclosing no
    /// area are dropped.
    pub fn from_outlines(outlines: &[Vec<Point2<Real>>]) -> Result<Self, FractureError> {
        let cutouts: Vec<Cutout> = outlines
            .iter()
            .filter_map(|outline| ccw_ring(outline))
            .map(|ring| ring_to_cutout(&ring))
            .collect();
        if cutouts.is_empty() {
            return Err(FractureError::CutoutSetEmpty);
        }
        Ok(CutoutSet {
            cutouts,
            dimensions: Vector2::new(1.0, 1.0),
        })
    }

    /// Cutout set traced from the pixels of `img` that are `>= threshold`.
    ///
    /// Outlines are simplified with tolerance `simplify` (in pixels) and
    /// mapped into the unit square, image rows running from `+y` down to
    /// `-y`. Holes inside traced regions are ignored.
    #[cfg(feature = "image-io")]
    pub fn from_image(img: &image::GrayImage, threshold: u8, simplify: Real) -> Result<Self, FractureError> {
        use geo::{Centroid, Contains, Simplify};

        let (width, height) = (img.width() as usize, img.height() as usize);
        if width == 0 || height == 0 {
            return Err(FractureError::Image("image has no pixels".to_string()));
        }
        let bits: Vec<Vec<i8>> = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| (img.get_pixel(x as u32, y as u32)[0] >= threshold) as i8)
                    .collect()
            })
            .collect();
        let path = contour_tracing::array::bits_to_paths(bits, true);

        let polygons: Vec<geo::Polygon<Real>> = parse_svg_path(&path)
            .into_iter()
            .filter_map(|polyline| {
                let points: Vec<Point2<Real>> = polyline.into_iter().map(|(x, y)| Point2::new(x, y)).collect();
                let ring = ccw_ring(&points)?.simplify(&simplify);
                (ring.0.len() >= 4).then(|| geo::Polygon::new(ring, vec![]))
            })
            .collect();

        let (w, h) = (width as Real, height as Real);
        let cutouts: Vec<Cutout> = polygons
            .iter()
            .enumerate()
            .filter(|(i, polygon)| {
                let Some(centroid) = polygon.centroid() else {
                    return false;
                };
                !polygons.iter().enumerate().any(|(j, other)| {
                    j != *i && other.unsigned_area() > polygon.unsigned_area() && other.contains(&centroid)
                })
            })
            .filter_map(|(_, polygon)| {
                let points: Vec<Point2<Real>> = polygon
                    .exterior()
                    .coords()
                    .map(|c| Point2::new(c.x / w - 0.5, 0.5 - c.y / h))
                    .collect();
                ccw_ring(&points)
            })
            .map(|ring| ring_to_cutout(&ring))
            .collect();

        if cutouts.is_empty() {
            return Err(FractureError::CutoutSetEmpty);
        }
        Ok(CutoutSet {
            cutouts,
            dimensions: Vector2::new(w, h),
        })
    }
}

/// Polylines of an SVG path made of `M`, `H`, `V` and `Z` commands, as
/// emitted by `contour_tracing`.
#[cfg(feature = "image-io")]
fn parse_svg_path(path: &str) -> Vec<Vec<(Real, Real)>> {
    fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<Real> {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let mut buffer = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == '-' {
                buffer.push(c);
                chars.next();
            } else {
                break;
            }
        }
        buffer.parse().ok()
    }

    let mut polylines = Vec::new();
    let mut current: Vec<(Real, Real)> = Vec::new();
    let (mut x, mut y) = (0.0, 0.0);
    let mut chars = path.trim().chars().peekable();
    while let Some(command) = chars.next() {
        match command {
            'M' | 'm' => {
                if !current.is_empty() {
                    polylines.push(std::mem::take(&mut current));
                }
                x = read_number(&mut chars).unwrap_or(x);
                y = read_number(&mut chars).unwrap_or(y);
                current.push((x, y));
            },
            'H' | 'h' => {
                x = read_number(&mut chars).unwrap_or(x);
                current.push((x, y));
            },
            'V' | 'v' => {
                y = read_number(&mut chars).unwrap_or(y);
                current.push((x, y));
            },
            'Z' | 'z' => {
                if !current.is_empty() {
                    polylines.push(std::mem::take(&mut current));
                }
            },
            _ => {},
        }
    }
    if !current.is_empty() {
        polylines.push(current);
    }
    polylines
}

impl FractureTool {
    /// Stamp the outlines of `conf` through a chunk.
    ///
    /// Every outline whose prism intersects the chunk yields one child; the
    /// rest of the chunk becomes the last child. Outlines are expected not
    /// to overlap.
    pub fn cutout(
        &mut self,
        chunk_id: ChunkId,
        conf: &CutoutConfiguration,
        replace_chunk: bool,
    ) -> Result<(), FractureError> {
        if conf.cutout_set.cutouts.is_empty() {
            return Err(self.report(FractureError::CutoutSetEmpty));
        }
        let index = self.prepare_fracture(chunk_id, replace_chunk)?;
        let parent = self.fracture_parent(index, replace_chunk);
        let source = self.chunks[index].mesh.clone();

        let origin = self.to_local(&Point3::from(conf.transform.translation.vector));
        let frame = Isometry3::from_parts(Translation3::from(origin.coords), conf.transform.rotation);
        let size = match conf.scale {
            Some(scale) => scale / self.scale_factor,
            None => fitted_size(&source, &frame),
        };

        let mut evaluator = BooleanEvaluator::new();
        let mut source_accelerator = BBoxGrid::new(&source, DEFAULT_GRID_RESOLUTION);
        let mut pieces = Vec::new();
        let mut remainder = Some(source.clone());
        for (k, cutout) in conf.cutout_set.cutouts.iter().enumerate() {
            let id = self.plane_index_offset + k as i64;
            let outline: Vec<Point2<Real>> = cutout
                .vertices
                .iter()
                .map(|p| Point2::new(p.x * size.x, p.y * size.y))
                .collect();
            let mut prism = extruded_outline(&outline, &frame, 2.0 * CUTTING_BOX_SIZE, 1.0, id);
            if !prism.is_valid() {
                continue;
            }
            prism.set_material_id(self.interior_material_id);

            evaluator
                .perform_boolean(
                    &source,
                    &prism,
                    &mut source_accelerator,
                    &mut DummyAccelerator::for_mesh(&prism),
                    BooleanConfiguration::intersection(),
                )
                .map_err(|e| self.report(e))?;
            let Some(piece) = evaluator.create_new_mesh() else {
                continue;
            };
            pieces.push(piece);

            if let Some(rest) = remainder.take() {
                inverse_normal_and_set_indices(&mut prism, -id);
                evaluator
                    .perform_boolean(
                        &rest,
                        &prism,
                        &mut BBoxGrid::new(&rest, DEFAULT_GRID_RESOLUTION),
                        &mut DummyAccelerator::for_mesh(&prism),
                        BooleanConfiguration::difference(),
                    )
                    .map_err(|e| self.report(e))?;
                remainder = evaluator.create_new_mesh();
            }
        }
        self.plane_index_offset += conf.cutout_set.cutouts.len() as i64;

        if pieces.is_empty() {
            self.logger
                .warn(&format!("cutout: no outline intersects chunk {}", chunk_id));
        }
        pieces.extend(remainder);
        self.commit_fracture(chunk_id, parent, pieces, replace_chunk)
    }
}

/// Extent of `mesh`'s bounding box along the local x and y axes of `frame`.
fn fitted_size(mesh: &crate::mesh::Mesh, frame: &Isometry3<Real>) -> Vector2<Real> {
    let bbox = mesh.bounding_box();
    let axes = [frame.rotation * Vector3::x(), frame.rotation * Vector3::y()];
    let mut size = Vector2::zeros();
    for (axis, extent) in axes.iter().zip(size.iter_mut()) {
        let (mut low, mut high) = (Real::MAX, Real::MIN);
        for corner in bbox.vertices() {
            let d = corner.coords.dot(axis);
            low = low.min(d);
            high = high.max(d);
        }
        *extent = high - low;
    }
    size
}
