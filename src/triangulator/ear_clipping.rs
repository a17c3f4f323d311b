//! Loop serialization, hole bridging and ear clipping of planar facets.
//!
//! All 2D work happens on [`FlatFacet`] points: the dominant-axis projection
//! of the facet, mirrored when needed so that outer loops wind
//! counter-clockwise.

use crate::float_types::{MAXIMUM_EXTENT, Real};
use crate::mesh::{Edge, Vertex, projection::Projection};
use geo::{Coord, Intersects, LineString, Point, Polygon as GeoPolygon};
use hashbrown::HashSet;
use nalgebra::{Point2, Vector2, Vector3};

/// Minimal turn for a vertex to be clipped as an ear.
const EAR_THRESHOLD: Real = 1e-4;

/// Minimal turn for an outer vertex to anchor a hole bridge.
const BRIDGE_THRESHOLD: Real = 1e-6;

/// Projection of one facet's vertices, oriented so that loops winding
/// positively around the facet normal are counter-clockwise.
pub(crate) struct FlatFacet<'a> {
    vertices: &'a [Vertex],
    projection: Projection,
}

impl<'a> FlatFacet<'a> {
    pub(crate) fn new(vertices: &'a [Vertex], normal: &Vector3<Real>) -> Self {
        FlatFacet {
            vertices,
            projection: Projection::from_normal(normal),
        }
    }

    pub(crate) fn point(&self, index: usize) -> Point2<Real> {
        let p = self.projection.project(&self.vertices[index].pos);
        if self.projection.opposite_winding {
            Point2::new(p.x, -p.y)
        } else {
            p
        }
    }

    fn ring(&self, polygon: &[usize]) -> GeoPolygon<Real> {
        let coords: Vec<Coord<Real>> = polygon
            .iter()
            .map(|&i| {
                let p = self.point(i);
                Coord { x: p.x, y: p.y }
            })
            .collect();
        GeoPolygon::new(LineString::new(coords), Vec::new())
    }
}

#[inline]
fn rotation(a: &Vector2<Real>, b: &Vector2<Real>) -> Real {
    a.x * b.y - a.y * b.x
}

#[inline]
fn same_float(a: Real, b: Real) -> bool {
    (b - a).abs() <= Real::EPSILON * (b + a).abs()
}

#[inline]
fn same_point(a: &Point2<Real>, b: &Point2<Real>) -> bool {
    same_float(a.x, b.x) && same_float(a.y, b.y)
}

/// `point` inside or on triangle `abc`, corners themselves excluded.
fn point_inside(a: &Point2<Real>, b: &Point2<Real>, c: &Point2<Real>, point: &Point2<Real>) -> bool {
    if same_point(a, point) || same_point(b, point) || same_point(c, point) {
        return false;
    }
    let v1 = rotation(&(b - a), &(point - a));
    let v2 = rotation(&(c - b), &(point - b));
    let v3 = rotation(&(a - c), &(point - c));
    (v1 >= 0.0 && v2 >= 0.0 && v3 >= 0.0) || (v1 <= 0.0 && v2 <= 0.0 && v3 <= 0.0)
}

/// Counter-clockwise turn at `curr`, in `[-1, 1]`.
fn turn(prev: &Point2<Real>, curr: &Point2<Real>, next: &Point2<Real>) -> Option<Real> {
    let a = (curr - prev).try_normalize(0.0)?;
    let b = (next - prev).try_normalize(0.0)?;
    Some(rotation(&a, &b))
}

/// Split a facet's edges into closed vertex loops, in edge direction.
///
/// Edges are chained head to tail; whenever the chain reaches a vertex it
/// already passed through, the closed part is cut off as a loop. Chains
/// that dead-end are open and dropped.
pub(crate) fn serialize_loops(edges: &[Edge]) -> Vec<Vec<usize>> {
    let mut used = vec![false; edges.len()];
    let mut loops = Vec::new();
    let mut chain: Vec<usize> = Vec::new();
    let mut on_chain: HashSet<usize> = HashSet::new();

    loop {
        let Some(&last) = chain.last() else {
            let Some(first) = used.iter().position(|u| !u) else {
                break;
            };
            used[first] = true;
            chain.push(first);
            on_chain.insert(edges[first].s);
            continue;
        };

        let tail = edges[last].e;
        let Some(next) = (0..edges.len()).find(|&p| !used[p] && edges[p].s == tail) else {
            chain.clear();
            on_chain.clear();
            continue;
        };
        used[next] = true;
        chain.push(next);
        on_chain.insert(edges[next].s);

        let closing = edges[next].e;
        if on_chain.contains(&closing) {
            let Some(start) = chain.iter().rposition(|&id| edges[id].s == closing) else {
                continue;
            };
            let closed: Vec<usize> = chain.drain(start..).map(|id| edges[id].s).collect();
            for v in &closed {
                on_chain.remove(v);
            }
            loops.push(closed);
        }
    }
    loops
}

/// Twice the vector area of a loop.
pub(crate) fn loop_normal(vertices: &[Vertex], polygon: &[usize]) -> Vector3<Real> {
    let Some(&first) = polygon.first() else {
        return Vector3::zeros();
    };
    let origin = vertices[first].pos;
    polygon
        .windows(2)
        .skip(1)
        .fold(Vector3::zeros(), |acc, w| {
            acc + (vertices[w[0]].pos - origin).cross(&(vertices[w[1]].pos - origin))
        })
}

/// Whether `outer` encloses the centroid of `hole`.
pub(crate) fn encloses(flat: &FlatFacet, outer: &GeoPolygon<Real>, hole: &[usize]) -> bool {
    if hole.is_empty() {
        return false;
    }
    let sum = hole
        .iter()
        .fold(Vector2::zeros(), |acc, &i| acc + flat.point(i).coords);
    let c = sum / hole.len() as Real;
    outer.intersects(&Point::new(c.x, c.y))
}

pub(crate) fn outer_polygon(flat: &FlatFacet, polygon: &[usize]) -> GeoPolygon<Real> {
    flat.ring(polygon)
}

/// Splice `hole` into `outer` through a bridge edge.
///
/// The bridge leaves the hole at its rightmost vertex and lands on the
/// closest outer vertex visible along `+x`. Returns `false` when no such
/// vertex exists; `outer` is then untouched.
pub(crate) fn unite_polygons(outer: &mut Vec<usize>, hole: &[usize], flat: &FlatFacet) -> bool {
    if outer.len() < 3 || hole.len() < 3 {
        return false;
    }

    let mut x_max = -MAXIMUM_EXTENT;
    let mut hole_index = None;
    for (i, &v) in hole.iter().enumerate() {
        let x = flat.point(v).x;
        if x > x_max {
            hole_index = Some(i);
            x_max = x;
        }
    }
    let Some(hole_index) = hole_index else {
        return false;
    };
    let hole_point = flat.point(hole[hole_index]);

    // closest outer vertex or edge point to the right of the hole
    let mut min_x = MAXIMUM_EXTENT;
    let mut base = None;
    let mut on_vertex = false;
    let mut computed = hole_point;
    let n = outer.len();
    for i in 0..n {
        let next = (i + 1) % n;
        let p1 = flat.point(outer[i]);
        let p2 = flat.point(outer[next]);
        if p1.x < x_max && p2.x < x_max {
            continue;
        }
        let vc = p2 - p1;
        if vc.y == 0.0 && p1.y == hole_point.y {
            if p1.x < min_x && p1.x < p2.x && p1.x > x_max {
                min_x = p1.x;
                base = Some(i);
                on_vertex = true;
            }
            if p2.x < min_x && p2.x < p1.x && p2.x > x_max {
                min_x = p2.x;
                base = Some(next);
                on_vertex = true;
            }
        } else if vc.y != 0.0 {
            let t = (hole_point.y - p1.y) / vc.y;
            if (0.0..=1.0).contains(&t) {
                let hit = p1 + vc * t;
                if hit.x < min_x && hit.x > x_max {
                    min_x = hit.x;
                    base = Some(i);
                    on_vertex = false;
                    computed = hit;
                }
            }
        }
    }
    let Some(mut base) = base else {
        return false;
    };

    let bridge = if on_vertex {
        base
    } else {
        let mut anchor = flat.point(outer[base]);
        let other = flat.point(outer[(base + 1) % n]);
        if anchor.x > other.x {
            base = (base + 1) % n;
            anchor = other;
        }
        // a reflex outer vertex inside (hole, anchor, hit) would block the
        // bridge; take the one closest in angle to +x
        let mut best_angle = -Real::MAX;
        let mut blocker = None;
        let mut blocked = false;
        for i in 0..n {
            let candidate = flat.point(outer[i]);
            if !point_inside(&hole_point, &anchor, &computed, &candidate) {
                continue;
            }
            blocked = true;
            let prev = flat.point(outer[(i + n - 1) % n]);
            let next = flat.point(outer[(i + 1) % n]);
            if turn(&prev, &candidate, &next).is_none_or(|t| t < BRIDGE_THRESHOLD) {
                continue;
            }
            let Some(direction) = (candidate - hole_point).try_normalize(0.0) else {
                continue;
            };
            let angle = direction.x;
            if angle > best_angle {
                best_angle = angle;
                blocker = Some(i);
            }
        }
        match (blocked, blocker) {
            (false, _) => base,
            (true, Some(i)) => i,
            (true, None) => return false,
        }
    };

    let mut united = Vec::with_capacity(outer.len() + hole.len() + 2);
    united.extend_from_slice(&outer[..=bridge]);
    united.extend(hole[hole_index..].iter().chain(&hole[..hole_index]));
    united.push(hole[hole_index]);
    united.extend_from_slice(&outer[bridge..]);
    *outer = united;
    true
}

/// Ear clip a counter-clockwise (in `flat`) polygon.
///
/// Emits triangles in the polygon's winding. Whatever cannot be clipped
/// (degenerate remainders) is dropped.
pub(crate) fn ear_clip(mut polygon: Vec<usize>, flat: &FlatFacet) -> Vec<[usize; 3]> {
    let mut triangles = Vec::with_capacity(polygon.len().saturating_sub(2));
    let mut curr = 0;
    while polygon.len() > 2 && curr < polygon.len() {
        let n = polygon.len();
        let prev = (curr + n - 1) % n;
        let next = (curr + 1) % n;
        let (pp, cp, np) = (flat.point(polygon[prev]), flat.point(polygon[curr]), flat.point(polygon[next]));

        let is_convex = turn(&pp, &cp, &np).is_some_and(|t| t > EAR_THRESHOLD);
        let is_ear = is_convex
            && (0..n)
                .filter(|&k| k != curr && k != prev && k != next)
                .all(|k| !point_inside(&cp, &pp, &np, &flat.point(polygon[k])));

        if is_ear {
            triangles.push([polygon[prev], polygon[curr], polygon[next]]);
            polygon.remove(curr);
            curr = 0;
        } else {
            curr += 1;
        }
    }
    triangles
}
