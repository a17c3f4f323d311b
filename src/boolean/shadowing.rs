//! Shadow counting kernels.
//!
//! A point `p` is shadowed by an edge when the edge crosses the line
//! `x = p.x` above `p` in the xy projection, and by a facet when the facet
//! crosses the `+z` ray from `p`. The signed sums of those crossings give
//! winding numbers without ever building a plane or a BSP tree.
//!
//! Suffix convention: `01` is "point of A against edge of B", `10` the
//! reverse; `02` / `20` do the same with facets.

use crate::float_types::Real;
use crate::mesh::{Edge, Vertex};
use nalgebra::Point3;

#[inline]
fn vertex_shadowing(a: &Point3<Real>, b: &Point3<Real>) -> i32 {
    (b.x >= a.x) as i32
}

#[inline]
fn ve_status01(s: &Point3<Real>, e: &Point3<Real>, p: &Point3<Real>) -> i32 {
    vertex_shadowing(p, e) - vertex_shadowing(p, s)
}

#[inline]
fn ve_status10(s: &Point3<Real>, e: &Point3<Real>, p: &Point3<Real>) -> i32 {
    vertex_shadowing(s, p) - vertex_shadowing(e, p)
}

/// Lexicographic `a > b`.
pub(crate) fn should_swap(a: &Point3<Real>, b: &Point3<Real>) -> bool {
    for axis in 0..3 {
        if a[axis] < b[axis] {
            return false;
        }
        if a[axis] > b[axis] {
            return true;
        }
    }
    false
}

/// Point of edge `s → e` at `x = p.x`, clamped to the endpoints.
fn point_on_edge(s: &Vertex, e: &Vertex, p: &Point3<Real>) -> Vertex {
    let (s, e) = if s.pos.x > e.pos.x { (e, s) } else { (s, e) };
    let t = (p.x - s.pos.x) / (e.pos.x - s.pos.x);
    if t >= 1.0 {
        *e
    } else if t <= 0.0 {
        *s
    } else {
        s.interpolate(e, t)
    }
}

/// Edge of B over point of A. Returns the status and, when the edge spans
/// `p.x`, the point of the edge at `x = p.x`.
pub(crate) fn shadowing01(s: &Vertex, e: &Vertex, p: &Point3<Real>) -> (i32, Option<Vertex>) {
    let winding = ve_status01(&s.pos, &e.pos, p);
    if winding == 0 {
        return (0, None);
    }
    let on_edge = point_on_edge(s, e, p);
    let status = if on_edge.pos.y >= p.y { winding } else { 0 };
    (status, Some(on_edge))
}

/// Edge of A under point of B.
pub(crate) fn shadowing10(s: &Vertex, e: &Vertex, p: &Point3<Real>) -> (i32, Option<Vertex>) {
    let winding = ve_status10(&s.pos, &e.pos, p);
    if winding == 0 {
        return (0, None);
    }
    let on_edge = point_on_edge(s, e, p);
    let status = if on_edge.pos.y < p.y { winding } else { 0 };
    (status, Some(on_edge))
}

/// Nearest edge points below and above `p` along `y`, collected while
/// summing the facet's vertex/edge statuses.
#[derive(Debug, Default)]
struct Bracket {
    below: Option<Vertex>,
    above: Option<Vertex>,
}

impl Bracket {
    fn take(&mut self, p: &Point3<Real>, point: Vertex) {
        if p.y > point.pos.y && self.below.is_none_or(|b| point.pos.y > b.pos.y) {
            self.below = Some(point);
        }
        if p.y <= point.pos.y && self.above.is_none_or(|a| point.pos.y < a.pos.y) {
            self.above = Some(point);
        }
    }

    /// Point of the segment `below → above` at `(p.x, p.y)`.
    fn point_at(&self, p: &Point3<Real>) -> Vertex {
        let (p1, p2) = match (self.below, self.above) {
            (Some(b), Some(a)) => (b, a),
            (Some(only), None) | (None, Some(only)) => (only, only),
            (None, None) => (Vertex::at(*p), Vertex::at(*p)),
        };
        let vc = p2.pos - p1.pos;
        let t = if vc.x.abs() > vc.y.abs() {
            (p.x - p1.pos.x) / vc.x
        } else if vc.y != 0.0 {
            (p.y - p1.pos.y) / vc.y
        } else {
            0.0
        };
        let t = t.clamp(0.0, 1.0);
        let mut on_facet = p1.interpolate(&p2, t);
        on_facet.pos = Point3::new(p.x, p.y, p1.pos.z + t * vc.z);
        on_facet
    }
}

fn vf_status02(p: &Point3<Real>, points: &[Vertex], edges: &[Edge]) -> (i32, Bracket) {
    let mut value = 0;
    let mut bracket = Bracket::default();
    for edge in edges {
        let (status, on_edge) = shadowing01(&points[edge.s], &points[edge.e], p);
        value -= status;
        if let Some(point) = on_edge {
            bracket.take(p, point);
        }
    }
    (value, bracket)
}

fn vf_status20(p: &Point3<Real>, points: &[Vertex], edges: &[Edge]) -> (i32, Bracket) {
    let mut value = 0;
    let mut bracket = Bracket::default();
    for edge in edges {
        let (status, on_edge) = shadowing10(&points[edge.s], &points[edge.e], p);
        value += status;
        if let Some(point) = on_edge {
            bracket.take(p, point);
        }
    }
    (value, bracket)
}

/// Facet of B over point of A. The returned point is the facet point
/// straight above or below `p` when the facet covers `p` in projection.
pub(crate) fn shadowing02(p: &Point3<Real>, points: &[Vertex], edges: &[Edge]) -> (i32, Option<Vertex>) {
    let (status, bracket) = vf_status02(p, points, edges);
    if status == 0 {
        return (0, None);
    }
    let on_facet = bracket.point_at(p);
    let status = if on_facet.pos.z >= p.z { status } else { 0 };
    (status, Some(on_facet))
}

/// Facet of A under point of B.
pub(crate) fn shadowing20(p: &Point3<Real>, points: &[Vertex], edges: &[Edge]) -> (i32, Option<Vertex>) {
    let (status, bracket) = vf_status20(p, points, edges);
    if status == 0 {
        return (0, None);
    }
    let on_facet = bracket.point_at(p);
    let status = if on_facet.pos.z < p.z { status } else { 0 };
    (status, Some(on_facet))
}

fn edges_cross_check(a_s: &Vertex, a_e: &Vertex, b_s: &Vertex, b_e: &Vertex) -> i32 {
    shadowing01(b_s, b_e, &a_e.pos).0 - shadowing01(b_s, b_e, &a_s.pos).0
        + shadowing10(a_s, a_e, &b_e.pos).0
        - shadowing10(a_s, a_e, &b_s.pos).0
}

/// First pair of points where the other primitive is not in front (`shadow`
/// status 0) and first pair where it is (status ±1). The crossing lies
/// between them.
#[derive(Debug, Default)]
struct ShadowPairs {
    unshadowed: Option<[Vertex; 2]>,
    shadowed: Option<[Vertex; 2]>,
}

impl ShadowPairs {
    fn record(&mut self, status: i32, pair: Option<[Vertex; 2]>) {
        let Some(pair) = pair else { return };
        match status {
            0 if self.unshadowed.is_none() => self.unshadowed = Some(pair),
            1 | -1 if self.shadowed.is_none() => self.shadowed = Some(pair),
            _ => {},
        }
    }

    const fn is_complete(&self) -> bool {
        self.unshadowed.is_some() && self.shadowed.is_some()
    }

    /// Blend the pairs by `div`: slot 1 yields the point on A, slot 0 the
    /// point on B. Both share the A point's position unless `keep_b_z`.
    fn blend(&self, delta: impl Fn(&[Vertex; 2]) -> Real, keep_b_z: bool) -> (Vertex, Vertex) {
        let shadowed = self.shadowed.unwrap_or_default();
        let unshadowed = self.unshadowed.unwrap_or_default();
        let delta_plus = delta(&shadowed);
        let delta_minus = delta(&unshadowed);
        let div = if delta_plus != 0.0 {
            delta_plus / (delta_plus - delta_minus)
        } else {
            0.0
        };
        let on_a = shadowed[1].interpolate(&unshadowed[1], div);
        let mut on_b = shadowed[0].interpolate(&unshadowed[0], div);
        let z = on_b.pos.z;
        on_b.pos = on_a.pos;
        if keep_b_z {
            on_b.pos.z = z;
        }
        (on_a, on_b)
    }
}

/// Crossing of edge A and edge B in the xy projection.
///
/// Returns the crossing status and, when it is non-zero, the crossing point
/// on A and on B (same x and y, each with its own edge's z).
pub(crate) fn edges_intersection(
    a_s: &Vertex,
    a_e: &Vertex,
    b_s: &Vertex,
    b_e: &Vertex,
) -> (i32, Option<(Vertex, Vertex)>) {
    let status = edges_cross_check(a_s, a_e, b_s, b_e);
    if status == 0 {
        return (0, None);
    }

    let mut pairs = ShadowPairs::default();
    for p in [b_s, b_e] {
        let (shadow, on_edge) = shadowing10(a_s, a_e, &p.pos);
        pairs.record(shadow, on_edge.map(|on_a| [*p, on_a]));
    }
    if !pairs.is_complete() {
        for p in [a_s, a_e] {
            let (shadow, on_edge) = shadowing01(b_s, b_e, &p.pos);
            pairs.record(shadow, on_edge.map(|on_b| [on_b, *p]));
        }
    }

    // only a positive gap along y is meaningful here
    let delta = |pair: &[Vertex; 2]| pair[0].pos.y - pair[1].pos.y;
    let shadowed_gap = pairs.shadowed.map(|pair| delta(&pair)).unwrap_or(0.0);
    let points = if shadowed_gap > 0.0 {
        pairs.blend(delta, true)
    } else {
        pairs.blend(|_| 0.0, true)
    };
    (status, Some(points))
}

/// [`edges_intersection`] counted only when B lies above A at the crossing.
fn edge_edge_shadowing(
    a_s: &Vertex,
    a_e: &Vertex,
    b_s: &Vertex,
    b_e: &Vertex,
) -> (i32, Option<(Vertex, Vertex)>) {
    match edges_intersection(a_s, a_e, b_s, b_e) {
        (status, Some((on_a, on_b))) if on_b.pos.z >= on_a.pos.z => (status, Some((on_a, on_b))),
        (_, points) => (0, points),
    }
}

/// A crossing between an edge and a facet: the status and the crossing point
/// as seen by mesh A and by mesh B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Crossing {
    pub status: i32,
    pub on_a: Vertex,
    pub on_b: Vertex,
}

impl Crossing {
    pub(crate) fn negated(self) -> Self {
        Crossing {
            status: -self.status,
            ..self
        }
    }
}

/// Edge `st → end` of A against the facet of B made of `edges`.
pub(crate) fn edge_facet_intersection12(
    st: &Vertex,
    end: &Vertex,
    points: &[Vertex],
    edges: &[Edge],
) -> Option<Crossing> {
    let mut status = 0;
    let mut pairs = ShadowPairs::default();
    for (p, sign) in [(end, -1), (st, 1)] {
        let (shadow, on_facet) = shadowing02(&p.pos, points, edges);
        status += sign * shadow;
        pairs.record(shadow, on_facet.map(|f| [f, *p]));
    }

    for edge in edges {
        let (s, e) = (&points[edge.s], &points[edge.e]);
        let (shadow, hit) = if should_swap(&s.pos, &e.pos) {
            let (shadow, hit) = edge_edge_shadowing(st, end, e, s);
            (-shadow, hit)
        } else {
            edge_edge_shadowing(st, end, s, e)
        };
        status -= shadow;
        pairs.record(shadow, hit.map(|(on_a, on_b)| [on_b, on_a]));
    }

    if status == 0 || !pairs.is_complete() {
        return None;
    }
    let (on_a, on_b) = pairs.blend(|pair| pair[0].pos.z - pair[1].pos.z, false);
    Some(Crossing { status, on_a, on_b })
}

/// Edge `st → end` of B against the facet of A made of `edges`.
pub(crate) fn edge_facet_intersection21(
    st: &Vertex,
    end: &Vertex,
    points: &[Vertex],
    edges: &[Edge],
) -> Option<Crossing> {
    let mut status = 0;
    let mut pairs = ShadowPairs::default();
    for (p, sign) in [(end, 1), (st, -1)] {
        let (shadow, on_facet) = shadowing20(&p.pos, points, edges);
        status += sign * shadow;
        pairs.record(shadow, on_facet.map(|f| [*p, f]));
    }

    for edge in edges {
        let (s, e) = (&points[edge.s], &points[edge.e]);
        let (shadow, hit) = if should_swap(&s.pos, &e.pos) {
            let (shadow, hit) = edge_edge_shadowing(e, s, st, end);
            (-shadow, hit)
        } else {
            edge_edge_shadowing(s, e, st, end)
        };
        status -= shadow;
        pairs.record(shadow, hit.map(|(on_a, on_b)| [on_b, on_a]));
    }

    if status == 0 || !pairs.is_complete() {
        return None;
    }
    let (on_a, on_b) = pairs.blend(|pair| pair[0].pos.z - pair[1].pos.z, false);
    Some(Crossing { status, on_a, on_b })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: Real, y: Real, z: Real) -> Vertex {
        Vertex::at(Point3::new(x, y, z))
    }

    #[test]
    fn test_should_swap_is_lexicographic() {
        assert!(should_swap(&Point3::new(1.0, 0.0, 0.0), &Point3::new(0.0, 5.0, 5.0)));
        assert!(!should_swap(&Point3::new(1.0, 0.0, 0.0), &Point3::new(1.0, 0.0, 1.0)));
        assert!(!should_swap(&Point3::new(1.0, 2.0, 3.0), &Point3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_edge_over_point() {
        let (status, on_edge) = shadowing01(&v(0.0, 1.0, 0.0), &v(2.0, 1.0, 0.0), &Point3::new(1.0, 0.0, 0.0));
        assert_eq!(status, 1);
        assert_eq!(on_edge.map(|p| p.pos), Some(Point3::new(1.0, 1.0, 0.0)));

        // below the point: spans it but does not shadow it
        let (status, on_edge) = shadowing01(&v(0.0, -1.0, 0.0), &v(2.0, -1.0, 0.0), &Point3::new(1.0, 0.0, 0.0));
        assert_eq!(status, 0);
        assert!(on_edge.is_some());

        // does not span x = 3
        assert_eq!(shadowing01(&v(0.0, 1.0, 0.0), &v(2.0, 1.0, 0.0), &Point3::new(3.0, 0.0, 0.0)), (0, None));
    }

    #[test]
    fn test_square_facet_winding() {
        // unit square at z = 1, counter-clockwise seen from +z
        let points = [v(0.0, 0.0, 1.0), v(1.0, 0.0, 1.0), v(1.0, 1.0, 1.0), v(0.0, 1.0, 1.0)];
        let edges = [Edge::new(0, 1), Edge::new(1, 2), Edge::new(2, 3), Edge::new(3, 0)];

        let (below, on_facet) = shadowing02(&Point3::new(0.5, 0.5, 0.0), &points, &edges);
        assert_ne!(below, 0);
        let on_facet = on_facet.unwrap();
        assert!((on_facet.pos - Point3::new(0.5, 0.5, 1.0)).norm() < 1e-12);

        // above the facet: covered in projection but not shadowed
        let (above, on_facet) = shadowing02(&Point3::new(0.5, 0.5, 2.0), &points, &edges);
        assert_eq!(above, 0);
        assert!(on_facet.is_some());

        assert_eq!(shadowing02(&Point3::new(1.5, 0.5, 0.0), &points, &edges).0, 0);

        // the reversed square shadows with the opposite sign
        let reversed: Vec<Edge> = edges.iter().map(|e| e.reversed()).collect();
        let (flipped, _) = shadowing02(&Point3::new(0.5, 0.5, 0.0), &points, &reversed);
        assert_eq!(flipped, -below);
    }

    #[test]
    fn test_crossing_edges_share_xy() {
        let (status, points) = edges_intersection(
            &v(0.0, 0.0, 0.0),
            &v(2.0, 2.0, 0.0),
            &v(0.0, 2.0, 1.0),
            &v(2.0, 0.0, 1.0),
        );
        assert_ne!(status, 0);
        let (on_a, on_b) = points.unwrap();
        assert!((on_a.pos - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12, "{:?}", on_a.pos);
        assert!((on_b.pos - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12, "{:?}", on_b.pos);
    }

    #[test]
    fn test_edge_through_facet() {
        let points = [v(0.0, 0.0, 0.5), v(1.0, 0.0, 0.5), v(1.0, 1.0, 0.5), v(0.0, 1.0, 0.5)];
        let edges = [Edge::new(0, 1), Edge::new(1, 2), Edge::new(2, 3), Edge::new(3, 0)];
        let crossing = edge_facet_intersection12(&v(0.3, 0.4, 0.0), &v(0.3, 0.4, 1.0), &points, &edges)
            .expect("vertical edge pierces the square");
        assert_eq!(crossing.status.abs(), 1);
        assert!((crossing.on_a.pos - Point3::new(0.3, 0.4, 0.5)).norm() < 1e-12);
        assert_eq!(crossing.on_a.pos, crossing.on_b.pos);

        assert!(edge_facet_intersection12(&v(2.0, 0.4, 0.0), &v(2.0, 0.4, 1.0), &points, &edges).is_none());
    }
}
