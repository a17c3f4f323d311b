//! Epsilon tolerant vertex identity.
//!
//! Vertices coming out of the boolean evaluator and the triangulator are
//! rarely bit-identical, so de-duplication orders them with an explicit
//! comparator that treats components within a tolerance as equal. The
//! comparator is handed to [`OrderedMap`] rather than baked into `Ord` on
//! [`Vertex`], since different passes need different notions of identity.

use crate::float_types::{NORMAL_EPSILON, POSITION_EPSILON, Real};
use crate::mesh::vertex::Vertex;
use nalgebra::Point3;
use std::cmp::Ordering;

/// Comparator used to key an [`OrderedMap`].
pub type Comparator<K> = fn(&K, &K) -> Ordering;

#[inline]
fn compare_with_tolerance(a: Real, b: Real, eps: Real) -> Ordering {
    if a + eps < b {
        Ordering::Less
    } else if a - eps > b {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Position only, `POSITION_EPSILON` per axis.
pub fn compare_points(a: &Point3<Real>, b: &Point3<Real>) -> Ordering {
    compare_with_tolerance(a.x, b.x, POSITION_EPSILON)
        .then_with(|| compare_with_tolerance(a.y, b.y, POSITION_EPSILON))
        .then_with(|| compare_with_tolerance(a.z, b.z, POSITION_EPSILON))
}

/// Lexicographic on position, then normal, then uv.
pub fn compare_vertices(a: &Vertex, b: &Vertex) -> Ordering {
    compare_points(&a.pos, &b.pos)
        .then_with(|| compare_with_tolerance(a.normal.x, b.normal.x, NORMAL_EPSILON))
        .then_with(|| compare_with_tolerance(a.normal.y, b.normal.y, NORMAL_EPSILON))
        .then_with(|| compare_with_tolerance(a.normal.z, b.normal.z, NORMAL_EPSILON))
        .then_with(|| compare_with_tolerance(a.uv.x, b.uv.x, NORMAL_EPSILON))
        .then_with(|| compare_with_tolerance(a.uv.y, b.uv.y, NORMAL_EPSILON))
}

/// Position only, for vertices.
pub fn compare_vertex_positions(a: &Vertex, b: &Vertex) -> Ordering {
    compare_points(&a.pos, &b.pos)
}

/// Ordered associative container keyed by an explicit comparator.
///
/// Entries are kept sorted in a `Vec` and located by binary search.
#[derive(Clone)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
    compare: Comparator<K>,
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K, V> OrderedMap<K, V> {
    pub const fn new(compare: Comparator<K>) -> Self {
        OrderedMap {
            entries: Vec::new(),
            compare,
        }
    }

    fn search(&self, key: &K) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(candidate, _)| (self.compare)(candidate, key))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.search(key).ok().map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_ok()
    }

    /// Insert or overwrite; returns the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.search(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (key, value));
                None
            },
        }
    }

    /// Value for `key`, inserting `default()` first when absent.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let i = match self.search(&key) {
            Ok(i) => i,
            Err(i) => {
                self.entries.insert(i, (key, default()));
                i
            },
        };
        &mut self.entries[i].1
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.search(key) {
            Ok(i) => Some(&mut self.entries[i].1),
            Err(_) => None,
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.search(key).ok().map(|i| self.entries.remove(i).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Merge equal vertices under `compare`.
///
/// Returns the distinct vertices in first-seen order and, for every input
/// vertex, the index of its representative.
pub fn weld(vertices: &[Vertex], compare: Comparator<Vertex>) -> (Vec<Vertex>, Vec<usize>) {
    let mut map: OrderedMap<Vertex, usize> = OrderedMap::new(compare);
    let mut welded = Vec::new();
    let mut mapping = Vec::with_capacity(vertices.len());
    for v in vertices {
        let index = *map.get_or_insert_with(*v, || {
            welded.push(*v);
            welded.len() - 1
        });
        mapping.push(index);
    }
    (welded, mapping)
}

/// For every vertex, the index of the first vertex sharing its position.
pub fn positioned_mapping(vertices: &[Vertex]) -> Vec<usize> {
    let mut map: OrderedMap<Point3<Real>, usize> = OrderedMap::new(compare_points);
    vertices
        .iter()
        .enumerate()
        .map(|(i, v)| *map.get_or_insert_with(v.pos, || i))
        .collect()
}
