use crate::mesh::Mesh;
use crate::mesh::comparators::positioned_mapping;
use hashbrown::HashMap;

impl Mesh {
    /// Checks if the Mesh has holes.
    ///
    /// ### Returns
    /// Returns `true` if, after merging coincident vertices, some undirected
    /// edge is used an odd number of times.
    ///
    /// ### Notes:
    /// - Orientation is ignored, a flipped facet still closes its neighbours.
    /// - Positions are compared with `POSITION_EPSILON`.
    /// - An edge pointing past the vertex array counts as open.
    pub fn has_open_edges(&self) -> bool {
        if self.edges.iter().any(|e| e.s >= self.vertices.len() || e.e >= self.vertices.len()) {
            return true;
        }
        let remap = positioned_mapping(&self.vertices);
        let mut edge_counts: HashMap<(usize, usize), u32> = HashMap::new();
        for edge in &self.edges {
            let (s, e) = (remap[edge.s], remap[edge.e]);
            let key = if s < e { (s, e) } else { (e, s) };
            *edge_counts.entry(key).or_insert(0) += 1;
        }
        edge_counts.values().any(|&count| count % 2 == 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::shapes::cuboid;
    use nalgebra::Point3;

    #[test]
    fn test_closed_cuboid_has_no_open_edges() {
        let cube = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0));
        assert!(!cube.has_open_edges());
    }

    #[test]
    fn test_removed_face_opens_mesh() {
        let mut cube = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0));
        cube.facets.pop();
        cube.edges.truncate(cube.edges.len() - 4);
        assert!(cube.has_open_edges());
    }

    #[test]
    fn test_dangling_edge_is_open() {
        let mut cube = cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0));
        cube.edges[0].s = 7 + cube.vertices.len();
        assert!(cube.has_open_edges());
    }
}
