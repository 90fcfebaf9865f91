use super::builder::Octree;
use super::evaluator::dist2;

impl Octree {
    /// Returns the indices of every particle strictly inside the sphere of
    /// radius `r` around `x`, in the order the positions were supplied to
    /// [`Octree::build`] (not sorted).
    ///
    /// Subtrees are pruned against the sphere using each node's center of
    /// mass and `r_max`: a node wholly outside the sphere is skipped, a node
    /// wholly inside contributes its whole particle range without distance
    /// tests, and only the boundary-straddling leaves are checked particle
    /// by particle.
    pub fn search_sphere(&self, x: [f64; 3], r: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() {
            self.node_search_sphere(0, &x, r, &mut out);
        }
        out
    }

    fn node_search_sphere(&self, ni: usize, x: &[f64; 3], r: f64, out: &mut Vec<usize>) {
        let node = &self.nodes[ni];
        let d = dist2(x, &node.com).sqrt();
        let r_max = node.r_max2.sqrt();

        if d - r_max > r {
            // Disjoint from the sphere.
            return;
        }
        if d + r_max < r {
            // Entirely inside the sphere.
            out.extend_from_slice(&self.index[node.start..node.end]);
            return;
        }
        if node.is_leaf() {
            let r2 = r * r;
            for j in node.start..node.end {
                if dist2(x, &self.points[j]) < r2 {
                    out.push(self.index[j]);
                }
            }
            return;
        }
        for child in node.children.into_iter().flatten() {
            self.node_search_sphere(child, x, r, out);
        }
    }
}
