use log::trace;

use super::bounds::Cube;

/// A single cell of the gravity octree.
///
/// Nodes live in an index-addressed arena ([`Octree::nodes`]); child links
/// are arena indices rather than heap pointers, which keeps ownership flat
/// and makes read-only parallel traversal straightforward. Every node knows
/// the contiguous range `start..end` of particles it covers in the tree's
/// reordered arrays, and carries the aggregate quantities the acceptance
/// criteria need.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    /// The cubic region of space this node covers.
    pub cube: Cube,
    /// Total mass of all particles in the node.
    pub mass: f64,
    /// Mass-weighted center of mass of the node's particles.
    pub com: [f64; 3],
    /// Maximum squared distance from any contained particle to the center
    /// of mass.
    pub r_max2: f64,
    /// Mean squared distance from the contained particles to the center of
    /// mass (the second moment used by the Salmon-Warren criterion).
    pub sigma_x2: f64,
    /// Start of the node's particle range in the tree's reordered arrays.
    pub start: usize,
    /// One past the end of the node's particle range.
    pub end: usize,
    /// Arena indices of the eight octant children. A node with no children
    /// is a leaf.
    pub children: [Option<usize>; 8],
}

impl Node {
    /// Returns true if this node holds its particles directly instead of
    /// delegating to children.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }

    /// Number of particles contained in the node.
    pub fn count(&self) -> usize {
        self.end - self.start
    }
}

/// A gravity octree built over a set of point masses.
///
/// The tree recursively splits a root bounding cube into octants until each
/// cell holds at most one particle, with a size floor that stops the
/// recursion for coincident (or pathological) input. It is built fresh per
/// evaluation, owned by the caller, and discarded afterwards; nothing is
/// shared across calls.
///
/// # Examples
///
/// ```
/// use gravtree::{EvalParams, Octree};
///
/// let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
/// let masses = vec![1.0, 1.0];
/// let tree = Octree::build(&points, &masses);
///
/// // Exact (always-descend) potential halfway between two unit masses.
/// let phi = tree.potential_at([0.5, 0.0, 0.0], None, &EvalParams::direct(0.0));
/// assert!((phi + 4.0).abs() < 1e-12);
/// ```
pub struct Octree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) points: Vec<[f64; 3]>,
    pub(crate) masses: Vec<f64>,
    pub(crate) index: Vec<usize>,
    size_floor: f64,
}

impl Octree {
    /// Builds a tree over the given particles, using the padded bounding
    /// cube of the positions as the root cell.
    ///
    /// # Panics
    ///
    /// Panics if `points` and `masses` have different lengths.
    pub fn build(points: &[[f64; 3]], masses: &[f64]) -> Self {
        Self::build_in(points, masses, Cube::bounding(points))
    }

    /// Builds a tree with an explicit root cell. The cell must enclose all
    /// positions for the octant partition to be meaningful.
    pub fn build_in(points: &[[f64; 3]], masses: &[f64], root: Cube) -> Self {
        assert_eq!(
            points.len(),
            masses.len(),
            "points and masses must have the same length"
        );

        let n = points.len();
        let mut tree = Octree {
            nodes: Vec::with_capacity(2 * n.max(1)),
            points: points.to_vec(),
            masses: masses.to_vec(),
            index: (0..n).collect(),
            size_floor: root.half_size * f64::EPSILON,
        };

        if n == 0 {
            return tree;
        }

        tree.build_node(root, 0, n);
        trace!("built octree: {} particles, {} nodes", n, tree.nodes.len());
        tree
    }

    /// Number of particles stored in the tree.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the tree holds no particles.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The node arena. The root, when the tree is non-empty, is `nodes()[0]`.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The root node, if the tree is non-empty.
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Particle positions in tree order.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Maps tree order back to the order positions were supplied in.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Recursively adds the node covering `cube` and the particle range
    /// `start..end`, returning its arena index.
    fn build_node(&mut self, cube: Cube, start: usize, end: usize) -> usize {
        let (mass, com, r_max2, sigma_x2) =
            node_stats(&self.points[start..end], &self.masses[start..end]);

        let i = self.nodes.len();
        self.nodes.push(Node {
            cube,
            mass,
            com,
            r_max2,
            sigma_x2,
            start,
            end,
            children: [None; 8],
        });

        // The negated comparison makes a NaN-sized cell a leaf as well, so
        // non-finite coordinates terminate instead of recursing forever.
        if end - start <= 1 || !(cube.half_size > self.size_floor) {
            return i;
        }

        let bounds = self.partition_octants(&cube, start, end);
        for o in 0..8 {
            let (s, e) = (bounds[o], bounds[o + 1]);
            if s == e {
                continue;
            }
            let child = self.build_node(cube.octant(o), s, e);
            self.nodes[i].children[o] = Some(child);
        }
        i
    }

    /// Reorders the particle range `start..end` so each octant's particles
    /// are contiguous, returning the nine range boundaries.
    fn partition_octants(&mut self, cube: &Cube, start: usize, end: usize) -> [usize; 9] {
        let mut counts = [0usize; 8];
        for i in start..end {
            counts[cube.octant_of(&self.points[i])] += 1;
        }

        let mut bounds = [start; 9];
        for o in 0..8 {
            bounds[o + 1] = bounds[o] + counts[o];
        }

        let tmp_points = self.points[start..end].to_vec();
        let tmp_masses = self.masses[start..end].to_vec();
        let tmp_index = self.index[start..end].to_vec();

        let mut cursor = bounds;
        for k in 0..end - start {
            let o = cube.octant_of(&tmp_points[k]);
            let dst = cursor[o];
            cursor[o] += 1;
            self.points[dst] = tmp_points[k];
            self.masses[dst] = tmp_masses[k];
            self.index[dst] = tmp_index[k];
        }
        bounds
    }
}

/// Computes the aggregate quantities of one cell: total mass, mass-weighted
/// center of mass, maximum squared particle-to-COM distance, and the mean
/// squared particle-to-COM distance.
pub(crate) fn node_stats(
    points: &[[f64; 3]],
    masses: &[f64],
) -> (f64, [f64; 3], f64, f64) {
    let mut mass = 0.0;
    let mut com = [0.0; 3];
    for (p, &m) in points.iter().zip(masses) {
        mass += m;
        for k in 0..3 {
            com[k] += m * p[k];
        }
    }
    for c in com.iter_mut() {
        *c /= mass;
    }

    let mut r_max2: f64 = 0.0;
    let mut sigma_x2 = 0.0;
    for (p, &m) in points.iter().zip(masses) {
        let mut r2 = 0.0;
        for k in 0..3 {
            let dx = p[k] - com[k];
            r2 += dx * dx;
        }
        r_max2 = r_max2.max(r2);
        sigma_x2 += m * r2;
    }
    sigma_x2 /= mass;

    (mass, com, r_max2, sigma_x2)
}
