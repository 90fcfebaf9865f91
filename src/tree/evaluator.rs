use rayon::prelude::*;

use super::builder::{Node, Octree};
use super::criteria::OpeningCriterion;

/// Per-call evaluation configuration: the acceptance criterion, its opening
/// parameter `theta`, and the gravitational softening length `eps`.
///
/// Smaller `theta` means more accuracy and more work; `theta = 0` descends
/// all the way to direct summation. The softening is added in quadrature to
/// every pairwise distance, so forces stay finite between coincident
/// points. There is deliberately no process-wide default configuration:
/// every evaluation names its parameters.
#[derive(Clone, Copy, Debug)]
pub struct EvalParams {
    /// Which node acceptance rule to apply during traversal.
    pub criterion: OpeningCriterion,
    /// Opening parameter of the criterion.
    pub theta: f64,
    /// Plummer softening length.
    pub eps: f64,
}

impl Default for EvalParams {
    /// PKDGRAV3 criterion with `theta = 0.7` and no softening, the
    /// defaults of the reference tree codes this follows.
    fn default() -> Self {
        EvalParams {
            criterion: OpeningCriterion::default(),
            theta: 0.7,
            eps: 0.0,
        }
    }
}

impl EvalParams {
    /// Parameters that force exact direct summation (`theta = 0`), with the
    /// given softening. Mostly useful as a brute-force baseline in tests.
    pub fn direct(eps: f64) -> Self {
        EvalParams {
            criterion: OpeningCriterion::BarnesHut,
            theta: 0.0,
            eps,
        }
    }
}

#[inline]
pub(super) fn dist2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    dx * dx + dy * dy + dz * dz
}

/// Softened point-mass potential: `-m / sqrt(r^2 + eps^2)`.
#[inline]
fn point_potential(r2: f64, eps2: f64, mass: f64) -> f64 {
    -mass / (r2 + eps2).sqrt()
}

/// Softened point-mass acceleration on the evaluation point, with `dr`
/// pointing from the evaluation point toward the source.
#[inline]
fn point_acceleration(dr: [f64; 3], eps2: f64, mass: f64) -> [f64; 3] {
    let r2 = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2] + eps2;
    let r = r2.sqrt();
    let f = mass / (r2 * r);
    [f * dr[0], f * dr[1], f * dr[2]]
}

/// Softened point-mass tidal tensor, the second derivative of the potential
/// at the evaluation point. Even in `dr`, so the same separation vector
/// serves both partners of a pair.
#[inline]
fn point_tidal_tensor(dr: [f64; 3], eps2: f64, mass: f64) -> [[f64; 3]; 3] {
    let (x, y, z) = (dr[0], dr[1], dr[2]);
    let (x2, y2, z2) = (x * x, y * y, z * z);
    let a = x2 + y2 + z2 + eps2;
    let f = mass / (a * a * a.sqrt());

    let xy = -3.0 * x * y;
    let xz = -3.0 * x * z;
    let yz = -3.0 * y * z;
    let mut t = [
        [y2 + z2 - 2.0 * x2, xy, xz],
        [xy, x2 + z2 - 2.0 * y2, yz],
        [xz, yz, x2 + y2 - 2.0 * z2],
    ];
    for row in t.iter_mut() {
        for v in row.iter_mut() {
            *v *= f;
        }
    }
    t
}

#[inline]
fn tensor_add(acc: &mut [[f64; 3]; 3], t: [[f64; 3]; 3]) {
    for k in 0..3 {
        for l in 0..3 {
            acc[k][l] += t[k][l];
        }
    }
}

impl Octree {
    /// Evaluates the gravitational potential at `x` in `G = 1` units.
    ///
    /// `exclude` is a tree-order particle index (see [`Octree::index`])
    /// whose contribution is skipped; pass the particle's own slot when
    /// evaluating at a stored particle's position, or `None` for an
    /// external query point. The traversal is read-only, so any number of
    /// evaluations may run concurrently against one tree.
    pub fn potential_at(&self, x: [f64; 3], exclude: Option<usize>, params: &EvalParams) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.node_potential(0, &x, exclude, params, params.eps * params.eps)
    }

    /// Evaluates the gravitational acceleration at `x` in `G = 1` units.
    /// Same exclusion semantics as [`Octree::potential_at`].
    pub fn acceleration_at(
        &self,
        x: [f64; 3],
        exclude: Option<usize>,
        params: &EvalParams,
    ) -> [f64; 3] {
        if self.nodes.is_empty() {
            return [0.0; 3];
        }
        self.node_acceleration(0, &x, exclude, params, params.eps * params.eps)
    }

    /// Evaluates the potential at every stored particle's own position,
    /// excluding self-interaction, and writes the results to `out` in the
    /// order the positions were supplied to [`Octree::build`].
    ///
    /// Per-point traversals are independent and run in parallel.
    ///
    /// # Panics
    ///
    /// Panics if `out.len()` differs from the number of particles.
    pub fn potentials(&self, params: &EvalParams, out: &mut [f64]) {
        assert_eq!(
            out.len(),
            self.len(),
            "tree has {} points, but out has length {}",
            self.len(),
            out.len()
        );

        let phi: Vec<f64> = (0..self.len())
            .into_par_iter()
            .map(|i| self.potential_at(self.points[i], Some(i), params))
            .collect();
        for (i, p) in phi.into_iter().enumerate() {
            out[self.index[i]] = p;
        }
    }

    /// Evaluates the acceleration at every stored particle's own position,
    /// excluding self-interaction, in supplied order. Parallel like
    /// [`Octree::potentials`].
    ///
    /// # Panics
    ///
    /// Panics if `out.len()` differs from the number of particles.
    pub fn accelerations(&self, params: &EvalParams, out: &mut [[f64; 3]]) {
        assert_eq!(
            out.len(),
            self.len(),
            "tree has {} points, but out has length {}",
            self.len(),
            out.len()
        );

        let acc: Vec<[f64; 3]> = (0..self.len())
            .into_par_iter()
            .map(|i| self.acceleration_at(self.points[i], Some(i), params))
            .collect();
        for (i, a) in acc.into_iter().enumerate() {
            out[self.index[i]] = a;
        }
    }

    /// Evaluates the tidal tensor at `x` in `G = 1` units: the 3x3 matrix
    /// of second derivatives of the potential, which sets the differential
    /// (stretching) force across an extended body at `x`. Same exclusion
    /// semantics as [`Octree::potential_at`].
    pub fn tidal_tensor_at(
        &self,
        x: [f64; 3],
        exclude: Option<usize>,
        params: &EvalParams,
    ) -> [[f64; 3]; 3] {
        if self.nodes.is_empty() {
            return [[0.0; 3]; 3];
        }
        self.node_tidal_tensor(0, &x, exclude, params, params.eps * params.eps)
    }

    /// Evaluates the tidal tensor at every stored particle's own position,
    /// excluding self-interaction, in supplied order. Parallel like
    /// [`Octree::potentials`].
    ///
    /// # Panics
    ///
    /// Panics if `out.len()` differs from the number of particles.
    pub fn tidal_tensors(&self, params: &EvalParams, out: &mut [[[f64; 3]; 3]]) {
        assert_eq!(
            out.len(),
            self.len(),
            "tree has {} points, but out has length {}",
            self.len(),
            out.len()
        );

        let tensors: Vec<[[f64; 3]; 3]> = (0..self.len())
            .into_par_iter()
            .map(|i| self.tidal_tensor_at(self.points[i], Some(i), params))
            .collect();
        for (i, t) in tensors.into_iter().enumerate() {
            out[self.index[i]] = t;
        }
    }

    /// A node whose particle range contains the excluded particle must
    /// never be folded into a monopole, or the self-interaction would leak
    /// back in through the aggregate mass.
    #[inline]
    fn may_approximate(&self, node: &Node, exclude: Option<usize>) -> bool {
        match exclude {
            None => true,
            Some(j) => j < node.start || j >= node.end,
        }
    }

    fn node_potential(
        &self,
        ni: usize,
        x: &[f64; 3],
        exclude: Option<usize>,
        params: &EvalParams,
        eps2: f64,
    ) -> f64 {
        let node = &self.nodes[ni];

        if node.is_leaf() {
            let mut phi = 0.0;
            for j in node.start..node.end {
                if exclude == Some(j) {
                    continue;
                }
                phi += point_potential(dist2(x, &self.points[j]), eps2, self.masses[j]);
            }
            return phi;
        }

        let d2 = dist2(x, &node.com);
        if self.may_approximate(node, exclude) && params.criterion.accepts(node, d2, params.theta)
        {
            return point_potential(d2, eps2, node.mass);
        }

        let mut phi = 0.0;
        for child in node.children.into_iter().flatten() {
            phi += self.node_potential(child, x, exclude, params, eps2);
        }
        phi
    }

    fn node_acceleration(
        &self,
        ni: usize,
        x: &[f64; 3],
        exclude: Option<usize>,
        params: &EvalParams,
        eps2: f64,
    ) -> [f64; 3] {
        let node = &self.nodes[ni];

        if node.is_leaf() {
            let mut acc = [0.0; 3];
            for j in node.start..node.end {
                if exclude == Some(j) {
                    continue;
                }
                let p = &self.points[j];
                let da = point_acceleration(
                    [p[0] - x[0], p[1] - x[1], p[2] - x[2]],
                    eps2,
                    self.masses[j],
                );
                for k in 0..3 {
                    acc[k] += da[k];
                }
            }
            return acc;
        }

        if self.may_approximate(node, exclude)
            && params
                .criterion
                .accepts(node, dist2(x, &node.com), params.theta)
        {
            let c = &node.com;
            return point_acceleration([c[0] - x[0], c[1] - x[1], c[2] - x[2]], eps2, node.mass);
        }

        let mut acc = [0.0; 3];
        for child in node.children.into_iter().flatten() {
            let da = self.node_acceleration(child, x, exclude, params, eps2);
            for k in 0..3 {
                acc[k] += da[k];
            }
        }
        acc
    }

    fn node_tidal_tensor(
        &self,
        ni: usize,
        x: &[f64; 3],
        exclude: Option<usize>,
        params: &EvalParams,
        eps2: f64,
    ) -> [[f64; 3]; 3] {
        let node = &self.nodes[ni];

        if node.is_leaf() {
            let mut t = [[0.0; 3]; 3];
            for j in node.start..node.end {
                if exclude == Some(j) {
                    continue;
                }
                let p = &self.points[j];
                tensor_add(
                    &mut t,
                    point_tidal_tensor(
                        [p[0] - x[0], p[1] - x[1], p[2] - x[2]],
                        eps2,
                        self.masses[j],
                    ),
                );
            }
            return t;
        }

        if self.may_approximate(node, exclude)
            && params
                .criterion
                .accepts(node, dist2(x, &node.com), params.theta)
        {
            let c = &node.com;
            return point_tidal_tensor(
                [c[0] - x[0], c[1] - x[1], c[2] - x[2]],
                eps2,
                node.mass,
            );
        }

        let mut t = [[0.0; 3]; 3];
        for child in node.children.into_iter().flatten() {
            tensor_add(&mut t, self.node_tidal_tensor(child, x, exclude, params, eps2));
        }
        t
    }
}

/// Reference `O(N^2)` potential: the softened pairwise sum every tree
/// evaluation approximates. Writes the potential at each particle's own
/// position (self-excluded) into `out`.
///
/// # Panics
///
/// Panics if the slice lengths disagree.
pub fn direct_potentials(points: &[[f64; 3]], masses: &[f64], eps: f64, out: &mut [f64]) {
    assert_eq!(points.len(), masses.len());
    assert_eq!(points.len(), out.len());

    let eps2 = eps * eps;
    out.fill(0.0);
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let r2 = dist2(&points[i], &points[j]);
            out[i] += point_potential(r2, eps2, masses[j]);
            out[j] += point_potential(r2, eps2, masses[i]);
        }
    }
}

/// Reference `O(N^2)` acceleration, mirroring [`direct_potentials`].
///
/// # Panics
///
/// Panics if the slice lengths disagree.
pub fn direct_accelerations(points: &[[f64; 3]], masses: &[f64], eps: f64, out: &mut [[f64; 3]]) {
    assert_eq!(points.len(), masses.len());
    assert_eq!(points.len(), out.len());

    let eps2 = eps * eps;
    out.fill([0.0; 3]);
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let (pi, pj) = (&points[i], &points[j]);
            let dr = [pj[0] - pi[0], pj[1] - pi[1], pj[2] - pi[2]];
            let dai = point_acceleration(dr, eps2, masses[j]);
            let daj = point_acceleration(dr, eps2, masses[i]);
            for k in 0..3 {
                out[i][k] += dai[k];
                out[j][k] -= daj[k];
            }
        }
    }
}

/// Reference `O(N^2)` tidal tensor, mirroring [`direct_potentials`]. The
/// point tensor is even in the separation vector, so one evaluation per
/// unordered pair serves both partners (up to the mass factor).
///
/// # Panics
///
/// Panics if the slice lengths disagree.
pub fn direct_tidal_tensors(
    points: &[[f64; 3]],
    masses: &[f64],
    eps: f64,
    out: &mut [[[f64; 3]; 3]],
) {
    assert_eq!(points.len(), masses.len());
    assert_eq!(points.len(), out.len());

    let eps2 = eps * eps;
    out.fill([[0.0; 3]; 3]);
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let (pi, pj) = (&points[i], &points[j]);
            let dr = [pj[0] - pi[0], pj[1] - pi[1], pj[2] - pi[2]];
            tensor_add(&mut out[i], point_tidal_tensor(dr, eps2, masses[j]));
            tensor_add(&mut out[j], point_tidal_tensor(dr, eps2, masses[i]));
        }
    }
}
