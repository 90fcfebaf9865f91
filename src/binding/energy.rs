use log::debug;
use rayon::prelude::*;

use crate::errors::GravtreeError;
use crate::tree::{EvalParams, Octree};

/// The active particles of one binding-energy run: positions, velocities,
/// the shared particle mass, and the transient bound flags. The flags are
/// owned exclusively by the iteration loop; particles start bound and can
/// only lose the flag.
struct ParticleSet {
    positions: Vec<[f64; 3]>,
    velocities: Vec<[f64; 3]>,
    mass: f64,
    bound: Vec<bool>,
}

impl ParticleSet {
    fn len(&self) -> usize {
        self.positions.len()
    }

    /// Indices of the particles still flagged bound.
    fn bound_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.bound[i]).collect()
    }

    fn specific_kinetic(&self, i: usize) -> f64 {
        let v = &self.velocities[i];
        0.5 * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2])
    }
}

/// Computes the gravitational potential at every particle's own position,
/// in `G = 1` units, assuming all particles share the mass `mass`.
///
/// One tree is built over all `n` particles and each particle's potential
/// (self-interaction excluded) is written to `out`. `positions` is flat and
/// row-major: `x0, y0, z0, x1, y1, z1, ...`, of length `3 * out.len()`.
/// An empty input is a valid no-op.
///
/// # Errors
///
/// * [`GravtreeError::InvalidSoftening`] when `eps` is not positive and finite.
/// * [`GravtreeError::InvalidArgument`] when `positions.len() != 3 * out.len()`.
///
/// # Examples
///
/// ```
/// use gravtree::potential_energy;
///
/// let positions = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0];
/// let mut phi = [0.0; 2];
/// potential_energy(&positions, 3.0, 1e-9, &mut phi).unwrap();
/// // Each particle sees the other's mass at distance 2.
/// assert!((phi[0] + 1.5).abs() < 1e-8);
/// assert!((phi[1] + 1.5).abs() < 1e-8);
/// ```
pub fn potential_energy(
    positions: &[f64],
    mass: f64,
    eps: f64,
    out: &mut [f64],
) -> Result<(), GravtreeError> {
    validate_softening(eps)?;
    let n = out.len();
    let x = to_vec3(positions, n, "positions")?;
    if n == 0 {
        return Ok(());
    }

    let tree = Octree::build(&x, &vec![mass; n]);
    let params = EvalParams { eps, ..EvalParams::default() };
    tree.potentials(&params, out);
    Ok(())
}

/// Self-consistently classifies particles as bound or unbound and writes
/// each particle's final specific energy `0.5 |v|^2 + phi` to `out`, in
/// `G = 1` units.
///
/// The first iteration builds a tree over all particles. Each following
/// iteration rebuilds the tree from the particles still flagged bound, so
/// unbound particles stop contributing mass to the field but keep receiving
/// potential evaluations against the reduced tree. A particle flagged
/// unbound never re-enters the source set, so the bound set shrinks
/// monotonically. Exactly `n_iter` iterations run; the count is a fixed
/// work budget, not a tolerance, and there is no early exit.
///
/// # Errors
///
/// * [`GravtreeError::InvalidSoftening`] when `eps` is not positive and finite.
/// * [`GravtreeError::InvalidArgument`] when `n_iter < 1` or any buffer
///   length disagrees with `out.len()`.
///
/// # Examples
///
/// ```
/// use gravtree::iterative_binding_energy;
///
/// // A tight pair plus one particle kicked hard outward.
/// let positions = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0, 0.0];
/// let velocities = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1e6, 0.0];
/// let mut energy = [0.0; 3];
/// iterative_binding_energy(&positions, &velocities, 1e8, 1e-3, 2, &mut energy).unwrap();
/// assert!(energy[0] < 0.0); // bound
/// assert!(energy[2] > 0.0); // escaping
/// ```
pub fn iterative_binding_energy(
    positions: &[f64],
    velocities: &[f64],
    mass: f64,
    eps: f64,
    n_iter: usize,
    out: &mut [f64],
) -> Result<(), GravtreeError> {
    binding_energy_impl(positions, velocities, mass, eps, n_iter, None, out)
}

/// Like [`iterative_binding_energy`], but with a pre-filter `mask` of
/// length `out.len()` selecting which particles participate at all.
///
/// Masked-out particles never enter any tree and receive exactly `0.0` in
/// `out`; the result at the selected indices is identical to calling
/// [`iterative_binding_energy`] on the already-filtered arrays.
///
/// # Errors
///
/// * [`GravtreeError::InvalidSoftening`] when `eps` is not positive and finite.
/// * [`GravtreeError::InvalidArgument`] when `n_iter < 1`, when a coordinate
///   buffer length disagrees with `out.len()`, or when
///   `mask.len() != out.len()`.
pub fn iterative_binding_energy_masked(
    positions: &[f64],
    velocities: &[f64],
    mass: f64,
    eps: f64,
    n_iter: usize,
    mask: &[bool],
    out: &mut [f64],
) -> Result<(), GravtreeError> {
    binding_energy_impl(positions, velocities, mass, eps, n_iter, Some(mask), out)
}

fn binding_energy_impl(
    positions: &[f64],
    velocities: &[f64],
    mass: f64,
    eps: f64,
    n_iter: usize,
    mask: Option<&[bool]>,
    out: &mut [f64],
) -> Result<(), GravtreeError> {
    validate_softening(eps)?;
    if n_iter < 1 {
        return Err(GravtreeError::InvalidArgument(format!(
            "n_iter must be at least 1, got {}",
            n_iter
        )));
    }

    let n = out.len();
    let x = to_vec3(positions, n, "positions")?;
    let v = to_vec3(velocities, n, "velocities")?;
    if let Some(mask) = mask {
        if mask.len() != n {
            return Err(GravtreeError::InvalidArgument(format!(
                "mask has length {}, expected {}",
                mask.len(),
                n
            )));
        }
    }

    out.fill(0.0);
    if n == 0 {
        return Ok(());
    }

    // Compact the mask-selected particles; `active` maps back to input slots.
    let active: Vec<usize> = match mask {
        Some(mask) => (0..n).filter(|&i| mask[i]).collect(),
        None => (0..n).collect(),
    };
    let mut set = ParticleSet {
        positions: active.iter().map(|&i| x[i]).collect(),
        velocities: active.iter().map(|&i| v[i]).collect(),
        mass,
        bound: vec![true; active.len()],
    };

    let params = EvalParams { eps, ..EvalParams::default() };
    let mut energy = vec![0.0; set.len()];

    for iter in 0..n_iter {
        let sources = set.bound_indices();
        let tree = Octree::build(
            &sources.iter().map(|&i| set.positions[i]).collect::<Vec<_>>(),
            &vec![set.mass; sources.len()],
        );

        // Bound particles are the tree's own points: evaluate with
        // self-exclusion, then scatter back through the compaction map.
        let mut phi_sources = vec![0.0; sources.len()];
        tree.potentials(&params, &mut phi_sources);
        for (k, &i) in sources.iter().enumerate() {
            energy[i] = set.specific_kinetic(i) + phi_sources[k];
        }

        // Unbound particles still feel the reduced tree, as external
        // query points with nothing to exclude.
        let stripped: Vec<usize> = (0..set.len()).filter(|&i| !set.bound[i]).collect();
        let phi_stripped: Vec<f64> = stripped
            .par_iter()
            .map(|&i| tree.potential_at(set.positions[i], None, &params))
            .collect();
        for (&i, &phi) in stripped.iter().zip(&phi_stripped) {
            energy[i] = set.specific_kinetic(i) + phi;
        }

        // Sticky unbinding: the bound set never grows.
        for i in 0..set.len() {
            set.bound[i] = set.bound[i] && energy[i] < 0.0;
        }
        debug!(
            "binding iteration {}: {} of {} particles bound",
            iter + 1,
            set.bound.iter().filter(|&&b| b).count(),
            set.len()
        );
    }

    for (k, &i) in active.iter().enumerate() {
        out[i] = energy[k];
    }
    Ok(())
}

fn validate_softening(eps: f64) -> Result<(), GravtreeError> {
    if eps > 0.0 && eps.is_finite() {
        Ok(())
    } else {
        Err(GravtreeError::InvalidSoftening)
    }
}

/// Checks the declared length of a flat row-major coordinate buffer and
/// repacks it into 3-vectors.
fn to_vec3(flat: &[f64], n: usize, name: &str) -> Result<Vec<[f64; 3]>, GravtreeError> {
    if flat.len() != 3 * n {
        return Err(GravtreeError::InvalidArgument(format!(
            "{} has length {}, expected {} (3 per particle)",
            name,
            flat.len(),
            3 * n
        )));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}
