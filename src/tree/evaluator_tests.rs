use crate::tree::{
    direct_accelerations, direct_potentials, direct_tidal_tensors, EvalParams, Octree,
    OpeningCriterion,
};

use approx::{assert_abs_diff_eq, assert_relative_eq};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(n: usize, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            [
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ]
        })
        .collect()
}

const ALL: [OpeningCriterion; 3] = [
    OpeningCriterion::BarnesHut,
    OpeningCriterion::Pkdgrav3,
    OpeningCriterion::SalmonWarren,
];

#[test]
fn test_two_body_potential_is_exact() {
    // Masses m1, m2 at separation d, no softening, always-descend
    // traversal: the pair potential energy is -m1 * m2 / d.
    let (m1, m2, d) = (3.0, 5.0, 2.0);
    let points = vec![[0.0, 0.0, 0.0], [d, 0.0, 0.0]];
    let tree = Octree::build(&points, &[m1, m2]);

    let mut phi = [0.0; 2];
    tree.potentials(&EvalParams::direct(0.0), &mut phi);

    assert_relative_eq!(m1 * phi[0], -m1 * m2 / d, max_relative = 1e-13);
    assert_relative_eq!(m2 * phi[1], -m1 * m2 / d, max_relative = 1e-13);
}

#[test]
fn test_two_body_acceleration_is_exact() {
    let (m1, m2, d) = (3.0, 5.0, 2.0);
    let points = vec![[0.0, 0.0, 0.0], [d, 0.0, 0.0]];
    let tree = Octree::build(&points, &[m1, m2]);

    let mut acc = [[0.0; 3]; 2];
    tree.accelerations(&EvalParams::direct(0.0), &mut acc);

    // Particle 0 is pulled toward +x with magnitude m2 / d^2.
    assert_relative_eq!(acc[0][0], m2 / (d * d), max_relative = 1e-13);
    assert_abs_diff_eq!(acc[0][1], 0.0);
    assert_abs_diff_eq!(acc[0][2], 0.0);
    assert_relative_eq!(acc[1][0], -m1 / (d * d), max_relative = 1e-13);
}

#[test]
fn test_theta_zero_matches_brute_force() {
    // With theta = 0 every criterion degenerates to direct summation.
    let points = random_points(200, 1);
    let masses = vec![1.0; points.len()];
    let eps = 1e-3;

    let mut expected = vec![0.0; points.len()];
    direct_potentials(&points, &masses, eps, &mut expected);

    let tree = Octree::build(&points, &masses);
    for crit in ALL {
        let params = EvalParams { criterion: crit, theta: 0.0, eps };
        let mut phi = vec![0.0; points.len()];
        tree.potentials(&params, &mut phi);
        for i in 0..points.len() {
            assert_relative_eq!(phi[i], expected[i], max_relative = 1e-11);
        }
    }
}

#[test]
fn test_theta_zero_acceleration_matches_brute_force() {
    let points = random_points(100, 2);
    let masses = vec![1.0; points.len()];
    let eps = 1e-3;

    let mut expected = vec![[0.0; 3]; points.len()];
    direct_accelerations(&points, &masses, eps, &mut expected);

    let tree = Octree::build(&points, &masses);
    let mut acc = vec![[0.0; 3]; points.len()];
    tree.accelerations(&EvalParams::direct(eps), &mut acc);

    for i in 0..points.len() {
        for k in 0..3 {
            assert_relative_eq!(acc[i][k], expected[i][k], max_relative = 1e-9, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_error_grows_monotonically_with_theta() {
    let points = random_points(200, 3);
    let masses = vec![1.0; points.len()];
    let eps = 1e-3;
    let thetas = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

    let mut expected = vec![0.0; points.len()];
    direct_potentials(&points, &masses, eps, &mut expected);

    let tree = Octree::build(&points, &masses);
    for crit in ALL {
        let mut prev_err = 0.0;
        for &theta in &thetas {
            let params = EvalParams { criterion: crit, theta, eps };
            let mut phi = vec![0.0; points.len()];
            tree.potentials(&params, &mut phi);

            let err = phi
                .iter()
                .zip(&expected)
                .map(|(p, e)| ((p - e) / e).abs())
                .fold(0.0, f64::max);

            assert!(
                err >= prev_err - 1e-12,
                "{:?}: error shrank from {} to {} as theta rose to {}",
                crit,
                prev_err,
                err,
                theta
            );
            prev_err = err;
        }
        // Even the loosest theta stays in the ballpark of the truth.
        assert!(prev_err < 0.5, "{:?}: error {} at theta = 1", crit, prev_err);
    }
}

#[test]
fn test_self_is_excluded_even_through_monopoles() {
    // Two tight, well-separated clumps with an aggressive theta: monopole
    // acceptance must never fold a particle's own mass into its potential,
    // so every value stays finite and close to the direct sum.
    let mut rng = StdRng::seed_from_u64(4);
    let mut points = Vec::new();
    for c in [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0]] {
        for _ in 0..20 {
            points.push([
                c[0] + rng.random_range(-0.01..0.01),
                c[1] + rng.random_range(-0.01..0.01),
                c[2] + rng.random_range(-0.01..0.01),
            ]);
        }
    }
    let masses = vec![1.0; points.len()];

    let mut expected = vec![0.0; points.len()];
    direct_potentials(&points, &masses, 0.0, &mut expected);

    let tree = Octree::build(&points, &masses);
    let params = EvalParams { criterion: OpeningCriterion::Pkdgrav3, theta: 1.0, eps: 0.0 };
    let mut phi = vec![0.0; points.len()];
    tree.potentials(&params, &mut phi);

    for i in 0..points.len() {
        assert!(phi[i].is_finite());
        assert_relative_eq!(phi[i], expected[i], max_relative = 0.05);
    }
}

#[test]
fn test_single_particle_has_zero_self_potential() {
    let tree = Octree::build(&[[0.0, 0.0, 0.0]], &[1.0]);
    let mut phi = [f64::NAN];
    tree.potentials(&EvalParams::default(), &mut phi);
    assert_eq!(phi[0], 0.0);
}

#[test]
fn test_empty_tree_evaluates_to_zero() {
    let tree = Octree::build(&[], &[]);
    assert_eq!(tree.potential_at([1.0, 2.0, 3.0], None, &EvalParams::default()), 0.0);
    assert_eq!(tree.acceleration_at([1.0, 2.0, 3.0], None, &EvalParams::default()), [0.0; 3]);

    let mut phi: [f64; 0] = [];
    tree.potentials(&EvalParams::default(), &mut phi);
}

#[test]
fn test_external_query_point_sees_whole_mass() {
    // Far from the tree, every criterion collapses it to one monopole.
    let points = random_points(64, 5);
    let masses = vec![2.0; points.len()];
    let tree = Octree::build(&points, &masses);

    let x = [1e6, 0.0, 0.0];
    for crit in ALL {
        let params = EvalParams { criterion: crit, theta: 0.7, eps: 0.0 };
        let phi = tree.potential_at(x, None, &params);
        assert_relative_eq!(phi, -128.0 / 1e6, max_relative = 1e-6);
    }
}

#[test]
fn test_two_body_tidal_tensor_is_exact() {
    // A single source of mass m at distance d along x: the tensor at the
    // origin is diag(-2m/d^3, m/d^3, m/d^3).
    let (m1, m2, d) = (3.0, 5.0, 2.0);
    let points = vec![[0.0, 0.0, 0.0], [d, 0.0, 0.0]];
    let tree = Octree::build(&points, &[m1, m2]);

    let mut t = [[[0.0; 3]; 3]; 2];
    tree.tidal_tensors(&EvalParams::direct(0.0), &mut t);

    let d3 = d * d * d;
    assert_relative_eq!(t[0][0][0], -2.0 * m2 / d3, max_relative = 1e-13);
    assert_relative_eq!(t[0][1][1], m2 / d3, max_relative = 1e-13);
    assert_relative_eq!(t[0][2][2], m2 / d3, max_relative = 1e-13);
    for k in 0..3 {
        for l in 0..3 {
            if k != l {
                assert_abs_diff_eq!(t[0][k][l], 0.0);
            }
        }
    }
    assert_relative_eq!(t[1][0][0], -2.0 * m1 / d3, max_relative = 1e-13);
}

#[test]
fn test_theta_zero_tidal_tensor_matches_brute_force() {
    let points = random_points(100, 6);
    let masses = vec![1.0; points.len()];
    let eps = 1e-3;

    let mut expected = vec![[[0.0; 3]; 3]; points.len()];
    direct_tidal_tensors(&points, &masses, eps, &mut expected);

    let tree = Octree::build(&points, &masses);
    let mut t = vec![[[0.0; 3]; 3]; points.len()];
    tree.tidal_tensors(&EvalParams::direct(eps), &mut t);

    for i in 0..points.len() {
        for k in 0..3 {
            for l in 0..3 {
                assert_relative_eq!(
                    t[i][k][l],
                    expected[i][k][l],
                    max_relative = 1e-9,
                    epsilon = 1e-9
                );
            }
        }
    }
}

#[test]
fn test_tidal_tensor_is_symmetric_and_traceless() {
    // Each point contribution is a symmetric matrix with exactly zero
    // trace at eps = 0, and both properties survive summation and monopole
    // approximation.
    let points = random_points(150, 7);
    let masses = vec![1.0; points.len()];
    let tree = Octree::build(&points, &masses);

    let params = EvalParams { criterion: OpeningCriterion::Pkdgrav3, theta: 0.7, eps: 0.0 };
    let mut t = vec![[[0.0; 3]; 3]; points.len()];
    tree.tidal_tensors(&params, &mut t);

    for ti in &t {
        let scale = ti.iter().flatten().fold(0.0, |m, v| v.abs().max(m));
        for k in 0..3 {
            for l in k + 1..3 {
                assert_eq!(ti[k][l], ti[l][k]);
            }
        }
        let trace = ti[0][0] + ti[1][1] + ti[2][2];
        assert!(trace.abs() <= 1e-10 * scale, "trace {} at scale {}", trace, scale);
    }
}

#[test]
fn test_external_point_tidal_tensor_uses_monopole() {
    // Far away, the whole set collapses to one source of the total mass.
    let points = random_points(64, 8);
    let masses = vec![2.0; points.len()];
    let tree = Octree::build(&points, &masses);

    let d = 1e4;
    let params = EvalParams { criterion: OpeningCriterion::BarnesHut, theta: 0.7, eps: 0.0 };
    let t = tree.tidal_tensor_at([d, 0.0, 0.0], None, &params);

    let expected = -2.0 * 128.0 / (d * d * d);
    assert_relative_eq!(t[0][0], expected, max_relative = 1e-3);
}

#[test]
fn test_results_are_written_in_input_order() {
    // The tree reorders particles internally; outputs must not be.
    let points = vec![
        [10.0, 0.0, 0.0],
        [-10.0, 0.0, 0.0],
        [10.1, 0.0, 0.0],
    ];
    let masses = vec![1.0; 3];
    let tree = Octree::build(&points, &masses);

    let mut phi = [0.0; 3];
    tree.potentials(&EvalParams::direct(0.0), &mut phi);

    // Particles 0 and 2 sit 0.1 apart, so they are much more bound than 1.
    assert!(phi[0] < phi[1] && phi[2] < phi[1]);
}
