use crate::tree::{Cube, Node, OpeningCriterion};

fn cell(half_size: f64, r_max2: f64, sigma_x2: f64) -> Node {
    Node {
        cube: Cube { center: [0.0; 3], half_size },
        mass: 4.0,
        com: [0.0; 3],
        r_max2,
        sigma_x2,
        start: 0,
        end: 4,
        children: [None; 8],
    }
}

const ALL: [OpeningCriterion; 3] = [
    OpeningCriterion::BarnesHut,
    OpeningCriterion::Pkdgrav3,
    OpeningCriterion::SalmonWarren,
];

#[test]
fn test_theta_zero_always_descends() {
    let node = cell(0.5, 0.25, 0.1);
    for crit in ALL {
        for d2 in [1e-6, 1.0, 1e3, 1e12] {
            assert!(!crit.accepts(&node, d2, 0.0), "{:?} accepted at theta = 0", crit);
        }
    }
}

#[test]
fn test_monotone_in_theta() {
    // Raising theta can only turn "descend" into "accept", never back.
    let node = cell(0.5, 0.3, 0.12);
    let thetas = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 0.7, 1.0, 2.0];

    for crit in ALL {
        for d2 in [0.1, 0.5, 1.0, 2.0, 5.0, 25.0, 400.0] {
            let mut accepted = false;
            for &theta in &thetas {
                let a = crit.accepts(&node, d2, theta);
                assert!(
                    a || !accepted,
                    "{:?} flipped accept -> descend at theta = {}, d2 = {}",
                    crit,
                    theta,
                    d2
                );
                accepted = a;
            }
        }
    }
}

#[test]
fn test_barnes_hut_threshold() {
    // Side length 1 at distance 2: s/d = 0.5.
    let node = cell(0.5, 0.25, 0.1);
    let d2 = 4.0;
    assert!(!OpeningCriterion::BarnesHut.accepts(&node, d2, 0.49));
    assert!(OpeningCriterion::BarnesHut.accepts(&node, d2, 0.51));
}

#[test]
fn test_pkdgrav3_threshold() {
    // Accept when d > 1.5 * r_max / theta: with r_max = 1, theta = 0.7
    // the opening radius squared is 2.25 / 0.49.
    let node = cell(0.5, 1.0, 0.1);
    let r_open2 = 2.25 / 0.49;
    assert!(!OpeningCriterion::Pkdgrav3.accepts(&node, r_open2 * 0.99, 0.7));
    assert!(OpeningCriterion::Pkdgrav3.accepts(&node, r_open2 * 1.01, 0.7));
}

#[test]
fn test_salmon_warren_never_accepts_inside_r_max() {
    let node = cell(0.5, 1.0, 0.25);
    for d2 in [0.0, 0.5, 0.99] {
        assert!(!OpeningCriterion::SalmonWarren.accepts(&node, d2, 100.0));
    }
}

#[test]
fn test_salmon_warren_threshold() {
    // r_max = 1, sigma_x^2 = 0.5, theta = 0.5: accept once
    // (d - 1)^2 > 0.5 / 0.25, i.e. d > 1 + sqrt(2).
    let node = cell(0.5, 1.0, 0.5);
    let d_crit = 1.0 + 2.0_f64.sqrt();
    let below = (d_crit - 0.1) * (d_crit - 0.1);
    let above = (d_crit + 0.1) * (d_crit + 0.1);
    assert!(!OpeningCriterion::SalmonWarren.accepts(&node, below, 0.5));
    assert!(OpeningCriterion::SalmonWarren.accepts(&node, above, 0.5));
}

#[test]
fn test_default_criterion() {
    assert_eq!(OpeningCriterion::default(), OpeningCriterion::Pkdgrav3);
}
