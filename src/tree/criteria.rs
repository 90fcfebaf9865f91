use super::builder::Node;

/// The rule deciding whether a tree node is far enough from an evaluation
/// point to be approximated by its monopole (total mass at the center of
/// mass) instead of being descended into.
///
/// The set of criteria is closed and dispatched through this tagged enum;
/// each rule is a pure function of node geometry, the squared distance to
/// the node's center of mass, and the opening parameter `theta`. All three
/// are monotone in `theta`: raising `theta` can only turn "descend"
/// decisions into "accept", never the reverse, and `theta = 0` forces full
/// descent to direct summation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OpeningCriterion {
    /// The classical criterion of Barnes & Hut (1986): accept when
    /// `s / d < theta`, with `s` the cell side length. Cheapest to
    /// evaluate; its error bound is only loosely tied to `theta`.
    BarnesHut,
    /// The opening radius of PKDGRAV3 (Potter, Stadel & Teyssier 2017,
    /// section 3.1): accept when `d > 1.5 * r_max / theta`. Measuring
    /// `r_max` from the center of mass rather than the geometric center
    /// keeps the worst-case monopole error `theta`-controlled even for
    /// lopsided mass distributions inside the cell.
    #[default]
    Pkdgrav3,
    /// The monopole error bound of Salmon & Warren (1994), in the compact
    /// form given by Behroozi, Wechsler & Wu (2013, appendix B): accept
    /// when `(1 / (1 - r_max/d))^2 * (sigma_x^2 / d^2) < theta^2`, with
    /// `sigma_x^2` the mass dispersion about the center of mass.
    SalmonWarren,
}

impl OpeningCriterion {
    /// Returns true when `node`, seen from squared distance `d2` between
    /// the evaluation point and the node's center of mass, may be treated
    /// as a single pseudo-particle.
    ///
    /// Deterministic and side-effect-free. A false here only costs extra
    /// descent; a true is what bounds the approximation error.
    pub fn accepts(self, node: &Node, d2: f64, theta: f64) -> bool {
        match self {
            OpeningCriterion::BarnesHut => {
                let s = 2.0 * node.cube.half_size;
                s * s < theta * theta * d2
            }
            OpeningCriterion::Pkdgrav3 => {
                // d > 1.5 * r_max / theta, squared and rearranged so that
                // theta = 0 rejects without dividing by zero.
                theta * theta * d2 > 2.25 * node.r_max2
            }
            OpeningCriterion::SalmonWarren => {
                let d = d2.sqrt();
                let gap = d - node.r_max2.sqrt();
                gap > 0.0 && node.sigma_x2 < theta * theta * gap * gap
            }
        }
    }
}
