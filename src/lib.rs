//! # gravtree
//!
//! Hierarchical gravity for point-mass sets: an octree with monopole
//! aggregation replaces the naive `O(N^2)` all-pairs sum with an
//! approximate `O(N log N)` evaluation of potentials and accelerations,
//! controlled by one of three node acceptance criteria (Barnes-Hut,
//! PKDGRAV3, Salmon-Warren).
//!
//! On top of the evaluator sits an iterative binding-energy classifier:
//! the tree is rebuilt over a shrinking bound subset until a fixed
//! iteration budget is exhausted, which is how halo analysis pipelines
//! decide which tracer particles are gravitationally bound to a group.
//!
//! Everything runs in `G = 1` units. Trees are built fresh per call and
//! own no process-wide state; theta, softening, and the criterion are
//! explicit per-call configuration via [`EvalParams`].
//!
//! ```
//! use gravtree::potential_energy;
//!
//! // Two unit-mass particles separated by 1.
//! let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
//! let mut phi = [0.0; 2];
//! potential_energy(&positions, 1.0, 1e-6, &mut phi).unwrap();
//! assert!((phi[0] + 1.0).abs() < 1e-6);
//! ```

pub mod binding;
pub mod errors;
pub mod tree;

pub use binding::{iterative_binding_energy, iterative_binding_energy_masked, potential_energy};
pub use errors::GravtreeError;
pub use tree::{
    direct_accelerations, direct_potentials, direct_tidal_tensors, Cube, EvalParams, Node,
    Octree, OpeningCriterion,
};
