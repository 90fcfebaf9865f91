mod bounds;
mod builder;
mod criteria;
mod evaluator;
mod query;

pub use bounds::*;
pub use builder::*;
pub use criteria::*;
pub use evaluator::*;

#[cfg(test)]
mod criteria_tests;
#[cfg(test)]
mod evaluator_tests;
