mod energy;

pub use energy::*;
