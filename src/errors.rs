use std::error::Error;
use std::fmt;

/// Represents errors that can occur at the crate's public boundary.
///
/// Tree construction and traversal are infallible once inputs have been
/// validated; every detected violation is fatal to the call and surfaced
/// to the caller rather than recovered internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GravtreeError {
    /// The softening length is zero, negative, or non-finite. A vanishing
    /// softening combined with coincident particle positions would divide
    /// by zero, so it is rejected up front instead of emitting infinities.
    InvalidSoftening,
    /// A caller contract violation: a non-positive iteration count, or a
    /// buffer whose length disagrees with the declared particle count.
    InvalidArgument(String),
}

impl fmt::Display for GravtreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GravtreeError::InvalidSoftening => {
                write!(f, "Softening length must be positive and finite")
            }
            GravtreeError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl Error for GravtreeError {}
