//! The numeric bound for matrix elements.

use std::fmt::Debug;

use num_traits::{Float, NumAssignOps, NumCast};

/// Element type for activation and weight matrices.
///
/// Kernels need real arithmetic, comparison, absolute value, and an additive
/// identity; `Send + Sync` lets rayon split work across rows and output
/// chunks. `f32` and `f64` satisfy the bound out of the box, as does any
/// `num_traits::Float` fixed-point-style wrapper the caller supplies.
pub trait Element: Float + NumAssignOps + Debug + Send + Sync + 'static {
    /// Converts an `f64` constant (epsilon floors, integer bounds) into the
    /// element type.
    #[inline]
    fn from_f64(v: f64) -> Self {
        <Self as NumCast>::from(v).expect("constant not representable in element type")
    }
}

impl<T> Element for T where T: Float + NumAssignOps + Debug + Send + Sync + 'static {}
