//! Symmetric rounding: nearest integer, ties away from zero.

use crate::tensor::Element;

/// Rounds to the nearest integer with ties resolved away from zero.
///
/// For `x >= 0` this is `floor(x + 0.5)`; for `x < 0` it is `ceil(x - 0.5)`.
/// Distinct from round-half-to-even: `round_sym(0.5) == 1` and
/// `round_sym(-0.5) == -1`. Both weight and activation quantization depend
/// on this exact boundary behavior.
#[inline]
pub fn round_sym<T: Element>(x: T) -> T {
    let half = T::from_f64(0.5);
    if x >= T::zero() {
        (x + half).floor()
    } else {
        (x - half).ceil()
    }
}
