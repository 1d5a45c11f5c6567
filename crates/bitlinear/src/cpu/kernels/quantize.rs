//! Quantization routines for weight and activation matrices.
//!
//! Three quantizers live here:
//!
//! - **Binary weights**: re-center by the tensor mean, then take the sign.
//!   `sign(0) = +1`, so the output codes are always {-1, +1} — never zero.
//!   The emitted scale is `beta = mean(|W|)`.
//! - **Ternary weights**: AbsMean. Scale by `1/beta`, round with ties away
//!   from zero, clamp to {-1, 0, +1}. This variant can produce exact zeros.
//! - **Activations**: per-row dynamic AbsMax fake quantization. Each row is
//!   scaled so its own absolute maximum maps to the positive bound of a
//!   signed B-bit code, rounded, clamped to the asymmetric two's-complement
//!   range `[-(Qb+1), Qb]`, and immediately mapped back to the real domain.
//!
//! Degenerate inputs never divide by zero: every derived scale is floored
//! at the caller-supplied epsilon before use. Rows are quantized
//! independently, so the activation pass parallelizes across rows.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::config::QuantConfig;
use crate::cpu::kernels::rounding::round_sym;
use crate::tensor::{BitMatrix, Element, TernaryMatrix};

/// Binary-quantized weights: packed sign codes plus the AbsMean scale.
#[derive(Debug, Clone)]
pub struct BinaryQuantized<T: Element> {
    /// Packed sign codes, `[out, in]`. Bit 1 is +1, bit 0 is −1.
    pub codes: BitMatrix,
    /// AbsMean scale `beta`, floored at epsilon.
    pub scale: T,
    /// The re-centering term `alpha = mean(W)`. Used only to center the
    /// sign extraction; it does not appear in the output scale.
    pub mean: T,
}

impl<T: Element> BinaryQuantized<T> {
    /// Expands the codes back to a real matrix with values in {−β, +β}.
    pub fn dequantize(&self) -> Array2<T> {
        let [out_features, in_features] = self.codes.shape();
        Array2::from_shape_fn((out_features, in_features), |(i, j)| {
            if self.codes.get(i, j) {
                self.scale
            } else {
                -self.scale
            }
        })
    }
}

/// Ternary-quantized weights: byte codes plus the AbsMean scale.
#[derive(Debug, Clone)]
pub struct TernaryQuantized<T: Element> {
    /// Ternary codes, `[out, in]`.
    pub codes: TernaryMatrix,
    /// AbsMean scale `beta`, floored at epsilon.
    pub scale: T,
}

impl<T: Element> TernaryQuantized<T> {
    /// Expands the codes back to a real matrix with values in {−β, 0, +β}.
    pub fn dequantize(&self) -> Array2<T> {
        let [out_features, in_features] = self.codes.shape();
        Array2::from_shape_fn((out_features, in_features), |(i, j)| {
            match self.codes.get(i, j).value() {
                1 => self.scale,
                -1 => -self.scale,
                _ => T::zero(),
            }
        })
    }
}

/// Quantizes a weight matrix to binary codes with mean re-centering.
///
/// `alpha = mean(W)` re-centers the tensor before the sign is taken;
/// `beta = mean(|W|)` (floored at `epsilon`) becomes the scale. The sign
/// convention maps zero to +1, so the dequantized weights are always
/// {−β, +β} — the output is binary, not ternary.
///
/// # Panics
///
/// Panics if the weight matrix is empty.
pub fn quantize_weights_binary<T: Element>(
    w: &ArrayView2<T>,
    epsilon: T,
) -> BinaryQuantized<T> {
    let (out_features, in_features) = w.dim();
    assert!(
        out_features > 0 && in_features > 0,
        "weight matrix must be non-empty"
    );

    let count = T::from_f64((out_features * in_features) as f64);
    let mut sum = T::zero();
    let mut abs_sum = T::zero();
    for &v in w.iter() {
        sum += v;
        abs_sum += v.abs();
    }
    let alpha = sum / count;
    let beta = (abs_sum / count).max(epsilon);

    let mut signs = Vec::with_capacity(out_features * in_features);
    for &v in w.iter() {
        // sign(0) = +1: the centered value maps to Pos on exact equality.
        signs.push(if v - alpha >= T::zero() { 1i8 } else { -1i8 });
    }
    let signs = Array2::from_shape_vec((out_features, in_features), signs)
        .expect("sign buffer matches weight shape");
    let codes = BitMatrix::from_signs(&signs.view()).expect("sign codes are always ±1");

    BinaryQuantized {
        codes,
        scale: beta,
        mean: alpha,
    }
}

/// Quantizes a weight matrix to ternary codes by AbsMean thresholding.
///
/// `beta = mean(|W|)` (floored at `epsilon`); each weight becomes
/// `clamp(round_sym(w / beta), -1, +1)`. Unlike the binary variant there is
/// no re-centering term, and exact zeros are produced for weights well
/// inside the scale.
///
/// # Panics
///
/// Panics if the weight matrix is empty.
pub fn quantize_weights_ternary<T: Element>(
    w: &ArrayView2<T>,
    epsilon: T,
) -> TernaryQuantized<T> {
    let (out_features, in_features) = w.dim();
    assert!(
        out_features > 0 && in_features > 0,
        "weight matrix must be non-empty"
    );

    let count = T::from_f64((out_features * in_features) as f64);
    let mut abs_sum = T::zero();
    for &v in w.iter() {
        abs_sum += v.abs();
    }
    let beta = (abs_sum / count).max(epsilon);

    let one = T::one();
    let mut codes = Vec::with_capacity(out_features * in_features);
    for &v in w.iter() {
        let r = round_sym(v / beta);
        codes.push(if r >= one {
            1i8
        } else if r <= -one {
            -1i8
        } else {
            0i8
        });
    }

    TernaryQuantized {
        codes: TernaryMatrix::from_raw(codes, [out_features, in_features]),
        scale: beta,
    }
}

/// Fake-quantizes one activation row in place, returning the row's scale γ.
///
/// `gamma = Qb / max(|row|)` with `Qb = 2^(B-1) - 1` and the maximum floored
/// at `epsilon`. Each element is scaled, rounded with ties away from zero,
/// clamped to `[-(Qb+1), Qb]` (the asymmetric signed B-bit range), and
/// divided back by γ. Every output element lies within `1/gamma` of its
/// input.
pub fn fake_quantize_row<T: Element>(
    row: &[T],
    out: &mut [T],
    bit_width: u32,
    epsilon: T,
) -> T {
    debug_assert!(
        (2..=16).contains(&bit_width),
        "bit width {bit_width} outside supported range 2..=16"
    );
    debug_assert_eq!(row.len(), out.len());

    let mut max_abs = T::zero();
    for &v in row {
        max_abs = max_abs.max(v.abs());
    }
    let max_abs = max_abs.max(epsilon);

    let q_max = T::from_f64(((1u32 << (bit_width - 1)) - 1) as f64);
    let q_min = -(q_max + T::one());
    let gamma = q_max / max_abs;

    for (o, &v) in out.iter_mut().zip(row.iter()) {
        let q = round_sym(v * gamma).min(q_max).max(q_min);
        *o = q / gamma;
    }

    gamma
}

/// Fake-quantizes an activation matrix, each row independently.
///
/// Rows never interact: each derives its own γ from its own absolute
/// maximum, so the pass parallelizes across rows.
pub fn quantize_activations<T: Element>(x: &ArrayView2<T>, config: &QuantConfig) -> Array2<T> {
    let bit_width = config.bit_width;
    let epsilon = T::from_f64(config.epsilon);

    let x_s = x.as_standard_layout();
    let mut out = Array2::zeros(x.raw_dim());

    out.outer_iter_mut()
        .into_par_iter()
        .zip(x_s.outer_iter())
        .for_each(|(mut out_row, row)| {
            let src = row.as_slice().expect("activation row must be contiguous");
            let dst = out_row
                .as_slice_mut()
                .expect("output row must be contiguous");
            fake_quantize_row(src, dst, bit_width, epsilon);
        });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const EPS: f32 = 1e-8;

    #[test]
    fn binary_signs_follow_centered_weights() {
        let w = arr2(&[[1.0f32, -1.0], [0.5, -0.5]]);
        let q = quantize_weights_binary(&w.view(), EPS);

        // alpha = 0, beta = mean(|W|) = 0.75
        assert_abs_diff_eq!(q.mean, 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(q.scale, 0.75, epsilon = 1e-7);
        assert!(q.codes.get(0, 0));
        assert!(!q.codes.get(0, 1));
        assert!(q.codes.get(1, 0));
        assert!(!q.codes.get(1, 1));

        let dq = q.dequantize();
        assert_abs_diff_eq!(dq[(0, 0)], 0.75, epsilon = 1e-7);
        assert_abs_diff_eq!(dq[(1, 1)], -0.75, epsilon = 1e-7);
    }

    #[test]
    fn binary_never_emits_zero() {
        // Every entry equals the mean, so every centered weight is exactly
        // zero; the sign convention must map all of them to +1.
        let w = arr2(&[[0.5f32, 0.5], [0.5, 0.5]]);
        let q = quantize_weights_binary(&w.view(), EPS);

        assert_abs_diff_eq!(q.scale, 0.5, epsilon = 1e-7);
        for i in 0..2 {
            for j in 0..2 {
                assert!(q.codes.get(i, j), "centered zero must map to +1");
            }
        }
        let dq = q.dequantize();
        for &v in dq.iter() {
            assert_abs_diff_eq!(v, 0.5, epsilon = 1e-7);
        }
    }

    #[test]
    fn binary_all_zero_weights_floor_scale_to_epsilon() {
        let w = arr2(&[[0.0f32, 0.0], [0.0, 0.0]]);
        let q = quantize_weights_binary(&w.view(), EPS);
        assert_eq!(q.scale, EPS);
        // sign(0 - 0) = +1 everywhere.
        assert!(q.codes.get(1, 1));
    }

    #[test]
    fn ternary_absmean_codes() {
        // beta = (0.9 + 0.1 + 0.0 + 0.05 + 0.8) / 5 = 0.37
        // -0.9 / 0.37 = -2.43 -> -2 -> clamp -1
        // -0.1 / 0.37 = -0.27 -> 0
        //  0.0 -> 0
        //  0.05 / 0.37 = 0.135 -> 0
        //  0.8 / 0.37 = 2.16 -> 2 -> clamp 1
        let w = arr2(&[[-0.9f32, -0.1, 0.0, 0.05, 0.8]]);
        let q = quantize_weights_ternary(&w.view(), EPS);

        assert_abs_diff_eq!(q.scale, 0.37, epsilon = 1e-6);
        let got: Vec<i8> = (0..5).map(|j| q.codes.get(0, j).value()).collect();
        assert_eq!(got, vec![-1, 0, 0, 0, 1]);
    }

    #[test]
    fn ternary_exact_multiples_round_trip_losslessly() {
        // Every entry equals beta, so w / beta = 1 exactly and the
        // dequantized weight reproduces the input bit for bit.
        let w = arr2(&[[0.75f32, 0.75], [0.75, 0.75]]);
        let q = quantize_weights_ternary(&w.view(), EPS);

        assert_eq!(q.scale, 0.75);
        let dq = q.dequantize();
        for &v in dq.iter() {
            assert_eq!(v, 0.75);
        }
    }

    #[test]
    fn ternary_all_zero_weights_stay_zero() {
        let w = arr2(&[[0.0f32; 3]; 2]);
        let q = quantize_weights_ternary(&w.view(), EPS);
        assert_eq!(q.scale, EPS);
        assert_eq!(q.codes.sparsity(), 1.0);
        assert!(q.dequantize().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn fake_quantize_is_exact_when_gamma_is_one() {
        // maxabs = 127 gives gamma = 127/127 = 1, so the output is just
        // round_sym clamped to [-128, 127].
        let row = [-127.0f32, 50.5, 100.25];
        let mut out = [0.0f32; 3];
        let gamma = fake_quantize_row(&row, &mut out, 8, EPS);

        assert_eq!(gamma, 1.0);
        assert_eq!(out, [-127.0, 51.0, 100.0]);
    }

    #[test]
    fn fake_quantize_error_stays_within_one_step() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let row: Vec<f32> = (0..64).map(|_| rng.gen_range(-4.0..4.0)).collect();
            let mut out = vec![0.0f32; 64];
            let gamma = fake_quantize_row(&row, &mut out, 8, EPS);

            let step = 1.0 / gamma;
            for (orig, dq) in row.iter().zip(out.iter()) {
                let err = (orig - dq).abs();
                assert!(
                    err <= step + 1e-6,
                    "error {err} exceeds step {step} for value {orig}"
                );
            }
        }
    }

    #[test]
    fn fake_quantize_two_bit_collapses_to_signs_and_zero() {
        // Qb = 1, maxabs = 1, gamma = 1: round to {-1, 0, +1}.
        let row = [0.6f32, -1.0, 0.2];
        let mut out = [0.0f32; 3];
        let gamma = fake_quantize_row(&row, &mut out, 2, EPS);

        assert_eq!(gamma, 1.0);
        assert_eq!(out, [1.0, -1.0, 0.0]);
    }

    #[test]
    fn rows_quantize_independently() {
        // Row scales differ; a shared scale would distort one of them.
        let x = arr2(&[[1.0f32, 1.0], [2.0, 2.0]]);
        let out = quantize_activations(&x.view(), &QuantConfig::default());

        // Each row's maximum maps exactly onto Qb, so constant rows
        // reproduce themselves.
        assert_abs_diff_eq!(out[(0, 0)], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[(1, 1)], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_row_survives_epsilon_floor() {
        let x = arr2(&[[0.0f32, 0.0, 0.0]]);
        let out = quantize_activations(&x.view(), &QuantConfig::default());
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
