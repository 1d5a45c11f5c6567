//! Scalar kernel implementations for matrix operations.
//!
//! These are the innermost loops the parallel dispatchers in
//! [`crate::cpu::ops`] call once per output chunk or input row. Every kernel
//! accumulates in `k`-ascending order, so splitting work across rows or
//! output chunks never changes which order a single output element sums in.

use crate::tensor::Element;

/// Computes vector-matrix product against pre-transposed weights.
///
/// `b_rows` holds `out_chunk.len()` consecutive weight rows of length `k`
/// (the `[out, in]` layout): `out[i] = dot(a, b_rows[i])`.
pub fn matmul_vec_scalar<T: Element>(out_chunk: &mut [T], a: &[T], b_rows: &[T], k: usize) {
    for (i, out_val) in out_chunk.iter_mut().enumerate() {
        let b_row = &b_rows[i * k..(i + 1) * k];
        let mut sum = T::zero();
        for (&x, &y) in a.iter().zip(b_row.iter()) {
            sum += x * y;
        }
        *out_val = sum;
    }
}

/// Computes one output row of a direct-layout matmul.
///
/// `b` is `[k, n]` row-major: `out_row[j] = sum_k a_row[k] * b[k][j]`.
/// The loop runs `k` outer and `j` inner so both operands stream
/// sequentially; per output element the accumulation is still k-ascending.
pub fn matmul_row_direct_scalar<T: Element>(out_row: &mut [T], a_row: &[T], b: &[T], n: usize) {
    for v in out_row.iter_mut() {
        *v = T::zero();
    }
    for (kk, &x) in a_row.iter().enumerate() {
        let b_row = &b[kk * n..(kk + 1) * n];
        for (out_val, &y) in out_row.iter_mut().zip(b_row.iter()) {
            *out_val += x * y;
        }
    }
}

/// Computes vector-matrix product against ternary weight codes.
///
/// `code_rows` holds `out_chunk.len()` consecutive code rows of length `k`,
/// entries in {-1, 0, +1}. No multiplication: +1 accumulates, −1
/// negate-accumulates, 0 skips.
pub fn ternary_matmul_vec_scalar<T: Element>(
    out_chunk: &mut [T],
    a: &[T],
    code_rows: &[i8],
    k: usize,
) {
    for (i, out_val) in out_chunk.iter_mut().enumerate() {
        let codes = &code_rows[i * k..(i + 1) * k];
        let mut sum = T::zero();
        for (&x, &code) in a.iter().zip(codes.iter()) {
            if code == 1 {
                sum += x;
            } else if code == -1 {
                sum -= x;
            }
            // code == 0: no operation
        }
        *out_val = sum;
    }
}

/// Computes vector-matrix product against packed binary sign bits.
///
/// `word_rows` holds `out_chunk.len()` consecutive packed rows of
/// `words_per_row` words each; bit 1 accumulates, bit 0 negate-accumulates.
/// No multiplication.
pub fn binary_matmul_vec_scalar<T: Element>(
    out_chunk: &mut [T],
    a: &[T],
    word_rows: &[u32],
    words_per_row: usize,
    k: usize,
) {
    for (i, out_val) in out_chunk.iter_mut().enumerate() {
        let words = &word_rows[i * words_per_row..(i + 1) * words_per_row];
        let mut sum = T::zero();
        for (kk, &x) in a.iter().take(k).enumerate() {
            let bit = (words[kk >> 5] >> (kk & 31)) & 1;
            if bit == 1 {
                sum += x;
            } else {
                sum -= x;
            }
        }
        *out_val = sum;
    }
}
