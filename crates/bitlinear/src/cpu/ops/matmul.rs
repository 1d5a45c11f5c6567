//! Public, safe entry points for matrix multiplication.
//!
//! This module dispatches to the scalar kernels in
//! [`crate::cpu::kernels::scalar`], parallelizing with one of two
//! strategies based on the batch size:
//!
//! - **Decode path** (`rows == 1`): parallelizes over output features. The
//!   single input row is shared by all threads, each computing a chunk of
//!   the output vector.
//! - **Prefill path** (`rows > 1`): parallelizes over input rows. Each
//!   thread computes one full output row independently.
//!
//! Both strategies split only across output elements — the `k`-ascending
//! accumulation of any single element is never subdivided, so results are
//! identical to a sequential run.
//!
//! Dimension mismatches are precondition violations and fail fast with an
//! assertion; they are never silently truncated.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::cpu::kernels::scalar;
use crate::tensor::{BitMatrix, Element, TernaryMatrix};

/// Computes `C = A @ B` with `B` in direct `[hidden, cols]` layout.
///
/// `C[i][j] = sum_k A[i][k] * B[k][j]`, with no intermediate rounding
/// beyond the element type's arithmetic.
///
/// # Panics
///
/// Panics if `A`'s column count does not equal `B`'s row count.
pub fn matmul<T: Element>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> Array2<T> {
    let (m, k) = a.dim();
    let (k2, n) = b.dim();
    assert_eq!(k, k2, "matmul dimension mismatch: A[k]={k} != B[k]={k2}");

    let mut c = Array2::zeros((m, n));

    let a_s = a.as_standard_layout();
    let b_s = b.as_standard_layout();
    let b_slice = b_s.as_slice().expect("weight matrix must be contiguous");

    // Direct layout streams B row by row inside the kernel, so both paths
    // parallelize over input rows.
    c.outer_iter_mut()
        .into_par_iter()
        .zip(a_s.outer_iter())
        .for_each(|(mut c_row, a_row)| {
            let a_slice = a_row.as_slice().expect("input row must be contiguous");
            let out = c_row.as_slice_mut().expect("output row must be contiguous");
            scalar::matmul_row_direct_scalar(out, a_slice, b_slice, n);
        });

    c
}

/// Computes `C = A @ B^T` with the right operand supplied pre-transposed.
///
/// `bt` is `[cols, hidden]`: row `j` holds output feature `j`'s weights.
/// Semantically identical to `matmul(a, transpose(bt))`; the layout lets
/// the kernel stream both operands sequentially.
///
/// # Panics
///
/// Panics if the inner dimensions disagree.
pub fn transpose_matmul<T: Element>(a: &ArrayView2<T>, bt: &ArrayView2<T>) -> Array2<T> {
    let (m, k) = a.dim();
    let (n, k2) = bt.dim();
    assert_eq!(k, k2, "matmul dimension mismatch: A[k]={k} != B[k]={k2}");

    let mut c = Array2::zeros((m, n));

    let a_s = a.as_standard_layout();
    let b_s = bt.as_standard_layout();
    let a_slice = a_s.as_slice().expect("input matrix must be contiguous");
    let b_slice = b_s.as_slice().expect("weight matrix must be contiguous");

    if m == 1 {
        // Decode path: parallelize over output-feature chunks.
        let out_slice = c.as_slice_mut().expect("output must be contiguous");
        let num_threads = rayon::current_num_threads();
        let chunk_size = n.div_ceil(num_threads.max(1)).max(1);

        out_slice
            .par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(chunk_idx, out_chunk)| {
                let row_start = chunk_idx * chunk_size;
                let b_rows = &b_slice[row_start * k..(row_start + out_chunk.len()) * k];
                scalar::matmul_vec_scalar(out_chunk, a_slice, b_rows, k);
            });
    } else {
        // Prefill path: parallelize over input rows.
        c.outer_iter_mut()
            .into_par_iter()
            .zip(a_s.outer_iter())
            .for_each(|(mut c_row, a_row)| {
                let a_row_slice = a_row.as_slice().expect("input row must be contiguous");
                let out = c_row.as_slice_mut().expect("output row must be contiguous");
                scalar::matmul_vec_scalar(out, a_row_slice, b_slice, k);
            });
    }

    c
}

/// Computes `C = (A @ B^T) / s` with the right operand pre-transposed.
///
/// Every output element is divided by `scale`. Callers deriving the scale
/// from data are responsible for flooring it away from zero first.
///
/// # Panics
///
/// Panics if the inner dimensions disagree.
pub fn matmul_transpose_scale<T: Element>(
    a: &ArrayView2<T>,
    bt: &ArrayView2<T>,
    scale: T,
) -> Array2<T> {
    let mut c = transpose_matmul(a, bt);
    c.mapv_inplace(|v| v / scale);
    c
}

/// Computes `C = A @ W^T` for ternary weight codes, without multiplication.
///
/// `codes` is `[cols, hidden]`: row `j` holds output feature `j`'s codes.
/// For each output element the kernel accumulates `A[i][k]` on `Pos`,
/// subtracts it on `Neg`, and skips `Zero` — equivalent to a matmul against
/// a matrix with entries in {-1, 0, +1}, with `k`-ascending accumulation.
///
/// # Panics
///
/// Panics if `A`'s column count does not equal the code matrix's
/// `in_features`.
pub fn ternary_matmul<T: Element>(a: &ArrayView2<T>, codes: &TernaryMatrix) -> Array2<T> {
    let (m, k) = a.dim();
    let n = codes.out_features();
    assert_eq!(
        k,
        codes.in_features(),
        "matmul dimension mismatch: A[k]={k} != codes[k]={}",
        codes.in_features()
    );

    let mut c = Array2::zeros((m, n));

    let a_s = a.as_standard_layout();
    let a_slice_all = a_s.as_slice().expect("input matrix must be contiguous");

    if m == 1 {
        let out_slice = c.as_slice_mut().expect("output must be contiguous");
        let num_threads = rayon::current_num_threads();
        let chunk_size = n.div_ceil(num_threads.max(1)).max(1);

        out_slice
            .par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(chunk_idx, out_chunk)| {
                let row_start = chunk_idx * chunk_size;
                let code_rows = codes.rows(row_start, out_chunk.len());
                scalar::ternary_matmul_vec_scalar(out_chunk, a_slice_all, code_rows, k);
            });
    } else {
        let code_slice = codes.as_slice();
        c.outer_iter_mut()
            .into_par_iter()
            .zip(a_s.outer_iter())
            .for_each(|(mut c_row, a_row)| {
                let a_row_slice = a_row.as_slice().expect("input row must be contiguous");
                let out = c_row.as_slice_mut().expect("output row must be contiguous");
                scalar::ternary_matmul_vec_scalar(out, a_row_slice, code_slice, k);
            });
    }

    c
}

/// Computes `C = A @ W^T` for packed binary sign codes, without
/// multiplication.
///
/// Bit 1 accumulates `A[i][k]`, bit 0 subtracts it. Equivalent to
/// [`ternary_matmul`] over codes restricted to {-1, +1}.
///
/// # Panics
///
/// Panics if `A`'s column count does not equal the bit matrix's
/// `in_features`.
pub fn binary_matmul<T: Element>(a: &ArrayView2<T>, bits: &BitMatrix) -> Array2<T> {
    let (m, k) = a.dim();
    let n = bits.out_features();
    assert_eq!(
        k,
        bits.in_features(),
        "matmul dimension mismatch: A[k]={k} != bits[k]={}",
        bits.in_features()
    );

    let mut c = Array2::zeros((m, n));
    let words_per_row = bits.words_per_row();

    let a_s = a.as_standard_layout();
    let a_slice_all = a_s.as_slice().expect("input matrix must be contiguous");

    if m == 1 {
        let out_slice = c.as_slice_mut().expect("output must be contiguous");
        let num_threads = rayon::current_num_threads();
        let chunk_size = n.div_ceil(num_threads.max(1)).max(1);

        out_slice
            .par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(chunk_idx, out_chunk)| {
                let row_start = chunk_idx * chunk_size;
                let word_rows = bits.rows(row_start, out_chunk.len());
                scalar::binary_matmul_vec_scalar(
                    out_chunk,
                    a_slice_all,
                    word_rows,
                    words_per_row,
                    k,
                );
            });
    } else {
        let word_slice = bits.rows(0, n);
        c.outer_iter_mut()
            .into_par_iter()
            .zip(a_s.outer_iter())
            .for_each(|(mut c_row, a_row)| {
                let a_row_slice = a_row.as_slice().expect("input row must be contiguous");
                let out = c_row.as_slice_mut().expect("output row must be contiguous");
                scalar::binary_matmul_vec_scalar(out, a_row_slice, word_slice, words_per_row, k);
            });
    }

    c
}
