//! Elementwise stages the layers compose after a matmul.

use ndarray::{Array2, ArrayView1};

use crate::tensor::Element;

/// Adds a bias vector to every row of the matrix.
///
/// # Panics
///
/// Panics if the bias length does not match the column count.
pub fn add_bias<T: Element>(out: &mut Array2<T>, bias: &ArrayView1<T>) {
    assert_eq!(
        out.ncols(),
        bias.len(),
        "bias length {} != output columns {}",
        bias.len(),
        out.ncols()
    );
    for mut row in out.outer_iter_mut() {
        for (v, &b) in row.iter_mut().zip(bias.iter()) {
            *v += b;
        }
    }
}

/// Multiplies column `j` of the matrix by `scales[j]`.
///
/// # Panics
///
/// Panics if the scale length does not match the column count.
pub fn scale_columns<T: Element>(out: &mut Array2<T>, scales: &ArrayView1<T>) {
    assert_eq!(
        out.ncols(),
        scales.len(),
        "scale length {} != output columns {}",
        scales.len(),
        out.ncols()
    );
    for mut row in out.outer_iter_mut() {
        for (v, &s) in row.iter_mut().zip(scales.iter()) {
            *v *= s;
        }
    }
}
