//! Storage formats for quantized weight codes.
//!
//! A quantized weight is one of three values, [`WeightCode`]. Two container
//! layouts are provided:
//!
//! - [`TernaryMatrix`]: one signed byte per code. Simple, and the layout the
//!   ternary matmul kernel iterates directly.
//! - [`BitMatrix`]: packed sign bits for binary codes (bit 1 → +1,
//!   bit 0 → −1), one `u32` word per 32 codes per row.
//!
//! Storage width is an internal density optimization only — comparison and
//! arithmetic semantics are identical for both layouts.
//!
//! Both containers use the `[out_features, in_features]` orientation: row `j`
//! holds the codes for output feature `j`, matching the weight layout the
//! matmul kernels expect.

use anyhow::{bail, Result};
use ndarray::ArrayView2;

/// A quantized weight value.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightCode {
    /// −1: negate-accumulate.
    Neg = -1,
    /// 0: skip.
    Zero = 0,
    /// +1: accumulate.
    Pos = 1,
}

impl WeightCode {
    /// The signed integer value of the code.
    #[inline]
    pub const fn value(self) -> i8 {
        self as i8
    }

    /// Converts a signed integer into a code.
    ///
    /// # Errors
    ///
    /// Returns an error for any value outside {-1, 0, +1}.
    pub fn from_value(v: i8) -> Result<Self> {
        match v {
            -1 => Ok(Self::Neg),
            0 => Ok(Self::Zero),
            1 => Ok(Self::Pos),
            _ => bail!("invalid weight code {v}, expected -1, 0, or +1"),
        }
    }
}

/// A ternary-coded weight matrix, one byte per code.
///
/// Shape is `[out_features, in_features]` in row-major order.
#[derive(Debug, Clone)]
pub struct TernaryMatrix {
    codes: Vec<i8>,
    shape: [usize; 2],
}

impl TernaryMatrix {
    /// Builds a code matrix from raw signed bytes, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry lies outside {-1, 0, +1}.
    pub fn from_signed(codes: &ArrayView2<i8>) -> Result<Self> {
        let (out_features, in_features) = codes.dim();
        let mut data = Vec::with_capacity(out_features * in_features);
        for &v in codes.iter() {
            WeightCode::from_value(v)?;
            data.push(v);
        }
        Ok(Self {
            codes: data,
            shape: [out_features, in_features],
        })
    }

    /// Builds a code matrix from already-validated codes.
    pub(crate) fn from_raw(codes: Vec<i8>, shape: [usize; 2]) -> Self {
        debug_assert_eq!(codes.len(), shape[0] * shape[1]);
        Self { codes, shape }
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn out_features(&self) -> usize {
        self.shape[0]
    }

    pub fn in_features(&self) -> usize {
        self.shape[1]
    }

    /// The code at `[row, col]`.
    pub fn get(&self, row: usize, col: usize) -> WeightCode {
        let v = self.codes[row * self.shape[1] + col];
        // Entries are validated on construction.
        WeightCode::from_value(v).expect("corrupt ternary code")
    }

    /// Raw codes for a contiguous range of output rows, for the kernels.
    pub(crate) fn rows(&self, start: usize, count: usize) -> &[i8] {
        let k = self.shape[1];
        &self.codes[start * k..(start + count) * k]
    }

    /// All codes, row-major.
    pub(crate) fn as_slice(&self) -> &[i8] {
        &self.codes
    }

    /// Fraction of Zero codes.
    pub fn sparsity(&self) -> f64 {
        if self.codes.is_empty() {
            return 0.0;
        }
        let zeros = self.codes.iter().filter(|&&c| c == 0).count();
        zeros as f64 / self.codes.len() as f64
    }

    /// Storage footprint in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.codes.len()
    }

    /// Compression ratio versus an f32 matrix of the same shape.
    pub fn compression_ratio(&self) -> f64 {
        let fp32_bytes = self.shape[0] * self.shape[1] * 4;
        fp32_bytes as f64 / self.memory_bytes().max(1) as f64
    }
}

/// A binary-coded weight matrix with packed sign bits.
///
/// Bit 1 encodes +1 and bit 0 encodes −1; there is no Zero in this layout.
/// Each row of `[out_features, in_features]` is padded to whole `u32` words.
#[derive(Debug, Clone)]
pub struct BitMatrix {
    words: Vec<u32>,
    shape: [usize; 2],
    words_per_row: usize,
}

impl BitMatrix {
    /// Packs a matrix of ±1 signs into bit form.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is not exactly −1 or +1.
    pub fn from_signs(signs: &ArrayView2<i8>) -> Result<Self> {
        let (out_features, in_features) = signs.dim();
        let words_per_row = in_features.div_ceil(32);
        let mut words = vec![0u32; out_features * words_per_row];
        for (row_idx, row) in signs.outer_iter().enumerate() {
            for (col_idx, &v) in row.iter().enumerate() {
                match v {
                    1 => words[row_idx * words_per_row + col_idx / 32] |= 1 << (col_idx % 32),
                    -1 => {}
                    _ => bail!("invalid binary code {v}, expected -1 or +1"),
                }
            }
        }
        Ok(Self {
            words,
            shape: [out_features, in_features],
            words_per_row,
        })
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn out_features(&self) -> usize {
        self.shape[0]
    }

    pub fn in_features(&self) -> usize {
        self.shape[1]
    }

    /// The sign at `[row, col]`: `true` is +1, `false` is −1.
    pub fn get(&self, row: usize, col: usize) -> bool {
        let word = self.words[row * self.words_per_row + col / 32];
        (word >> (col % 32)) & 1 == 1
    }

    /// Packed words for a contiguous range of output rows, for the kernels.
    pub(crate) fn rows(&self, start: usize, count: usize) -> &[u32] {
        &self.words[start * self.words_per_row..(start + count) * self.words_per_row]
    }

    pub(crate) fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    /// Storage footprint in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.words.len() * 4
    }
}
