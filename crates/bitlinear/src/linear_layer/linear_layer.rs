//! A CPU linear layer supporting full-precision, packed binary, packed
//! ternary, and quantization-aware weight paths.
//!
//! The core component is the [`LinearLayer`] struct with a typed
//! [`LinearData`] enum for its weight storage, so each forward call
//! dispatches to the kernel matching the weight format.
//!
//! Weight tensors use the `[out_features, in_features]` layout throughout:
//! row `j` holds output feature `j`'s weights or codes, and the matmul is
//! responsible for the implicit transposition.

use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2, ArrayView2};

use crate::config::QuantConfig;
use crate::cpu::kernels::quantize::{
    quantize_activations, quantize_weights_binary, quantize_weights_ternary,
};
use crate::cpu::ops::elementwise::{add_bias, scale_columns};
use crate::cpu::ops::matmul::{binary_matmul, ternary_matmul, transpose_matmul};
use crate::tensor::{BitMatrix, Element, TernaryMatrix};

/// The weight data for a linear layer.
///
/// This allows type-safe dispatch to the matching compute kernel.
pub enum LinearData<T: Element> {
    /// Full-precision weights, `[out, in]`.
    Full(Array2<T>),
    /// Packed binary sign codes (bit 1 → +1, bit 0 → −1), no learned scale.
    Binary(BitMatrix),
    /// Ternary codes with a per-output-column scale vector β.
    ScaledTernary {
        codes: TernaryMatrix,
        scales: Array1<T>,
    },
    /// Latent real weights, binary-quantized on every forward call.
    QatBinary(Array2<T>),
    /// Latent real weights, ternary-quantized on every forward call.
    QatTernary(Array2<T>),
}

/// The weight path a layer runs, mirroring the [`LinearData`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerMode {
    Full,
    Binary,
    ScaledTernary,
    QatBinary,
    QatTernary,
}

/// A CPU linear transformation layer (`y = x @ W^T + b`).
///
/// Every operation is a pure function of the inputs: the layer holds no
/// mutable state, and repeated forward calls with the same input produce
/// identical results.
pub struct LinearLayer<T: Element> {
    pub data: LinearData<T>,
    pub bias: Option<Array1<T>>,
    config: QuantConfig,
}

impl<T: Element> LinearLayer<T> {
    /// Creates a full-precision layer from `[out, in]` weights and an
    /// optional bias.
    pub fn new_full(weights: Array2<T>, bias: impl Into<Option<Array1<T>>>) -> Self {
        Self {
            data: LinearData::Full(weights),
            bias: bias.into(),
            config: QuantConfig::default(),
        }
    }

    /// Creates a binary layer from ±1 sign codes, `[out, in]`.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is not exactly −1 or +1.
    pub fn new_binary(
        signs: &ArrayView2<i8>,
        bias: impl Into<Option<Array1<T>>>,
    ) -> Result<Self> {
        let codes = BitMatrix::from_signs(signs)?;
        Ok(Self {
            data: LinearData::Binary(codes),
            bias: bias.into(),
            config: QuantConfig::default(),
        })
    }

    /// Creates a binary layer from already-packed sign bits.
    pub fn new_binary_packed(codes: BitMatrix, bias: impl Into<Option<Array1<T>>>) -> Self {
        Self {
            data: LinearData::Binary(codes),
            bias: bias.into(),
            config: QuantConfig::default(),
        }
    }

    /// Creates a scaled-ternary layer from int8 codes, a per-output-column
    /// scale vector, and an optional bias.
    ///
    /// # Errors
    ///
    /// Returns an error if a code lies outside {-1, 0, +1} or the scale
    /// vector length does not match the output dimension.
    pub fn new_scaled_ternary(
        codes: &ArrayView2<i8>,
        scales: Array1<T>,
        bias: impl Into<Option<Array1<T>>>,
    ) -> Result<Self> {
        let codes = TernaryMatrix::from_signed(codes)?;
        if scales.len() != codes.out_features() {
            return Err(anyhow!(
                "scale vector length {} != output features {}",
                scales.len(),
                codes.out_features()
            ));
        }
        Ok(Self {
            data: LinearData::ScaledTernary { codes, scales },
            bias: bias.into(),
            config: QuantConfig::default(),
        })
    }

    /// Creates a quantization-aware binary layer over latent real weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new_qat_binary(
        weights: Array2<T>,
        bias: impl Into<Option<Array1<T>>>,
        config: QuantConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data: LinearData::QatBinary(weights),
            bias: bias.into(),
            config,
        })
    }

    /// Creates a quantization-aware ternary layer over latent real weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new_qat_ternary(
        weights: Array2<T>,
        bias: impl Into<Option<Array1<T>>>,
        config: QuantConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data: LinearData::QatTernary(weights),
            bias: bias.into(),
            config,
        })
    }

    /// Replaces the layer's quantization configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(mut self, config: QuantConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Computes `y = x @ W^T (+ b)`, dispatching on the weight path.
    ///
    /// - `Full`: dense transposed matmul.
    /// - `Binary`: packed add/sub matmul, no scale.
    /// - `ScaledTernary`: ternary matmul, per-column β multiply, then bias
    ///   iff `config.bias_enabled`.
    /// - `QatBinary` / `QatTernary`: quantize-dequantize the weights,
    ///   fake-quantize the activations per row, then dense matmul on the
    ///   real-valued pair.
    ///
    /// # Panics
    ///
    /// Panics if the input's column count does not match `in_features()`,
    /// or if a bias length does not match `out_features()`.
    pub fn forward(&self, input: &ArrayView2<T>) -> Array2<T> {
        match &self.data {
            LinearData::Full(w) => {
                let mut out = transpose_matmul(input, &w.view());
                if let Some(b) = &self.bias {
                    add_bias(&mut out, &b.view());
                }
                out
            }
            LinearData::Binary(codes) => {
                let mut out = binary_matmul(input, codes);
                if let Some(b) = &self.bias {
                    add_bias(&mut out, &b.view());
                }
                out
            }
            LinearData::ScaledTernary { codes, scales } => {
                let mut out = ternary_matmul(input, codes);
                scale_columns(&mut out, &scales.view());
                if self.config.bias_enabled {
                    if let Some(b) = &self.bias {
                        add_bias(&mut out, &b.view());
                    }
                }
                out
            }
            LinearData::QatBinary(w) => {
                let epsilon = T::from_f64(self.config.epsilon);
                let w_q = quantize_weights_binary(&w.view(), epsilon).dequantize();
                let x_q = quantize_activations(input, &self.config);
                let mut out = transpose_matmul(&x_q.view(), &w_q.view());
                if let Some(b) = &self.bias {
                    add_bias(&mut out, &b.view());
                }
                out
            }
            LinearData::QatTernary(w) => {
                let epsilon = T::from_f64(self.config.epsilon);
                let w_q = quantize_weights_ternary(&w.view(), epsilon).dequantize();
                let x_q = quantize_activations(input, &self.config);
                let mut out = transpose_matmul(&x_q.view(), &w_q.view());
                if let Some(b) = &self.bias {
                    add_bias(&mut out, &b.view());
                }
                out
            }
        }
    }

    /// Converts a quantization-aware layer into its packed inference form.
    ///
    /// The latent weights are quantized once and stored as codes with the
    /// derived β folded into a per-column scale, so subsequent forward
    /// calls skip re-quantization and run the add/sub kernels directly.
    /// The frozen layer applies no activation fake quantization — it
    /// computes packed arithmetic on the raw activations.
    ///
    /// # Errors
    ///
    /// Returns an error for layers that are already packed.
    pub fn freeze(&self) -> Result<Self> {
        match &self.data {
            LinearData::QatBinary(w) => {
                let epsilon = T::from_f64(self.config.epsilon);
                let q = quantize_weights_binary(&w.view(), epsilon);
                let [out_features, in_features] = q.codes.shape();
                log::info!(
                    "freezing binary layer [{out_features}, {in_features}], beta = {:?}",
                    q.scale
                );
                // Re-express the sign bits as ternary codes so the β scale
                // has a place to live (the packed-binary path carries none).
                let mut codes = Vec::with_capacity(out_features * in_features);
                for i in 0..out_features {
                    for j in 0..in_features {
                        codes.push(if q.codes.get(i, j) { 1i8 } else { -1i8 });
                    }
                }
                Ok(Self {
                    data: LinearData::ScaledTernary {
                        codes: TernaryMatrix::from_raw(codes, [out_features, in_features]),
                        scales: Array1::from_elem(out_features, q.scale),
                    },
                    bias: self.bias.clone(),
                    config: self.config,
                })
            }
            LinearData::QatTernary(w) => {
                let epsilon = T::from_f64(self.config.epsilon);
                let q = quantize_weights_ternary(&w.view(), epsilon);
                let out_features = q.codes.out_features();
                log::info!(
                    "freezing ternary layer [{out_features}, {}], beta = {:?}, sparsity = {:.3}",
                    q.codes.in_features(),
                    q.scale,
                    q.codes.sparsity()
                );
                Ok(Self {
                    data: LinearData::ScaledTernary {
                        codes: q.codes,
                        scales: Array1::from_elem(out_features, q.scale),
                    },
                    bias: self.bias.clone(),
                    config: self.config,
                })
            }
            _ => Err(anyhow!("layer is already packed; nothing to freeze")),
        }
    }

    pub fn mode(&self) -> LayerMode {
        match &self.data {
            LinearData::Full(_) => LayerMode::Full,
            LinearData::Binary(_) => LayerMode::Binary,
            LinearData::ScaledTernary { .. } => LayerMode::ScaledTernary,
            LinearData::QatBinary(_) => LayerMode::QatBinary,
            LinearData::QatTernary(_) => LayerMode::QatTernary,
        }
    }

    pub fn out_features(&self) -> usize {
        match &self.data {
            LinearData::Full(w) | LinearData::QatBinary(w) | LinearData::QatTernary(w) => {
                w.shape()[0]
            }
            LinearData::Binary(codes) => codes.out_features(),
            LinearData::ScaledTernary { codes, .. } => codes.out_features(),
        }
    }

    pub fn in_features(&self) -> usize {
        match &self.data {
            LinearData::Full(w) | LinearData::QatBinary(w) | LinearData::QatTernary(w) => {
                w.shape()[1]
            }
            LinearData::Binary(codes) => codes.in_features(),
            LinearData::ScaledTernary { codes, .. } => codes.in_features(),
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.out_features(), self.in_features()]
    }

    pub fn has_bias(&self) -> bool {
        self.bias.is_some()
    }

    pub fn config(&self) -> &QuantConfig {
        &self.config
    }
}

/// Creates a full-precision layer with no bias.
impl<T: Element> From<Array2<T>> for LinearLayer<T> {
    fn from(weights: Array2<T>) -> Self {
        LinearLayer::new_full(weights, None)
    }
}

/// Creates a full-precision layer with a bias.
impl<T: Element> From<(Array2<T>, Array1<T>)> for LinearLayer<T> {
    fn from((weights, bias): (Array2<T>, Array1<T>)) -> Self {
        LinearLayer::new_full(weights, Some(bias))
    }
}
