//! Quantized linear-layer kernels for CPU inference.
//!
//! This crate provides the arithmetic core of a low-bit inference engine:
//! full-precision, binary-weight, and ternary-weight matrix multiplication,
//! each optionally fused with bias addition and dynamic per-row activation
//! fake quantization.
//!
//! # Quantization
//!
//! ## Binary weights (centered sign)
//!
//! ```text
//! alpha = mean(W)            // re-centering term
//! beta  = mean(|W|)          // scale, floored at epsilon
//! W_q   = sign(W - alpha)    // sign(0) = +1, so codes are {-1, +1}
//! ```
//!
//! ## Ternary weights (AbsMean threshold)
//!
//! ```text
//! beta = mean(|W|)           // floored at epsilon
//! W_q  = round(W / beta)     // ties away from zero, clamped to {-1, 0, +1}
//! ```
//!
//! ## Activations (per-row AbsMax, fake quantization)
//!
//! ```text
//! gamma = (2^(B-1) - 1) / max(|row|)
//! X_q   = round(row * gamma) clamped to the signed B-bit range
//! X'    = X_q / gamma        // back to the real domain
//! ```
//!
//! Downstream arithmetic stays real-valued but carries only B-bit-equivalent
//! precision, matching the numeric behavior of a quantized accelerator.
//!
//! # Matmul variants
//!
//! Ternary and binary weight codes turn multiply-accumulate into
//! accumulate, negate-accumulate, or skip — the kernels in
//! [`cpu::ops::matmul`] contain no multiplication on those paths. Dense
//! variants cover the direct, transposed-operand, and
//! transposed-operand-with-scale layouts.
//!
//! # Quick start
//!
//! ```ignore
//! use bitlinear::{LinearLayer, QuantConfig};
//! use ndarray::arr2;
//!
//! let weights = arr2(&[[0.5f32, -0.5], [0.5, 0.5]]); // [out, in]
//! let layer = LinearLayer::new_qat_ternary(weights, None, QuantConfig::default())?;
//!
//! let input = arr2(&[[1.0f32, 2.0]]);
//! let output = layer.forward(&input.view());
//! ```

pub mod config;
pub mod cpu;
pub mod linear_layer;
pub mod tensor;

pub use config::QuantConfig;
pub use cpu::kernels::quantize::{
    quantize_activations, quantize_weights_binary, quantize_weights_ternary, BinaryQuantized,
    TernaryQuantized,
};
pub use cpu::kernels::rounding::round_sym;
pub use linear_layer::{LayerMode, LinearData, LinearLayer};
pub use tensor::{BitMatrix, Element, TernaryMatrix, WeightCode};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::QuantConfig;
    pub use crate::linear_layer::{LayerMode, LinearLayer};
    pub use crate::tensor::{BitMatrix, Element, TernaryMatrix, WeightCode};
}
