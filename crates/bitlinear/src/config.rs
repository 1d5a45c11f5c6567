//! Configuration for the quantization-aware layers.

use anyhow::{bail, Result};

/// Quantization knobs exposed at the layer boundary.
///
/// Three settings cover everything the kernels make configurable:
/// activation resolution, the scale floor, and whether the bias stage runs
/// in the scaled-ternary layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantConfig {
    /// Activation quantization resolution in bits. The signed code range is
    /// `[-(2^(B-1)), 2^(B-1) - 1]`. Supported range: 2..=16.
    pub bit_width: u32,

    /// Floor applied to every derived scale (β, γ) so degenerate tensors
    /// never divide by zero.
    pub epsilon: f64,

    /// Whether the bias-add stage runs in the scaled-ternary layer variant.
    /// Layers built without a bias vector skip the stage regardless.
    pub bias_enabled: bool,
}

impl Default for QuantConfig {
    fn default() -> Self {
        Self {
            bit_width: 8,
            epsilon: 1e-8,
            bias_enabled: true,
        }
    }
}

impl QuantConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the activation bit width.
    #[must_use]
    pub const fn with_bit_width(mut self, bit_width: u32) -> Self {
        self.bit_width = bit_width;
        self
    }

    /// Sets the scale floor.
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Enables or disables the bias stage of the scaled-ternary layer.
    #[must_use]
    pub const fn with_bias_enabled(mut self, enabled: bool) -> Self {
        self.bias_enabled = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bit width is outside 2..=16 or the epsilon
    /// is not a positive finite value.
    pub fn validate(&self) -> Result<()> {
        if !(2..=16).contains(&self.bit_width) {
            bail!(
                "activation bit width must be in 2..=16, got {}",
                self.bit_width
            );
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            bail!("epsilon must be a positive finite value, got {}", self.epsilon);
        }
        Ok(())
    }
}
