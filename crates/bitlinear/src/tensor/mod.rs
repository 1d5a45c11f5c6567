//! Core data structures shared by the kernels and layers: the element-type
//! bound and the quantized weight-code storage formats.

pub mod codes;
pub mod element;

pub use codes::{BitMatrix, TernaryMatrix, WeightCode};
pub use element::Element;
