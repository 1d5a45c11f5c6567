//! Linear layers composing one weight path with a matmul variant and a
//! bias stage.

pub mod linear_layer;


pub use linear_layer::{LayerMode, LinearData, LinearLayer};
