//! CPU backend: low-level per-row kernels and the safe, parallel entry
//! points built on top of them.

pub mod kernels;
pub mod ops;
