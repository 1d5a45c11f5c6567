//! Safe, parallel entry points for the matrix operations.

pub mod elementwise;
pub mod matmul;

#[cfg(test)]
mod tests;
