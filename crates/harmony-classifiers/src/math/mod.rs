//! Small dense matrix type used throughout the crate.
//!
//! `Array2` is a row-major container with just enough convenience methods
//! for slicing training folds and assembling meta-features. It is kept
//! dependency-free so estimators can convert into whatever layout their
//! backend expects.
pub mod matrix;

pub use matrix::{Array2, ShapeError};
