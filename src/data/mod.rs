//! Data model: element types, typed columns, vectors and matrices.
//!
//! - [`dtype`]: element types and scalar values
//! - [`values`]: typed columns
//! - [`vector`]: dense / sparse / labeled vectors
//! - [`matrix`]: dense / sparse / labeled matrices with a major axis
//! - [`inefficient`]: the policy for layout-mismatched operations

pub mod dtype;
pub mod inefficient;
pub mod matrix;
pub mod values;
pub mod vector;

pub use dtype::{DType, Scalar};
pub use inefficient::{
    inefficient_action, inefficient_action_policy, set_inefficient_action_policy,
    InefficientActionPolicy,
};
pub use matrix::{DenseMatrix, MajorAxis, Matrix, SparseMatrix};
pub use values::{Element, Values};
pub use vector::{SparseVector, Vector};
