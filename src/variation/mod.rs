//! Variation expansion for batch parameters.
//!
//! Parameters may carry bracketed option lists (`a [cat,dog] on a sofa`).
//! Each parameter is parsed into a [`ParamString`] and the batch is expanded
//! into a [`TaskMatrix`] of immutable [`TaskSpec`]s.
//!
//! ```ignore
//! use batchforge::variation::{TaskMatrix, VariationInputs};
//!
//! let inputs = VariationInputs::new("a [cat,dog]", "[image3,image4]");
//! let matrix = TaskMatrix::expand(&inputs)?;
//! assert_eq!(matrix.len(), 4);
//! ```

pub mod matrix;
pub mod param;

pub use matrix::{AxisSizes, TaskMatrix, TaskSpec, VariationInputs, MAX_ITERATIONS, MIN_ITERATIONS};
pub use param::{Expansion, ParamString, Segment};
