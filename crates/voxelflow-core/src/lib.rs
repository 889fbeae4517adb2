//! Core types for the VoxelfloweRS engine
//!
//! This crate holds the small, dependency-light vocabulary the engine is
//! built from: element dtypes, shapes, CPU tensor values, named variable
//! handles, and the shared error taxonomy. Heavier concerns (device kernels,
//! autodiff, data loading) live outside it.

#![allow(clippy::result_large_err)]

pub mod dtype;
pub mod error;
pub mod shape;
pub mod tensor;
pub mod variable;

pub use dtype::{dtype_from_type, DType};
pub use error::{EngineError, Result};
pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{Initializer, Variable, VariableId, VariableStore};
