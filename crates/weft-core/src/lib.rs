//! # weft-core
//!
//! Strided n-dimensional tensors over pluggable storage backends.
//!
//! This crate provides:
//! - [`Tensor`] — n-dimensional strided view over shared storage
//! - [`Extent`] — shape representation
//! - [`Storage`] trait — backend abstraction, with row-major
//!   ([`NativeStorage`]) and column-major ([`BlasStorage`]) implementations
//! - [`IndexIter`] — coordinate generation in either traversal order
//! - free numeric and linear-algebra functions in [`numeric`] and [`linalg`]
//! - binary serialization in [`serialize`]

pub mod dtype;
pub mod error;
pub mod extent;
pub mod index;
pub mod linalg;
pub mod numeric;
pub mod serialize;
pub mod storage;
pub mod tensor;

pub use dtype::{DType, Element, FloatElement};
pub use error::{Error, Result};
pub use extent::Extent;
pub use index::IndexIter;
pub use storage::{BlasStorage, DimensionOrder, NativeStorage, Storage};
pub use tensor::{broadcast_pair, broadcast_to, IndexSpec, Tensor, TensorType};
