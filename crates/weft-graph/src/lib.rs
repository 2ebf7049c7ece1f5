//! # weft-graph
//!
//! Operator graphs with reverse-mode differentiation over `weft-core`
//! tensors.
//!
//! This crate provides:
//! - [`Graph`] — arena of operator nodes with index-based edges
//! - [`OpKernel`] — the operator interface (shape resolution, forward
//!   apply, gradient factory)
//! - ready-made kernels in [`ops`]: input, add, mul, dot, linear, flatten,
//!   log-softmax, sigmoid, and their gradients
//!
//! `Graph::forward` evaluates nodes in dependency order; `Graph::backward`
//! extends the graph with gradient nodes so a later `forward` computes both
//! values and gradients in one sweep.

pub mod graph;
pub mod ops;

pub use graph::{BackwardResult, Dependencies, Graph, Node, NodeId, OpKernel};
pub use ops::{
    AddGrad, AddOp, DotGradLeft, DotGradRight, DotOp, FlattenGrad, FlattenOp, InputOp,
    LinearGradBias, LinearGradInput, LinearGradWeight, LinearOp, LogSoftmaxGrad,
    LogSoftmaxOp, MulGrad, MulOp, SigmoidGrad, SigmoidOp,
};
