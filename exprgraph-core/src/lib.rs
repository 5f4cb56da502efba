//! Reverse-mode automatic differentiation over an explicit expression graph.
//!
//! Nodes are appended to an [`ExpressionGraph`] in construction order and
//! referenced through [`Expr`] handles. [`ExpressionGraph::forward`] evaluates
//! them in that order, [`ExpressionGraph::backward`] walks them in reverse and
//! accumulates adjoints with the chain rule.
//!
//! ```
//! use exprgraph_core::{ops, ExpressionGraph, Tensor};
//!
//! let graph = ExpressionGraph::new();
//! let a = graph.param([1]);
//! let b = graph.param([1]);
//! a.set_val(Tensor::scalar(2.0)).unwrap();
//! b.set_val(Tensor::scalar(3.0)).unwrap();
//! let c = ops::mul_op(&a, &b).unwrap();
//!
//! graph.backprop(1).unwrap();
//! assert_eq!(c.val().unwrap().item().unwrap(), 6.0);
//! assert_eq!(a.grad().unwrap().item().unwrap(), 3.0);
//! assert_eq!(b.grad().unwrap().item().unwrap(), 2.0);
//! ```

pub mod autograd;
pub mod config;
pub mod error;
pub mod ops;
pub mod shape;
pub mod tensor;
pub mod utils;

pub use autograd::{Expr, ExpressionGraph, NodeId, Operator};
pub use config::{DuplicateNamePolicy, GraphConfig};
pub use error::GraphError;
pub use shape::{Dim, Shape};
pub use tensor::Tensor;
