//! Operator nodes.
//!
//! Each operator implements `autograd::Operator` and comes with a convenience
//! constructor (`mul_op`, `tanh_op`, ...) that appends it to the operands' graph.
//! Custom operators are appended the same way through `ExpressionGraph::apply`.

pub mod activation;
pub mod arithmetic;
pub mod linalg;
pub mod reduction;

pub use activation::{relu_op, sigmoid_op, tanh_op, Relu, Sigmoid, Tanh};
pub use arithmetic::{add_op, mul_op, sub_op, Add, Mul, Sub};
pub use linalg::{matmul_op, MatMul};
pub use reduction::{sum_op, Sum};
