pub mod expr;
pub mod grad_check;
pub mod graph;
pub mod node;
pub mod operator;

pub use expr::Expr;
pub use graph::ExpressionGraph;
pub use node::{ConstantInit, Node, NodeId, NodeKind};
pub use operator::Operator;
