use crate::autograd::graph::ExpressionGraph;
use crate::autograd::node::NodeId;
use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;
use std::fmt;

/// Handle to a node of an `ExpressionGraph`.
///
/// Cheap to clone. Holds a counted reference to the graph, so the graph (and
/// therefore the node) outlives every handle. Two handles are equal when they
/// refer to the same node of the same graph, regardless of values.
#[derive(Clone)]
pub struct Expr {
    graph: ExpressionGraph,
    id: NodeId,
}

impl Expr {
    pub(crate) fn new(graph: ExpressionGraph, id: NodeId) -> Self {
        Expr { graph, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &ExpressionGraph {
        &self.graph
    }

    pub fn shape(&self) -> Result<Shape, GraphError> {
        self.graph.with_node(self.id, |node| Ok(node.shape().clone()))
    }

    /// Variant name of the node ("input", "param", "constant" or the operator name).
    pub fn kind(&self) -> Result<&'static str, GraphError> {
        self.graph.with_node(self.id, |node| Ok(node.kind().name()))
    }

    /// Handles to the nodes this node consumes, in argument order.
    pub fn operands(&self) -> Result<Vec<Expr>, GraphError> {
        self.graph.with_node(self.id, |node| {
            Ok(node
                .operands()
                .iter()
                .map(|&id| Expr::new(self.graph.clone(), id))
                .collect())
        })
    }

    /// Current value of the node.
    ///
    /// # Errors
    /// `GraphError::UninitializedValue` if the value has not been computed (or
    /// assigned) yet.
    pub fn val(&self) -> Result<Tensor, GraphError> {
        self.graph.with_node(self.id, |node| node.val().cloned())
    }

    /// Current adjoint of the node.
    ///
    /// # Errors
    /// `GraphError::UninitializedAdjoint` if no backward pass ran since the last
    /// allocation.
    pub fn grad(&self) -> Result<Tensor, GraphError> {
        self.graph.with_node(self.id, |node| node.grad().cloned())
    }

    /// Assigns a value to an input or parameter node.
    ///
    /// Takes effect at the next forward pass. Until then values of downstream
    /// nodes are stale and `ExpressionGraph::backward` fails with
    /// `GraphError::ForwardRequired`.
    pub fn set_val(&self, value: Tensor) -> Result<(), GraphError> {
        self.graph.assign(self.id, value)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.graph.ptr_eq(&other.graph)
    }
}

impl Eq for Expr {}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Expr");
        s.field("id", &self.id);
        match self.graph.with_node(self.id, |node| {
            Ok((node.kind().name(), node.shape().clone()))
        }) {
            Ok((kind, shape)) => s.field("kind", &kind).field("shape", &shape.to_string()),
            Err(_) => s.field("kind", &"<unavailable>"),
        };
        s.finish()
    }
}

#[cfg(test)]
#[path = "expr_test.rs"]
mod tests;
