use crate::autograd::expr::Expr;
use crate::autograd::node::{ConstantInit, Node, NodeId, NodeKind};
use crate::autograd::operator::Operator;
use crate::config::{DuplicateNamePolicy, GraphConfig};
use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Extent covered by the last successful forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Evaluation {
    nodes: usize,
    batch_size: usize,
}

#[derive(Debug, Default)]
struct GraphInner {
    config: GraphConfig,
    /// Every node ever constructed, in construction order. Operands always
    /// precede their consumers, so this is a topological order.
    nodes: Vec<Node>,
    named: HashMap<String, NodeId>,
    inputs: Vec<NodeId>,
    params: Vec<NodeId>,
    evaluated: Option<Evaluation>,
}

/// A reverse-mode expression graph.
///
/// Nodes are appended by the construction methods (`input`, `param`, `constant`,
/// `apply`, ...) which return `Expr` handles. `forward` evaluates every node in
/// construction order, `backward` propagates adjoints in reverse order starting
/// from the last node (or an explicit output with `backward_from`).
///
/// Cloning an `ExpressionGraph` clones the reference, not the graph: all clones
/// and all `Expr` handles share the same node storage. The graph is
/// single-threaded (`!Send`); passes must not be interleaved.
#[derive(Debug, Clone, Default)]
pub struct ExpressionGraph {
    inner: Rc<RefCell<GraphInner>>,
}

impl ExpressionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GraphConfig) -> Self {
        ExpressionGraph {
            inner: Rc::new(RefCell::new(GraphInner {
                config,
                ..GraphInner::default()
            })),
        }
    }

    pub fn config(&self) -> GraphConfig {
        self.inner.borrow().config.clone()
    }

    /// Whether two values refer to the same graph.
    pub fn ptr_eq(&self, other: &ExpressionGraph) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of nodes constructed so far.
    pub fn len(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().nodes.is_empty()
    }

    /// Batch extent of the last forward pass, if it still covers every node.
    pub fn batch_size(&self) -> Option<usize> {
        let inner = self.inner.borrow();
        inner
            .evaluated
            .filter(|ev| ev.nodes == inner.nodes.len())
            .map(|ev| ev.batch_size)
    }

    // --- Passes ---

    /// Runs `forward(batch_size)` then `backward()`.
    pub fn backprop(&self, batch_size: usize) -> Result<(), GraphError> {
        self.forward(batch_size)?;
        self.backward()
    }

    /// Runs `forward(batch_size)` then `backward_from(output)`.
    pub fn backprop_from(&self, batch_size: usize, output: &Expr) -> Result<(), GraphError> {
        self.forward(batch_size)?;
        self.backward_from(output)
    }

    /// Evaluates every node for the given batch extent.
    ///
    /// First every node is allocated, then every node computes its value, both in
    /// construction order. On error the graph is left partially evaluated and
    /// `backward` refuses to run until a forward pass succeeds.
    pub fn forward(&self, batch_size: usize) -> Result<(), GraphError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.evaluated = None;
        debug!(
            "ExpressionGraph: forward pass over {} nodes, batch size {}",
            inner.nodes.len(),
            batch_size
        );

        for node in inner.nodes.iter_mut() {
            node.allocate(batch_size)?;
        }

        for i in 0..inner.nodes.len() {
            let (earlier, rest) = inner.nodes.split_at_mut(i);
            let Some(node) = rest.first_mut() else {
                break;
            };
            trace!("ExpressionGraph: forward {} ({})", node.id(), node.kind().name());
            node.forward(earlier)?;
            if inner.config.check_finite && !node.value_is_finite() {
                return Err(GraphError::NonFiniteValue {
                    node: node.id(),
                    operation: node.kind().name().to_string(),
                });
            }
        }

        inner.evaluated = Some(Evaluation {
            nodes: inner.nodes.len(),
            batch_size,
        });
        Ok(())
    }

    /// Propagates adjoints from the last constructed node.
    ///
    /// # Errors
    /// `GraphError::EmptyGraph` if there are no nodes, `GraphError::ForwardRequired`
    /// if the last successful forward pass does not cover every node.
    pub fn backward(&self) -> Result<(), GraphError> {
        let len = self.len();
        if len == 0 {
            return Err(GraphError::EmptyGraph);
        }
        self.backward_at(NodeId(len - 1))
    }

    /// Propagates adjoints from an explicit output node.
    ///
    /// Nodes constructed after `output` keep a zero adjoint and are not visited.
    pub fn backward_from(&self, output: &Expr) -> Result<(), GraphError> {
        self.check_owned(output)?;
        self.backward_at(output.id())
    }

    fn backward_at(&self, output: NodeId) -> Result<(), GraphError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let len = inner.nodes.len();
        match inner.evaluated {
            Some(ev) if ev.nodes == len => {}
            other => {
                return Err(GraphError::ForwardRequired {
                    evaluated: other.map_or(0, |ev| ev.nodes),
                    nodes: len,
                })
            }
        }
        debug!(
            "ExpressionGraph: backward pass from {} over {} nodes",
            output, len
        );

        for node in inner.nodes.iter_mut() {
            node.set_zero_adjoint()?;
        }
        inner
            .nodes
            .get_mut(output.0)
            .ok_or(GraphError::ForeignNode { node: output })?
            .init_dependent()?;

        for i in (0..=output.0).rev() {
            let (earlier, rest) = inner.nodes.split_at_mut(i);
            if let Some(node) = rest.first() {
                trace!("ExpressionGraph: backward {} ({})", node.id(), node.kind().name());
                node.backward(earlier)?;
            }
        }
        Ok(())
    }

    // --- Construction ---

    fn push_node(&self, build: impl FnOnce(NodeId) -> Node) -> Expr {
        let mut inner = self.inner.borrow_mut();
        let id = NodeId(inner.nodes.len());
        let node = build(id);
        trace!(
            "ExpressionGraph: constructed {} ({}, shape {})",
            id,
            node.kind().name(),
            node.shape()
        );
        inner.nodes.push(node);
        Expr::new(self.clone(), id)
    }

    /// Constructs an input node and records it in the input list.
    ///
    /// The node is not wired into any existing node; its value must be assigned
    /// with `Expr::set_val` before the next forward pass.
    pub fn input(&self, shape: impl Into<Shape>) -> Expr {
        let shape = shape.into();
        let expr = self.push_node(|id| Node::new(id, NodeKind::Input, shape));
        self.inner.borrow_mut().inputs.push(expr.id());
        expr
    }

    /// Constructs a parameter node and records it in the parameter list.
    ///
    /// Unless a value is assigned, the parameter is zero at its first allocation.
    pub fn param(&self, shape: impl Into<Shape>) -> Expr {
        let shape = shape.into();
        let expr = self.push_node(|id| Node::new(id, NodeKind::Param, shape));
        self.inner.borrow_mut().params.push(expr.id());
        expr
    }

    /// Constructs a constant node with every element equal to `value`.
    pub fn constant(&self, shape: impl Into<Shape>, value: f32) -> Expr {
        let shape = shape.into();
        self.push_node(|id| Node::new(id, NodeKind::Constant(ConstantInit::Fill(value)), shape))
    }

    /// Constructs a constant node holding `data`.
    pub fn constant_from(&self, data: Tensor) -> Expr {
        self.push_node(|id| Node::with_data(id, data))
    }

    pub fn ones(&self, shape: impl Into<Shape>) -> Expr {
        self.constant(shape, 1.0)
    }

    pub fn zeros(&self, shape: impl Into<Shape>) -> Expr {
        self.constant(shape, 0.0)
    }

    /// Constructs an operator node consuming `operands`.
    ///
    /// Operands must be handles of this graph. Because they already exist, the new
    /// node always comes after them in construction order.
    pub fn apply<O>(&self, op: O, operands: &[&Expr]) -> Result<Expr, GraphError>
    where
        O: Operator + 'static,
    {
        if operands.len() != op.arity() {
            return Err(GraphError::InvalidOperandCount {
                operation: op.name().to_string(),
                expected: op.arity(),
                actual: operands.len(),
            });
        }
        for operand in operands {
            self.check_owned(operand)?;
        }
        let shape = {
            let inner = self.inner.borrow();
            let shapes = operands
                .iter()
                .map(|operand| {
                    inner
                        .nodes
                        .get(operand.id().0)
                        .map(Node::shape)
                        .ok_or(GraphError::ForeignNode { node: operand.id() })
                })
                .collect::<Result<Vec<_>, _>>()?;
            op.infer_shape(&shapes)?
        };
        let ids = operands.iter().map(|operand| operand.id()).collect();
        Ok(self.push_node(|id| {
            Node::new(
                id,
                NodeKind::Operator {
                    op: Box::new(op),
                    operands: ids,
                },
                shape,
            )
        }))
    }

    fn check_owned(&self, expr: &Expr) -> Result<(), GraphError> {
        if expr.graph().ptr_eq(self) {
            Ok(())
        } else {
            Err(GraphError::ForeignNode { node: expr.id() })
        }
    }

    // --- Registries ---

    /// Binds `name` to the node behind `expr`.
    ///
    /// Rebinding a name to a different node is governed by
    /// `GraphConfig::duplicate_names`.
    pub fn add_named_node(&self, expr: &Expr, name: &str) -> Result<(), GraphError> {
        self.check_owned(expr)?;
        let mut inner = self.inner.borrow_mut();
        let policy = inner.config.duplicate_names;
        match inner.named.get(name).copied() {
            None => {
                inner.named.insert(name.to_string(), expr.id());
            }
            Some(existing) if existing == expr.id() => {}
            Some(existing) => match policy {
                DuplicateNamePolicy::Reject => {
                    return Err(GraphError::DuplicateName {
                        name: name.to_string(),
                        existing,
                    })
                }
                DuplicateNamePolicy::KeepFirst => {
                    warn!(
                        "ExpressionGraph: name '{}' already bound to {}, ignoring {}",
                        name,
                        existing,
                        expr.id()
                    );
                }
                DuplicateNamePolicy::Replace => {
                    warn!(
                        "ExpressionGraph: rebinding name '{}' from {} to {}",
                        name,
                        existing,
                        expr.id()
                    );
                    inner.named.insert(name.to_string(), expr.id());
                }
            },
        }
        Ok(())
    }

    /// Looks up a named node.
    pub fn get(&self, name: &str) -> Result<Expr, GraphError> {
        let id = self
            .inner
            .borrow()
            .named
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::NameNotFound {
                name: name.to_string(),
            })?;
        Ok(Expr::new(self.clone(), id))
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.inner.borrow().named.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.borrow().named.keys().cloned().collect();
        names.sort();
        names
    }

    /// Input nodes in declaration order.
    pub fn inputs(&self) -> Vec<Expr> {
        let ids = self.inner.borrow().inputs.clone();
        ids.into_iter().map(|id| Expr::new(self.clone(), id)).collect()
    }

    /// Parameter nodes in declaration order.
    pub fn params(&self) -> Vec<Expr> {
        let ids = self.inner.borrow().params.clone();
        ids.into_iter().map(|id| Expr::new(self.clone(), id)).collect()
    }

    /// Renders the graph in graphviz `dot` format, output at the bottom.
    pub fn graphviz(&self) -> String {
        let inner = self.inner.borrow();
        let mut dot = String::from("digraph ExpressionGraph {\nrankdir=BT\n");
        for node in inner.nodes.iter().rev() {
            dot.push_str(&node.graphviz());
        }
        dot.push_str("}\n");
        dot
    }

    // --- Node access for handles ---

    /// Assigns a leaf value. Values computed by the last forward pass no longer
    /// reflect the leaves, so the graph must be evaluated again before `backward`.
    pub(crate) fn assign(&self, id: NodeId, value: Tensor) -> Result<(), GraphError> {
        let mut inner = self.inner.try_borrow_mut().map_err(|_| busy())?;
        inner
            .nodes
            .get_mut(id.0)
            .ok_or(GraphError::ForeignNode { node: id })?
            .set_val(value)?;
        if inner.evaluated.take().is_some() {
            trace!("ExpressionGraph: {} assigned, evaluation invalidated", id);
        }
        Ok(())
    }

    pub(crate) fn with_node<R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&Node) -> Result<R, GraphError>,
    ) -> Result<R, GraphError> {
        let inner = self.inner.try_borrow().map_err(|_| busy())?;
        let node = inner
            .nodes
            .get(id.0)
            .ok_or(GraphError::ForeignNode { node: id })?;
        f(node)
    }
}

fn busy() -> GraphError {
    GraphError::InternalError("graph is borrowed by a pass in progress".to_string())
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
