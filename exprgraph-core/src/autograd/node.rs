use crate::autograd::operator::Operator;
use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;
use std::fmt;

/// Position of a node in its graph's construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// How a constant node obtains its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantInit {
    /// Every element set to the given value, for any batch extent.
    Fill(f32),
    /// Explicit data supplied at construction.
    Data,
}

/// The closed set of node variants.
#[derive(Debug)]
pub enum NodeKind {
    Input,
    Param,
    Constant(ConstantInit),
    Operator {
        op: Box<dyn Operator>,
        operands: Vec<NodeId>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Param => "param",
            NodeKind::Constant(_) => "constant",
            NodeKind::Operator { op, .. } => op.name(),
        }
    }
}

/// A node of the expression graph: its variant, declared shape, and the value
/// and adjoint storage it owns.
///
/// Lifecycle per pass: `allocate` → `forward` → `set_zero_adjoint` (or
/// `init_dependent` for the output) → contributions accumulated by consumers'
/// `backward`.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    shape: Shape,
    value: Option<Tensor>,
    adjoint: Option<Tensor>,
    batch_size: Option<usize>,
    value_ready: bool,
    adjoint_ready: bool,
}

/// Sizes `slot` for `dims`, reusing the existing buffer when there is one.
fn ensure_storage<'a>(
    slot: &'a mut Option<Tensor>,
    dims: &[usize],
) -> Result<&'a mut Tensor, GraphError> {
    if let Some(tensor) = slot.as_mut() {
        tensor.resize(dims)?;
    } else {
        *slot = Some(Tensor::zeros(dims)?);
    }
    slot.as_mut()
        .ok_or_else(|| GraphError::InternalError("storage missing after allocation".to_string()))
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, shape: Shape) -> Self {
        Node {
            id,
            kind,
            shape,
            value: None,
            adjoint: None,
            batch_size: None,
            value_ready: false,
            adjoint_ready: false,
        }
    }

    /// A constant node whose value is fixed at construction.
    pub(crate) fn with_data(id: NodeId, data: Tensor) -> Self {
        let shape = Shape::fixed(data.shape());
        let mut node = Node::new(id, NodeKind::Constant(ConstantInit::Data), shape);
        node.value = Some(data);
        node.value_ready = true;
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Batch extent of the last successful `allocate`.
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn operands(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Operator { operands, .. } => operands,
            _ => &[],
        }
    }

    fn shape_error(&self, expected: Vec<usize>, actual: &Tensor) -> GraphError {
        GraphError::ShapeMismatch {
            expected,
            actual: actual.shape().to_vec(),
            operation: format!("allocate {} ({})", self.id, self.kind.name()),
        }
    }

    /// Sizes value and adjoint storage for `batch_size`.
    ///
    /// Storage is resized in place, so calling this again with the same extent
    /// allocates nothing. Leaf values are validated (inputs, params, data
    /// constants) or produced (fill constants, unassigned params) here, operator
    /// values are left stale until `forward`.
    pub fn allocate(&mut self, batch_size: usize) -> Result<(), GraphError> {
        let dims = self.shape.resolve(batch_size);
        match &self.kind {
            NodeKind::Input => match &self.value {
                Some(value) if value.shape() == dims.as_slice() => {}
                Some(value) => return Err(self.shape_error(dims, value)),
                None => return Err(GraphError::MissingInput { node: self.id }),
            },
            NodeKind::Param => match &self.value {
                Some(value) if value.shape() == dims.as_slice() => {}
                Some(value) => return Err(self.shape_error(dims, value)),
                None => {
                    self.value = Some(Tensor::zeros(&dims)?);
                    self.value_ready = true;
                }
            },
            NodeKind::Constant(ConstantInit::Fill(c)) => {
                let c = *c;
                ensure_storage(&mut self.value, &dims)?.fill(c);
                self.value_ready = true;
            }
            NodeKind::Constant(ConstantInit::Data) => match &self.value {
                Some(value) if value.shape() == dims.as_slice() => {}
                Some(value) => return Err(self.shape_error(dims, value)),
                None => return Err(GraphError::UninitializedValue { node: self.id }),
            },
            NodeKind::Operator { .. } => {
                ensure_storage(&mut self.value, &dims)?;
                self.value_ready = false;
            }
        }
        ensure_storage(&mut self.adjoint, &dims)?;
        self.adjoint_ready = false;
        self.batch_size = Some(batch_size);
        Ok(())
    }

    /// Computes the value from the operands' current values.
    ///
    /// `earlier` holds every node constructed before this one. Leaves already got
    /// their value at `allocate` (or from an assignment), so this is a no-op for them.
    pub fn forward(&mut self, earlier: &[Node]) -> Result<(), GraphError> {
        let NodeKind::Operator { op, operands } = &self.kind else {
            return Ok(());
        };
        let inputs = operand_values(self.id, operands, earlier)?;
        let out = self
            .value
            .as_mut()
            .ok_or(GraphError::NotAllocated { node: self.id })?;
        op.forward(&inputs, out)?;
        self.value_ready = true;
        Ok(())
    }

    /// Adds this node's contribution into each operand's adjoint.
    ///
    /// Contributions are accumulated, never assigned, so an operand consumed by
    /// several nodes (or twice by the same node) ends up with the sum.
    pub fn backward(&self, earlier: &mut [Node]) -> Result<(), GraphError> {
        let NodeKind::Operator { op, operands } = &self.kind else {
            return Ok(());
        };
        let grad_output = self.grad()?;
        let output = self.val()?;
        let grads = {
            let inputs = operand_values(self.id, operands, earlier)?;
            op.backward(&inputs, output, grad_output)?
        };
        if grads.len() != operands.len() {
            return Err(GraphError::InternalError(format!(
                "{} returned {} gradients for {} operands",
                op.name(),
                grads.len(),
                operands.len()
            )));
        }
        for (operand, grad) in operands.iter().zip(grads.iter()) {
            earlier
                .get_mut(operand.0)
                .ok_or_else(|| forward_reference(self.id, *operand))?
                .accumulate_adjoint(grad)?;
        }
        Ok(())
    }

    fn accumulate_adjoint(&mut self, grad: &Tensor) -> Result<(), GraphError> {
        self.adjoint
            .as_mut()
            .ok_or(GraphError::NotAllocated { node: self.id })?
            .add_assign(grad)
    }

    /// Resets the adjoint to zero.
    pub fn set_zero_adjoint(&mut self) -> Result<(), GraphError> {
        self.adjoint
            .as_mut()
            .ok_or(GraphError::NotAllocated { node: self.id })?
            .fill(0.0);
        self.adjoint_ready = true;
        Ok(())
    }

    /// Seeds the adjoint with ones: the output's derivative with respect to itself.
    pub fn init_dependent(&mut self) -> Result<(), GraphError> {
        self.adjoint
            .as_mut()
            .ok_or(GraphError::NotAllocated { node: self.id })?
            .fill(1.0);
        self.adjoint_ready = true;
        Ok(())
    }

    pub fn val(&self) -> Result<&Tensor, GraphError> {
        match &self.value {
            Some(value) if self.value_ready => Ok(value),
            _ => Err(GraphError::UninitializedValue { node: self.id }),
        }
    }

    pub fn grad(&self) -> Result<&Tensor, GraphError> {
        match &self.adjoint {
            Some(adjoint) if self.adjoint_ready => Ok(adjoint),
            _ => Err(GraphError::UninitializedAdjoint { node: self.id }),
        }
    }

    /// Replaces the value of an input or parameter node.
    ///
    /// The tensor must be an instance of the declared shape; a batch dimension
    /// accepts any extent, which is then checked again at the next `allocate`.
    pub fn set_val(&mut self, value: Tensor) -> Result<(), GraphError> {
        match self.kind {
            NodeKind::Input | NodeKind::Param => {}
            _ => {
                return Err(GraphError::NotAssignable {
                    node: self.id,
                    kind: self.kind.name().to_string(),
                })
            }
        }
        if !self.shape.matches(value.shape()) {
            return Err(GraphError::IncompatibleShapes {
                lhs: self.shape.clone(),
                rhs: Shape::fixed(value.shape()),
                operation: format!("set_val {}", self.id),
            });
        }
        self.value = Some(value);
        self.value_ready = true;
        Ok(())
    }

    pub(crate) fn value_is_finite(&self) -> bool {
        self.value.as_ref().map_or(true, Tensor::is_finite)
    }

    /// Graphviz fragment: this node's vertex plus one edge per operand.
    pub fn graphviz(&self) -> String {
        let style = match self.kind {
            NodeKind::Input => "shape=\"invhouse\", style=\"filled\", fillcolor=\"lightblue\"",
            NodeKind::Param => "shape=\"box\", style=\"filled\", fillcolor=\"orange\"",
            NodeKind::Constant(_) => "shape=\"diamond\"",
            NodeKind::Operator { .. } => "shape=\"box\"",
        };
        let mut fragment = format!(
            "{} [label=\"{}\\n{}\", {}];\n",
            self.id,
            self.kind.name(),
            self.shape,
            style
        );
        for operand in self.operands() {
            fragment.push_str(&format!("{} -> {};\n", operand, self.id));
        }
        fragment
    }
}

fn forward_reference(node: NodeId, operand: NodeId) -> GraphError {
    GraphError::InternalError(format!(
        "node {} refers to {} which is not an earlier node",
        node, operand
    ))
}

fn operand_values<'a>(
    node: NodeId,
    operands: &[NodeId],
    earlier: &'a [Node],
) -> Result<Vec<&'a Tensor>, GraphError> {
    operands
        .iter()
        .map(|operand| {
            earlier
                .get(operand.0)
                .ok_or_else(|| forward_reference(node, *operand))?
                .val()
        })
        .collect()
}

#[cfg(test)]
#[path = "node_test.rs"]
mod tests;
