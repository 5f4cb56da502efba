use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// Defines the arithmetic of an operator node.
///
/// The graph owns the operator's output value and adjoint and hands the operator
/// only the tensors it needs. An implementation never sees other nodes and never
/// touches adjoint storage directly: the gradients it returns from `backward` are
/// accumulated into the operands' adjoints by the graph.
pub trait Operator: Debug {
    /// Short name used in error messages and graphviz labels.
    fn name(&self) -> &'static str;

    /// Number of operands the operator takes.
    fn arity(&self) -> usize;

    /// Computes the declared output shape from the operands' declared shapes.
    ///
    /// Called once at construction time. Shapes may contain `Dim::Batch`
    /// placeholders, so an implementation compares dimensions symbolically.
    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError>;

    /// Writes the operator's value into `out`.
    ///
    /// `out` is already sized for the current batch extent; `operands` are the
    /// current values of the operand nodes, in construction-argument order.
    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError>;

    /// Computes the contribution of this node to each operand's adjoint.
    ///
    /// Receives the operand values, this node's value (`output`) and this node's
    /// adjoint (`grad_output`, dL/dOutput), and must return dL/dOperand_i for each
    /// operand. The returned `Vec` must have exactly one tensor per operand, in the
    /// same order as `operands`, each shaped like its operand.
    fn backward(
        &self,
        operands: &[&Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError>;
}
