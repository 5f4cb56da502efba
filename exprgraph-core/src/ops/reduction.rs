use crate::autograd::expr::Expr;
use crate::autograd::operator::Operator;
use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Sum of all elements, producing a tensor of shape `[1]`.
///
/// Typically the last node of a graph, reducing a batched loss to the scalar
/// that seeds the backward pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Operator for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        match operands {
            [_] => Ok(Shape::fixed(&[1])),
            _ => Err(GraphError::InvalidOperandCount {
                operation: self.name().to_string(),
                expected: 1,
                actual: operands.len(),
            }),
        }
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        let [x] = operands else {
            return Err(GraphError::InvalidOperandCount {
                operation: self.name().to_string(),
                expected: 1,
                actual: operands.len(),
            });
        };
        out.fill(x.as_slice().iter().sum());
        Ok(())
    }

    fn backward(
        &self,
        operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        let [x] = operands else {
            return Err(GraphError::InvalidOperandCount {
                operation: self.name().to_string(),
                expected: 1,
                actual: operands.len(),
            });
        };
        // Every element contributes with weight 1.
        let g = grad_output.item()?;
        Ok(vec![Tensor::full(x.shape(), g)?])
    }
}

pub fn sum_op(x: &Expr) -> Result<Expr, GraphError> {
    x.graph().apply(Sum, &[x])
}
