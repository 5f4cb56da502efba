use crate::autograd::expr::Expr;
use crate::autograd::operator::Operator;
use crate::error::GraphError;
use crate::ops::arithmetic::elementwise_shape;
use crate::shape::Shape;
use crate::tensor::Tensor;

fn unary_operand<'a>(operation: &str, operands: &[&'a Tensor]) -> Result<&'a Tensor, GraphError> {
    match operands {
        [x] => Ok(*x),
        _ => Err(GraphError::InvalidOperandCount {
            operation: operation.to_string(),
            expected: 1,
            actual: operands.len(),
        }),
    }
}

fn write_unary(
    operation: &str,
    operands: &[&Tensor],
    out: &mut Tensor,
    f: impl Fn(f32) -> f32,
) -> Result<(), GraphError> {
    let x = unary_operand(operation, operands)?;
    if x.shape() != out.shape() {
        return Err(GraphError::ShapeMismatch {
            expected: out.shape().to_vec(),
            actual: x.shape().to_vec(),
            operation: operation.to_string(),
        });
    }
    for (o, &v) in out.as_mut_slice().iter_mut().zip(x.as_slice()) {
        *o = f(v);
    }
    Ok(())
}

/// Element-wise hyperbolic tangent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Operator for Tanh {
    fn name(&self) -> &'static str {
        "tanh"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        elementwise_shape(self.name(), operands)
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        write_unary(self.name(), operands, out, f32::tanh)
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        // d tanh(x) = 1 - tanh(x)^2, taken from the stored output.
        let grad = grad_output.zip_map(output, self.name(), |g, y| g * (1.0 - y * y))?;
        Ok(vec![grad])
    }
}

/// Element-wise logistic sigmoid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Operator for Sigmoid {
    fn name(&self) -> &'static str {
        "sigmoid"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        elementwise_shape(self.name(), operands)
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        write_unary(self.name(), operands, out, |x| 1.0 / (1.0 + (-x).exp()))
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        let grad = grad_output.zip_map(output, self.name(), |g, y| g * y * (1.0 - y))?;
        Ok(vec![grad])
    }
}

/// Element-wise `max(x, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Operator for Relu {
    fn name(&self) -> &'static str {
        "relu"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        elementwise_shape(self.name(), operands)
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        write_unary(self.name(), operands, out, |x| x.max(0.0))
    }

    fn backward(
        &self,
        operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        let x = unary_operand(self.name(), operands)?;
        // The subgradient at 0 is taken as 0.
        let grad = grad_output.zip_map(x, self.name(), |g, v| if v > 0.0 { g } else { 0.0 })?;
        Ok(vec![grad])
    }
}

pub fn tanh_op(x: &Expr) -> Result<Expr, GraphError> {
    x.graph().apply(Tanh, &[x])
}

pub fn sigmoid_op(x: &Expr) -> Result<Expr, GraphError> {
    x.graph().apply(Sigmoid, &[x])
}

pub fn relu_op(x: &Expr) -> Result<Expr, GraphError> {
    x.graph().apply(Relu, &[x])
}

#[cfg(test)]
#[path = "activation_test.rs"]
mod tests;
