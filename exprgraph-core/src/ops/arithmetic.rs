use crate::autograd::expr::Expr;
use crate::autograd::operator::Operator;
use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Shape rule shared by the element-wise operators: all operands alike.
pub(crate) fn elementwise_shape(operation: &str, operands: &[&Shape]) -> Result<Shape, GraphError> {
    let (first, rest) = operands
        .split_first()
        .ok_or_else(|| GraphError::InvalidOperandCount {
            operation: operation.to_string(),
            expected: 1,
            actual: 0,
        })?;
    for other in rest {
        if other != first {
            return Err(GraphError::IncompatibleShapes {
                lhs: (*first).clone(),
                rhs: (*other).clone(),
                operation: operation.to_string(),
            });
        }
    }
    Ok((*first).clone())
}

fn write_binary(
    operation: &str,
    operands: &[&Tensor],
    out: &mut Tensor,
    f: impl Fn(f32, f32) -> f32,
) -> Result<(), GraphError> {
    let [a, b] = operands else {
        return Err(GraphError::InvalidOperandCount {
            operation: operation.to_string(),
            expected: 2,
            actual: operands.len(),
        });
    };
    for shape in [a.shape(), b.shape()] {
        if shape != out.shape() {
            return Err(GraphError::ShapeMismatch {
                expected: out.shape().to_vec(),
                actual: shape.to_vec(),
                operation: operation.to_string(),
            });
        }
    }
    for ((o, &x), &y) in out
        .as_mut_slice()
        .iter_mut()
        .zip(a.as_slice())
        .zip(b.as_slice())
    {
        *o = f(x, y);
    }
    Ok(())
}

fn binary_operands<'a>(
    operation: &str,
    operands: &[&'a Tensor],
) -> Result<(&'a Tensor, &'a Tensor), GraphError> {
    match operands {
        [a, b] => Ok((*a, *b)),
        _ => Err(GraphError::InvalidOperandCount {
            operation: operation.to_string(),
            expected: 2,
            actual: operands.len(),
        }),
    }
}

/// Element-wise `a + b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Operator for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn arity(&self) -> usize {
        2
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        elementwise_shape(self.name(), operands)
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        write_binary(self.name(), operands, out, |a, b| a + b)
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        Ok(vec![grad_output.clone(), grad_output.clone()])
    }
}

/// Element-wise `a - b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sub;

impl Operator for Sub {
    fn name(&self) -> &'static str {
        "sub"
    }

    fn arity(&self) -> usize {
        2
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        elementwise_shape(self.name(), operands)
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        write_binary(self.name(), operands, out, |a, b| a - b)
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        Ok(vec![grad_output.clone(), grad_output.map(|g| -g)])
    }
}

/// Element-wise `a * b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mul;

impl Operator for Mul {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        elementwise_shape(self.name(), operands)
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        write_binary(self.name(), operands, out, |a, b| a * b)
    }

    fn backward(
        &self,
        operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        let (a, b) = binary_operands(self.name(), operands)?;
        // grad_a = grad_output * b, grad_b = grad_output * a
        let grad_a = grad_output.zip_map(b, self.name(), |g, y| g * y)?;
        let grad_b = grad_output.zip_map(a, self.name(), |g, x| g * x)?;
        Ok(vec![grad_a, grad_b])
    }
}

pub fn add_op(a: &Expr, b: &Expr) -> Result<Expr, GraphError> {
    a.graph().apply(Add, &[a, b])
}

pub fn sub_op(a: &Expr, b: &Expr) -> Result<Expr, GraphError> {
    a.graph().apply(Sub, &[a, b])
}

pub fn mul_op(a: &Expr, b: &Expr) -> Result<Expr, GraphError> {
    a.graph().apply(Mul, &[a, b])
}

#[cfg(test)]
#[path = "arithmetic_test.rs"]
mod tests;
