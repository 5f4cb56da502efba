use crate::autograd::expr::Expr;
use crate::autograd::operator::Operator;
use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Matrix product of two rank-2 operands: `[m, k] x [k, n] -> [m, n]`.
///
/// `m` may be the batch dimension, which is how a batched input is multiplied by
/// a weight parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatMul;

fn matrix_dims(operation: &str, t: &Tensor) -> Result<(usize, usize), GraphError> {
    match t.shape() {
        [rows, cols] => Ok((*rows, *cols)),
        other => Err(GraphError::ShapeMismatch {
            expected: vec![0, 0],
            actual: other.to_vec(),
            operation: format!("{} (rank-2 operand)", operation),
        }),
    }
}

/// `a[m, k] · b[k, n]` with optional transposition of either side.
///
/// `trans_a` means `a` is stored as `[k, m]`, `trans_b` that `b` is stored as `[n, k]`.
fn gemm(
    a: &[f32],
    b: &[f32],
    (m, k, n): (usize, usize, usize),
    trans_a: bool,
    trans_b: bool,
) -> Vec<f32> {
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for p in 0..k {
            let av = if trans_a { a[p * m + i] } else { a[i * k + p] };
            if av == 0.0 {
                continue;
            }
            for j in 0..n {
                let bv = if trans_b { b[j * k + p] } else { b[p * n + j] };
                out[i * n + j] += av * bv;
            }
        }
    }
    out
}

impl Operator for MatMul {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn infer_shape(&self, operands: &[&Shape]) -> Result<Shape, GraphError> {
        let [a, b] = operands else {
            return Err(GraphError::InvalidOperandCount {
                operation: self.name().to_string(),
                expected: 2,
                actual: operands.len(),
            });
        };
        match (a.dims(), b.dims()) {
            ([m, ka], [kb, n]) if ka == kb => Ok(Shape::new(vec![*m, *n])),
            _ => Err(GraphError::IncompatibleShapes {
                lhs: (*a).clone(),
                rhs: (*b).clone(),
                operation: self.name().to_string(),
            }),
        }
    }

    fn forward(&self, operands: &[&Tensor], out: &mut Tensor) -> Result<(), GraphError> {
        let [a, b] = operands else {
            return Err(GraphError::InvalidOperandCount {
                operation: self.name().to_string(),
                expected: 2,
                actual: operands.len(),
            });
        };
        let (m, k) = matrix_dims(self.name(), a)?;
        let (kb, n) = matrix_dims(self.name(), b)?;
        if k != kb {
            return Err(GraphError::ShapeMismatch {
                expected: vec![k, n],
                actual: b.shape().to_vec(),
                operation: self.name().to_string(),
            });
        }
        if out.shape() != [m, n].as_slice() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![m, n],
                actual: out.shape().to_vec(),
                operation: self.name().to_string(),
            });
        }
        let product = gemm(a.as_slice(), b.as_slice(), (m, k, n), false, false);
        out.as_mut_slice().copy_from_slice(&product);
        Ok(())
    }

    fn backward(
        &self,
        operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        let [a, b] = operands else {
            return Err(GraphError::InvalidOperandCount {
                operation: self.name().to_string(),
                expected: 2,
                actual: operands.len(),
            });
        };
        let (m, k) = matrix_dims(self.name(), a)?;
        let (kb, n) = matrix_dims(self.name(), b)?;
        if k != kb {
            return Err(GraphError::ShapeMismatch {
                expected: vec![k, n],
                actual: b.shape().to_vec(),
                operation: self.name().to_string(),
            });
        }
        if grad_output.shape() != [m, n].as_slice() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![m, n],
                actual: grad_output.shape().to_vec(),
                operation: format!("{} backward", self.name()),
            });
        }
        // grad_a = grad_output · bᵀ  ([m, n] x [n, k])
        let grad_a = gemm(grad_output.as_slice(), b.as_slice(), (m, n, k), false, true);
        // grad_b = aᵀ · grad_output  ([k, m] x [m, n])
        let grad_b = gemm(a.as_slice(), grad_output.as_slice(), (k, m, n), true, false);
        Ok(vec![
            Tensor::new(grad_a, vec![m, k])?,
            Tensor::new(grad_b, vec![k, n])?,
        ])
    }
}

pub fn matmul_op(a: &Expr, b: &Expr) -> Result<Expr, GraphError> {
    a.graph().apply(MatMul, &[a, b])
}

#[cfg(test)]
#[path = "linalg_test.rs"]
mod tests;
