use super::*;
use crate::autograd::graph::ExpressionGraph;
use approx::assert_relative_eq;

fn run_unary(
    op: fn(&Expr) -> Result<Expr, GraphError>,
    data: Vec<f32>,
) -> Result<(Tensor, Tensor), GraphError> {
    let graph = ExpressionGraph::new();
    let n = data.len();
    let x = graph.param([n]);
    x.set_val(Tensor::new(data, vec![n])?)?;
    let y = op(&x)?;
    graph.backprop(1)?;
    Ok((y.val()?, x.grad()?))
}

#[test]
fn test_tanh() -> Result<(), GraphError> {
    let (val, grad) = run_unary(tanh_op, vec![0.0, 1.0, -2.0])?;
    for (i, x) in [0.0f32, 1.0, -2.0].iter().enumerate() {
        assert_relative_eq!(val.as_slice()[i], x.tanh(), epsilon = 1e-6);
        assert_relative_eq!(grad.as_slice()[i], 1.0 - x.tanh().powi(2), epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn test_sigmoid() -> Result<(), GraphError> {
    let (val, grad) = run_unary(sigmoid_op, vec![0.0, 2.0])?;
    assert_relative_eq!(val.as_slice()[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(grad.as_slice()[0], 0.25, epsilon = 1e-6);
    let s = 1.0 / (1.0 + (-2.0f32).exp());
    assert_relative_eq!(val.as_slice()[1], s, epsilon = 1e-6);
    assert_relative_eq!(grad.as_slice()[1], s * (1.0 - s), epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_relu() -> Result<(), GraphError> {
    let (val, grad) = run_unary(relu_op, vec![-1.0, 0.0, 2.5])?;
    assert_eq!(val.as_slice(), &[0.0, 0.0, 2.5]);
    assert_eq!(grad.as_slice(), &[0.0, 0.0, 1.0]);
    Ok(())
}
