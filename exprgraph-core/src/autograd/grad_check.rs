use crate::autograd::expr::Expr;
use crate::autograd::graph::ExpressionGraph;
use crate::error::GraphError;
use crate::tensor::Tensor;
use log::debug;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed at element {element_index}: analytical grad {analytical_grad:?} != numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },
    #[error("Failed to assign perturbed value at element {element_index}: {source}")]
    MutationError {
        element_index: usize,
        source: GraphError,
    },
    #[error("Forward pass failed during gradient check: {0}")]
    ForwardPassError(GraphError),
    #[error("Backward pass failed during gradient check: {0}")]
    BackwardPassError(GraphError),
    #[error("Could not access analytical gradient: {source}")]
    AnalyticalGradAccessError { source: GraphError },
    #[error("Numerical gradient is NaN or infinite at element {element_index}. Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },
    #[error("Analytical gradient is NaN or infinite at element {element_index}. Value: {value:?}")]
    AnalyticalGradNaNOrInfinite { element_index: usize, value: f64 },
    #[error("Tensor error during gradient check: {0}")]
    TensorError(GraphError),
}

impl From<GraphError> for GradCheckError {
    fn from(err: GraphError) -> Self {
        GradCheckError::TensorError(err)
    }
}

/// Scalar loss used for the numerical side: the sum of the output's elements,
/// which is what seeding every output element with 1 differentiates.
fn output_loss(output: &Expr) -> Result<f64, GradCheckError> {
    let value = output.val().map_err(GradCheckError::ForwardPassError)?;
    Ok(value.as_slice().iter().map(|&x| x as f64).sum())
}

fn loss_at(
    graph: &ExpressionGraph,
    wrt: &Expr,
    output: &Expr,
    batch_size: usize,
    data: Vec<f32>,
    shape: &[usize],
    element_index: usize,
) -> Result<f64, GradCheckError> {
    let perturbed = Tensor::new(data, shape.to_vec())?;
    wrt.set_val(perturbed)
        .map_err(|source| GradCheckError::MutationError {
            element_index,
            source,
        })?;
    graph
        .forward(batch_size)
        .map_err(GradCheckError::ForwardPassError)?;
    output_loss(output)
}

/// Compares the analytical gradient of `output` with respect to `wrt` against
/// central finite differences `(f(x + eps) - f(x - eps)) / 2 eps`.
///
/// `wrt` must be an input or parameter node with an assigned value. Its original
/// value is assigned back whether or not the check passes. On success the graph
/// is also re-evaluated so values and adjoints match that value again.
pub fn check_grad(
    graph: &ExpressionGraph,
    wrt: &Expr,
    output: &Expr,
    batch_size: usize,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    graph
        .backprop_from(batch_size, output)
        .map_err(GradCheckError::BackwardPassError)?;
    let analytical = wrt
        .grad()
        .map_err(|source| GradCheckError::AnalyticalGradAccessError { source })?;
    let original = wrt.val()?;
    debug!(
        "check_grad: {} elements of {}, epsilon {}",
        original.numel(),
        wrt.id(),
        epsilon
    );

    let outcome = compare_elements(
        graph,
        wrt,
        output,
        batch_size,
        &original,
        &analytical,
        (epsilon, tolerance),
    );

    let restored = wrt
        .set_val(original)
        .map_err(|source| GradCheckError::MutationError {
            element_index: 0,
            source,
        });
    outcome?;
    restored?;
    graph
        .backprop_from(batch_size, output)
        .map_err(GradCheckError::BackwardPassError)
}

fn compare_elements(
    graph: &ExpressionGraph,
    wrt: &Expr,
    output: &Expr,
    batch_size: usize,
    original: &Tensor,
    analytical: &Tensor,
    (epsilon, tolerance): (f64, f64),
) -> Result<(), GradCheckError> {
    let shape = original.shape();
    for elem_idx in 0..original.numel() {
        let mut data_plus = original.get_f32_data();
        data_plus[elem_idx] = (data_plus[elem_idx] as f64 + epsilon) as f32;
        let loss_plus = loss_at(graph, wrt, output, batch_size, data_plus, shape, elem_idx)?;

        let mut data_minus = original.get_f32_data();
        data_minus[elem_idx] = (data_minus[elem_idx] as f64 - epsilon) as f32;
        let loss_minus = loss_at(graph, wrt, output, batch_size, data_minus, shape, elem_idx)?;

        let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
        let analytical_grad = analytical.as_slice()[elem_idx] as f64;

        if !numerical_grad.is_finite() {
            return Err(GradCheckError::NumericalGradNaNOrInfinite {
                element_index: elem_idx,
                loss_plus,
                loss_minus,
            });
        }
        if !analytical_grad.is_finite() {
            return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
                element_index: elem_idx,
                value: analytical_grad,
            });
        }

        let difference = (analytical_grad - numerical_grad).abs();
        if difference > tolerance && difference / (analytical_grad.abs() + epsilon) > tolerance {
            return Err(GradCheckError::GradientMismatch {
                element_index: elem_idx,
                analytical_grad,
                numerical_grad,
                difference,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
