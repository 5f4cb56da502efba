use crate::error::GraphError;
use rand::Rng;

/// Dense, row-major `f32` array used for node values and adjoints.
///
/// The graph only stores, resizes and accumulates into tensors; the arithmetic
/// itself lives in the operators (`crate::ops`).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

fn numel_of(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Allocates a vector of `numel` copies of `value`, reporting failure instead of aborting.
fn try_filled(numel: usize, value: f32) -> Result<Vec<f32>, GraphError> {
    let mut data = Vec::new();
    data.try_reserve_exact(numel)
        .map_err(|_| GraphError::AllocationFailed { numel })?;
    data.resize(numel, value);
    Ok(data)
}

impl Tensor {
    /// Creates a tensor from flattened row-major data and a shape.
    ///
    /// # Errors
    /// Returns `GraphError::TensorCreationError` if `data.len()` does not match
    /// the number of elements described by `shape`.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, GraphError> {
        let numel = numel_of(&shape);
        if data.len() != numel {
            return Err(GraphError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        Ok(Tensor { shape, data })
    }

    /// A single-element tensor of shape `[1]`.
    pub fn scalar(value: f32) -> Self {
        Tensor {
            shape: vec![1],
            data: vec![value],
        }
    }

    pub fn full(shape: &[usize], value: f32) -> Result<Self, GraphError> {
        Ok(Tensor {
            shape: shape.to_vec(),
            data: try_filled(numel_of(shape), value)?,
        })
    }

    pub fn zeros(shape: &[usize]) -> Result<Self, GraphError> {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Result<Self, GraphError> {
        Self::full(shape, 1.0)
    }

    /// Samples every element uniformly from `[low, high)`.
    ///
    /// # Errors
    /// `GraphError::InvalidSamplingRange` unless `low < high` and both bounds are finite.
    pub fn uniform<R: Rng>(
        shape: &[usize],
        low: f32,
        high: f32,
        rng: &mut R,
    ) -> Result<Self, GraphError> {
        if !(low < high && low.is_finite() && high.is_finite()) {
            return Err(GraphError::InvalidSamplingRange { low, high });
        }
        let mut tensor = Self::zeros(shape)?;
        for x in tensor.data.iter_mut() {
            *x = rng.gen_range(low..high);
        }
        Ok(tensor)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns a copy of the data as a `Vec<f32>`.
    pub fn get_f32_data(&self) -> Vec<f32> {
        self.data.clone()
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Result<f32, GraphError> {
        match self.data.as_slice() {
            [x] => Ok(*x),
            _ => Err(GraphError::ShapeMismatch {
                expected: vec![1],
                actual: self.shape.clone(),
                operation: "item".to_string(),
            }),
        }
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Reshapes the storage in place, reusing the existing buffer when possible.
    ///
    /// Newly exposed elements are zero. Resizing to the current shape is a no-op.
    pub fn resize(&mut self, shape: &[usize]) -> Result<(), GraphError> {
        if self.shape == shape {
            return Ok(());
        }
        let numel = numel_of(shape);
        if numel > self.data.len() {
            self.data
                .try_reserve_exact(numel - self.data.len())
                .map_err(|_| GraphError::AllocationFailed { numel })?;
        }
        self.data.resize(numel, 0.0);
        self.shape = shape.to_vec();
        Ok(())
    }

    /// Element-wise `self += other`; both tensors must have the same shape.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<(), GraphError> {
        if self.shape != other.shape {
            return Err(GraphError::GradientAccumulationShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
            });
        }
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += *b;
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Applies `f` to every element, producing a tensor of the same shape.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Combines two same-shaped tensors element by element.
    pub fn zip_map(
        &self,
        other: &Tensor,
        operation: &str,
        f: impl Fn(f32, f32) -> f32,
    ) -> Result<Tensor, GraphError> {
        if self.shape != other.shape {
            return Err(GraphError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
                operation: operation.to_string(),
            });
        }
        Ok(Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
