use crate::tensor::Tensor;

/// Checks if a tensor is approximately equal to the expected shape and data.
/// Panics if shapes differ or data differs by more than `tolerance`.
pub fn check_tensor_near(
    actual: &Tensor,
    expected_shape: &[usize],
    expected_data: &[f32],
    tolerance: f32,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");
    assert_eq!(
        actual.numel(),
        expected_data.len(),
        "Data length mismatch"
    );

    for (i, (a, e)) in actual.as_slice().iter().zip(expected_data.iter()).enumerate() {
        let diff = (*a - *e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}
