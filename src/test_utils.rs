// Test utilities for backend-aware tensor construction
//
// Helpers for building tensors from flat slices and for producing deterministic
// padded pose batches, shared by the unit tests, the integration tests and the
// demo binary.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Create f32 tensor from data slice with specified shape
///
/// Supports tensors of any dimensionality through reshape.
pub fn tensor_from_f32_vec<B: Backend, const D: usize>(
    data: &[f32],
    shape: &[usize],
    device: &B::Device,
) -> Tensor<B, D> {
    let expected_size: usize = shape.iter().product();
    assert_eq!(
        data.len(),
        expected_size,
        "Data length {} doesn't match shape {:?} (expected {})",
        data.len(),
        shape,
        expected_size
    );

    let flat_tensor = Tensor::<B, 1>::from_data(TensorData::new(data.to_vec(), [data.len()]), device);
    flat_tensor.reshape(burn::tensor::Shape::from(shape))
}

/// Padded batch of synthetic pose frames, [batch, seq_len, data_dim].
///
/// Frame `t < valid_lens[b]` of sequence `b` holds keypoint coordinates drawn
/// uniformly from [0, 1); frames past the padding boundary are zero. The same
/// `seed` always yields the same batch.
pub fn synthetic_pose_batch<B: Backend>(
    valid_lens: &[usize],
    seq_len: usize,
    data_dim: usize,
    seed: u64,
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0.0f32; valid_lens.len() * seq_len * data_dim];

    for (b, &valid_len) in valid_lens.iter().enumerate() {
        assert!(
            valid_len <= seq_len,
            "valid length {} exceeds sequence length {}",
            valid_len,
            seq_len
        );
        let start = b * seq_len * data_dim;
        for value in &mut data[start..start + valid_len * data_dim] {
            *value = rng.random::<f32>();
        }
    }

    Tensor::from_data(
        TensorData::new(data, [valid_lens.len(), seq_len, data_dim]),
        device,
    )
}

/// Batch whose frame `(b, t)` is filled with the value `b * seq_len + t`.
///
/// Useful for checking which frames a gather picked.
pub fn indexed_pose_batch<B: Backend>(
    batch: usize,
    seq_len: usize,
    data_dim: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let data: Vec<f32> = (0..batch * seq_len)
        .flat_map(|frame| std::iter::repeat(frame as f32).take(data_dim))
        .collect();
    Tensor::from_data(TensorData::new(data, [batch, seq_len, data_dim]), device)
}
