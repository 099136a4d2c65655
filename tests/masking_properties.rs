//! Properties of mask selection and frame substitution
//!
//! Exercises the masking engine on its own, without building a model.

use burn::prelude::*;
use burn_ndarray::NdArray;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spoter_rs::spoter::architectures::encoder::masking::{
    apply_mask_substitution, apply_padding_substitution, compute_padding_boundary,
    extract_targets, mask_set_size, select_mask_indices,
};
use spoter_rs::test_utils::{indexed_pose_batch, tensor_from_f32_vec};
use spoter_rs::{EncoderError, RaggedIndices};

type TestBackend = NdArray<f32>;

fn to_vec3(t: Tensor<TestBackend, 3>) -> Vec<f32> {
    t.into_data().to_vec().unwrap()
}

/// Test 1: mask-set size is ceil(L * r) and every index lies in [0, L)
#[test]
fn test_mask_set_size_and_range() {
    let valid_lens: Vec<usize> = (0..40).collect();
    for (i, &ratio) in [0.0, 0.05, 0.1, 0.25, 0.5, 0.9, 1.0].iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(i as u64);
        let mask_idxs = select_mask_indices(&valid_lens, ratio, &mut rng).unwrap();

        assert_eq!(mask_idxs.len(), valid_lens.len());
        for (idxs, &valid_len) in mask_idxs.iter().zip(valid_lens.iter()) {
            let expected = ((valid_len as f64) * ratio).ceil() as usize;
            assert_eq!(idxs.len(), expected.min(valid_len), "L={} r={}", valid_len, ratio);
            assert!(idxs.iter().all(|&p| p < valid_len));
        }
    }
}

/// Test 2: indices within a sequence are strictly increasing
#[test]
fn test_mask_indices_strictly_increasing() {
    let mut rng = StdRng::seed_from_u64(3);
    let mask_idxs = select_mask_indices(&[17, 64, 1, 9], 0.4, &mut rng).unwrap();

    for idxs in mask_idxs.iter() {
        assert!(idxs.windows(2).all(|w| w[0] < w[1]), "{:?}", idxs);
    }
}

/// Test 3: ratio 1.0 masks every valid frame, ratio 0.0 masks nothing
#[test]
fn test_ratio_extremes() {
    let mut rng = StdRng::seed_from_u64(0);
    let all = select_mask_indices(&[4, 2], 1.0, &mut rng).unwrap();
    assert_eq!(all.to_vecs(), vec![vec![0, 1, 2, 3], vec![0, 1]]);

    let none = select_mask_indices(&[4, 2], 0.0, &mut rng).unwrap();
    assert_eq!(none.sizes(), vec![0, 0]);
    assert_eq!(none.total(), 0);
}

/// Test 4: out-of-range ratios are rejected
#[test]
fn test_invalid_ratio_rejected() {
    let mut rng = StdRng::seed_from_u64(0);
    for ratio in [-0.1, 1.5, f64::NAN] {
        let err = select_mask_indices(&[4], ratio, &mut rng).unwrap_err();
        assert!(matches!(err, EncoderError::MaskRatioOutOfRange(_)));
    }
}

/// Test 5: same seed selects the same frames
#[test]
fn test_selection_reproducible() {
    let lens = [30, 12, 0, 7];
    let a = select_mask_indices(&lens, 0.3, &mut StdRng::seed_from_u64(9)).unwrap();
    let b = select_mask_indices(&lens, 0.3, &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(a, b);
}

/// Test 6: omitted padding means every frame is genuine
#[test]
fn test_omitted_padding_boundary() {
    assert_eq!(compute_padding_boundary(None, 3, 7).unwrap(), vec![7, 7, 7]);
    assert_eq!(compute_padding_boundary(None, 0, 7).unwrap(), Vec::<usize>::new());
}

/// Test 7: malformed padding is rejected
#[test]
fn test_padding_boundary_errors() {
    assert_eq!(
        compute_padding_boundary(Some(&[2]), 2, 5).unwrap_err(),
        EncoderError::PaddingLengthMismatch { expected: 2, got: 1 }
    );
    assert_eq!(
        compute_padding_boundary(Some(&[2, 6]), 2, 5).unwrap_err(),
        EncoderError::ValidLengthOutOfRange { index: 1, valid_len: 6, seq_len: 5 }
    );
}

/// Test 8: targets are the raw frames at the mask positions
#[test]
fn test_targets_follow_mask_positions() {
    let device = Default::default();
    let batch = indexed_pose_batch::<TestBackend>(2, 4, 3, &device);
    let mask_idxs = RaggedIndices::from(vec![vec![1, 3], vec![0]]);

    let targets = extract_targets(&batch, &mask_idxs).unwrap();
    assert_eq!(targets[0].dims(), [2, 3]);
    assert_eq!(targets[1].dims(), [1, 3]);

    let first: Vec<f32> = targets[0].clone().into_data().to_vec().unwrap();
    let second: Vec<f32> = targets[1].clone().into_data().to_vec().unwrap();
    assert_eq!(first, vec![1.0, 1.0, 1.0, 3.0, 3.0, 3.0]);
    assert_eq!(second, vec![4.0, 4.0, 4.0]);
}

/// Test 9: padding substitution touches exactly the frames past the boundary
/// and applying it twice changes nothing
#[test]
fn test_padding_substitution_idempotent() {
    let device = Default::default();
    let batch = indexed_pose_batch::<TestBackend>(2, 3, 2, &device);
    let pad = tensor_from_f32_vec::<TestBackend, 2>(&[-1.0, -1.0], &[1, 2], &device);

    let once = apply_padding_substitution(batch, &[3, 1], pad.clone()).unwrap();
    let twice = apply_padding_substitution(once.clone(), &[3, 1], pad).unwrap();

    let once = to_vec3(once);
    assert_eq!(
        once,
        vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, -1.0, -1.0, -1.0, -1.0]
    );
    assert_eq!(once, to_vec3(twice));
}

/// Test 10: with no padding, substitution is the identity
#[test]
fn test_padding_substitution_noop_without_padding() {
    let device = Default::default();
    let batch = indexed_pose_batch::<TestBackend>(2, 3, 2, &device);
    let pad = tensor_from_f32_vec::<TestBackend, 2>(&[-1.0, -1.0], &[1, 2], &device);

    let valid_lens = compute_padding_boundary(None, 2, 3).unwrap();
    let out = apply_padding_substitution(batch.clone(), &valid_lens, pad).unwrap();
    assert_eq!(to_vec3(out), to_vec3(batch));
}

/// Test 11: mask substitution writes the token at the mask positions only
#[test]
fn test_mask_substitution_positions() {
    let device = Default::default();
    let batch = indexed_pose_batch::<TestBackend>(2, 3, 2, &device);
    let token = tensor_from_f32_vec::<TestBackend, 2>(&[9.0, 8.0], &[1, 2], &device);
    let mask_idxs = RaggedIndices::from(vec![vec![], vec![0, 2]]);

    let out = apply_mask_substitution(batch, &mask_idxs, token).unwrap();
    assert_eq!(
        to_vec3(out),
        vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 9.0, 8.0, 4.0, 4.0, 9.0, 8.0]
    );
}

/// Test 12: helper agrees with the per-sequence sizes of a selection
#[test]
fn test_mask_set_size_matches_selection() {
    let lens = [5, 3, 0, 11];
    let mask_idxs = select_mask_indices(&lens, 0.2, &mut StdRng::seed_from_u64(1)).unwrap();
    let expected: Vec<usize> = lens.iter().map(|&l| mask_set_size(l, 0.2)).collect();
    assert_eq!(mask_idxs.sizes(), expected);
    assert_eq!(expected, vec![1, 1, 0, 3]);
}
