//! Gradient flow through the masked reconstruction objective
//!
//! The learned tokens and the positional table must receive gradients so an
//! optimizer can train them.

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spoter_rs::spoter::architectures::encoder::loss_utils::masked_reconstruction_loss;
use spoter_rs::test_utils::synthetic_pose_batch;
use spoter_rs::{EncoderConfig, SpoterEncoder};

type TestBackend = Autodiff<NdArray<f32>>;

fn config() -> EncoderConfig {
    EncoderConfig::new(4, 8)
        .with_nhead(2)
        .with_num_layers(1)
        .with_d_ff(16)
        .with_max_frames(6)
        .with_dropout(0.0)
        .with_seed(3)
}

fn abs_sum(t: Tensor<NdArray<f32>, 2>) -> f32 {
    t.abs().sum().into_scalar()
}

/// Test 1: tokens, positional table and heads all receive gradients
#[test]
fn test_gradients_reach_learned_tokens() {
    let device = Default::default();
    let model = SpoterEncoder::<TestBackend>::from_config(&config(), &device).unwrap();
    let valid_lens = [6, 3];
    let x = synthetic_pose_batch::<TestBackend>(&valid_lens, 6, 4, 1, &device);

    let mut rng = StdRng::seed_from_u64(0);
    let out = model.forward(x, Some(&valid_lens), 0.5, false, &mut rng).unwrap();
    let loss = masked_reconstruction_loss(&out.predictions, &out.targets, &device).unwrap();
    let grads = loss.backward();

    let mask_grad = model.mask_token.val().grad(&grads).expect("mask token gradient");
    assert_eq!(mask_grad.dims(), [1, 8]);
    assert!(abs_sum(mask_grad) > 0.0);

    let pad_grad = model.pad_token.val().grad(&grads).expect("pad token gradient");
    assert!(abs_sum(pad_grad) > 0.0);

    let pos = model.pos_encoding.as_ref().expect("learnable table");
    let pos_grad = pos.embedding.val().grad(&grads).expect("positional gradient");
    assert_eq!(pos_grad.dims(), [6, 8]);

    let head_grad = model
        .head
        .linear
        .weight
        .val()
        .grad(&grads)
        .expect("reconstruction head gradient");
    assert!(abs_sum(head_grad) > 0.0);
}

/// Test 2: an all-empty batch yields a zero loss instead of failing
#[test]
fn test_all_empty_batch_zero_loss() {
    let device = Default::default();
    let model = SpoterEncoder::<TestBackend>::from_config(&config(), &device).unwrap();
    let x = synthetic_pose_batch::<TestBackend>(&[0, 0], 4, 4, 2, &device);

    let mut rng = StdRng::seed_from_u64(0);
    let out = model.forward(x, Some(&[0, 0]), 0.5, false, &mut rng).unwrap();
    let loss = masked_reconstruction_loss(&out.predictions, &out.targets, &device).unwrap();

    assert_eq!(loss.dims(), [1]);
    assert_eq!(loss.into_scalar(), 0.0);
}
