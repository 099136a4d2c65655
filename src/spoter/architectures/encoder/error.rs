//! Error type shared by every encoder component.

use thiserror::Error;

/// Failures raised by the masked-pose encoder.
///
/// Configuration variants are raised while building a model, input variants while
/// running a forward pass. Nothing is silently corrected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncoderError {
    #[error("hidden_dim ({hidden_dim}) must be divisible by nhead ({nhead})")]
    HeadDimensionMismatch { hidden_dim: usize, nhead: usize },

    #[error("{name} must be greater than zero")]
    ZeroDimension { name: &'static str },

    #[error("invalid positional encoding '{name}': {reason}")]
    InvalidPositionalEncoding { name: String, reason: String },

    #[error("sequence length {seq_len} exceeds positional encoding capacity max_frames={max_frames}")]
    SequenceTooLong { seq_len: usize, max_frames: usize },

    #[error("padding_idx has {got} entries but the batch holds {expected} sequences")]
    PaddingLengthMismatch { expected: usize, got: usize },

    #[error("valid length {valid_len} of sequence {index} exceeds seq_len {seq_len}")]
    ValidLengthOutOfRange {
        index: usize,
        valid_len: usize,
        seq_len: usize,
    },

    #[error("mask_ratio must lie in [0, 1], got {0}")]
    MaskRatioOutOfRange(f64),

    #[error("input feature dimension {got} does not match data_dim {expected}")]
    DataDimMismatch { expected: usize, got: usize },

    #[error("hidden dimension {got} does not match model width {expected}")]
    HiddenDimMismatch { expected: usize, got: usize },

    #[error("mask index set covers {got} sequences, expected {expected}")]
    MaskBatchMismatch { expected: usize, got: usize },

    #[error("got {predictions} prediction tensors but {targets} target tensors")]
    PairCountMismatch { predictions: usize, targets: usize },

    #[error("prediction/target pairing broken at sequence {index}: {pred:?} vs {target:?}")]
    PredictionTargetMismatch {
        index: usize,
        pred: Vec<usize>,
        target: Vec<usize>,
    },

    #[error("invalid tensor slice: {0}")]
    InvalidSlice(String),

    #[error("invalid initialisation distribution: {0}")]
    InvalidDistribution(String),
}
