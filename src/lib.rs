//! spoter-rs: masked-frame pretraining encoder for pose sequences (SPOTER)

pub mod spoter;

pub use spoter::architectures::encoder::{
    EncoderConfig, EncoderError, EncoderOutput, PositionalEncodingKind, RaggedIndices,
    SpoterEncoder, DEFAULT_MASK_RATIO,
};
pub use spoter::settings::{settings, Settings};

/// Tensor slice assignment functionality
pub mod tensor_slice_assign;

/// Test utilities for backend-aware tensor construction and synthetic pose batches
pub mod test_utils;
