//! Masked-frame pretraining encoder for pose sequences

pub mod config;
pub mod encoder;
pub mod error;
pub mod heads;
pub mod loss_utils;
pub mod masking;
pub mod positional_encoding;
pub mod rng;
pub mod transformer;

pub use config::{EncoderConfig, PositionalEncodingKind};
pub use encoder::{EncoderOutput, SpoterEncoder, DEFAULT_MASK_RATIO};
pub use error::EncoderError;
pub use masking::RaggedIndices;
pub use rng::DeterministicRngContext;
