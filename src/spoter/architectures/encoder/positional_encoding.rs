use burn::{
    module::{Ignored, Module, Param},
    tensor::{backend::Backend, Tensor},
};

use super::config::PositionalEncodingKind;
use super::error::EncoderError;
use super::rng::DeterministicRngContext;

/// Learned additive position table.
///
/// Holds a `[max_frames, hidden_dim]` parameter; a sequence of length `seq_len`
/// receives rows `0..seq_len`, broadcast over the batch.
#[derive(Module, Debug)]
pub struct LearnablePositionalEncoding<B: Backend> {
    pub embedding: Param<Tensor<B, 2>>,
    max_frames: Ignored<usize>,
    hidden_dim: Ignored<usize>,
}

impl<B: Backend> LearnablePositionalEncoding<B> {
    /// Build the table for `kind`, or `None` when positional encoding is disabled.
    pub fn from_kind(
        kind: PositionalEncodingKind,
        max_frames: usize,
        hidden_dim: usize,
        rng_ctx: &DeterministicRngContext<B>,
        seed: u64,
    ) -> Result<Option<Self>, EncoderError> {
        let shape = [max_frames, hidden_dim];
        let table = rng_ctx.with_isolated_seed(Some(seed), |rng| match kind {
            PositionalEncodingKind::None => Ok(None),
            PositionalEncodingKind::LearnableUniform => rng_ctx
                .generate_uniform_tensor(shape, rng, 0.0, 1.0)
                .map(Some),
            PositionalEncodingKind::LearnableNormal { std } => rng_ctx
                .generate_normal_tensor(shape, rng, 0.0, std as f32)
                .map(Some),
        })?;

        Ok(table.map(Self::from_table))
    }

    /// Wrap an existing `[max_frames, hidden_dim]` table.
    pub fn from_table(table: Tensor<B, 2>) -> Self {
        let [max_frames, hidden_dim] = table.dims();
        Self {
            embedding: Param::from_tensor(table),
            max_frames: Ignored(max_frames),
            hidden_dim: Ignored(hidden_dim),
        }
    }

    pub fn max_frames(&self) -> usize {
        *self.max_frames
    }

    /// input shape: [batch, seq, hidden]
    /// output shape: [batch, seq, hidden]
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>, EncoderError> {
        let [_, seq_len, hidden_dim] = x.dims();
        if seq_len > *self.max_frames {
            return Err(EncoderError::SequenceTooLong {
                seq_len,
                max_frames: *self.max_frames,
            });
        }
        if hidden_dim != *self.hidden_dim {
            return Err(EncoderError::HiddenDimMismatch {
                expected: *self.hidden_dim,
                got: hidden_dim,
            });
        }
        if seq_len == 0 {
            return Ok(x);
        }

        let positions = self
            .embedding
            .val()
            .slice([0..seq_len, 0..hidden_dim])
            .unsqueeze::<3>();
        Ok(x + positions)
    }
}
