use burn::{
    module::{Ignored, Module, Param},
    tensor::{backend::Backend, Tensor},
};
use rand::rngs::StdRng;

use super::{
    config::{EncoderConfig, PositionalEncodingKind},
    error::EncoderError,
    heads::{EmbeddingHead, ReconstructionHead},
    masking::{
        apply_mask_substitution, apply_padding_substitution, compute_padding_boundary,
        extract_targets, gather_rows, select_mask_indices, RaggedIndices,
    },
    positional_encoding::LearnablePositionalEncoding,
    rng::{seed_offsets, DeterministicRngContext},
    transformer::EncoderStack,
};

/// Fraction of valid frames masked when the caller has no preference.
pub const DEFAULT_MASK_RATIO: f64 = 0.1;

/// Standard deviation used by [`SpoterEncoder::reinitialize_tokens`].
pub const TOKEN_REINIT_STD: f32 = 0.2;

/// Result of one masked forward pass.
///
/// `predictions[i]` and `targets[i]` both have shape `[n_i, data_dim]` where `n_i`
/// is the mask-set size of sequence `i`.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    pub predictions: Vec<Tensor<B, 2>>,
    pub targets: Vec<Tensor<B, 2>>,
    /// Present only when requested.
    pub mask_idxs: Option<RaggedIndices>,
}

/// Masked-frame reconstruction encoder for pose sequences.
///
/// SEED SCHEDULE (relative to the context seed):
/// - +100: input embedding
/// - +101: reconstruction head
/// - +200: positional table
/// - +300 / +301: mask / pad token
/// - +302: token re-initialisation
/// - +400: transformer stack
#[derive(Module, Debug)]
pub struct SpoterEncoder<B: Backend> {
    pub input_embedding: EmbeddingHead<B>,
    pub transformer_encoder: EncoderStack<B>,
    pub head: ReconstructionHead<B>,
    pub pos_encoding: Option<LearnablePositionalEncoding<B>>,

    /// Learned sentinel for masked frames, shape [1, hidden_dim]
    pub mask_token: Param<Tensor<B, 2>>,
    /// Learned sentinel for padded frames, shape [1, hidden_dim]
    pub pad_token: Param<Tensor<B, 2>>,

    data_dim: Ignored<usize>,
    hidden_dim: Ignored<usize>,
    max_frames: Ignored<usize>,
    pos_encoding_kind: Ignored<PositionalEncodingKind>,
}

impl<B: Backend> SpoterEncoder<B> {
    /// Build a model whose randomness derives from `config.seed`.
    pub fn from_config(config: &EncoderConfig, device: &B::Device) -> Result<Self, EncoderError> {
        let rng_ctx = DeterministicRngContext::new(config.seed, device.clone());
        Self::new(config, &rng_ctx)
    }

    pub fn new(
        config: &EncoderConfig,
        rng_ctx: &DeterministicRngContext<B>,
    ) -> Result<Self, EncoderError> {
        config.validate()?;
        let kind = config.positional_encoding_kind()?;
        let seed_for = |offset: u64| rng_ctx.seed.wrapping_add(offset);

        let input_embedding = EmbeddingHead::new(
            rng_ctx,
            seed_for(seed_offsets::INPUT_EMBEDDING),
            config.data_dim,
            config.hidden_dim,
        )?;
        let transformer_encoder =
            EncoderStack::new(config, rng_ctx, seed_for(seed_offsets::TRANSFORMER_STACK))?;
        let head = ReconstructionHead::new(
            rng_ctx,
            seed_for(seed_offsets::RECONSTRUCTION_HEAD),
            config.hidden_dim,
            config.data_dim,
        )?;
        let pos_encoding = LearnablePositionalEncoding::from_kind(
            kind,
            config.max_frames,
            config.hidden_dim,
            rng_ctx,
            seed_for(seed_offsets::POSITIONAL_TABLE),
        )?;

        let token_shape = [1, config.hidden_dim];
        let mask_token = rng_ctx.with_isolated_seed(Some(seed_for(seed_offsets::MASK_TOKEN)), |rng| {
            rng_ctx.generate_uniform_tensor(token_shape, rng, 0.0, 1.0)
        })?;
        let pad_token = rng_ctx.with_isolated_seed(Some(seed_for(seed_offsets::PAD_TOKEN)), |rng| {
            rng_ctx.generate_uniform_tensor(token_shape, rng, 0.0, 1.0)
        })?;

        let mut model = Self {
            input_embedding,
            transformer_encoder,
            head,
            pos_encoding,
            mask_token: Param::from_tensor(mask_token),
            pad_token: Param::from_tensor(pad_token),
            data_dim: Ignored(config.data_dim),
            hidden_dim: Ignored(config.hidden_dim),
            max_frames: Ignored(config.max_frames),
            pos_encoding_kind: Ignored(kind),
        };

        if config.normal_token_init {
            model.reinitialize_tokens(rng_ctx)?;
        }

        log::info!(
            "Built SPOTER encoder: data_dim={} hidden_dim={} layers={} heads={} pos_encoding={} params={}",
            config.data_dim,
            config.hidden_dim,
            config.num_layers,
            config.nhead,
            kind.name(),
            model.num_params()
        );

        Ok(model)
    }

    /// Re-draw the mask and pad tokens from N(0, 0.2^2).
    ///
    /// Parameter ids are kept, so optimizer bookkeeping keyed on them survives.
    pub fn reinitialize_tokens(
        &mut self,
        rng_ctx: &DeterministicRngContext<B>,
    ) -> Result<(), EncoderError> {
        let shape = [1, *self.hidden_dim];
        let seed = rng_ctx.seed.wrapping_add(seed_offsets::TOKEN_REINIT);
        let (mask, pad) = rng_ctx.with_isolated_seed(Some(seed), |rng| {
            let mask = rng_ctx.generate_normal_tensor(shape, rng, 0.0, TOKEN_REINIT_STD)?;
            let pad = rng_ctx.generate_normal_tensor(shape, rng, 0.0, TOKEN_REINIT_STD)?;
            Ok::<_, EncoderError>((mask, pad))
        })?;

        let require_grad = self.mask_token.val().is_require_grad();
        self.mask_token = Param::initialized(self.mask_token.id.clone(), mask.set_require_grad(require_grad));
        let require_grad = self.pad_token.val().is_require_grad();
        self.pad_token = Param::initialized(self.pad_token.id.clone(), pad.set_require_grad(require_grad));
        Ok(())
    }

    pub fn data_dim(&self) -> usize {
        *self.data_dim
    }

    pub fn hidden_dim(&self) -> usize {
        *self.hidden_dim
    }

    pub fn max_frames(&self) -> usize {
        *self.max_frames
    }

    pub fn pos_encoding_kind(&self) -> PositionalEncodingKind {
        *self.pos_encoding_kind
    }

    /// Mask, encode and reconstruct a padded batch.
    ///
    /// # Arguments
    /// * `x` - raw frames, [batch, seq, data_dim]
    /// * `padding_idx` - genuine frame count of every sequence; `None` means no padding
    /// * `mask_ratio` - fraction of genuine frames to mask, in [0, 1]
    /// * `return_mask_idxs` - also return the mask positions
    /// * `rng` - source of the mask selection
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        padding_idx: Option<&[usize]>,
        mask_ratio: f64,
        return_mask_idxs: bool,
        rng: &mut StdRng,
    ) -> Result<EncoderOutput<B>, EncoderError> {
        let [batch_size, seq_len, data_dim] = x.dims();
        if data_dim != *self.data_dim {
            return Err(EncoderError::DataDimMismatch {
                expected: *self.data_dim,
                got: data_dim,
            });
        }

        let valid_lens = compute_padding_boundary(padding_idx, batch_size, seq_len)?;
        let mask_idxs = select_mask_indices(&valid_lens, mask_ratio, rng)?;
        let targets = extract_targets(&x, &mask_idxs)?;

        for (bi, _) in valid_lens.iter().enumerate().filter(|&(_, &l)| l == 0) {
            log::warn!("Sequence {} has no valid frames; it contributes no masked targets", bi);
        }

        if batch_size == 0 || seq_len == 0 {
            let device = x.device();
            let predictions = (0..batch_size)
                .map(|_| Tensor::zeros([0, data_dim], &device))
                .collect();
            return Ok(EncoderOutput {
                predictions,
                targets,
                mask_idxs: return_mask_idxs.then_some(mask_idxs),
            });
        }

        let hidden = self.input_embedding.forward(x);
        let hidden = apply_padding_substitution(hidden, &valid_lens, self.pad_token.val())?;
        let hidden = apply_mask_substitution(hidden, &mask_idxs, self.mask_token.val())?;
        let hidden = match &self.pos_encoding {
            Some(pos_encoding) => pos_encoding.forward(hidden)?,
            None => hidden,
        };

        let encoded = self.transformer_encoder.forward(hidden)?;
        let reconstructed = self.head.forward(encoded);
        let predictions = gather_rows(&reconstructed, &mask_idxs)?;

        log::debug!(
            "Masked {} of {} valid frames across {} sequences (ratio {})",
            mask_idxs.total(),
            valid_lens.iter().sum::<usize>(),
            batch_size,
            mask_ratio
        );

        Ok(EncoderOutput {
            predictions,
            targets,
            mask_idxs: return_mask_idxs.then_some(mask_idxs),
        })
    }
}
