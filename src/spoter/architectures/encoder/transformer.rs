use burn::{
    module::{Ignored, Module, ModuleMapper, ParamId},
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Initializer,
    },
    tensor::{backend::Backend, Tensor},
};
use rand::{rngs::StdRng, SeedableRng};

use super::config::EncoderConfig;
use super::error::EncoderError;
use super::rng::DeterministicRngContext;

/// Bidirectional self-attention stack over [batch, seq, hidden] sequences.
///
/// No causal mask and no key-padding mask: padded frames carry the learned pad
/// token and take part in attention like any other frame. The stack has no notion
/// of position of its own.
#[derive(Module, Debug)]
pub struct EncoderStack<B: Backend> {
    encoder: TransformerEncoder<B>,
    hidden_dim: Ignored<usize>,
    num_layers: Ignored<usize>,
}

/// Re-draws every weight matrix of a module from an explicit `StdRng`.
///
/// Matrices get U(-1/sqrt(fan_in), 1/sqrt(fan_in)) with `fan_in = dims[0]`
/// (burn stores linear weights as [d_input, d_output]). Vectors are left alone:
/// with a zero initializer biases are zero and layer-norm scale/shift are ones/zeros.
struct SeededWeightInit<'a, B: Backend> {
    rng_ctx: &'a DeterministicRngContext<B>,
    rng: StdRng,
    error: Option<EncoderError>,
}

impl<B: Backend> ModuleMapper<B> for SeededWeightInit<'_, B> {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        if D < 2 || self.error.is_some() {
            return tensor;
        }
        let shape = tensor.dims();
        let bound = 1.0 / (shape[0] as f32).sqrt();

        match self
            .rng_ctx
            .generate_uniform_tensor(shape, &mut self.rng, -bound, bound)
        {
            Ok(redrawn) => redrawn.set_require_grad(tensor.is_require_grad()),
            Err(err) => {
                self.error = Some(err);
                tensor
            }
        }
    }
}

impl<B: Backend> EncoderStack<B> {
    /// Build the stack. Layers are created with zero weights and every weight
    /// matrix is then drawn from a `StdRng` seeded with `seed`, so the backend
    /// RNG is never consulted.
    pub fn new(
        config: &EncoderConfig,
        rng_ctx: &DeterministicRngContext<B>,
        seed: u64,
    ) -> Result<Self, EncoderError> {
        config.validate()?;

        let encoder = TransformerEncoderConfig::new(
            config.hidden_dim,
            config.d_ff,
            config.nhead,
            config.num_layers,
        )
        .with_dropout(config.dropout)
        .with_norm_first(config.norm_first)
        .with_initializer(Initializer::Zeros)
        .init(rng_ctx.device());

        let mut init = SeededWeightInit {
            rng_ctx,
            rng: StdRng::seed_from_u64(seed),
            error: None,
        };
        let encoder = encoder.map(&mut init);
        if let Some(err) = init.error {
            return Err(err);
        }

        Ok(Self {
            encoder,
            hidden_dim: Ignored(config.hidden_dim),
            num_layers: Ignored(config.num_layers),
        })
    }

    pub fn num_layers(&self) -> usize {
        *self.num_layers
    }

    /// input shape: [batch, seq, hidden]
    /// output shape: [batch, seq, hidden]
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>, EncoderError> {
        let [_, _, hidden_dim] = x.dims();
        if hidden_dim != *self.hidden_dim {
            return Err(EncoderError::HiddenDimMismatch {
                expected: *self.hidden_dim,
                got: hidden_dim,
            });
        }
        Ok(self.encoder.forward(TransformerEncoderInput::new(x)))
    }
}
