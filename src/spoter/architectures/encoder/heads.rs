//! Projection heads between raw pose features and the hidden space.

use burn::{
    module::{Module, Param},
    tensor::{activation, backend::Backend, Tensor},
};
use rand::rngs::StdRng;

use super::error::EncoderError;
use super::rng::DeterministicRngContext;

/// Linear layer with deterministically initialised weights
///
/// Stores the weights as `Param` tensors so they are registered by the Module
/// derive and visible to optimizers.
#[derive(Module, Debug)]
pub struct DeterministicLinear<B: Backend> {
    /// Weight matrix of shape [output_dim, input_dim]
    pub weight: Param<Tensor<B, 2>>,
    /// Optional bias vector of shape [output_dim]
    pub bias: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> DeterministicLinear<B> {
    pub fn new(weight: Tensor<B, 2>, bias: Option<Tensor<B, 1>>) -> Self {
        Self {
            weight: Param::from_tensor(weight),
            bias: bias.map(Param::from_tensor),
        }
    }

    /// Xavier/Glorot normal weights, small normal bias.
    pub fn init(
        rng_ctx: &DeterministicRngContext<B>,
        rng: &mut StdRng,
        input_dim: usize,
        output_dim: usize,
        bias: bool,
    ) -> Result<Self, EncoderError> {
        let std = (2.0 / (input_dim + output_dim) as f32).sqrt();
        let weight = rng_ctx.generate_normal_tensor([output_dim, input_dim], rng, 0.0, std)?;
        let bias = if bias {
            Some(rng_ctx.generate_normal_tensor([output_dim], rng, 0.0, 0.01)?)
        } else {
            None
        };
        Ok(Self::new(weight, bias))
    }

    pub fn input_dim(&self) -> usize {
        self.weight.val().dims()[1]
    }

    pub fn output_dim(&self) -> usize {
        self.weight.val().dims()[0]
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = input.matmul(self.weight.val().transpose());
        match &self.bias {
            Some(bias) => output.add(bias.val().unsqueeze()),
            None => output,
        }
    }

    /// Applies the layer to the last dimension of a [batch, seq, input_dim] tensor.
    pub fn forward_3d(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq, input_dim] = input.dims();
        let output_dim = self.output_dim();

        let output_2d = self.forward(input.reshape([batch * seq, input_dim]));
        output_2d.reshape([batch, seq, output_dim])
    }
}

/// Raw features to hidden space: linear followed by GELU.
#[derive(Module, Debug)]
pub struct EmbeddingHead<B: Backend> {
    pub linear: DeterministicLinear<B>,
}

impl<B: Backend> EmbeddingHead<B> {
    pub fn new(
        rng_ctx: &DeterministicRngContext<B>,
        seed: u64,
        data_dim: usize,
        hidden_dim: usize,
    ) -> Result<Self, EncoderError> {
        let linear = rng_ctx.with_isolated_seed(Some(seed), |rng| {
            DeterministicLinear::init(rng_ctx, rng, data_dim, hidden_dim, true)
        })?;
        Ok(Self { linear })
    }

    /// [batch, seq, data_dim] -> [batch, seq, hidden_dim]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        activation::gelu(self.linear.forward_3d(x))
    }
}

/// Hidden space back to raw features: linear followed by sigmoid.
///
/// Outputs always lie in [0, 1], matching normalised keypoint coordinates.
#[derive(Module, Debug)]
pub struct ReconstructionHead<B: Backend> {
    pub linear: DeterministicLinear<B>,
}

impl<B: Backend> ReconstructionHead<B> {
    pub fn new(
        rng_ctx: &DeterministicRngContext<B>,
        seed: u64,
        hidden_dim: usize,
        data_dim: usize,
    ) -> Result<Self, EncoderError> {
        let linear = rng_ctx.with_isolated_seed(Some(seed), |rng| {
            DeterministicLinear::init(rng_ctx, rng, hidden_dim, data_dim, true)
        })?;
        Ok(Self { linear })
    }

    /// [batch, seq, hidden_dim] -> [batch, seq, data_dim]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        activation::sigmoid(self.linear.forward_3d(x))
    }
}
