use burn::tensor::{backend::Backend, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::error::EncoderError;

/// Seed offsets for every random draw made by the encoder.
///
/// Each component derives its own `StdRng` from `base seed + offset`, so adding a
/// component never shifts the draws of another one.
pub mod seed_offsets {
    pub const INPUT_EMBEDDING: u64 = 100;
    pub const RECONSTRUCTION_HEAD: u64 = 101;
    pub const POSITIONAL_TABLE: u64 = 200;
    pub const MASK_TOKEN: u64 = 300;
    pub const PAD_TOKEN: u64 = 301;
    pub const TOKEN_REINIT: u64 = 302;
    pub const TRANSFORMER_STACK: u64 = 400;
    pub const FORWARD_MASKING: u64 = 1000;
}

/// Deterministic RNG context that ensures reproducible random operations
///
/// Parameter initialisation and mask selection both take their randomness from
/// here. Never use `StdRng::from_entropy()` or any global RNG source.
#[derive(Debug, Clone)]
pub struct DeterministicRngContext<B: Backend> {
    pub seed: u64,
    device: B::Device,
}

impl<B: Backend> DeterministicRngContext<B> {
    pub fn new(seed: u64, device: B::Device) -> Self {
        Self { seed, device }
    }

    /// Execute function with isolated deterministic RNG
    ///
    /// Seeds a fresh `StdRng` from `seed`, falling back to the context seed.
    pub fn with_isolated_seed<F, R>(&self, seed: Option<u64>, f: F) -> R
    where
        F: FnOnce(&mut StdRng) -> R,
    {
        let effective_seed = seed.unwrap_or(self.seed);
        let mut rng = StdRng::seed_from_u64(effective_seed);
        f(&mut rng)
    }

    /// `StdRng` seeded with context seed + offset.
    pub fn next_std_rng(&self, offset: Option<u64>) -> StdRng {
        let effective_seed = self.seed.wrapping_add(offset.unwrap_or(0));
        StdRng::seed_from_u64(effective_seed)
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Generate deterministic f32 tensor from N(mean, std^2) using explicit RNG
    pub fn generate_normal_tensor<const D: usize>(
        &self,
        shape: [usize; D],
        rng: &mut StdRng,
        mean: f32,
        std: f32,
    ) -> Result<Tensor<B, D>, EncoderError> {
        let normal = Normal::new(mean, std).map_err(|e| {
            EncoderError::InvalidDistribution(format!("N({}, {}^2): {}", mean, std, e))
        })?;
        let total_elements: usize = shape.iter().product();
        let data: Vec<f32> = (0..total_elements).map(|_| normal.sample(rng)).collect();

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape(shape))
    }

    /// Generate deterministic f32 tensor uniform in [low, high) using explicit RNG
    pub fn generate_uniform_tensor<const D: usize>(
        &self,
        shape: [usize; D],
        rng: &mut StdRng,
        low: f32,
        high: f32,
    ) -> Result<Tensor<B, D>, EncoderError> {
        if !(low < high) {
            return Err(EncoderError::InvalidDistribution(format!(
                "U[{}, {}) is empty",
                low, high
            )));
        }
        let total_elements: usize = shape.iter().product();
        let data: Vec<f32> = (0..total_elements)
            .map(|_| rng.random_range(low..high))
            .collect();

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_same_seed_same_tensor() {
        let device = Default::default();
        let ctx = DeterministicRngContext::<TestBackend>::new(42, device);

        let a = ctx
            .with_isolated_seed(Some(7), |rng| ctx.generate_normal_tensor([3, 4], rng, 0.0, 1.0))
            .unwrap();
        let b = ctx
            .with_isolated_seed(Some(7), |rng| ctx.generate_normal_tensor([3, 4], rng, 0.0, 1.0))
            .unwrap();
        assert_eq!(values(a), values(b));
    }

    #[test]
    fn test_offset_changes_stream() {
        let device = Default::default();
        let ctx = DeterministicRngContext::<TestBackend>::new(42, device);

        let mut rng_a = ctx.next_std_rng(None);
        let mut rng_b = ctx.next_std_rng(Some(5));
        let a = ctx.generate_uniform_tensor([16], &mut rng_a, 0.0, 1.0).unwrap();
        let b = ctx.generate_uniform_tensor([16], &mut rng_b, 0.0, 1.0).unwrap();
        assert_ne!(values(a), values(b));
    }

    #[test]
    fn test_uniform_range() {
        let device = Default::default();
        let ctx = DeterministicRngContext::<TestBackend>::new(0, device);
        let mut rng = ctx.next_std_rng(Some(1));
        let t = ctx.generate_uniform_tensor([64, 8], &mut rng, 0.0, 1.0).unwrap();
        assert_eq!(t.dims(), [64, 8]);
        assert!(values(t).iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_invalid_distributions() {
        let device = Default::default();
        let ctx = DeterministicRngContext::<TestBackend>::new(0, device);
        let mut rng = ctx.next_std_rng(None);
        assert!(ctx.generate_normal_tensor([2], &mut rng, 0.0, -1.0).is_err());
        assert!(ctx.generate_uniform_tensor([2], &mut rng, 1.0, 1.0).is_err());
    }
}
