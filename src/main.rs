use std::error::Error;
use std::fs;

use burn_ndarray::NdArray;
use log::{debug, info};
use spoter_rs::spoter::architectures::encoder::{
    loss_utils::masked_reconstruction_loss,
    rng::{seed_offsets, DeterministicRngContext},
    EncoderConfig, SpoterEncoder,
};
use spoter_rs::{settings, test_utils::synthetic_pose_batch};

type Backend = NdArray<f32>;

fn load_model_config(seed: u64) -> Result<EncoderConfig, Box<dyn Error>> {
    let config = match &settings().runtime.model_config_path {
        Some(path) => {
            info!("Loading encoder config from {}", path.display());
            serde_json::from_str::<EncoderConfig>(&fs::read_to_string(path)?)?
        }
        None => EncoderConfig::default(),
    };
    Ok(config.with_seed(seed))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let runtime = &settings().runtime;
    info!(
        "spoter-rs starting (seed {}, mask ratio {})",
        runtime.seed, runtime.mask_ratio
    );

    let config = load_model_config(runtime.seed)?;
    let device = Default::default();
    let rng_ctx = DeterministicRngContext::<Backend>::new(config.seed, device);
    let model = SpoterEncoder::new(&config, &rng_ctx)?;

    let seq_len = config.max_frames.clamp(1, 32);
    let valid_lens = [seq_len, seq_len / 2, 0];
    let batch = synthetic_pose_batch::<Backend>(
        &valid_lens,
        seq_len,
        config.data_dim,
        config.seed,
        rng_ctx.device(),
    );

    let mut rng = rng_ctx.next_std_rng(Some(seed_offsets::FORWARD_MASKING));
    let output = model.forward(batch, Some(&valid_lens), runtime.mask_ratio, true, &mut rng)?;

    if let Some(mask_idxs) = &output.mask_idxs {
        info!("Mask-set sizes per sequence: {:?}", mask_idxs.sizes());
        debug!("Masked frame positions: {:?}", mask_idxs.to_vecs());
    }

    let loss = masked_reconstruction_loss(&output.predictions, &output.targets, rng_ctx.device())?;
    let loss_value = loss.into_data().to_vec::<f32>().map_err(|e| format!("{:?}", e))?;
    info!("Masked reconstruction loss: {:.6}", loss_value[0]);

    Ok(())
}
