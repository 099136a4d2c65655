use burn::{
    nn::loss::{MseLoss, Reduction},
    tensor::{backend::Backend, Tensor},
};

use super::error::EncoderError;

/// Check that every prediction has the shape of its target.
pub fn validate_pairs<B: Backend>(
    predictions: &[Tensor<B, 2>],
    targets: &[Tensor<B, 2>],
) -> Result<(), EncoderError> {
    if predictions.len() != targets.len() {
        return Err(EncoderError::PairCountMismatch {
            predictions: predictions.len(),
            targets: targets.len(),
        });
    }
    for (index, (pred, target)) in predictions.iter().zip(targets.iter()).enumerate() {
        if pred.dims() != target.dims() {
            return Err(EncoderError::PredictionTargetMismatch {
                index,
                pred: pred.dims().to_vec(),
                target: target.dims().to_vec(),
            });
        }
    }
    Ok(())
}

/// Mean squared reconstruction error over all masked frames of a batch.
///
/// Sequences with an empty mask set are skipped. When no sequence has a masked
/// frame the loss is a zero scalar on `device`, so a training step over a batch of
/// empty sequences stays well defined.
///
/// # Returns
///
/// A `[1]` tensor holding the mean over every masked feature value.
pub fn masked_reconstruction_loss<B: Backend>(
    predictions: &[Tensor<B, 2>],
    targets: &[Tensor<B, 2>],
    device: &B::Device,
) -> Result<Tensor<B, 1>, EncoderError> {
    validate_pairs(predictions, targets)?;

    let (preds, targs): (Vec<_>, Vec<_>) = predictions
        .iter()
        .zip(targets.iter())
        .filter(|(pred, _)| pred.dims()[0] > 0)
        .map(|(pred, target)| (pred.clone(), target.clone()))
        .unzip();

    if preds.is_empty() {
        return Ok(Tensor::zeros([1], device));
    }

    let preds = Tensor::cat(preds, 0);
    let targs = Tensor::cat(targs, 0);
    Ok(MseLoss::new().forward(preds, targs, Reduction::Mean))
}
