//! Masking engine: padding boundaries, mask selection, target gathering and
//! sentinel-token substitution for ragged batches.
//!
//! Per-sequence bookkeeping lives on the host because valid lengths and mask-set
//! sizes differ between sequences. The tensor side sees one gather per sequence
//! and one masked overwrite per batch.
//!
//! Call order inside a forward pass matters:
//! 1. [`select_mask_indices`] and [`extract_targets`] on the raw batch,
//! 2. embedding,
//! 3. [`apply_padding_substitution`],
//! 4. [`apply_mask_substitution`].
//!
//! Mask indices always lie below the valid length, so steps 3 and 4 never touch
//! the same position.

use burn::tensor::{backend::Backend, Bool, Int, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::error::EncoderError;
use crate::tensor_slice_assign::fill_sequence_rows;

/// Per-sequence index lists stored in one flat buffer.
///
/// Sequence `i` owns `indices[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaggedIndices {
    indices: Vec<usize>,
    offsets: Vec<usize>,
}

impl RaggedIndices {
    pub fn new() -> Self {
        Self {
            indices: Vec::new(),
            offsets: vec![0],
        }
    }

    pub fn with_capacity(sequences: usize, total: usize) -> Self {
        let mut offsets = Vec::with_capacity(sequences + 1);
        offsets.push(0);
        Self {
            indices: Vec::with_capacity(total),
            offsets,
        }
    }

    /// Append the index list of the next sequence.
    pub fn push(&mut self, sequence: &[usize]) {
        self.indices.extend_from_slice(sequence);
        self.offsets.push(self.indices.len());
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of sequence `i`.
    ///
    /// Panics if `i >= self.len()`.
    pub fn get(&self, i: usize) -> &[usize] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.offsets.windows(2).map(|w| &self.indices[w[0]..w[1]])
    }

    /// Mask-set size of every sequence.
    pub fn sizes(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Total number of indices across all sequences.
    pub fn total(&self) -> usize {
        self.indices.len()
    }

    pub fn to_vecs(&self) -> Vec<Vec<usize>> {
        self.iter().map(<[usize]>::to_vec).collect()
    }
}

impl Default for RaggedIndices {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Vec<usize>>> for RaggedIndices {
    fn from(lists: Vec<Vec<usize>>) -> Self {
        let total = lists.iter().map(Vec::len).sum();
        let mut ragged = Self::with_capacity(lists.len(), total);
        for list in &lists {
            ragged.push(list);
        }
        ragged
    }
}

/// Resolve the number of genuine frames of every sequence.
///
/// `None` means no padding: every sequence is `seq_len` frames long.
pub fn compute_padding_boundary(
    padding_idx: Option<&[usize]>,
    batch_size: usize,
    seq_len: usize,
) -> Result<Vec<usize>, EncoderError> {
    let Some(valid_lens) = padding_idx else {
        return Ok(vec![seq_len; batch_size]);
    };

    if valid_lens.len() != batch_size {
        return Err(EncoderError::PaddingLengthMismatch {
            expected: batch_size,
            got: valid_lens.len(),
        });
    }
    if let Some((index, &valid_len)) = valid_lens.iter().enumerate().find(|&(_, &l)| l > seq_len) {
        return Err(EncoderError::ValidLengthOutOfRange {
            index,
            valid_len,
            seq_len,
        });
    }

    Ok(valid_lens.to_vec())
}

/// Number of frames masked in a sequence of `valid_len` frames.
pub fn mask_set_size(valid_len: usize, mask_ratio: f64) -> usize {
    ((valid_len as f64 * mask_ratio).ceil() as usize).min(valid_len)
}

pub fn validate_mask_ratio(mask_ratio: f64) -> Result<(), EncoderError> {
    if (0.0..=1.0).contains(&mask_ratio) {
        Ok(())
    } else {
        Err(EncoderError::MaskRatioOutOfRange(mask_ratio))
    }
}

/// Draw the mask positions of every sequence.
///
/// For each sequence the range `[0, valid_len)` is shuffled with `rng`, the first
/// `ceil(valid_len * mask_ratio)` entries are kept and sorted ascending.
pub fn select_mask_indices(
    valid_lens: &[usize],
    mask_ratio: f64,
    rng: &mut StdRng,
) -> Result<RaggedIndices, EncoderError> {
    validate_mask_ratio(mask_ratio)?;

    let total = valid_lens.iter().map(|&l| mask_set_size(l, mask_ratio)).sum();
    let mut mask_idxs = RaggedIndices::with_capacity(valid_lens.len(), total);

    for &valid_len in valid_lens {
        let mut candidates: Vec<usize> = (0..valid_len).collect();
        candidates.shuffle(rng);
        candidates.truncate(mask_set_size(valid_len, mask_ratio));
        candidates.sort_unstable();
        mask_idxs.push(&candidates);
    }

    Ok(mask_idxs)
}

fn check_batch(mask_idxs: &RaggedIndices, batch_size: usize) -> Result<(), EncoderError> {
    if mask_idxs.len() != batch_size {
        return Err(EncoderError::MaskBatchMismatch {
            expected: batch_size,
            got: mask_idxs.len(),
        });
    }
    Ok(())
}

/// Gather rows `mask_idxs[i]` of every sequence `i` of a [batch, seq, dim] tensor.
///
/// Returns one `[n_i, dim]` tensor per sequence; empty mask sets give `[0, dim]`.
pub fn gather_rows<B: Backend>(
    x: &Tensor<B, 3>,
    mask_idxs: &RaggedIndices,
) -> Result<Vec<Tensor<B, 2>>, EncoderError> {
    let [batch_size, seq_len, dim] = x.dims();
    check_batch(mask_idxs, batch_size)?;
    let device = x.device();

    mask_idxs
        .iter()
        .enumerate()
        .map(|(bi, idxs)| {
            if idxs.is_empty() {
                return Ok(Tensor::zeros([0, dim], &device));
            }
            if let Some(&bad) = idxs.iter().find(|&&i| i >= seq_len) {
                return Err(EncoderError::InvalidSlice(format!(
                    "mask index {} of sequence {} exceeds seq_len {}",
                    bad, bi, seq_len
                )));
            }
            let positions: Vec<i64> = idxs.iter().map(|&i| i as i64).collect();
            let positions =
                Tensor::<B, 1, Int>::from_data(TensorData::new(positions, [idxs.len()]), &device);
            Ok(x
                .clone()
                .slice([bi..bi + 1, 0..seq_len, 0..dim])
                .reshape([seq_len, dim])
                .select(0, positions))
        })
        .collect()
}

/// Ground-truth raw frames at the mask positions.
///
/// Must be called on the raw batch, before embedding and substitution.
pub fn extract_targets<B: Backend>(
    raw_batch: &Tensor<B, 3>,
    mask_idxs: &RaggedIndices,
) -> Result<Vec<Tensor<B, 2>>, EncoderError> {
    gather_rows(raw_batch, mask_idxs)
}

/// Overwrite every frame at or beyond `valid_lens[i]` with the pad token.
///
/// `pad_token` has shape `[1, hidden]`. Sequences with no padding are skipped.
pub fn apply_padding_substitution<B: Backend>(
    embedded: Tensor<B, 3>,
    valid_lens: &[usize],
    pad_token: Tensor<B, 2>,
) -> Result<Tensor<B, 3>, EncoderError> {
    let [batch_size, seq_len, _] = embedded.dims();
    if valid_lens.len() != batch_size {
        return Err(EncoderError::PaddingLengthMismatch {
            expected: batch_size,
            got: valid_lens.len(),
        });
    }

    let mut x = embedded;
    for (bi, &valid_len) in valid_lens.iter().enumerate() {
        if valid_len > seq_len {
            return Err(EncoderError::ValidLengthOutOfRange {
                index: bi,
                valid_len,
                seq_len,
            });
        }
        if valid_len == seq_len {
            continue;
        }
        x = fill_sequence_rows(x, bi, valid_len..seq_len, pad_token.clone())?;
    }
    Ok(x)
}

/// Overwrite every masked frame with the mask token.
///
/// `mask_token` has shape `[1, hidden]`; it is broadcast over the batch and
/// selected through a boolean position mask in a single pass.
pub fn apply_mask_substitution<B: Backend>(
    embedded: Tensor<B, 3>,
    mask_idxs: &RaggedIndices,
    mask_token: Tensor<B, 2>,
) -> Result<Tensor<B, 3>, EncoderError> {
    let [batch_size, seq_len, hidden] = embedded.dims();
    check_batch(mask_idxs, batch_size)?;
    if mask_idxs.total() == 0 {
        return Ok(embedded);
    }
    let [_, token_dim] = mask_token.dims();
    if token_dim != hidden {
        return Err(EncoderError::HiddenDimMismatch {
            expected: hidden,
            got: token_dim,
        });
    }

    let mut selected = vec![false; batch_size * seq_len * hidden];
    for (bi, idxs) in mask_idxs.iter().enumerate() {
        for &pos in idxs {
            if pos >= seq_len {
                return Err(EncoderError::InvalidSlice(format!(
                    "mask index {} of sequence {} exceeds seq_len {}",
                    pos, bi, seq_len
                )));
            }
            let start = (bi * seq_len + pos) * hidden;
            selected[start..start + hidden].fill(true);
        }
    }

    let device = embedded.device();
    let selected = Tensor::<B, 3, Bool>::from_data(
        TensorData::new(selected, [batch_size, seq_len, hidden]),
        &device,
    );
    let tokens: Tensor<B, 3> = mask_token
        .reshape([1, 1, hidden])
        .expand([batch_size, seq_len, hidden]);

    Ok(embedded.mask_where(selected, tokens))
}
