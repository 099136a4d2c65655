//! Validated tensor slice assignment built on Burn's `slice_assign`.
//!
//! Every overwrite the masking engine performs goes through here, so a bad range
//! surfaces as an [`EncoderError::InvalidSlice`] instead of a backend panic.

use burn::prelude::*;
use std::ops::Range;

use crate::spoter::architectures::encoder::error::EncoderError;

/// Overwrite `ranges` of `tensor` with `values`.
///
/// Ranges must be non-empty, in bounds, and `values` must have exactly the
/// shape of the region.
pub fn update_tensor_slice<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    values: Tensor<B, D>,
    ranges: [Range<usize>; D],
) -> Result<Tensor<B, D>, EncoderError> {
    let tensor_shape = tensor.dims();
    let mut slice_shape = [0usize; D];

    for (dim_idx, (range, &tensor_dim)) in ranges.iter().zip(tensor_shape.iter()).enumerate() {
        if range.start >= range.end {
            return Err(EncoderError::InvalidSlice(format!(
                "start {} >= end {} for dimension {}",
                range.start, range.end, dim_idx
            )));
        }

        if range.end > tensor_dim {
            return Err(EncoderError::InvalidSlice(format!(
                "dimension {} range {}..{} exceeds size {}",
                dim_idx, range.start, range.end, tensor_dim
            )));
        }

        slice_shape[dim_idx] = range.end - range.start;
    }

    let values_shape = values.dims();
    if slice_shape != values_shape {
        return Err(EncoderError::InvalidSlice(format!(
            "shape mismatch: expected {:?}, got {:?}",
            slice_shape, values_shape
        )));
    }

    Ok(tensor.slice_assign(ranges, values))
}

/// Overwrite rows `rows` of sequence `batch_idx` with one repeated row vector.
///
/// `row` has shape `[1, hidden]` and is broadcast over the row range. An empty
/// row range leaves the tensor untouched.
pub fn fill_sequence_rows<B: Backend>(
    tensor: Tensor<B, 3>,
    batch_idx: usize,
    rows: Range<usize>,
    row: Tensor<B, 2>,
) -> Result<Tensor<B, 3>, EncoderError> {
    if rows.is_empty() {
        return Ok(tensor);
    }
    let [_, _, hidden] = tensor.dims();
    let [one, row_dim] = row.dims();
    if one != 1 || row_dim != hidden {
        return Err(EncoderError::InvalidSlice(format!(
            "fill row must have shape [1, {}], got [{}, {}]",
            hidden, one, row_dim
        )));
    }

    let fill: Tensor<B, 3> = row.reshape([1, 1, hidden]).expand([1, rows.len(), hidden]);
    update_tensor_slice(tensor, fill, [batch_idx..batch_idx + 1, rows, 0..hidden])
}
