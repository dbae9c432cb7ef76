// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Signed confidence margins
//!
//! A margin is `±0.5 * ln(p / (1 - p))` after reflecting `p` into [0.5, 1],
//! positive when the rounded prediction matches the target, clamped to
//! `[-MARGIN_BOUND, MARGIN_BOUND]`.

use crate::datasets::SampleBatch;
use crate::error::{EvalError, Result};

/// Saturation bound for margins
pub const MARGIN_BOUND: f64 = 20.0;

/// Hard decision for a probability: `round(p)` with 0.5 rounding up
pub fn predicted_label(prediction: f64) -> u8 {
    if prediction >= 0.5 {
        1
    } else {
        0
    }
}

/// Half-logit confidence of a probability already reflected into [0.5, 1].
///
/// Returns `+inf` for `p == 1`; callers clamp.
pub fn confidence_score(p: f64) -> f64 {
    0.5 * (p / (1.0 - p)).ln()
}

/// Margin of a single (prediction, target) pair
pub fn margin(prediction: f64, target: u8) -> f64 {
    let correct = if predicted_label(prediction) == target { 1.0 } else { -1.0 };
    let reflected = if prediction < 0.5 { 1.0 - prediction } else { prediction };
    (correct * confidence_score(reflected)).clamp(-MARGIN_BOUND, MARGIN_BOUND)
}

fn margins_unchecked(predictions: &[f64], targets: &[u8]) -> Vec<f64> {
    predictions
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| margin(p, t))
        .collect()
}

/// Elementwise margins over aligned slices
pub fn margins(predictions: &[f64], targets: &[u8]) -> Result<Vec<f64>> {
    if predictions.len() != targets.len() {
        return Err(EvalError::MisalignedSequences {
            values: predictions.len(),
            paired: targets.len(),
        });
    }
    Ok(margins_unchecked(predictions, targets))
}

/// Margins of every sample in a batch
pub fn batch_margins(batch: &SampleBatch) -> Vec<f64> {
    // Column lengths were checked when the batch was built
    margins_unchecked(batch.predictions(), batch.targets())
}
