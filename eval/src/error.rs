// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error taxonomy for the evaluation engine
//!
//! Every failure is a precondition check made at a call boundary. The two
//! documented conventions (saturated margins for predictions of exactly 0 or 1,
//! and a conditional metric of 1 when nothing is covered) are not errors and
//! never show up here.

use crate::partition::GroupLabel;
use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Batch has no samples
    #[error("batch is empty")]
    EmptyBatch,

    /// The three per-sample sequences disagree in length
    #[error(
        "length mismatch: {predictions} predictions, {targets} targets, {attributes} attributes"
    )]
    LengthMismatch {
        predictions: usize,
        targets: usize,
        attributes: usize,
    },

    /// A per-sample sequence and its companion have different lengths
    #[error("sequence length mismatch: {values} values but {paired} paired entries")]
    MisalignedSequences { values: usize, paired: usize },

    #[error("prediction {value} at index {index} is not a probability in [0, 1]")]
    InvalidPrediction { index: usize, value: f64 },

    #[error("target {value} at index {index} is not binary (expected 0 or 1)")]
    InvalidTarget { index: usize, value: u8 },

    #[error("threshold step {0} must be finite and positive")]
    InvalidStep(f64),

    /// Step so small relative to the largest margin that the grid would exceed `limit`
    #[error("threshold step {step} over margins up to {max_abs_margin} exceeds {limit} thresholds")]
    TooManyThresholds { step: f64, max_abs_margin: f64, limit: usize },

    /// A group has nothing to sweep over (e.g. no predicted positives for a precision curve)
    #[error("group {group} has no samples to evaluate")]
    EmptyGroup { group: GroupLabel },

    #[error("at least 2 points are needed to integrate a curve, got {0}")]
    InsufficientCurvePoints(usize),

    #[error("coverage values are neither non-decreasing nor non-increasing")]
    NonMonotonicCoverage,

    #[error("curve has {coverage} coverage values but {metric} metric values")]
    CurveLengthMismatch { coverage: usize, metric: usize },

    /// Two curves share no rounded coverage value
    #[error("groups {first} and {second} share no common coverage points")]
    NoCommonSupport { first: GroupLabel, second: GroupLabel },

    /// Area between curves compares exactly two groups
    #[error("area between curves needs exactly 2 groups, found {0}")]
    UnsupportedGroupCount(usize),
}

impl EvalError {
    /// True for the degenerate-input family (empty or misaligned batch)
    pub fn is_degenerate_input(&self) -> bool {
        matches!(
            self,
            EvalError::EmptyBatch | EvalError::LengthMismatch { .. } | EvalError::MisalignedSequences { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_input_family() {
        assert!(EvalError::EmptyBatch.is_degenerate_input());
        assert!(EvalError::LengthMismatch { predictions: 1, targets: 2, attributes: 2 }.is_degenerate_input());
        assert!(EvalError::MisalignedSequences { values: 3, paired: 1 }.is_degenerate_input());
        assert!(!EvalError::UnsupportedGroupCount(3).is_degenerate_input());
    }

    #[test]
    fn test_messages_name_the_groups() {
        let err = EvalError::NoCommonSupport { first: 0, second: 1 };
        assert_eq!(err.to_string(), "groups 0 and 1 share no common coverage points");
    }
}
