// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Group fairness evaluation for binary classifiers
//!
//! This crate provides:
//! - Signed, saturated confidence margins per sample
//! - Group partitioning by sensitive attribute (accuracy and precision variants)
//! - Rejection-threshold sweeps producing accuracy/precision-coverage curves
//! - Area under curve and area between two groups' curves (the fairness gap)
//! - A reproducible multi-seed pipeline with JSON, CSV and Markdown output

pub mod area;
pub mod datasets;
pub mod error;
pub mod margin;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod statistics;
pub mod sweep;

pub use area::{area_between_curves, area_under_curve, AlignedPoint, GroupPair};
pub use datasets::{RandomState, SampleBatch};
pub use error::{EvalError, Result};
pub use margin::{margin, margins, MARGIN_BOUND};
pub use metrics::{ClassificationReport, ConfusionMatrix, GroupReport, RunAggregate};
pub use partition::{group_margins, partition, GroupLabel, GroupMargins};
pub use pipeline::{EvaluationConfig, EvaluationPipeline, EvaluationResults};
pub use statistics::{CurveGap, EvaluationStatistics, MarginHistogram};
pub use sweep::{Curve, GroupCurves, MetricKind, SortedMargins, ThresholdGrid, DEFAULT_TAU_STEP, MAX_THRESHOLDS};
