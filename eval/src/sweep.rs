// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Rejection-threshold sweep
//!
//! For a threshold τ ≥ 0 a sample is covered when its margin lies outside
//! `(-τ, τ]`. Coverage is the covered fraction and the conditional metric is
//! the fraction of covered samples whose margin exceeds τ, with the value 1
//! when nothing is covered.
//!
//! Margins are sorted once per group; every τ is then answered with two
//! binary searches instead of a rescan.

use crate::error::{EvalError, Result};
use crate::partition::{GroupLabel, GroupMargins};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default distance between consecutive thresholds
pub const DEFAULT_TAU_STEP: f64 = 0.001;

/// Largest threshold grid a sweep will build
pub const MAX_THRESHOLDS: usize = 1_000_000;

/// Which conditional quantity a curve reports.
///
/// The sweep itself is identical; precision curves are built from margins of
/// predicted positives only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Accuracy,
    Precision,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::Precision => "precision",
        }
    }
}

/// Thresholds `0, step, 2*step, ...` strictly below the largest absolute margin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdGrid {
    step: f64,
    taus: Vec<f64>,
}

impl ThresholdGrid {
    /// Build the grid up to (not including) `max_abs_margin`.
    ///
    /// τ = 0 is always present, so a batch whose margins are all zero still
    /// gets a one-point grid.
    pub fn new(max_abs_margin: f64, step: f64) -> Result<Self> {
        Self::check_step(max_abs_margin, step)?;

        let mut taus: Vec<f64> = (0u64..)
            .map(|i| i as f64 * step)
            .take_while(|tau| *tau < max_abs_margin)
            .collect();
        if taus.is_empty() {
            taus.push(0.0);
        }

        Ok(Self { step, taus })
    }

    /// Reject a step that is not positive, or that would need more than
    /// [`MAX_THRESHOLDS`] thresholds to reach `max_abs_margin`
    pub fn check_step(max_abs_margin: f64, step: f64) -> Result<()> {
        if !step.is_finite() || step <= 0.0 {
            return Err(EvalError::InvalidStep(step));
        }
        if max_abs_margin / step > MAX_THRESHOLDS as f64 {
            return Err(EvalError::TooManyThresholds {
                step,
                max_abs_margin,
                limit: MAX_THRESHOLDS,
            });
        }
        Ok(())
    }

    /// Grid over the whole batch's margins, shared by every group
    pub fn from_margins(margins: &[f64], step: f64) -> Result<Self> {
        let max_abs = margins.iter().fold(0.0f64, |acc, m| acc.max(m.abs()));
        Self::new(max_abs, step)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn taus(&self) -> &[f64] {
        &self.taus
    }

    pub fn len(&self) -> usize {
        self.taus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taus.is_empty()
    }
}

/// Non-empty margin set, sorted ascending for logarithmic CDF queries
#[derive(Debug, Clone)]
pub struct SortedMargins {
    sorted: Vec<f64>,
}

impl SortedMargins {
    /// `None` when there are no margins
    pub fn new(margins: &[f64]) -> Option<Self> {
        if margins.is_empty() {
            return None;
        }
        let mut sorted = margins.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(Self { sorted })
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Number of margins `<= x`
    fn count_at_most(&self, x: f64) -> usize {
        self.sorted.partition_point(|&m| m <= x)
    }

    /// Empirical CDF: fraction of margins `<= tau`
    pub fn frac_below(&self, tau: f64) -> f64 {
        self.count_at_most(tau) as f64 / self.len() as f64
    }

    /// Fraction of margins `> tau`
    pub fn frac_correct(&self, tau: f64) -> f64 {
        (self.len() - self.count_at_most(tau)) as f64 / self.len() as f64
    }

    fn covered_counts(&self, tau: f64) -> (usize, usize) {
        let above = self.len() - self.count_at_most(tau);
        let below = self.count_at_most(-tau);
        (above + below, above)
    }

    /// Fraction of margins outside `(-tau, tau]`
    pub fn coverage(&self, tau: f64) -> f64 {
        let (covered, _) = self.covered_counts(tau);
        covered as f64 / self.len() as f64
    }

    /// Correct fraction among covered samples, 1 when nothing is covered
    pub fn conditional_metric(&self, tau: f64) -> f64 {
        match self.covered_counts(tau) {
            (0, _) => 1.0,
            (covered, correct) => correct as f64 / covered as f64,
        }
    }
}

/// Coverage and conditional metric, one value of each per threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    coverage: Vec<f64>,
    metric: Vec<f64>,
}

impl Curve {
    pub fn new(coverage: Vec<f64>, metric: Vec<f64>) -> Result<Self> {
        if coverage.len() != metric.len() {
            return Err(EvalError::CurveLengthMismatch {
                coverage: coverage.len(),
                metric: metric.len(),
            });
        }
        Ok(Self { coverage, metric })
    }

    /// Sweep `margins` over every threshold of `grid`, in ascending τ order
    pub fn sweep(margins: &SortedMargins, grid: &ThresholdGrid) -> Self {
        let (coverage, metric) = grid
            .taus()
            .iter()
            .map(|&tau| (margins.coverage(tau), margins.conditional_metric(tau)))
            .unzip();
        Self { coverage, metric }
    }

    pub fn coverage(&self) -> &[f64] {
        &self.coverage
    }

    pub fn metric(&self) -> &[f64] {
        &self.metric
    }

    pub fn len(&self) -> usize {
        self.coverage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coverage.is_empty()
    }

    /// `(coverage, metric)` pairs in stored order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.coverage.iter().copied().zip(self.metric.iter().copied())
    }

    /// Reversed copy: a raw sweep has coverage descending, plots want it ascending
    pub fn presentation(&self) -> Self {
        Self {
            coverage: self.coverage.iter().rev().copied().collect(),
            metric: self.metric.iter().rev().copied().collect(),
        }
    }
}

/// Curves keyed by group label
pub type GroupCurves = BTreeMap<GroupLabel, Curve>;

/// Sweep one margin set, failing with [`EvalError::EmptyGroup`] when it is empty
pub fn sweep_group(group: GroupLabel, margins: &[f64], grid: &ThresholdGrid) -> Result<Curve> {
    let sorted = SortedMargins::new(margins).ok_or(EvalError::EmptyGroup { group })?;
    Ok(Curve::sweep(&sorted, grid))
}

/// Sweep every group over the same grid
pub fn group_curves(groups: &GroupMargins, grid: &ThresholdGrid) -> Result<GroupCurves> {
    groups
        .iter()
        .map(|(&group, margins)| {
            tracing::debug!("Sweeping group {} ({} margins, {} thresholds)", group, margins.len(), grid.len());
            sweep_group(group, margins, grid).map(|curve| (group, curve))
        })
        .collect()
}
