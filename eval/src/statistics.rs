// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! One evaluation call: margins, shared grid, per-group curves and the scalar
//! summaries derived from them
//!
//! Data flows strictly forward:
//! batch -> margins -> grouped margins -> per-group curves -> scalars.
//! The call either returns every output or fails with the first violated
//! precondition.

use crate::area::GroupPair;
use crate::datasets::SampleBatch;
use crate::error::{EvalError, Result};
use crate::margin::{batch_margins, MARGIN_BOUND};
use crate::partition::{group_margins, GroupLabel, GroupMargins};
use crate::sweep::{group_curves, Curve, GroupCurves, MetricKind, SortedMargins, ThresholdGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of bins used for margin histograms
pub const HISTOGRAM_BINS: usize = 40;

/// Area between two groups' curves plus the size of the support it averages over
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveGap {
    pub groups: (GroupLabel, GroupLabel),
    pub value: f64,
    pub matched_points: usize,
}

impl CurveGap {
    fn between(curves: &GroupCurves) -> Result<Self> {
        let pair = GroupPair::from_curves(curves)?;
        Ok(Self {
            groups: pair.labels(),
            value: pair.area_between()?,
            matched_points: pair.aligned().len(),
        })
    }
}

/// Everything one evaluation call produces
#[derive(Debug, Clone)]
pub struct EvaluationStatistics {
    pub grid: ThresholdGrid,
    /// Accuracy-coverage curve of the whole batch
    pub overall_curve: Curve,
    /// Trapezoidal area under `overall_curve`
    pub area_under_curve: f64,
    pub margins_by_group: GroupMargins,
    pub accuracy_curves: GroupCurves,
    pub precision_curves: GroupCurves,
    pub accuracy_gap: CurveGap,
    /// Headline fairness gap
    pub precision_gap: CurveGap,
}

impl EvaluationStatistics {
    /// Run the full engine over a batch.
    ///
    /// Requires exactly two groups, and at least one predicted positive in each
    /// group for the precision curves.
    pub fn compute(batch: &SampleBatch, tau_step: f64) -> Result<Self> {
        let margins = batch_margins(batch);
        let grid = ThresholdGrid::from_margins(&margins, tau_step)?;
        tracing::debug!("Threshold grid: {} points, step {}", grid.len(), grid.step());

        let sorted = SortedMargins::new(&margins).ok_or(EvalError::EmptyBatch)?;
        let overall_curve = Curve::sweep(&sorted, &grid);
        let area_under_curve = overall_curve.presentation().area_under()?;

        let margins_by_group = group_margins(batch, MetricKind::Accuracy);
        if margins_by_group.len() != 2 {
            return Err(EvalError::UnsupportedGroupCount(margins_by_group.len()));
        }

        let accuracy_curves = group_curves(&margins_by_group, &grid)?;
        let precision_curves = group_curves(&group_margins(batch, MetricKind::Precision), &grid)?;

        let accuracy_gap = CurveGap::between(&accuracy_curves)?;
        let precision_gap = CurveGap::between(&precision_curves)?;

        Ok(Self {
            grid,
            overall_curve,
            area_under_curve,
            margins_by_group,
            accuracy_curves,
            precision_curves,
            accuracy_gap,
            precision_gap,
        })
    }

    pub fn curves(&self, kind: MetricKind) -> &GroupCurves {
        match kind {
            MetricKind::Accuracy => &self.accuracy_curves,
            MetricKind::Precision => &self.precision_curves,
        }
    }

    /// Area under each group's curve of the given kind
    pub fn group_areas(&self, kind: MetricKind) -> Result<BTreeMap<GroupLabel, f64>> {
        self.curves(kind)
            .iter()
            .map(|(&group, curve)| curve.presentation().area_under().map(|area| (group, area)))
            .collect()
    }

    /// Density histograms of each group's margins
    pub fn margin_histograms(&self) -> BTreeMap<GroupLabel, MarginHistogram> {
        self.margins_by_group
            .iter()
            .map(|(&group, margins)| (group, MarginHistogram::new(margins, HISTOGRAM_BINS)))
            .collect()
    }
}

/// Fixed-width histogram over `[-MARGIN_BOUND, MARGIN_BOUND]`, normalised to a density
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginHistogram {
    /// `bins + 1` edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub density: Vec<f64>,
}

impl MarginHistogram {
    pub fn new(margins: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let width = 2.0 * MARGIN_BOUND / bins as f64;
        let edges = (0..=bins).map(|i| -MARGIN_BOUND + i as f64 * width).collect();

        let mut counts = vec![0usize; bins];
        for &m in margins {
            let idx = (((m + MARGIN_BOUND) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let total = margins.len().max(1) as f64;
        let density = counts.iter().map(|&c| c as f64 / (total * width)).collect();

        Self { edges, counts, density }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> SampleBatch {
        SampleBatch::new(vec![0.9, 0.2, 0.6, 0.4], vec![1, 0, 1, 0], vec![0, 0, 1, 1]).unwrap()
    }

    #[test]
    fn test_compute_scenario() {
        let stats = EvaluationStatistics::compute(&scenario(), 0.001).unwrap();

        let max_margin = 0.5 * (0.9f64 / 0.1).ln();
        assert_eq!(stats.grid.len(), (max_margin / 0.001).ceil() as usize);
        assert_eq!(stats.overall_curve.len(), stats.grid.len());
        assert_eq!(stats.accuracy_curves.len(), 2);

        // Every sample is correct, so every covered set is fully accurate
        assert!(stats.overall_curve.metric().iter().all(|m| *m == 1.0));
        assert!(stats.area_under_curve > 0.0 && stats.area_under_curve <= 1.0);
        assert_eq!(stats.accuracy_gap.value, 0.0);
        assert_eq!(stats.accuracy_gap.groups, (0, 1));
    }

    #[test]
    fn test_single_group_is_unsupported() {
        let batch = SampleBatch::new(vec![0.9, 0.2, 0.7], vec![1, 0, 0], vec![5, 5, 5]).unwrap();
        assert_eq!(
            EvaluationStatistics::compute(&batch, 0.01).unwrap_err(),
            EvalError::UnsupportedGroupCount(1)
        );
    }

    #[test]
    fn test_group_without_predicted_positives() {
        let batch = SampleBatch::new(vec![0.9, 0.2, 0.3, 0.4], vec![1, 0, 1, 0], vec![0, 0, 1, 1]).unwrap();
        assert_eq!(
            EvaluationStatistics::compute(&batch, 0.01).unwrap_err(),
            EvalError::EmptyGroup { group: 1 }
        );
    }

    #[test]
    fn test_all_zero_margins_cannot_be_integrated() {
        let batch = SampleBatch::new(vec![0.5, 0.5], vec![1, 1], vec![0, 1]).unwrap();
        assert_eq!(
            EvaluationStatistics::compute(&batch, 0.01).unwrap_err(),
            EvalError::InsufficientCurvePoints(1)
        );
    }

    #[test]
    fn test_group_areas_and_histograms() {
        let stats = EvaluationStatistics::compute(&scenario(), 0.01).unwrap();
        let areas = stats.group_areas(MetricKind::Accuracy).unwrap();
        assert_eq!(areas.len(), 2);

        let hist = stats.margin_histograms();
        assert_eq!(hist[&0].counts.iter().sum::<usize>(), 2);
        assert_eq!(hist[&0].edges.len(), HISTOGRAM_BINS + 1);
    }

    #[test]
    fn test_histogram_density_integrates_to_one() {
        let hist = MarginHistogram::new(&[-20.0, -3.0, 0.0, 0.1, 20.0], 8);
        let width = hist.edges[1] - hist.edges[0];
        let mass: f64 = hist.density.iter().map(|d| d * width).sum();
        assert!((mass - 1.0).abs() < 1e-12);
        assert_eq!(hist.counts[7], 1);
        assert_eq!(hist.counts[0], 1);
    }
}
