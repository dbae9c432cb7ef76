// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Area statistics over coverage curves
//!
//! - Area under a curve by the trapezoidal rule
//! - Area between two groups' curves: mean absolute metric gap over the
//!   coverage values both curves reach after rounding to three decimals

use crate::error::{EvalError, Result};
use crate::partition::GroupLabel;
use crate::sweep::{Curve, GroupCurves};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Decimal places kept when matching coverage values across curves
pub const COVERAGE_DECIMALS: i32 = 3;

/// Integer join key for a coverage value
fn coverage_key(coverage: f64) -> i64 {
    (coverage * 10f64.powi(COVERAGE_DECIMALS)).round() as i64
}

/// Trapezoidal integral of `metric` over `coverage`.
///
/// Coverage must be monotonic. A descending sequence (the raw order of a
/// sweep) is integrated as if reversed, so the area is never negative.
pub fn area_under_curve(coverage: &[f64], metric: &[f64]) -> Result<f64> {
    if coverage.len() != metric.len() {
        return Err(EvalError::CurveLengthMismatch {
            coverage: coverage.len(),
            metric: metric.len(),
        });
    }
    if coverage.len() < 2 {
        return Err(EvalError::InsufficientCurvePoints(coverage.len()));
    }

    let ascending = coverage.windows(2).all(|w| w[1] >= w[0]);
    let descending = coverage.windows(2).all(|w| w[1] <= w[0]);
    let direction = match (ascending, descending) {
        (true, _) => 1.0,
        (false, true) => -1.0,
        (false, false) => return Err(EvalError::NonMonotonicCoverage),
    };

    let area: f64 = coverage
        .windows(2)
        .zip(metric.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
        .sum();

    Ok(direction * area)
}

impl Curve {
    /// Area under this curve, see [`area_under_curve`]
    pub fn area_under(&self) -> Result<f64> {
        area_under_curve(self.coverage(), self.metric())
    }
}

/// Metric values of both groups at one shared rounded coverage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedPoint {
    pub coverage: f64,
    pub first: f64,
    pub second: f64,
}

impl AlignedPoint {
    pub fn gap(&self) -> f64 {
        (self.first - self.second).abs()
    }
}

/// Exactly two groups' curves, named by their labels
#[derive(Debug, Clone, Copy)]
pub struct GroupPair<'a> {
    first: (GroupLabel, &'a Curve),
    second: (GroupLabel, &'a Curve),
}

impl<'a> GroupPair<'a> {
    pub fn new(first: (GroupLabel, &'a Curve), second: (GroupLabel, &'a Curve)) -> Self {
        Self { first, second }
    }

    /// Take the two groups of a curve map, lower label first
    pub fn from_curves(curves: &'a GroupCurves) -> Result<Self> {
        let mut iter = curves.iter();
        match (iter.next(), iter.next(), iter.next()) {
            (Some((&a, first)), Some((&b, second)), None) => Ok(Self::new((a, first), (b, second))),
            _ => Err(EvalError::UnsupportedGroupCount(curves.len())),
        }
    }

    pub fn labels(&self) -> (GroupLabel, GroupLabel) {
        (self.first.0, self.second.0)
    }

    /// Points of the first curve whose rounded coverage the second curve also
    /// reaches. Each rounded coverage is used once, at its first occurrence
    /// in either curve.
    pub fn aligned(&self) -> Vec<AlignedPoint> {
        let mut second_by_key: HashMap<i64, f64> = HashMap::new();
        for (coverage, metric) in self.second.1.points() {
            second_by_key.entry(coverage_key(coverage)).or_insert(metric);
        }

        let mut seen = HashSet::new();
        self.first
            .1
            .points()
            .filter_map(|(coverage, metric)| {
                let key = coverage_key(coverage);
                if !seen.insert(key) {
                    return None;
                }
                second_by_key.get(&key).map(|&other| AlignedPoint {
                    coverage: key as f64 / 10f64.powi(COVERAGE_DECIMALS),
                    first: metric,
                    second: other,
                })
            })
            .collect()
    }

    /// Mean absolute metric gap over the shared coverage support
    pub fn area_between(&self) -> Result<f64> {
        let aligned = self.aligned();
        if aligned.is_empty() {
            return Err(EvalError::NoCommonSupport {
                first: self.first.0,
                second: self.second.0,
            });
        }
        let total: f64 = aligned.iter().map(AlignedPoint::gap).sum();
        Ok(total / aligned.len() as f64)
    }
}

/// Area between the curves of a two-group map
pub fn area_between_curves(curves: &GroupCurves) -> Result<f64> {
    GroupPair::from_curves(curves)?.area_between()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(coverage: &[f64], metric: &[f64]) -> Curve {
        Curve::new(coverage.to_vec(), metric.to_vec()).unwrap()
    }

    #[test]
    fn test_auc_unit_square() {
        let area = area_under_curve(&[0.0, 0.5, 1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_descending_equals_ascending() {
        let up = area_under_curve(&[0.2, 0.6, 1.0], &[1.0, 0.9, 0.7]).unwrap();
        let down = area_under_curve(&[1.0, 0.6, 0.2], &[0.7, 0.9, 1.0]).unwrap();
        assert!((up - down).abs() < 1e-12);
        // 0.4 * 0.95 + 0.4 * 0.8
        assert!((up - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_auc_preconditions() {
        assert_eq!(
            area_under_curve(&[1.0], &[1.0]).unwrap_err(),
            EvalError::InsufficientCurvePoints(1)
        );
        assert_eq!(
            area_under_curve(&[0.0, 1.0, 0.5], &[1.0, 1.0, 1.0]).unwrap_err(),
            EvalError::NonMonotonicCoverage
        );
        assert!(matches!(
            area_under_curve(&[0.0, 1.0], &[1.0]).unwrap_err(),
            EvalError::CurveLengthMismatch { .. }
        ));
    }

    #[test]
    fn test_identical_curves_have_zero_gap() {
        let c = curve(&[1.0, 0.8, 0.5], &[0.7, 0.8, 0.95]);
        let pair = GroupPair::new((0, &c), (1, &c));
        assert_eq!(pair.area_between().unwrap(), 0.0);
    }

    #[test]
    fn test_gap_over_matched_coverage_only() {
        let a = curve(&[1.0, 0.8, 0.5], &[0.7, 0.8, 0.9]);
        let b = curve(&[1.0, 0.8004, 0.3], &[0.6, 0.5, 1.0]);
        let pair = GroupPair::new((0, &a), (1, &b));

        let aligned = pair.aligned();
        assert_eq!(aligned.len(), 2);
        // |0.7 - 0.6| and |0.8 - 0.5|
        assert!((pair.area_between().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_rounded_coverage_counts_once() {
        let a = curve(&[1.0, 1.0, 0.5], &[0.5, 0.9, 0.9]);
        let b = curve(&[1.0, 0.9999, 0.5], &[0.5, 0.1, 0.9]);
        let pair = GroupPair::new((0, &a), (1, &b));

        assert_eq!(pair.aligned().len(), 2);
        assert_eq!(pair.area_between().unwrap(), 0.0);
    }

    #[test]
    fn test_no_common_support_is_an_error() {
        let a = curve(&[1.0, 0.9], &[0.7, 0.8]);
        let b = curve(&[0.5, 0.4], &[0.7, 0.8]);
        let pair = GroupPair::new((3, &a), (7, &b));
        assert_eq!(
            pair.area_between().unwrap_err(),
            EvalError::NoCommonSupport { first: 3, second: 7 }
        );
    }

    #[test]
    fn test_requires_exactly_two_groups() {
        let c = curve(&[1.0], &[1.0]);
        let mut curves = GroupCurves::new();
        curves.insert(0, c.clone());
        assert_eq!(area_between_curves(&curves).unwrap_err(), EvalError::UnsupportedGroupCount(1));

        curves.insert(1, c.clone());
        assert_eq!(area_between_curves(&curves).unwrap(), 0.0);

        curves.insert(2, c);
        assert_eq!(area_between_curves(&curves).unwrap_err(), EvalError::UnsupportedGroupCount(3));
    }

    #[test]
    fn test_pair_orders_by_label() {
        let c = curve(&[1.0], &[1.0]);
        let mut curves = GroupCurves::new();
        curves.insert(5, c.clone());
        curves.insert(-2, c);
        assert_eq!(GroupPair::from_curves(&curves).unwrap().labels(), (-2, 5));
    }
}
