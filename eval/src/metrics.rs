// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Plain classification metrics, overall and per group, and aggregation of
//! scalar results across independent runs
//!
//! Decisions use the same `round(p)` rule as the margins, so the accuracy at
//! full coverage equals the accuracy reported here.

use crate::datasets::SampleBatch;
use crate::margin::predicted_label;
use crate::partition::GroupLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Tally `(prediction, target)` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, u8)>,
    {
        let mut matrix = Self::default();
        for (prediction, target) in pairs {
            matrix.record(prediction, target);
        }
        matrix
    }

    pub fn record(&mut self, prediction: f64, target: u8) {
        match (predicted_label(prediction), target) {
            (1, 1) => self.tp += 1,
            (0, 0) => self.tn += 1,
            (1, _) => self.fp += 1,
            _ => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall: TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        let denom = precision + recall;
        if denom == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / denom
    }

    /// Fraction of samples predicted positive
    pub fn positive_rate(&self) -> f64 {
        ratio(self.tp + self.fp, self.total())
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    num as f64 / denom as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub positive_rate: f64,
    pub support: usize,
}

impl ClassificationReport {
    pub fn from_confusion_matrix(cm: ConfusionMatrix) -> Self {
        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            positive_rate: cm.positive_rate(),
            support: cm.total(),
            confusion_matrix: cm,
        }
    }

    /// One-line summary
    pub fn format_line(&self) -> String {
        format!(
            "Acc={:.4} P={:.4} R={:.4} F1={:.4} PosRate={:.4} (n={})",
            self.accuracy, self.precision, self.recall, self.f1_score, self.positive_rate, self.support
        )
    }
}

/// Overall and per-group classification reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub overall: ClassificationReport,
    pub per_group: BTreeMap<GroupLabel, ClassificationReport>,
}

impl GroupReport {
    pub fn from_batch(batch: &SampleBatch) -> Self {
        let pairs = || batch.predictions().iter().copied().zip(batch.targets().iter().copied());
        let overall = ClassificationReport::from_confusion_matrix(ConfusionMatrix::from_pairs(pairs()));

        let mut matrices: BTreeMap<GroupLabel, ConfusionMatrix> = BTreeMap::new();
        for ((prediction, target), &group) in pairs().zip(batch.attributes()) {
            matrices.entry(group).or_default().record(prediction, target);
        }

        let per_group = matrices
            .into_iter()
            .map(|(group, cm)| (group, ClassificationReport::from_confusion_matrix(cm)))
            .collect();

        Self { overall, per_group }
    }

    /// Largest minus smallest per-group accuracy
    pub fn accuracy_spread(&self) -> f64 {
        spread(self.per_group.values().map(|r| r.accuracy))
    }

    /// Largest minus smallest per-group precision
    pub fn precision_spread(&self) -> f64 {
        spread(self.per_group.values().map(|r| r.precision))
    }

    pub fn format(&self) -> String {
        let mut output = format!("Overall:  {}\n", self.overall.format_line());
        for (group, report) in &self.per_group {
            output.push_str(&format!("Group {:>3}: {}\n", group, report.format_line()));
        }
        output
    }
}

fn spread(values: impl Iterator<Item = f64>) -> f64 {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi < lo {
        0.0
    } else {
        hi - lo
    }
}

/// Summary of one scalar collected over several runs (e.g. seeds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunAggregate {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl RunAggregate {
    /// `None` for an empty collection
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            count: values.len(),
            mean,
            std_dev: variance.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    pub fn format(&self) -> String {
        format!("{:.4} ± {:.4} (n={})", self.mean, self.std_dev, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let cm = ConfusionMatrix::from_pairs([(0.9, 1), (0.2, 0), (0.6, 0), (0.4, 1), (0.5, 1)]);
        assert_eq!(cm, ConfusionMatrix { tp: 2, tn: 1, fp: 1, fn_: 1 });
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
        assert!((cm.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_matrix_is_zero() {
        let cm = ConfusionMatrix::default();
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.f1_score(), 0.0);
    }

    #[test]
    fn test_group_report() {
        let batch = SampleBatch::new(vec![0.9, 0.2, 0.6, 0.4], vec![1, 0, 0, 0], vec![0, 0, 1, 1]).unwrap();
        let report = GroupReport::from_batch(&batch);

        assert_eq!(report.overall.support, 4);
        assert_eq!(report.per_group[&0].accuracy, 1.0);
        assert_eq!(report.per_group[&1].accuracy, 0.5);
        assert_eq!(report.per_group[&1].precision, 0.0);
        assert!((report.accuracy_spread() - 0.5).abs() < 1e-12);
        assert!((report.precision_spread() - 1.0).abs() < 1e-12);
        assert!(report.format().contains("Group   1"));
    }

    #[test]
    fn test_run_aggregate() {
        let agg = RunAggregate::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(agg.count, 4);
        assert!((agg.mean - 2.5).abs() < 1e-12);
        assert!((agg.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(agg.min, 1.0);
        assert_eq!(agg.max, 4.0);
        assert!(RunAggregate::from_values(&[]).is_none());
    }
}
