// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Splitting per-sample values by group attribute

use crate::datasets::SampleBatch;
use crate::error::{EvalError, Result};
use crate::margin::{margin, predicted_label};
use crate::sweep::MetricKind;
use std::collections::BTreeMap;

/// Discrete sensitive-attribute value
pub type GroupLabel = i64;

/// Per-group margin sequences, ordered by label
pub type GroupMargins = BTreeMap<GroupLabel, Vec<f64>>;

/// Split `values` into one subsequence per distinct label.
///
/// Equivalent to a stable sort by label followed by splitting into runs:
/// groups come out in ascending label order and samples keep their original
/// relative order inside a group. Fails when `values` and `labels` differ
/// in length.
pub fn partition<T: Clone>(values: &[T], labels: &[GroupLabel]) -> Result<BTreeMap<GroupLabel, Vec<T>>> {
    if values.len() != labels.len() {
        return Err(EvalError::MisalignedSequences {
            values: values.len(),
            paired: labels.len(),
        });
    }
    let mut groups: BTreeMap<GroupLabel, Vec<T>> = BTreeMap::new();
    for (value, label) in values.iter().zip(labels.iter()) {
        groups.entry(*label).or_default().push(value.clone());
    }
    Ok(groups)
}

/// Margins per group.
///
/// For [`MetricKind::Precision`] each group keeps only its predicted positives
/// (`round(p) == 1`). A group with no predicted positives still appears, with
/// an empty sequence, so keys always match the batch's distinct attributes.
pub fn group_margins(batch: &SampleBatch, kind: MetricKind) -> GroupMargins {
    let mut groups = GroupMargins::new();
    let samples = batch
        .predictions()
        .iter()
        .zip(batch.targets())
        .zip(batch.attributes());

    for ((&prediction, &target), &group) in samples {
        let entry = groups.entry(group).or_default();
        if kind == MetricKind::Precision && predicted_label(prediction) != 1 {
            continue;
        }
        entry.push(margin(prediction, target));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_orders_groups_and_keeps_relative_order() {
        let values = vec!["a", "b", "c", "d", "e"];
        let labels = vec![2, 0, 2, 1, 0];

        let groups = partition(&values, &labels).unwrap();
        let keys: Vec<_> = groups.keys().copied().collect();

        assert_eq!(keys, vec![0, 1, 2]);
        assert_eq!(groups[&0], vec!["b", "e"]);
        assert_eq!(groups[&1], vec!["d"]);
        assert_eq!(groups[&2], vec!["a", "c"]);
    }

    #[test]
    fn test_partition_is_exhaustive() {
        let values: Vec<i32> = (0..50).collect();
        let labels: Vec<GroupLabel> = (0..50).map(|i| (i * 7 % 3) as GroupLabel).collect();

        let groups = partition(&values, &labels).unwrap();
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, values.len());

        let mut recovered: Vec<i32> = groups.into_values().flatten().collect();
        recovered.sort_unstable();
        assert_eq!(recovered, values);
    }

    #[test]
    fn test_partition_rejects_misaligned_labels() {
        let err = partition(&[1.0, 2.0, 3.0], &[0]).unwrap_err();
        assert_eq!(err, EvalError::MisalignedSequences { values: 3, paired: 1 });
    }

    #[test]
    fn test_group_margins_accuracy() {
        let batch = SampleBatch::new(vec![0.9, 0.2, 0.6, 0.4], vec![1, 0, 1, 0], vec![0, 0, 1, 1]).unwrap();
        let groups = group_margins(&batch, MetricKind::Accuracy);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&0], vec![margin(0.9, 1), margin(0.2, 0)]);
        assert_eq!(groups[&1], vec![margin(0.6, 1), margin(0.4, 0)]);
    }

    #[test]
    fn test_group_margins_precision_keeps_predicted_positives() {
        let batch = SampleBatch::new(vec![0.9, 0.2, 0.6, 0.4], vec![1, 0, 0, 0], vec![0, 0, 1, 1]).unwrap();
        let groups = group_margins(&batch, MetricKind::Precision);

        assert_eq!(groups[&0], vec![margin(0.9, 1)]);
        assert_eq!(groups[&1], vec![margin(0.6, 0)]);
        assert!(groups[&1][0] < 0.0);
    }

    #[test]
    fn test_group_without_positives_is_kept_empty() {
        let batch = SampleBatch::new(vec![0.9, 0.1], vec![1, 0], vec![0, 1]).unwrap();
        let groups = group_margins(&batch, MetricKind::Precision);
        assert!(groups[&1].is_empty());
    }
}
