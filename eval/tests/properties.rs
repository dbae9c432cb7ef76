// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Property tests for the margin, partition and sweep stages

use fairness_eval::area::GroupPair;
use fairness_eval::margin::{margins, predicted_label, MARGIN_BOUND};
use fairness_eval::partition::{partition, GroupLabel};
use fairness_eval::sweep::{Curve, SortedMargins, ThresholdGrid};
use proptest::prelude::*;

fn arb_pairs() -> impl Strategy<Value = Vec<(f64, u8)>> {
    prop::collection::vec(
        (
            prop_oneof![Just(0.0), Just(0.5), Just(1.0), 0.0f64..=1.0],
            0u8..=1,
        ),
        1..200,
    )
}

fn arb_margins() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-MARGIN_BOUND..=MARGIN_BOUND, 1..200)
}

fn naive_frac_below(margins: &[f64], tau: f64) -> f64 {
    margins.iter().filter(|m| **m <= tau).count() as f64 / margins.len() as f64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Margins keep the input length and stay within the saturation bound
    #[test]
    fn margins_are_bounded(pairs in arb_pairs()) {
        let (predictions, targets): (Vec<f64>, Vec<u8>) = pairs.into_iter().unzip();
        let m = margins(&predictions, &targets).unwrap();
        prop_assert_eq!(m.len(), predictions.len());
        for value in &m {
            prop_assert!(value.abs() <= MARGIN_BOUND, "margin out of bounds: {}", value);
        }
    }

    /// A nonzero margin is positive exactly when the rounded prediction is right
    #[test]
    fn margin_sign_encodes_correctness(pairs in arb_pairs()) {
        let (predictions, targets): (Vec<f64>, Vec<u8>) = pairs.into_iter().unzip();
        let m = margins(&predictions, &targets).unwrap();
        for i in 0..m.len() {
            let correct = predicted_label(predictions[i]) == targets[i];
            if m[i] != 0.0 {
                prop_assert_eq!(m[i] > 0.0, correct);
            } else {
                prop_assert_eq!(predictions[i], 0.5);
            }
        }
    }

    /// Partitioning loses and duplicates nothing
    #[test]
    fn partition_round_trip(values in prop::collection::vec(any::<i32>(), 0..200), seed in any::<u64>()) {
        let labels: Vec<GroupLabel> = (0..values.len())
            .map(|i| ((seed.wrapping_add(i as u64 * 2654435761)) % 4) as GroupLabel)
            .collect();

        let groups = partition(&values, &labels).unwrap();
        let total: usize = groups.values().map(Vec::len).sum();
        prop_assert_eq!(total, values.len());

        let mut distinct = labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(groups.keys().copied().collect::<Vec<_>>(), distinct);

        let mut recovered: Vec<i32> = groups.into_values().flatten().collect();
        let mut original = values.clone();
        recovered.sort_unstable();
        original.sort_unstable();
        prop_assert_eq!(recovered, original);
    }

    /// Every sample is covered at τ = 0
    #[test]
    fn full_coverage_at_zero(m in arb_margins()) {
        let sorted = SortedMargins::new(&m).unwrap();
        prop_assert_eq!(sorted.coverage(0.0), 1.0);
    }

    /// Binary-search CDF agrees with a full rescan at every grid threshold
    #[test]
    fn sorted_sweep_matches_rescan(m in arb_margins()) {
        let grid = ThresholdGrid::from_margins(&m, 0.25).unwrap();
        let sorted = SortedMargins::new(&m).unwrap();
        let curve = Curve::sweep(&sorted, &grid);

        for (i, &tau) in grid.taus().iter().enumerate() {
            let below = naive_frac_below(&m, tau);
            let coverage = naive_frac_below(&m, -tau) + 1.0 - below;
            prop_assert!((sorted.frac_below(tau) - below).abs() < 1e-12);
            prop_assert!((curve.coverage()[i] - coverage).abs() < 1e-9);

            let expected = if coverage > 0.0 { (1.0 - below) / coverage } else { 1.0 };
            prop_assert!((curve.metric()[i] - expected).abs() < 1e-9);
        }
    }

    /// Conditional metrics are probabilities and coverage never grows with τ
    #[test]
    fn curve_is_well_formed(m in arb_margins()) {
        let grid = ThresholdGrid::from_margins(&m, 0.1).unwrap();
        let curve = Curve::sweep(&SortedMargins::new(&m).unwrap(), &grid);
        prop_assert!(curve.metric().iter().all(|v| (0.0..=1.0).contains(v)));
        prop_assert!(curve.coverage().windows(2).all(|w| w[0] >= w[1]));
    }

    /// A curve compared with itself has no gap
    #[test]
    fn identical_curves_have_no_gap(m in arb_margins()) {
        let grid = ThresholdGrid::from_margins(&m, 0.1).unwrap();
        let curve = Curve::sweep(&SortedMargins::new(&m).unwrap(), &grid);
        let pair = GroupPair::new((0, &curve), (1, &curve));
        prop_assert_eq!(pair.area_between().unwrap(), 0.0);
    }
}
