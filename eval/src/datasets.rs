// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Sample batches: the aligned (prediction, target, attribute) sequences the
//! engine consumes, plus CSV loading, synthetic generation and seeded
//! randomness.

use crate::error::{EvalError, Result};
use crate::margin::predicted_label;
use crate::partition::GroupLabel;
use anyhow::Context;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Three equal-length sequences where index `i` always refers to the same sample
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    predictions: Vec<f64>,
    targets: Vec<u8>,
    attributes: Vec<GroupLabel>,
}

/// One CSV row of a batch file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchRow {
    prediction: f64,
    target: u8,
    attribute: GroupLabel,
}

impl SampleBatch {
    /// Validate and build a batch.
    ///
    /// Rejects empty or misaligned input, predictions outside [0, 1] (NaN
    /// included) and non-binary targets. Predictions of exactly 0 or 1 are
    /// accepted; their margins saturate.
    pub fn new(predictions: Vec<f64>, targets: Vec<u8>, attributes: Vec<GroupLabel>) -> Result<Self> {
        if predictions.len() != targets.len() || predictions.len() != attributes.len() {
            return Err(EvalError::LengthMismatch {
                predictions: predictions.len(),
                targets: targets.len(),
                attributes: attributes.len(),
            });
        }
        if predictions.is_empty() {
            return Err(EvalError::EmptyBatch);
        }
        if let Some((index, &value)) = predictions
            .iter()
            .enumerate()
            .find(|(_, p)| !(0.0..=1.0).contains(*p))
        {
            return Err(EvalError::InvalidPrediction { index, value });
        }
        if let Some((index, &value)) = targets.iter().enumerate().find(|(_, t)| **t > 1) {
            return Err(EvalError::InvalidTarget { index, value });
        }

        Ok(Self {
            predictions,
            targets,
            attributes,
        })
    }

    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    pub fn targets(&self) -> &[u8] {
        &self.targets
    }

    pub fn attributes(&self) -> &[GroupLabel] {
        &self.attributes
    }

    /// Number of samples (never zero)
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Hard decisions under the `round(p)` rule
    pub fn predicted_labels(&self) -> Vec<u8> {
        self.predictions.iter().map(|&p| predicted_label(p)).collect()
    }

    /// Number of samples per group, ordered by label
    pub fn group_distribution(&self) -> BTreeMap<GroupLabel, usize> {
        let mut dist = BTreeMap::new();
        for &attribute in &self.attributes {
            *dist.entry(attribute).or_insert(0) += 1;
        }
        dist
    }

    pub fn group_count(&self) -> usize {
        self.group_distribution().len()
    }

    /// Load a batch from a CSV file with header `prediction,target,attribute`
    pub fn load_csv(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open batch file: {}", path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut predictions = Vec::new();
        let mut targets = Vec::new();
        let mut attributes = Vec::new();

        for (idx, result) in reader.deserialize::<BatchRow>().enumerate() {
            let row = result.with_context(|| format!("Failed to read row {} in {}", idx + 1, path.display()))?;
            predictions.push(row.prediction);
            targets.push(row.target);
            attributes.push(row.attribute);
        }

        tracing::debug!("Read {} rows from {}", predictions.len(), path.display());

        Self::new(predictions, targets, attributes)
            .with_context(|| format!("Invalid batch in {}", path.display()))
    }

    /// Write the batch in the same CSV layout `load_csv` reads
    pub fn save_csv(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create batch file: {}", path.display()))?;
        for i in 0..self.len() {
            writer.serialize(BatchRow {
                prediction: self.predictions[i],
                target: self.targets[i],
                attribute: self.attributes[i],
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate a two-group batch where group 1 is classified less reliably.
    ///
    /// Correct predictions are drawn more confident than incorrect ones, so the
    /// accuracy-coverage curves rise as the threshold grows.
    pub fn synthetic(size: usize, state: &mut RandomState) -> Result<Self> {
        let rng = state.rng();
        let mut predictions = Vec::with_capacity(size);
        let mut targets = Vec::with_capacity(size);
        let mut attributes = Vec::with_capacity(size);

        for _ in 0..size {
            let group: GroupLabel = if rng.gen_bool(0.5) { 1 } else { 0 };
            let target: u8 = if rng.gen_bool(0.5) { 1 } else { 0 };
            let reliability = if group == 0 { 0.85 } else { 0.7 };
            let correct = rng.gen_bool(reliability);

            // Stay clear of 0.5 so the decision never flips through rounding
            let confidence: f64 = if correct {
                rng.gen_range(0.55..0.999)
            } else {
                rng.gen_range(0.501..0.8)
            };
            let leans_positive = correct == (target == 1);
            let prediction = if leans_positive { confidence } else { 1.0 - confidence };

            predictions.push(prediction);
            targets.push(target);
            attributes.push(group);
        }

        Self::new(predictions, targets, attributes)
    }
}

/// Explicit seeded generator threaded into every stochastic step
#[derive(Debug, Clone)]
pub struct RandomState {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomState {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Same batch with the attribute column randomly permuted.
    ///
    /// Breaks any link between group membership and the model's behaviour,
    /// which gives a group-agnostic reference for the fairness gap.
    pub fn permute_attributes(&mut self, batch: &SampleBatch) -> SampleBatch {
        let mut attributes = batch.attributes.clone();
        attributes.shuffle(&mut self.rng);
        SampleBatch {
            predictions: batch.predictions.clone(),
            targets: batch.targets.clone(),
            attributes,
        }
    }
}

/// SHA-256 of a file, hex encoded
pub fn fingerprint(path: &Path) -> anyhow::Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
