// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible fairness evaluation pipeline
//!
//! Orchestrates:
//! - Batch loading (CSV files or seeded synthetic batches)
//! - One engine call per run
//! - Optional shuffled-attribute control
//! - Aggregation of scalar results across runs
//! - Results serialization (JSON, curve CSV, Markdown)

use crate::datasets::{fingerprint, RandomState, SampleBatch};
use crate::margin::MARGIN_BOUND;
use crate::metrics::{GroupReport, RunAggregate};
use crate::partition::GroupLabel;
use crate::statistics::{CurveGap, EvaluationStatistics, MarginHistogram};
use crate::sweep::{Curve, MetricKind, ThresholdGrid, DEFAULT_TAU_STEP};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for the evaluation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// One synthetic run per seed; CSV runs take their shuffle seed from here
    pub seeds: Vec<u64>,
    /// "synthetic" or "csv"
    pub dataset_id: String,
    /// One batch file per run (CSV mode)
    pub dataset_paths: Vec<String>,
    /// Samples per synthetic batch
    pub synthetic_size: usize,
    /// Distance between consecutive rejection thresholds
    pub tau_step: f64,
    /// Also measure the precision gap with permuted attributes
    pub shuffle_control: bool,
    /// Output directory for results
    pub output_dir: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seeds: vec![42],
            dataset_id: "synthetic".to_string(),
            dataset_paths: vec![],
            synthetic_size: 1000,
            tau_step: DEFAULT_TAU_STEP,
            shuffle_control: false,
            output_dir: "eval/results".to_string(),
        }
    }
}

impl EvaluationConfig {
    /// Load a config serialized as JSON; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tau_step.is_finite() || self.tau_step <= 0.0 {
            bail!("tau_step must be finite and positive, got {}", self.tau_step);
        }
        // Margins saturate at the bound, so this caps the grid for any batch
        ThresholdGrid::check_step(MARGIN_BOUND, self.tau_step)?;
        if self.seeds.is_empty() {
            bail!("at least one seed is required");
        }
        match self.dataset_id.as_str() {
            "synthetic" => {
                if self.synthetic_size == 0 {
                    bail!("synthetic_size must be positive");
                }
            }
            "csv" => {
                if self.dataset_paths.is_empty() {
                    bail!("csv mode needs at least one batch path");
                }
            }
            other => bail!("unknown dataset '{}', expected 'synthetic' or 'csv'", other),
        }
        Ok(())
    }
}

/// Where a run's batch came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSource {
    pub name: String,
    pub seed: u64,
    pub path: Option<String>,
    /// SHA-256 of the batch file
    pub sha256: Option<String>,
}

/// Scalar results of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub source: BatchSource,
    pub samples: usize,
    pub group_sizes: BTreeMap<GroupLabel, usize>,
    pub grid_points: usize,
    pub area_under_curve: f64,
    pub accuracy_gap: CurveGap,
    pub precision_gap: CurveGap,
    pub shuffled_precision_gap: Option<f64>,
    pub group_accuracy_areas: BTreeMap<GroupLabel, f64>,
    pub group_precision_areas: BTreeMap<GroupLabel, f64>,
    pub classification: GroupReport,
    pub margin_histograms: BTreeMap<GroupLabel, MarginHistogram>,
}

/// Scalars aggregated over all runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub runs: usize,
    pub area_under_curve: RunAggregate,
    pub accuracy_gap: RunAggregate,
    pub precision_gap: RunAggregate,
    pub shuffled_precision_gap: Option<RunAggregate>,
}

impl EvaluationSummary {
    fn from_runs(runs: &[RunResult]) -> Result<Self> {
        let collect = |f: fn(&RunResult) -> f64| -> Result<RunAggregate> {
            let values: Vec<f64> = runs.iter().map(f).collect();
            RunAggregate::from_values(&values).context("no runs to summarize")
        };

        let shuffled: Vec<f64> = runs.iter().filter_map(|r| r.shuffled_precision_gap).collect();

        Ok(Self {
            runs: runs.len(),
            area_under_curve: collect(|r| r.area_under_curve)?,
            accuracy_gap: collect(|r| r.accuracy_gap.value)?,
            precision_gap: collect(|r| r.precision_gap.value)?,
            shuffled_precision_gap: RunAggregate::from_values(&shuffled),
        })
    }
}

/// Complete evaluation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub config: EvaluationConfig,
    pub runs: Vec<RunResult>,
    pub summary: EvaluationSummary,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Suffix colliding run names with their run index so output files stay distinct
fn disambiguate_names(batches: &mut [(BatchSource, SampleBatch)]) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (source, _) in batches.iter() {
        *counts.entry(source.name.clone()).or_default() += 1;
    }
    for (idx, (source, _)) in batches.iter_mut().enumerate() {
        if counts.get(&source.name).copied().unwrap_or(0) > 1 {
            source.name = format!("{}-{}", source.name, idx);
        }
    }
}

/// One row of a curve export
#[derive(Debug, Serialize)]
struct CurveRow<'a> {
    kind: &'a str,
    group: String,
    tau: f64,
    coverage: f64,
    metric: f64,
}

/// Main evaluation pipeline
pub struct EvaluationPipeline {
    config: EvaluationConfig,
    statistics: Vec<(String, EvaluationStatistics)>,
}

impl EvaluationPipeline {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            statistics: Vec::new(),
        }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Load every batch the configuration names
    fn load_batches(&self) -> Result<Vec<(BatchSource, SampleBatch)>> {
        let mut batches = self.read_batches()?;
        disambiguate_names(&mut batches);
        Ok(batches)
    }

    fn read_batches(&self) -> Result<Vec<(BatchSource, SampleBatch)>> {
        match self.config.dataset_id.as_str() {
            "csv" => self
                .config
                .dataset_paths
                .iter()
                .enumerate()
                .map(|(idx, path)| -> Result<(BatchSource, SampleBatch)> {
                    let path_ref = Path::new(path);
                    tracing::info!("Loading batch from {}", path_ref.display());
                    let batch = SampleBatch::load_csv(path_ref)?;
                    let name = path_ref
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| format!("batch{}", idx));
                    let source = BatchSource {
                        name,
                        seed: self.config.seeds[idx % self.config.seeds.len()],
                        path: Some(path.clone()),
                        sha256: Some(fingerprint(path_ref)?),
                    };
                    Ok((source, batch))
                })
                .collect(),
            _ => self
                .config
                .seeds
                .iter()
                .map(|&seed| -> Result<(BatchSource, SampleBatch)> {
                    tracing::info!("Generating synthetic batch ({} samples, seed={})", self.config.synthetic_size, seed);
                    let mut state = RandomState::new(seed);
                    let batch = SampleBatch::synthetic(self.config.synthetic_size, &mut state)?;
                    let source = BatchSource {
                        name: format!("synthetic-seed{}", seed),
                        seed,
                        path: None,
                        sha256: None,
                    };
                    Ok((source, batch))
                })
                .collect(),
        }
    }

    /// Evaluate one batch
    pub fn evaluate_batch(&self, source: BatchSource, batch: &SampleBatch) -> Result<(RunResult, EvaluationStatistics)> {
        let stats = EvaluationStatistics::compute(batch, self.config.tau_step)
            .with_context(|| format!("Evaluation failed for {}", source.name))?;

        let shuffled_precision_gap = if self.config.shuffle_control {
            // Offset so the control never reuses the synthetic generator's stream
            let mut state = RandomState::new(source.seed.wrapping_add(1));
            let shuffled = state.permute_attributes(batch);
            let control = EvaluationStatistics::compute(&shuffled, self.config.tau_step)
                .with_context(|| format!("Shuffled control failed for {}", source.name))?;
            Some(control.precision_gap.value)
        } else {
            None
        };

        let result = RunResult {
            samples: batch.len(),
            group_sizes: batch.group_distribution(),
            grid_points: stats.grid.len(),
            area_under_curve: stats.area_under_curve,
            accuracy_gap: stats.accuracy_gap,
            precision_gap: stats.precision_gap,
            shuffled_precision_gap,
            group_accuracy_areas: stats.group_areas(MetricKind::Accuracy)?,
            group_precision_areas: stats.group_areas(MetricKind::Precision)?,
            classification: GroupReport::from_batch(batch),
            margin_histograms: stats.margin_histograms(),
            source,
        };

        Ok((result, stats))
    }

    /// Run every configured batch and aggregate
    pub fn run(&mut self) -> Result<EvaluationResults> {
        self.config.validate()?;
        let batches = self.load_batches()?;

        let pb = ProgressBar::new(batches.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Evaluating: [{wide_bar:.cyan/blue}] {pos}/{len}")?
                .progress_chars("#>-"),
        );

        let mut runs = Vec::with_capacity(batches.len());
        self.statistics.clear();

        for (source, batch) in batches {
            let name = source.name.clone();
            let (result, stats) = self.evaluate_batch(source, &batch)?;

            tracing::info!(
                "  {} - AUC: {:.4}, accuracy gap: {:.4}, precision gap: {:.4}",
                name,
                result.area_under_curve,
                result.accuracy_gap.value,
                result.precision_gap.value
            );

            runs.push(result);
            self.statistics.push((name, stats));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let summary = EvaluationSummary::from_runs(&runs)?;

        Ok(EvaluationResults {
            config: self.config.clone(),
            runs,
            summary,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Save results to JSON file
    pub fn save_results(results: &EvaluationResults, output_path: &Path) -> Result<()> {
        let parent = output_path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        tracing::info!("Results saved to {}", output_path.display());
        Ok(())
    }

    /// Write each run's curves as `curves_<run>.csv`, coverage ascending.
    ///
    /// The overall accuracy curve is written with group `all`.
    pub fn save_curves(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let curves_dir = output_dir.join("curves");
        std::fs::create_dir_all(&curves_dir)
            .with_context(|| format!("Failed to create directory {}", curves_dir.display()))?;

        let mut saved_paths = Vec::new();

        for (name, stats) in &self.statistics {
            let path = curves_dir.join(format!("curves_{}.csv", name));
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;

            let taus: Vec<f64> = stats.grid.taus().iter().rev().copied().collect();
            let mut write_curve = |kind: &str, group: String, curve: &Curve| -> Result<()> {
                let shown = curve.presentation();
                for ((coverage, metric), tau) in shown.points().zip(taus.iter()) {
                    writer.serialize(CurveRow {
                        kind,
                        group: group.clone(),
                        tau: *tau,
                        coverage,
                        metric,
                    })?;
                }
                Ok(())
            };

            write_curve(MetricKind::Accuracy.as_str(), "all".to_string(), &stats.overall_curve)?;
            for kind in [MetricKind::Accuracy, MetricKind::Precision] {
                for (group, curve) in stats.curves(kind) {
                    write_curve(kind.as_str(), group.to_string(), curve)?;
                }
            }
            writer.flush()?;

            tracing::info!("Curves saved: {}", path.display());
            saved_paths.push(path);
        }

        Ok(saved_paths)
    }

    /// Generate a markdown report
    pub fn generate_report(results: &EvaluationResults) -> String {
        let mut report = String::new();

        report.push_str("# Group Fairness Evaluation Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        report.push_str("## Summary\n\n");
        let summary = &results.summary;
        report.push_str(&format!("- **Runs:** {}\n", summary.runs));
        report.push_str(&format!("- **Area under accuracy-coverage curve:** {}\n", summary.area_under_curve.format()));
        report.push_str(&format!("- **Accuracy gap (area between curves):** {}\n", summary.accuracy_gap.format()));
        report.push_str(&format!("- **Precision gap (area between curves):** {}\n", summary.precision_gap.format()));
        if let Some(ref shuffled) = summary.shuffled_precision_gap {
            report.push_str(&format!("- **Precision gap, shuffled attributes:** {}\n", shuffled.format()));
        }

        report.push_str("\n### Runs\n\n");
        report.push_str("| Run | Samples | Groups | AUC | Accuracy Gap | Precision Gap | Shuffled |\n");
        report.push_str("|-----|---------|--------|-----|--------------|---------------|----------|\n");

        for run in &results.runs {
            let shuffled = run.shuffled_precision_gap.map_or("-".to_string(), |v| format!("{:.4}", v));
            report.push_str(&format!(
                "| {} | {} | {} | {:.4} | {:.4} | {:.4} | {} |\n",
                run.source.name,
                run.samples,
                run.group_sizes.len(),
                run.area_under_curve,
                run.accuracy_gap.value,
                run.precision_gap.value,
                shuffled
            ));
        }

        report.push_str("\n## Detailed Results\n\n");

        for run in &results.runs {
            report.push_str(&format!("### {}\n\n", run.source.name));
            if let Some(ref path) = run.source.path {
                report.push_str(&format!("- Input: `{}`\n", path));
            }
            if let Some(ref sha) = run.source.sha256 {
                report.push_str(&format!("- SHA-256: `{}`\n", sha));
            }
            report.push_str(&format!("- Seed: {}\n", run.source.seed));
            report.push_str(&format!("- Thresholds: {}\n", run.grid_points));
            report.push_str(&format!(
                "- Matched coverage points: accuracy {}, precision {}\n\n",
                run.accuracy_gap.matched_points, run.precision_gap.matched_points
            ));

            report.push_str("| Group | Samples | Accuracy AUC | Precision AUC |\n");
            report.push_str("|-------|---------|--------------|---------------|\n");
            for (group, size) in &run.group_sizes {
                let acc = run.group_accuracy_areas.get(group).map_or("-".to_string(), |v| format!("{:.4}", v));
                let prec = run.group_precision_areas.get(group).map_or("-".to_string(), |v| format!("{:.4}", v));
                report.push_str(&format!("| {} | {} | {} | {} |\n", group, size, acc, prec));
            }

            report.push_str("\n#### Classification\n\n");
            report.push_str(&format!("```\n{}```\n\n", run.classification.format()));
        }

        report.push_str("## Configuration\n\n");
        report.push_str(&format!("```json\n{}\n```\n", serde_json::to_string_pretty(&results.config).unwrap_or_default()));

        report
    }
}
