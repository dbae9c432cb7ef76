// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Standalone batch inspector
//!
//! Prints the group distribution, per-group classification report and the
//! engine's scalars for one batch, and can export synthetic batches as CSV.

use anyhow::Result;
use clap::Parser;
use fairness_eval::datasets::{RandomState, SampleBatch};
use fairness_eval::metrics::GroupReport;
use fairness_eval::statistics::EvaluationStatistics;
use fairness_eval::sweep::MetricKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "inspect-batch")]
#[command(about = "Inspect a single prediction batch")]
#[command(version)]
struct Args {
    /// Batch CSV file; a synthetic batch is generated when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Random seed for the synthetic batch
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of samples for the synthetic batch
    #[arg(short, long, default_value_t = 1000)]
    num_samples: usize,

    /// Rejection threshold step
    #[arg(long, default_value_t = fairness_eval::DEFAULT_TAU_STEP)]
    step: f64,

    /// Write the batch to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let batch = match args.input {
        Some(ref path) => {
            tracing::info!("Loading batch from {}", path.display());
            SampleBatch::load_csv(path)?
        }
        None => {
            tracing::info!("Generating synthetic batch ({} samples, seed={})", args.num_samples, args.seed);
            SampleBatch::synthetic(args.num_samples, &mut RandomState::new(args.seed))?
        }
    };

    if let Some(ref path) = args.export {
        batch.save_csv(path)?;
        println!("Batch written to: {}", path.display());
    }

    println!("\nSamples: {}", batch.len());
    println!("\nGroup distribution:");
    for (group, count) in batch.group_distribution() {
        println!("  Group {}: {} ({:.1}%)", group, count, count as f64 / batch.len() as f64 * 100.0);
    }

    println!("\n{}", "=".repeat(70));
    println!("CLASSIFICATION");
    println!("{}", "=".repeat(70));
    print!("{}", GroupReport::from_batch(&batch).format());

    println!("\n{}", "=".repeat(70));
    println!("SELECTIVE CLASSIFICATION");
    println!("{}", "=".repeat(70));

    // A batch the engine rejects is still worth inspecting above
    match EvaluationStatistics::compute(&batch, args.step) {
        Ok(stats) => {
            println!("Thresholds:          {}", stats.grid.len());
            println!("Area under curve:    {:.4}", stats.area_under_curve);
            println!(
                "Accuracy gap:        {:.4} ({} matched points)",
                stats.accuracy_gap.value, stats.accuracy_gap.matched_points
            );
            println!(
                "Precision gap:       {:.4} ({} matched points)",
                stats.precision_gap.value, stats.precision_gap.matched_points
            );
            for kind in [MetricKind::Accuracy, MetricKind::Precision] {
                for (group, area) in stats.group_areas(kind)? {
                    println!("  Group {} {} AUC: {:.4}", group, kind.as_str(), area);
                }
            }
        }
        Err(e) => {
            tracing::warn!("Engine rejected batch: {}", e);
            println!("Not evaluated: {}", e);
        }
    }

    Ok(())
}
