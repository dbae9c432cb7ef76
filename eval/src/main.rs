// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fairness evaluation CLI
//!
//! Usage:
//!   fair-eval --dataset synthetic --seeds 42,43,44
//!   fair-eval --dataset csv --input run1.csv --input run2.csv --shuffle-control

use anyhow::{Context, Result};
use clap::Parser;
use fairness_eval::pipeline::{EvaluationConfig, EvaluationPipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fair-eval")]
#[command(about = "Margin-based accuracy/precision-coverage fairness evaluation")]
#[command(version)]
struct Args {
    /// Batch source (synthetic, csv)
    #[arg(short, long, default_value = "synthetic")]
    dataset: String,

    /// Batch CSV file with columns prediction,target,attribute (repeatable, one run each)
    #[arg(short, long)]
    input: Vec<PathBuf>,

    /// Random seeds, comma-separated
    #[arg(short, long, default_value = "42")]
    seeds: String,

    /// Samples per synthetic batch
    #[arg(long, default_value_t = 1000)]
    size: usize,

    /// Rejection threshold step
    #[arg(long, default_value_t = fairness_eval::DEFAULT_TAU_STEP)]
    step: f64,

    /// Also report the precision gap with randomly permuted attributes
    #[arg(long)]
    shuffle_control: bool,

    /// Load the configuration from a JSON file instead of flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long, default_value = "eval/results")]
    output: PathBuf,

    /// Output format (json, markdown, both)
    #[arg(short, long, default_value = "both")]
    format: String,

    /// Skip writing per-run curve CSV files
    #[arg(long)]
    no_curves: bool,
}

fn parse_seeds(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map_err(|e| anyhow::anyhow!("invalid seed '{}': {}", s, e)))
        .collect()
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => EvaluationConfig::from_json_file(path)?,
        None => EvaluationConfig {
            seeds: parse_seeds(&args.seeds)?,
            dataset_id: args.dataset.clone(),
            dataset_paths: args.input.iter().map(|p| p.to_string_lossy().to_string()).collect(),
            synthetic_size: args.size,
            tau_step: args.step,
            shuffle_control: args.shuffle_control,
            output_dir: args.output.to_string_lossy().to_string(),
        },
    };
    let output = PathBuf::from(&config.output_dir);

    tracing::info!("Group Fairness Evaluation Pipeline");
    tracing::info!("==================================");
    tracing::info!("Dataset: {}", config.dataset_id);
    tracing::info!("Seeds: {:?}", config.seeds);
    tracing::info!("Threshold step: {}", config.tau_step);

    let dataset_id = config.dataset_id.clone();
    let mut pipeline = EvaluationPipeline::new(config);
    let results = pipeline.run()?;

    // Print summary to console
    println!("\n{}", "=".repeat(78));
    println!("EVALUATION SUMMARY");
    println!("{}", "=".repeat(78));
    println!("{:<24} {:>8} {:>10} {:>12} {:>12} {:>8}", "Run", "Samples", "AUC", "Acc Gap", "Prec Gap", "Shuffled");
    println!("{:-<78}", "");

    for run in &results.runs {
        let shuffled = run.shuffled_precision_gap.map_or("-".to_string(), |v| format!("{:.4}", v));
        println!(
            "{:<24} {:>8} {:>10.4} {:>12.4} {:>12.4} {:>8}",
            run.source.name,
            run.samples,
            run.area_under_curve,
            run.accuracy_gap.value,
            run.precision_gap.value,
            shuffled
        );
    }
    println!("{:-<78}", "");

    let summary = &results.summary;
    println!("AUC:           {}", summary.area_under_curve.format());
    println!("Accuracy gap:  {}", summary.accuracy_gap.format());
    println!("Precision gap: {}", summary.precision_gap.format());
    if let Some(ref shuffled) = summary.shuffled_precision_gap {
        println!("Shuffled gap:  {}", shuffled.format());
    }

    // Save outputs
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");

    if args.format == "json" || args.format == "both" {
        let json_path = output.join(format!("eval_{}_{}.json", dataset_id, timestamp));
        EvaluationPipeline::save_results(&results, &json_path)?;
        println!("\nJSON results saved to: {}", json_path.display());
    }

    if args.format == "markdown" || args.format == "both" {
        let report = EvaluationPipeline::generate_report(&results);
        let md_path = output.join(format!("eval_{}_{}.md", dataset_id, timestamp));
        std::fs::write(&md_path, report)?;
        println!("Markdown report saved to: {}", md_path.display());
    }

    if !args.no_curves {
        let curves = pipeline.save_curves(&output)?;
        println!("Curves saved to: {}/curves/ ({} files)", output.display(), curves.len());
    }

    println!("\nEvaluation complete!");

    Ok(())
}
