//! ReturnForge: retail return-risk pipeline
//!
//! This is the main entrypoint that runs the feature pipeline, checkpoints the
//! SKU feature table, and trains and evaluates the return-risk model.

use anyhow::Result;
use clap::Parser;
use returnforge::config::files;
use returnforge::{run_feature_pipeline, run_model_stage, Args};
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.to_config()?;

    if args.verbose {
        println!("ReturnForge - SKU Return Risk Pipeline");
        println!("======================================\n");
        println!("  Input file: {}", config.input.display());
        println!("  Output directory: {}", config.output_dir.display());
        println!("  Seed: {}\n", config.seed);
    }

    let start_time = Instant::now();

    // Step 1: Clean, partition, engineer features and export
    let feature_start = Instant::now();
    let tables = run_feature_pipeline(&config)?;
    let feature_time = feature_start.elapsed();

    println!("\n✓ Feature tables exported: {} SKUs", tables.sku_features.len());
    if args.verbose {
        println!("  Processing time: {:.2}s", feature_time.as_secs_f64());
    }

    // Step 2: Train and evaluate from the SKU feature checkpoint
    let model_start = Instant::now();
    let output = run_model_stage(&config, &tables.known_keys())?;
    let model_time = model_start.elapsed();

    println!("✓ Model fitted in {} iterations", output.model.n_iter);
    if args.verbose {
        println!("  Fitting time: {:.2}s", model_time.as_secs_f64());
        println!("  Intercept: {:.4}", output.model.intercept);
    }

    println!("\nData cleaning complete! Files saved:");
    for file in files::ALL {
        println!("- {}", config.output_path(file).display());
    }

    if args.verbose {
        let total_time = start_time.elapsed();
        println!("\nTotal processing time: {:.2}s", total_time.as_secs_f64());
    }

    Ok(())
}
