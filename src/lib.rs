//! ReturnForge: a Rust pipeline for retail return-risk analysis
//!
//! This library cleans a raw retail transaction export, splits it into sales and
//! returns, derives per-product financial and return-rate features, and trains a
//! class-balanced logistic regression that ranks products by return risk.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod dimensions;
pub mod export;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod rng;

// Re-export public items for easier access
pub use cli::Args;
pub use config::PipelineConfig;
pub use data::{clean_transactions, load_transactions, partition, RawTransaction, Transaction};
pub use model::{run_risk_model, ClassificationReport, LogisticRegressionParams, RiskPrediction};
pub use pipeline::{build_feature_tables, run_feature_pipeline, run_model_stage, FeatureTables};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
