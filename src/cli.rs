//! Command-line interface definitions and argument parsing

use crate::config::PipelineConfig;
use clap::Parser;
use std::path::PathBuf;

/// Retail return-risk pipeline: clean transactions, derive SKU features, score return risk
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the raw transaction CSV (ISO-8859-1 encoded)
    #[arg(short, long, default_value = "OnlineRetail.csv")]
    pub input: PathBuf,

    /// Directory for the exported tables
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the run configuration; everything not exposed as a flag keeps its fixed value
    pub fn to_config(&self) -> crate::Result<PipelineConfig> {
        if self.input.as_os_str().is_empty() {
            anyhow::bail!("Input path must not be empty");
        }

        Ok(PipelineConfig::default().with_paths(&self.input, &self.output_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reproduce_fixed_constants() {
        let args = Args::parse_from(["returnforge"]);
        let config = args.to_config().unwrap();

        assert_eq!(config, PipelineConfig::default());
        assert!(!args.verbose);
    }

    #[test]
    fn test_seed_is_not_a_flag() {
        assert!(Args::try_parse_from(["returnforge", "--seed", "7"]).is_err());
    }

    #[test]
    fn test_to_config() {
        let mut args = Args {
            input: PathBuf::from("retail.csv"),
            output_dir: PathBuf::from("out"),
            verbose: true,
        };

        let config = args.to_config().unwrap();
        assert_eq!(config.input, PathBuf::from("retail.csv"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.seed, 42);
        assert_eq!(config.cost_ratio, 0.7);

        args.input = PathBuf::new();
        assert!(args.to_config().is_err());
    }
}
