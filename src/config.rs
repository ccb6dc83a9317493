//! Fixed pipeline parameters

use std::path::{Path, PathBuf};

/// Synthetic city labels assigned to customers
pub const CITY_LABELS: [&str; 3] = ["CityA", "CityB", "CityC"];
/// Synthetic segment labels assigned to customers
pub const SEGMENT_LABELS: [&str; 3] = ["Small", "Medium", "Large"];
/// Synthetic category labels assigned to products
pub const CATEGORY_LABELS: [&str; 4] = ["Electronics", "Clothing", "Home", "Other"];

/// Output file names, one per exported table
pub mod files {
    pub const SALES: &str = "cleaned_sales.csv";
    pub const RETURNS: &str = "cleaned_returns.csv";
    pub const CUSTOMERS: &str = "customers.csv";
    pub const PRODUCTS: &str = "products.csv";
    pub const DISCOUNTS: &str = "discounts.csv";
    pub const RETURN_RATE: &str = "return_rate.csv";
    pub const NET_VIEW: &str = "net_view.csv";
    pub const SKU_RISK: &str = "sku_return_risk.csv";
    pub const SKU_PROBS: &str = "sku_return_probs.csv";

    /// Every file written by a complete run, in reporting order
    pub const ALL: [&str; 9] = [
        SALES,
        RETURNS,
        CUSTOMERS,
        PRODUCTS,
        DISCOUNTS,
        RETURN_RATE,
        NET_VIEW,
        SKU_RISK,
        SKU_PROBS,
    ];
}

/// All parameters of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Raw transaction export
    pub input: PathBuf,
    /// Directory receiving every output table
    pub output_dir: PathBuf,
    /// Master seed for every random stream
    pub seed: u64,
    /// Fraction of SKUs held out for evaluation
    pub test_size: f64,
    /// Upper (exclusive) bound of the per-invoice discount
    pub max_discount: f64,
    /// Cost price as a fraction of unit price
    pub cost_ratio: f64,
    /// Whisker length in IQRs for the unit-price outlier filter
    pub iqr_multiplier: f64,
    /// Mean return rate above which a SKU is labelled high risk
    pub high_risk_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("OnlineRetail.csv"),
            output_dir: PathBuf::from("."),
            seed: 42,
            test_size: 0.2,
            max_discount: 0.2,
            cost_ratio: 0.7,
            iqr_multiplier: 1.5,
            high_risk_threshold: 0.5,
        }
    }
}

impl PipelineConfig {
    /// Path of a named output table inside the output directory
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    pub fn with_paths(mut self, input: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        self.input = input.as_ref().to_path_buf();
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.cost_ratio, 0.7);
        assert_eq!(config.input, PathBuf::from("OnlineRetail.csv"));
    }

    #[test]
    fn test_output_path_joins_directory() {
        let config = PipelineConfig::default().with_paths("in.csv", "/tmp/out");
        assert_eq!(
            config.output_path(files::NET_VIEW),
            PathBuf::from("/tmp/out/net_view.csv")
        );
    }
}
