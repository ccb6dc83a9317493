//! Delimited-file export of every pipeline table, and the SKU feature checkpoint reader

use anyhow::Context;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;

use crate::aggregate::SkuRiskFeature;
use crate::config::{files, PipelineConfig};
use crate::pipeline::FeatureTables;

/// A row type with a fixed, ordered set of output columns
pub trait TableRow: Serialize {
    /// Header names, in the order serde writes the fields
    const COLUMNS: &'static [&'static str];
}

/// Write one table as CSV with a header row and no index column.
///
/// The header is written even when `rows` is empty.
pub fn write_table<T: TableRow>(path: &Path, rows: &[T]) -> crate::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer.flush()?;

    log::debug!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write every feature-pipeline table into the configured output directory.
///
/// Files already written stay on disk if a later write fails.
pub fn export_tables(tables: &FeatureTables, config: &PipelineConfig) -> crate::Result<()> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory: {}", config.output_dir.display())
    })?;

    write_table(&config.output_path(files::SKU_RISK), &tables.sku_features)?;
    write_table(&config.output_path(files::NET_VIEW), &tables.net_view)?;
    write_table(&config.output_path(files::SALES), &tables.sales)?;
    write_table(&config.output_path(files::RETURNS), &tables.returns)?;
    write_table(&config.output_path(files::CUSTOMERS), &tables.customers)?;
    write_table(&config.output_path(files::PRODUCTS), &tables.products)?;
    write_table(&config.output_path(files::DISCOUNTS), &tables.discounts)?;
    write_table(&config.output_path(files::RETURN_RATE), &tables.return_rates)?;

    Ok(())
}

/// Read the SKU risk-feature export back. This is the interchange point
/// between feature engineering and modeling.
pub fn read_sku_features(path: &Path) -> crate::Result<Vec<SkuRiskFeature>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open SKU feature file: {}", path.display()))?;

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let mut features = Vec::new();
    for result in reader.deserialize() {
        let feature: SkuRiskFeature =
            result.with_context(|| format!("Failed to parse SKU feature row in {}", path.display()))?;
        features.push(feature);
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn feature(stock: &str, return_rate: f64) -> SkuRiskFeature {
        SkuRiskFeature {
            stock_code: stock.to_string(),
            discount: 0.1,
            return_rate,
            quantity: 10,
            net_profit: 2.5,
            net_revenue: 12.5,
            high_return_risk: u8::from(return_rate > 0.5),
        }
    }

    #[test]
    fn test_write_empty_table_keeps_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_table::<SkuRiskFeature>(&path, &[]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.trim_end(),
            "StockCode,Discount,ReturnRate,Quantity,NetProfit,NetRevenue,HighReturnRisk"
        );
    }

    #[test]
    fn test_sku_feature_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(files::SKU_RISK);
        let features = vec![feature("85123A", 0.2), feature("22633", 0.6)];

        write_table(&path, &features).unwrap();
        let loaded = read_sku_features(&path).unwrap();

        assert_eq!(loaded, features);
    }

    #[test]
    fn test_read_missing_checkpoint_fails() {
        let dir = tempdir().unwrap();
        assert!(read_sku_features(&dir.path().join("absent.csv")).is_err());
    }
}
