//! The ordered stage sequence: feature pipeline, checkpoint, modeling

use crate::aggregate::{build_net_view, build_sku_features, NetViewEntry, SkuRiskFeature};
use crate::config::{files, PipelineConfig};
use crate::data::{
    clean_transactions, dedup_lines, load_transactions, missing_value_counts, partition,
    remove_price_outliers, RawTransaction, Transaction,
};
use crate::dimensions::{
    build_customers, build_discounts, build_products, filter_known_returns, Customer, DiscountEntry,
    KnownKeys, Product,
};
use crate::export::{export_tables, read_sku_features, write_table, TableRow};
use crate::features::{
    assign_discounts, compute_return_rates, derive_returns, derive_sales, ReturnRateEntry, ReturnRecord,
    SaleRecord,
};
use crate::model::{run_risk_model, LogisticRegressionParams, RiskModelOutput};
use crate::rng::{RngBank, Stage};

/// Every table produced by the feature pipeline
#[derive(Debug, Clone, Default)]
pub struct FeatureTables {
    pub sales: Vec<SaleRecord>,
    pub returns: Vec<ReturnRecord>,
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub discounts: Vec<DiscountEntry>,
    pub return_rates: Vec<ReturnRateEntry>,
    pub net_view: Vec<NetViewEntry>,
    pub sku_features: Vec<SkuRiskFeature>,
}

impl FeatureTables {
    pub fn known_keys(&self) -> KnownKeys {
        KnownKeys::new(&self.products, &self.customers)
    }
}

fn report_shape(stage: &str, rows: usize, columns: usize) {
    println!("Shape after {}: ({}, {})", stage, rows, columns);
}

fn report_table<T: TableRow>(stage: &str, rows: &[T]) {
    report_shape(stage, rows.len(), T::COLUMNS.len());
}

/// Run every transform stage over the raw export, in dependency order
pub fn build_feature_tables(raw: Vec<RawTransaction>, config: &PipelineConfig) -> FeatureTables {
    let rng = RngBank::new(config.seed);
    let columns = Transaction::COLUMNS.len();

    let cleaned = clean_transactions(raw);
    report_shape("removing duplicates", cleaned.stats.rows_after_dedup(), columns);

    let split = partition(cleaned.rows);
    report_shape("separating sales", split.sales.len(), columns);
    report_shape("separating returns", split.returns.len(), columns);

    let (sales, _) = remove_price_outliers(split.sales, config.iqr_multiplier);
    report_shape("outlier removal (sales)", sales.len(), columns);

    let sales = dedup_lines(sales);
    let returns = dedup_lines(split.returns);
    report_shape("deduplicating sales", sales.len(), columns);
    report_shape("deduplicating returns", returns.len(), columns);

    let discounts = assign_discounts(&sales, config.max_discount, &mut rng.for_stage(Stage::Discount));
    let return_rates = compute_return_rates(&sales, &returns);
    let sales = derive_sales(sales, &discounts, &return_rates, config.cost_ratio);
    let returns = derive_returns(returns);

    let customers = build_customers(&sales, &mut rng.for_stage(Stage::CustomerAttributes));
    report_table("building customers", &customers);
    let products = build_products(&sales, &mut rng.for_stage(Stage::ProductAttributes));
    report_table("building products", &products);

    let known = KnownKeys::new(&products, &customers);
    let returns = filter_known_returns(returns, &known);
    report_table("filtering returns", &returns);

    let discounts = build_discounts(&sales, &known);
    report_table("building discounts", &discounts);

    let sku_features = build_sku_features(&sales, &known, config.high_risk_threshold);
    report_table("aggregating SKU features", &sku_features);

    let net_view = build_net_view(&sales, &returns);
    report_table("building net view", &net_view);

    FeatureTables {
        sales,
        returns,
        customers,
        products,
        discounts,
        return_rates,
        net_view,
        sku_features,
    }
}

/// Load, transform and export. Returns the in-memory tables for the modeling stage.
pub fn run_feature_pipeline(config: &PipelineConfig) -> crate::Result<FeatureTables> {
    let raw = load_transactions(&config.input)?;
    report_shape("loading", raw.len(), Transaction::COLUMNS.len());
    for (column, missing) in missing_value_counts(&raw) {
        log::info!("missing values in {}: {}", column, missing);
    }

    let tables = build_feature_tables(raw, config);
    export_tables(&tables, config)?;

    Ok(tables)
}

/// Re-read the SKU feature export, train and evaluate the classifier, and
/// write the ranked probability table
pub fn run_model_stage(config: &PipelineConfig, known: &KnownKeys) -> crate::Result<RiskModelOutput> {
    let features = read_sku_features(&config.output_path(files::SKU_RISK))?;

    let rng = RngBank::new(config.seed);
    let output = run_risk_model(
        &features,
        known,
        config.test_size,
        &LogisticRegressionParams::default(),
        &mut rng.for_stage(Stage::ModelSplit),
    )?;

    write_table(&config.output_path(files::SKU_PROBS), &output.predictions)?;
    report_table("scoring held-out SKUs", &output.predictions);

    println!("\nClassification Report:");
    println!("{}", output.report);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(invoice: &str, stock: &str, qty: &str, price: &str, customer: &str) -> RawTransaction {
        RawTransaction {
            invoice_no: Some(invoice.to_string()),
            stock_code: Some(stock.to_string()),
            description: Some("ITEM".to_string()),
            quantity: Some(qty.to_string()),
            invoice_date: Some("12/1/2010 8:26".to_string()),
            unit_price: Some(price.to_string()),
            customer_id: Some(customer.to_string()),
            country: Some("United Kingdom".to_string()),
        }
    }

    #[test]
    fn test_build_feature_tables() {
        let rows = vec![
            raw("536365", "A", "2", "5.0", "100"),
            raw("536365", "A", "3", "5.0", "100"),
            raw("536366", "B", "4", "5.0", "200"),
            raw("C536367", "A", "-1", "5.0", "100"),
            raw("C536368", "Q", "-1", "5.0", "100"),
        ];

        let tables = build_feature_tables(rows, &PipelineConfig::default());

        assert_eq!(tables.sales.len(), 2);
        assert_eq!(tables.returns.len(), 1);
        assert_eq!(tables.customers.len(), 2);
        assert_eq!(tables.products.len(), 2);
        assert_eq!(tables.sku_features.len(), 2);
        assert_eq!(tables.net_view.len(), 3);

        let a = tables.return_rates.iter().find(|r| r.stock_code == "A").unwrap();
        assert_eq!((a.sales_qty, a.return_qty), (2, 1));
    }

    #[test]
    fn test_empty_input_yields_empty_tables() {
        let tables = build_feature_tables(Vec::new(), &PipelineConfig::default());
        assert!(tables.sales.is_empty());
        assert!(tables.sku_features.is_empty());
        assert!(tables.net_view.is_empty());
    }
}
