//! Per-SKU model features and the unified sales/returns net view

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::dimensions::KnownKeys;
use crate::export::TableRow;
use crate::features::{ReturnRecord, SaleRecord};

/// Aggregated sales features of one SKU; the interchange schema of the model stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SkuRiskFeature {
    pub stock_code: String,
    /// Mean discount over the SKU's sale lines
    pub discount: f64,
    /// Mean return rate over the SKU's sale lines
    pub return_rate: f64,
    pub quantity: i64,
    pub net_profit: f64,
    pub net_revenue: f64,
    pub high_return_risk: u8,
}

impl TableRow for SkuRiskFeature {
    const COLUMNS: &'static [&'static str] = &[
        "StockCode",
        "Discount",
        "ReturnRate",
        "Quantity",
        "NetProfit",
        "NetRevenue",
        "HighReturnRisk",
    ];
}

#[derive(Default)]
struct SkuAccumulator {
    lines: usize,
    discount: f64,
    return_rate: f64,
    quantity: i64,
    net_profit: f64,
    net_revenue: f64,
}

/// Roll sales up per StockCode (ordered by StockCode) and label high return risk.
///
/// A SKU is high risk when its mean return rate strictly exceeds `threshold`.
pub fn build_sku_features(sales: &[SaleRecord], known: &KnownKeys, threshold: f64) -> Vec<SkuRiskFeature> {
    let mut groups: BTreeMap<&str, SkuAccumulator> = BTreeMap::new();
    for sale in sales {
        let acc = groups.entry(sale.stock_code.as_str()).or_default();
        acc.lines += 1;
        acc.discount += sale.discount;
        acc.return_rate += sale.return_rate;
        acc.quantity = acc.quantity.saturating_add(sale.quantity);
        acc.net_profit += sale.net_profit;
        acc.net_revenue += sale.net_revenue;
    }

    groups
        .into_iter()
        .filter(|(stock_code, _)| known.has_product(stock_code))
        .map(|(stock_code, acc)| {
            let n = acc.lines as f64;
            let return_rate = acc.return_rate / n;
            SkuRiskFeature {
                stock_code: stock_code.to_string(),
                discount: acc.discount / n,
                return_rate,
                quantity: acc.quantity,
                net_profit: acc.net_profit,
                net_revenue: acc.net_revenue,
                high_return_risk: u8::from(return_rate > threshold),
            }
        })
        .collect()
}

/// Which partition a net-view row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Sales,
    Returns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetViewEntry {
    pub invoice_no: String,
    pub stock_code: String,
    pub quantity: i64,
    pub net_revenue: f64,
    pub net_profit: f64,
    pub return_rate: f64,
    pub source: Source,
}

impl NetViewEntry {
    fn from_sale(sale: &SaleRecord) -> Self {
        Self {
            invoice_no: sale.invoice_no.clone(),
            stock_code: sale.stock_code.clone(),
            quantity: sale.quantity,
            net_revenue: sale.net_revenue,
            net_profit: sale.net_profit,
            return_rate: sale.return_rate,
            source: Source::Sales,
        }
    }

    /// Returns carry their signed total as both revenue and profit
    fn from_return(ret: &ReturnRecord) -> Self {
        Self {
            invoice_no: ret.invoice_no.clone(),
            stock_code: ret.stock_code.clone(),
            quantity: ret.quantity,
            net_revenue: ret.total_price,
            net_profit: ret.total_price,
            return_rate: f64::from(ret.return_flag),
            source: Source::Returns,
        }
    }
}

impl TableRow for NetViewEntry {
    const COLUMNS: &'static [&'static str] = &[
        "InvoiceNo",
        "StockCode",
        "Quantity",
        "NetRevenue",
        "NetProfit",
        "ReturnRate",
        "Source",
    ];
}

/// Sales rows followed by return rows, each side deduplicated on (InvoiceNo, StockCode, Source)
pub fn build_net_view(sales: &[SaleRecord], returns: &[ReturnRecord]) -> Vec<NetViewEntry> {
    let mut seen = HashSet::new();
    let mut keep = |entry: &NetViewEntry| {
        seen.insert((entry.invoice_no.clone(), entry.stock_code.clone(), entry.source))
    };

    let mut view: Vec<NetViewEntry> = sales
        .iter()
        .map(NetViewEntry::from_sale)
        .filter(|e| keep(e))
        .collect();
    view.extend(returns.iter().map(NetViewEntry::from_return).filter(|e| keep(e)));

    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{Customer, Product};

    fn sale(invoice: &str, stock: &str, qty: i64, discount: f64, return_rate: f64) -> SaleRecord {
        let net_revenue = (1.0 - discount) * qty as f64;
        SaleRecord {
            invoice_no: invoice.to_string(),
            stock_code: stock.to_string(),
            description: "ITEM".to_string(),
            quantity: qty,
            invoice_date: None,
            unit_price: 1.0,
            customer_id: "100".to_string(),
            country: "United Kingdom".to_string(),
            discount,
            net_revenue,
            cost_price: 0.7,
            cost: 0.7 * qty as f64,
            net_profit: net_revenue - 0.7 * qty as f64,
            return_rate,
        }
    }

    fn ret(invoice: &str, stock: &str, qty: i64) -> ReturnRecord {
        ReturnRecord {
            invoice_no: invoice.to_string(),
            stock_code: stock.to_string(),
            description: "ITEM".to_string(),
            quantity: qty,
            invoice_date: None,
            unit_price: 2.0,
            customer_id: "100".to_string(),
            country: "United Kingdom".to_string(),
            total_price: qty as f64 * 2.0,
            return_flag: 1,
        }
    }

    fn known(stocks: &[&str]) -> KnownKeys {
        let products: Vec<Product> = stocks
            .iter()
            .map(|s| Product {
                stock_code: s.to_string(),
                description: "ITEM".to_string(),
                unit_price: 1.0,
                category: "Home".to_string(),
            })
            .collect();
        let customers = vec![Customer {
            customer_id: "100".to_string(),
            country: "United Kingdom".to_string(),
            fake_city: "CityA".to_string(),
            segment: "Small".to_string(),
        }];
        KnownKeys::new(&products, &customers)
    }

    #[test]
    fn test_sku_features_aggregate() {
        let sales = vec![
            sale("1", "X", 30, 0.1, 0.2),
            sale("2", "X", 50, 0.2, 0.2),
            sale("3", "Y", 40, 0.0, 0.6),
        ];

        let features = build_sku_features(&sales, &known(&["X", "Y"]), 0.5);
        assert_eq!(features.len(), 2);

        let x = &features[0];
        assert_eq!(x.stock_code, "X");
        assert!((x.discount - 0.15).abs() < 1e-12);
        assert_eq!(x.quantity, 80);
        assert_eq!(x.high_return_risk, 0);

        let y = &features[1];
        assert_eq!(y.stock_code, "Y");
        assert_eq!(y.high_return_risk, 1);
    }

    #[test]
    fn test_high_risk_threshold_is_strict() {
        let sales = vec![sale("1", "H", 1, 0.0, 0.5)];
        let features = build_sku_features(&sales, &known(&["H"]), 0.5);
        assert_eq!(features[0].high_return_risk, 0);
    }

    #[test]
    fn test_sku_features_restricted_to_known_products() {
        let sales = vec![sale("1", "X", 1, 0.0, 0.0), sale("2", "Z", 1, 0.0, 0.0)];
        let features = build_sku_features(&sales, &known(&["X"]), 0.5);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].stock_code, "X");
    }

    #[test]
    fn test_sku_quantity_saturates() {
        let sales = vec![sale("1", "X", i64::MAX, 0.0, 0.0), sale("2", "X", 5, 0.0, 0.0)];
        let features = build_sku_features(&sales, &known(&["X"]), 0.5);
        assert_eq!(features[0].quantity, i64::MAX);
    }

    #[test]
    fn test_empty_sales_yield_empty_features() {
        assert!(build_sku_features(&[], &known(&[]), 0.5).is_empty());
    }

    #[test]
    fn test_net_view_union() {
        let sales = vec![sale("1", "X", 2, 0.0, 0.25), sale("1", "X", 3, 0.0, 0.25)];
        let returns = vec![ret("C1", "X", -4), ret("1", "X", -1)];

        let view = build_net_view(&sales, &returns);
        assert_eq!(view.len(), 3);
        assert_eq!(view[0].source, Source::Sales);
        assert_eq!(view[0].quantity, 2);

        let returned = &view[1];
        assert_eq!(returned.source, Source::Returns);
        assert_eq!(returned.net_revenue, -8.0);
        assert_eq!(returned.net_profit, -8.0);
        assert_eq!(returned.return_rate, 1.0);

        // Same line key, different source
        assert_eq!(view[2].invoice_no, "1");
        assert_eq!(view[2].source, Source::Returns);
    }
}
