//! Per-invoice discounts, line-level financials and per-SKU return rates

use chrono::NaiveDateTime;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::data::{serialize_invoice_date, Transaction};
use crate::export::TableRow;

/// A sale line with discount, revenue, cost and return-rate features
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleRecord {
    pub invoice_no: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    #[serde(serialize_with = "serialize_invoice_date")]
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: f64,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    pub country: String,
    pub discount: f64,
    pub net_revenue: f64,
    pub cost_price: f64,
    pub cost: f64,
    pub net_profit: f64,
    pub return_rate: f64,
}

impl TableRow for SaleRecord {
    const COLUMNS: &'static [&'static str] = &[
        "InvoiceNo",
        "StockCode",
        "Description",
        "Quantity",
        "InvoiceDate",
        "UnitPrice",
        "CustomerID",
        "Country",
        "Discount",
        "NetRevenue",
        "CostPrice",
        "Cost",
        "NetProfit",
        "ReturnRate",
    ];
}

/// A return or credit-note line with its signed total
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReturnRecord {
    pub invoice_no: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    #[serde(serialize_with = "serialize_invoice_date")]
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: f64,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    pub country: String,
    pub total_price: f64,
    pub return_flag: u8,
}

impl ReturnRecord {
    pub fn from_transaction(t: Transaction) -> Self {
        Self {
            total_price: t.quantity as f64 * t.unit_price,
            return_flag: 1,
            invoice_no: t.invoice_no,
            stock_code: t.stock_code,
            description: t.description,
            quantity: t.quantity,
            invoice_date: t.invoice_date,
            unit_price: t.unit_price,
            customer_id: t.customer_id,
            country: t.country,
        }
    }
}

impl TableRow for ReturnRecord {
    const COLUMNS: &'static [&'static str] = &[
        "InvoiceNo",
        "StockCode",
        "Description",
        "Quantity",
        "InvoiceDate",
        "UnitPrice",
        "CustomerID",
        "Country",
        "TotalPrice",
        "ReturnFlag",
    ];
}

/// Sold and returned quantity of one SKU
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReturnRateEntry {
    pub stock_code: String,
    pub sales_qty: i64,
    pub return_qty: i64,
    pub return_rate: f64,
}

impl ReturnRateEntry {
    pub fn new(stock_code: String, sales_qty: i64, return_qty: i64) -> Self {
        let return_rate = if sales_qty.saturating_add(return_qty) == 0 {
            0.0
        } else {
            return_qty as f64 / (sales_qty as f64 + return_qty as f64)
        };

        Self {
            stock_code,
            sales_qty,
            return_qty,
            return_rate,
        }
    }
}

impl TableRow for ReturnRateEntry {
    const COLUMNS: &'static [&'static str] = &["StockCode", "SalesQty", "ReturnQty", "ReturnRate"];
}

/// Draw one discount per distinct invoice, in order of first appearance
///
/// # Arguments
/// * `sales` - Sales lines after outlier removal and deduplication
/// * `max_discount` - Exclusive upper bound of the uniform draw
/// * `rng` - The seeded discount stream
pub fn assign_discounts<R: Rng>(sales: &[Transaction], max_discount: f64, rng: &mut R) -> HashMap<String, f64> {
    let mut discounts = HashMap::new();
    for sale in sales {
        if !discounts.contains_key(&sale.invoice_no) {
            let discount = if max_discount > 0.0 {
                rng.gen_range(0.0..max_discount)
            } else {
                0.0
            };
            discounts.insert(sale.invoice_no.clone(), discount);
        }
    }

    log::debug!("assigned discounts to {} invoices", discounts.len());
    discounts
}

/// Quantity-weighted return rate for every SKU that was sold, ordered by StockCode.
///
/// Return quantity is the absolute value of the summed signed return quantities.
/// Sums saturate at the `i64` bounds.
pub fn compute_return_rates(sales: &[Transaction], returns: &[Transaction]) -> Vec<ReturnRateEntry> {
    let mut sales_qty: BTreeMap<&str, i64> = BTreeMap::new();
    for sale in sales {
        let total = sales_qty.entry(sale.stock_code.as_str()).or_insert(0);
        *total = total.saturating_add(sale.quantity);
    }

    let mut return_qty: HashMap<&str, i64> = HashMap::new();
    for ret in returns {
        let total = return_qty.entry(ret.stock_code.as_str()).or_insert(0);
        *total = total.saturating_add(ret.quantity);
    }

    sales_qty
        .into_iter()
        .map(|(stock_code, sold)| {
            let returned = return_qty.get(stock_code).map_or(0, |q| q.saturating_abs());
            ReturnRateEntry::new(stock_code.to_string(), sold, returned)
        })
        .collect()
}

/// Attach discount, financials and the SKU return rate to every sale line
pub fn derive_sales(
    sales: Vec<Transaction>,
    discounts: &HashMap<String, f64>,
    return_rates: &[ReturnRateEntry],
    cost_ratio: f64,
) -> Vec<SaleRecord> {
    let rates: HashMap<&str, f64> = return_rates
        .iter()
        .map(|entry| (entry.stock_code.as_str(), entry.return_rate))
        .collect();

    sales
        .into_iter()
        .map(|t| {
            let discount = discounts.get(&t.invoice_no).copied().unwrap_or(0.0);
            let quantity = t.quantity as f64;
            let net_revenue = t.unit_price * (1.0 - discount) * quantity;
            let cost_price = t.unit_price * cost_ratio;
            let cost = cost_price * quantity;
            let return_rate = rates.get(t.stock_code.as_str()).copied().unwrap_or(0.0);

            SaleRecord {
                invoice_no: t.invoice_no,
                stock_code: t.stock_code,
                description: t.description,
                quantity: t.quantity,
                invoice_date: t.invoice_date,
                unit_price: t.unit_price,
                customer_id: t.customer_id,
                country: t.country,
                discount,
                net_revenue,
                cost_price,
                cost,
                net_profit: net_revenue - cost,
                return_rate,
            }
        })
        .collect()
}

pub fn derive_returns(returns: Vec<Transaction>) -> Vec<ReturnRecord> {
    returns.into_iter().map(ReturnRecord::from_transaction).collect()
}
