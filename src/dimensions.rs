//! Customer, product and discount reference tables

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::{CATEGORY_LABELS, CITY_LABELS, SEGMENT_LABELS};
use crate::export::TableRow;
use crate::features::{ReturnRecord, SaleRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "FakeCity")]
    pub fake_city: String,
    #[serde(rename = "Segment")]
    pub segment: String,
}

impl TableRow for Customer {
    const COLUMNS: &'static [&'static str] = &["CustomerID", "Country", "FakeCity", "Segment"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub stock_code: String,
    pub description: String,
    pub unit_price: f64,
    pub category: String,
}

impl TableRow for Product {
    const COLUMNS: &'static [&'static str] = &["StockCode", "Description", "UnitPrice", "Category"];
}

/// The discount applied to one invoice line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscountEntry {
    pub invoice_no: String,
    pub stock_code: String,
    pub discount: f64,
}

impl TableRow for DiscountEntry {
    const COLUMNS: &'static [&'static str] = &["InvoiceNo", "StockCode", "Discount"];
}

/// Sample `n` labels uniformly with replacement
fn sample_labels<R: Rng>(labels: &[&str], n: usize, rng: &mut R) -> Vec<String> {
    (0..n)
        .map(|_| labels.choose(rng).map_or_else(String::new, |l| l.to_string()))
        .collect()
}

/// One customer per distinct CustomerID in sales, first occurrence wins.
///
/// Cities are drawn for every customer before any segment is drawn.
pub fn build_customers<R: Rng>(sales: &[SaleRecord], rng: &mut R) -> Vec<Customer> {
    let mut seen = HashSet::new();
    let firsts: Vec<&SaleRecord> = sales
        .iter()
        .filter(|s| seen.insert(s.customer_id.as_str()))
        .collect();

    let cities = sample_labels(&CITY_LABELS, firsts.len(), rng);
    let segments = sample_labels(&SEGMENT_LABELS, firsts.len(), rng);

    firsts
        .into_iter()
        .zip(cities.into_iter().zip(segments))
        .map(|(sale, (fake_city, segment))| Customer {
            customer_id: sale.customer_id.clone(),
            country: sale.country.clone(),
            fake_city,
            segment,
        })
        .collect()
}

/// One product per distinct StockCode in sales, carrying the first line's description and price
pub fn build_products<R: Rng>(sales: &[SaleRecord], rng: &mut R) -> Vec<Product> {
    let mut seen = HashSet::new();
    let firsts: Vec<&SaleRecord> = sales
        .iter()
        .filter(|s| seen.insert(s.stock_code.as_str()))
        .collect();

    let categories = sample_labels(&CATEGORY_LABELS, firsts.len(), rng);

    firsts
        .into_iter()
        .zip(categories)
        .map(|(sale, category)| Product {
            stock_code: sale.stock_code.clone(),
            description: sale.description.clone(),
            unit_price: sale.unit_price,
            category,
        })
        .collect()
}

/// Membership index over the dimension tables
#[derive(Debug, Clone, Default)]
pub struct KnownKeys {
    products: HashSet<String>,
    customers: HashSet<String>,
}

impl KnownKeys {
    pub fn new(products: &[Product], customers: &[Customer]) -> Self {
        Self {
            products: products.iter().map(|p| p.stock_code.clone()).collect(),
            customers: customers.iter().map(|c| c.customer_id.clone()).collect(),
        }
    }

    pub fn has_product(&self, stock_code: &str) -> bool {
        self.products.contains(stock_code)
    }

    pub fn has_customer(&self, customer_id: &str) -> bool {
        self.customers.contains(customer_id)
    }
}

/// Keep only returns whose product and customer both appear in the dimension tables
pub fn filter_known_returns(returns: Vec<ReturnRecord>, known: &KnownKeys) -> Vec<ReturnRecord> {
    let before = returns.len();
    let kept: Vec<ReturnRecord> = returns
        .into_iter()
        .filter(|r| known.has_product(&r.stock_code) && known.has_customer(&r.customer_id))
        .collect();

    log::debug!("dropped {} returns with unknown product or customer", before - kept.len());
    kept
}

/// One discount row per distinct (InvoiceNo, StockCode) in sales, restricted to known products
pub fn build_discounts(sales: &[SaleRecord], known: &KnownKeys) -> Vec<DiscountEntry> {
    let mut seen = HashSet::new();
    sales
        .iter()
        .filter(|s| seen.insert((s.invoice_no.as_str(), s.stock_code.as_str())))
        .filter(|s| known.has_product(&s.stock_code))
        .map(|s| DiscountEntry {
            invoice_no: s.invoice_no.clone(),
            stock_code: s.stock_code.clone(),
            discount: s.discount,
        })
        .collect()
}
