//! Transaction loading, cleaning, partitioning and unit-price outlier removal

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::export::TableRow;

/// Timestamp layout used when writing `InvoiceDate`
pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layouts accepted for `InvoiceDate`, tried in order before RFC 3339
const DATE_INPUT_FORMATS: [&str; 5] = [
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Invoice numbers starting with this marker are credit notes
pub const CREDIT_MARKER: char = 'C';

/// Field values read as missing, matching pandas' default `na_values`
const NA_TOKENS: [&str; 19] = [
    "",
    "#N/A",
    "#N/A N/A",
    "#NA",
    "-1.#IND",
    "-1.#QNAN",
    "-NaN",
    "-nan",
    "1.#IND",
    "1.#QNAN",
    "<NA>",
    "N/A",
    "NA",
    "NULL",
    "NaN",
    "None",
    "n/a",
    "nan",
    "null",
];

fn is_na_token(bytes: &[u8]) -> bool {
    NA_TOKENS.iter().any(|token| token.as_bytes() == bytes)
}

const COLUMNS: [&str; 8] = [
    "InvoiceNo",
    "StockCode",
    "Description",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
    "Country",
];

/// One line of the raw export, exactly as decoded. `None` marks an empty field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawTransaction {
    pub invoice_no: Option<String>,
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub invoice_date: Option<String>,
    pub unit_price: Option<String>,
    pub customer_id: Option<String>,
    pub country: Option<String>,
}

impl RawTransaction {
    fn fields(&self) -> [&Option<String>; 8] {
        [
            &self.invoice_no,
            &self.stock_code,
            &self.description,
            &self.quantity,
            &self.invoice_date,
            &self.unit_price,
            &self.customer_id,
            &self.country,
        ]
    }
}

/// A cleaned, typed transaction line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    #[serde(rename = "InvoiceNo")]
    pub invoice_no: String,
    #[serde(rename = "StockCode")]
    pub stock_code: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "InvoiceDate", serialize_with = "serialize_invoice_date")]
    pub invoice_date: Option<NaiveDateTime>,
    #[serde(rename = "UnitPrice")]
    pub unit_price: f64,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Country")]
    pub country: String,
}

impl Transaction {
    /// Credit notes are identified by the invoice prefix alone
    pub fn is_credit_note(&self) -> bool {
        self.invoice_no.starts_with(CREDIT_MARKER)
    }

    pub fn is_sale(&self) -> bool {
        self.quantity > 0 && !self.is_credit_note()
    }

    pub fn is_return(&self) -> bool {
        self.quantity < 0 || self.is_credit_note()
    }

    /// Key identifying an invoice line
    pub fn line_key(&self) -> (&str, &str) {
        (&self.invoice_no, &self.stock_code)
    }
}

impl TableRow for Transaction {
    const COLUMNS: &'static [&'static str] = &COLUMNS;
}

/// Write an optional timestamp, leaving the field empty when missing
pub fn serialize_invoice_date<S>(date: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match date {
        Some(date) => serializer.serialize_str(&date.format(DATE_OUTPUT_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}

/// Load the raw transaction export
///
/// # Arguments
/// * `file_path` - Path to a CSV file encoded as ISO-8859-1
///
/// # Returns
/// * Every record of the file, undecoded beyond text
pub fn load_transactions(file_path: &Path) -> crate::Result<Vec<RawTransaction>> {
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open input file: {}", file_path.display()))?;

    read_transactions(file)
        .with_context(|| format!("Failed to read transactions from {}", file_path.display()))
}

/// Read raw transactions from any CSV source
pub fn read_transactions<R: Read>(source: R) -> crate::Result<Vec<RawTransaction>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);

    let headers = reader.byte_headers()?.clone();
    let positions = locate_columns(&headers)?;

    let mut rows = Vec::new();
    for (i, record) in reader.byte_records().enumerate() {
        // Header occupies line 1
        let record = record.with_context(|| format!("Malformed record on line {}", i + 2))?;
        let field = |column: usize| {
            record
                .get(positions[column])
                .filter(|bytes| !is_na_token(bytes))
                .map(decode_latin1)
        };

        rows.push(RawTransaction {
            invoice_no: field(0),
            stock_code: field(1),
            description: field(2),
            quantity: field(3),
            invoice_date: field(4),
            unit_price: field(5),
            customer_id: field(6),
            country: field(7),
        });
    }

    Ok(rows)
}

/// Find the position of every expected column in the header row
fn locate_columns(headers: &ByteRecord) -> crate::Result<[usize; 8]> {
    let names: Vec<String> = headers
        .iter()
        .map(|h| decode_latin1(h).trim().to_string())
        .collect();

    let mut positions = [0usize; 8];
    for (slot, column) in COLUMNS.iter().enumerate() {
        positions[slot] = names
            .iter()
            .position(|name| name == column)
            .with_context(|| format!("Missing required column '{}'", column))?;
    }

    Ok(positions)
}

/// ISO-8859-1 maps every byte to the code point of the same value
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Per-column count of missing fields in the raw export
pub fn missing_value_counts(rows: &[RawTransaction]) -> Vec<(&'static str, usize)> {
    let mut counts = [0usize; 8];
    for row in rows {
        for (slot, field) in row.fields().iter().enumerate() {
            if field.is_none() {
                counts[slot] += 1;
            }
        }
    }

    COLUMNS.iter().copied().zip(counts).collect()
}

/// Row counts removed by each cleaning step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub missing_customer: usize,
    pub duplicates: usize,
    pub unparsable: usize,
    pub non_positive_price: usize,
    pub zero_quantity: usize,
}

impl CleaningStats {
    /// Rows remaining once exact duplicates are gone
    pub fn rows_after_dedup(&self) -> usize {
        self.input_rows - self.missing_customer - self.duplicates
    }
}

/// Output of the cleaning stage
#[derive(Debug, Clone)]
pub struct CleanedData {
    pub rows: Vec<Transaction>,
    pub stats: CleaningStats,
}

/// Normalize, deduplicate and type the raw export.
///
/// Identifier normalization and duplicate removal run on the text form of
/// each row, before any numeric coercion.
pub fn clean_transactions(raw: Vec<RawTransaction>) -> CleanedData {
    let mut stats = CleaningStats {
        input_rows: raw.len(),
        ..CleaningStats::default()
    };

    let mut seen = HashSet::with_capacity(raw.len());
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw {
        let Some(row) = normalize_identifiers(row) else {
            stats.missing_customer += 1;
            continue;
        };

        if !seen.insert(row.clone()) {
            stats.duplicates += 1;
            continue;
        }

        let (Some(quantity), Some(unit_price)) = (
            row.quantity.as_deref().and_then(parse_quantity),
            row.unit_price.as_deref().and_then(parse_price),
        ) else {
            stats.unparsable += 1;
            continue;
        };

        if unit_price <= 0.0 {
            stats.non_positive_price += 1;
            continue;
        }

        // A zero-quantity line is neither a sale nor a return
        if quantity == 0 && !row.invoice_no.as_deref().unwrap_or("").starts_with(CREDIT_MARKER) {
            stats.zero_quantity += 1;
            continue;
        }

        rows.push(Transaction {
            invoice_date: row.invoice_date.as_deref().and_then(parse_invoice_date),
            invoice_no: row.invoice_no.unwrap_or_default(),
            stock_code: row.stock_code.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            customer_id: row.customer_id.unwrap_or_default(),
            country: row.country.unwrap_or_default(),
            quantity,
            unit_price,
        });
    }

    log::debug!("cleaning stats: {:?}", stats);

    CleanedData { rows, stats }
}

/// Trim identifiers, reject rows without a customer and fill missing descriptions
fn normalize_identifiers(mut row: RawTransaction) -> Option<RawTransaction> {
    let trim = |value: Option<String>| value.map(|v| v.trim().to_string());

    row.invoice_no = trim(row.invoice_no);
    row.stock_code = trim(row.stock_code);
    row.customer_id = trim(row.customer_id)
        .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("nan"));
    row.customer_id.as_ref()?;

    if row.description.is_none() {
        row.description = Some("Unknown".to_string());
    }

    Some(row)
}

fn parse_quantity(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
            .map(|v| v as i64)
    })
}

fn parse_price(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an invoice timestamp; unknown layouts yield `None`
pub fn parse_invoice_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Cleaned rows split into sales and returns
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub sales: Vec<Transaction>,
    pub returns: Vec<Transaction>,
}

/// Split cleaned rows. A credit-note invoice is a return whatever its quantity sign.
pub fn partition(rows: Vec<Transaction>) -> Partition {
    let (returns, sales): (Vec<_>, Vec<_>) = rows.into_iter().partition(Transaction::is_return);
    debug_assert!(sales.iter().all(Transaction::is_sale));

    Partition { sales, returns }
}

/// Interquartile fences on unit price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl PriceBounds {
    /// Compute fences from the sales partition; `None` when there are no sales
    pub fn from_sales(sales: &[Transaction], multiplier: f64) -> Option<Self> {
        let mut prices: Vec<f64> = sales.iter().map(|t| t.unit_price).collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort_by(f64::total_cmp);

        let q1 = quantile(&prices, 0.25);
        let q3 = quantile(&prices, 0.75);
        let iqr = q3 - q1;

        Some(Self {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower && price <= self.upper
    }
}

/// Linearly interpolated quantile of sorted values
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let fraction = position - below as f64;

    sorted[below] + (sorted[above] - sorted[below]) * fraction
}

/// Drop sales whose unit price falls outside the IQR fences
pub fn remove_price_outliers(sales: Vec<Transaction>, multiplier: f64) -> (Vec<Transaction>, Option<PriceBounds>) {
    let Some(bounds) = PriceBounds::from_sales(&sales, multiplier) else {
        return (sales, None);
    };

    let kept: Vec<Transaction> = sales
        .into_iter()
        .filter(|t| bounds.contains(t.unit_price))
        .collect();

    log::debug!(
        "unit price fences [{:.4}, {:.4}] (Q1={:.4}, Q3={:.4})",
        bounds.lower,
        bounds.upper,
        bounds.q1,
        bounds.q3
    );

    (kept, Some(bounds))
}

/// Keep the first row of every (InvoiceNo, StockCode) pair
pub fn dedup_lines(rows: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|t| seen.insert((t.invoice_no.clone(), t.stock_code.clone())))
        .collect()
}
