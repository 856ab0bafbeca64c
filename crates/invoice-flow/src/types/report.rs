//! Extraction result payload and dashboard metrics

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One invoice found in a document, with its validation outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(default)]
    pub invoice_number: Option<String>,

    /// Pages the invoice spans, 1-indexed
    #[serde(default)]
    pub page_numbers: Vec<u32>,

    #[serde(default = "default_true")]
    pub is_valid: bool,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub warnings: Vec<String>,

    /// Raw extracted fields; keys vary by vendor
    #[serde(default)]
    pub fields: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl InvoiceRecord {
    /// Dollar amount of this invoice, taken from `total` with `amount_due`
    /// as the fallback when `total` is missing or blank
    pub fn amount(&self) -> f64 {
        for key in ["total", "amount_due"] {
            if let Some(value) = self.fields.get(key) {
                if !is_blank(value) {
                    return parse_currency(value);
                }
            }
        }
        0.0
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Parse a currency-formatted value ("$1,234.56") into a float
pub fn parse_currency(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let cleaned = s.replace(['$', ','], "");
            cleaned.trim().parse().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// Structured result of extracting one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Source document name
    pub filename: String,

    /// Detected vendor
    #[serde(default)]
    pub vendor: String,

    /// True when the provider had to derive a new vendor layout
    #[serde(default)]
    pub template_created: bool,

    #[serde(default)]
    pub total_pages: u32,

    pub invoices_found: usize,

    pub invoices_valid: usize,

    pub invoices_invalid: usize,

    #[serde(default)]
    pub invoices: Vec<InvoiceRecord>,

    /// False as soon as any invoice failed validation
    pub is_valid: bool,
}

impl ExtractionReport {
    /// Build a report from extracted invoices, deriving the counters
    pub fn from_invoices(
        filename: String,
        vendor: String,
        template_created: bool,
        total_pages: u32,
        invoices: Vec<InvoiceRecord>,
    ) -> Self {
        let invoices_found = invoices.len();
        let invoices_valid = invoices.iter().filter(|i| i.is_valid).count();
        let invoices_invalid = invoices_found - invoices_valid;
        Self {
            filename,
            vendor,
            template_created,
            total_pages,
            invoices_found,
            invoices_valid,
            invoices_invalid,
            invoices,
            is_valid: invoices_invalid == 0,
        }
    }
}

/// Dashboard totals derived from the amount fields of a set of invoices
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_invoices: usize,
    pub total_amount: f64,
    pub average_amount: f64,
    pub highest_amount: f64,
    pub lowest_amount: f64,
    pub amounts: Vec<f64>,
}

impl DashboardMetrics {
    pub fn from_invoices<'a>(invoices: impl Iterator<Item = &'a InvoiceRecord>) -> Self {
        let amounts: Vec<f64> = invoices.map(InvoiceRecord::amount).collect();
        let total_amount: f64 = amounts.iter().sum();
        let average_amount = if amounts.is_empty() {
            0.0
        } else {
            total_amount / amounts.len() as f64
        };
        let highest_amount = amounts.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let lowest_amount = amounts.iter().copied().reduce(f64::min).unwrap_or(0.0);
        Self {
            total_invoices: amounts.len(),
            total_amount,
            average_amount,
            highest_amount,
            lowest_amount,
            amounts,
        }
    }
}
