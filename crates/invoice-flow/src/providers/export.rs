//! CSV report artifacts for completed extractions

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::providers::ReportExporter;
use crate::types::{ExtractionReport, InvoiceRecord};

/// Well-known field columns; anything else stays in the fields_json column
const FIELD_COLUMNS: [&str; 5] = ["invoice_date", "due_date", "total", "amount_due", "currency"];

/// Writes one CSV per report, one row per invoice
#[derive(Debug, Default, Clone)]
pub struct CsvReportExporter;

impl CsvReportExporter {
    pub fn new() -> Self {
        Self
    }

    /// Artifact name: `<stem>_invoices_<ddmmyyTHHMMSS>.csv`
    fn artifact_name(report: &ExtractionReport) -> String {
        let stem = Path::new(&report.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("report");
        let timestamp = Utc::now().format("%d%m%yT%H%M%S");
        format!("{}_invoices_{}.csv", stem, timestamp)
    }
}

#[async_trait]
impl ReportExporter for CsvReportExporter {
    async fn export(&self, report: &ExtractionReport, dest_dir: &Path) -> Result<PathBuf> {
        let path = dest_dir.join(Self::artifact_name(report));

        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| Error::export(format!("Failed to create '{}': {}", path.display(), e)))?;

        let mut header = vec!["invoice_number", "pages", "valid", "errors", "warnings"];
        header.extend(FIELD_COLUMNS);
        header.push("fields_json");
        writer.write_record(&header)?;

        for invoice in &report.invoices {
            writer.write_record(invoice_row(invoice)?)?;
        }
        writer.flush()?;

        tracing::info!(
            "Report exported: {} ({} invoices)",
            path.display(),
            report.invoices.len()
        );
        Ok(path)
    }
}

fn invoice_row(invoice: &InvoiceRecord) -> Result<Vec<String>> {
    let mut row = vec![
        invoice.invoice_number.clone().unwrap_or_default(),
        invoice
            .page_numbers
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        invoice.is_valid.to_string(),
        invoice.errors.join("; "),
        invoice.warnings.join("; "),
    ];
    for column in FIELD_COLUMNS {
        row.push(field_text(invoice.fields.get(column)));
    }
    row.push(serde_json::to_string(&invoice.fields)?);
    Ok(row)
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(v) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> ExtractionReport {
        let invoices = vec![
            InvoiceRecord {
                invoice_number: Some("INV-100".to_string()),
                page_numbers: vec![1, 2],
                is_valid: true,
                fields: json!({"total": "$50.00", "currency": "USD"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                ..Default::default()
            },
            InvoiceRecord {
                invoice_number: None,
                page_numbers: vec![3],
                is_valid: false,
                errors: vec!["missing total".to_string()],
                ..Default::default()
            },
        ];
        ExtractionReport::from_invoices(
            "statement.pdf".to_string(),
            "Acme Corp".to_string(),
            false,
            3,
            invoices,
        )
    }

    #[tokio::test]
    async fn test_export_writes_one_row_per_invoice() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvReportExporter::new();
        let report = sample_report();

        let path = exporter.export(&report, dir.path()).await.unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header plus two invoices
        assert!(lines[0].starts_with("invoice_number,pages,valid"));
        assert!(lines[1].contains("INV-100"));
        assert!(lines[1].contains("1 2"));
        assert!(lines[2].contains("missing total"));
    }

    #[tokio::test]
    async fn test_export_fails_on_missing_directory() {
        let exporter = CsvReportExporter::new();
        let report = sample_report();
        let result = exporter.export(&report, Path::new("/nonexistent/dir")).await;
        assert!(matches!(result, Err(Error::Export(_))));
    }

    #[test]
    fn test_artifact_name_uses_stem() {
        let report = ExtractionReport::from_invoices(
            "monthly statement.pdf".to_string(),
            "Acme".to_string(),
            false,
            1,
            vec![],
        );
        let name = CsvReportExporter::artifact_name(&report);
        assert!(name.starts_with("monthly statement_invoices_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_field_text_variants() {
        assert_eq!(field_text(Some(&json!("USD"))), "USD");
        assert_eq!(field_text(Some(&json!(12.5))), "12.5");
        assert_eq!(field_text(Some(&json!(null))), "");
        assert_eq!(field_text(None), "");
    }
}
