//! Anthropic messages API client for invoice extraction
//!
//! Sends the PDF as a base64 document block and asks the model for a single
//! JSON object describing every invoice found in the document.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::providers::DocumentExtractor;
use crate::types::{DocumentTask, ExtractionReport, InvoiceRecord};

const ANTHROPIC_VERSION: &str = "2023-06-01";

const EXTRACTION_PROMPT: &str = r#"You are an invoice extraction engine. The attached PDF contains one or more invoices. Identify the vendor, then extract every invoice in the document.

Respond with a single JSON object and no prose:
{
  "vendor": "<vendor name>",
  "template_created": <true when the vendor layout was not recognized>,
  "total_pages": <page count>,
  "invoices": [
    {
      "invoice_number": "<number or null>",
      "page_numbers": [<1-indexed pages the invoice spans>],
      "is_valid": <false when required fields are missing or inconsistent>,
      "errors": ["<validation errors>"],
      "warnings": ["<validation warnings>"],
      "fields": {"invoice_date": "...", "due_date": "...", "total": "...", "amount_due": "...", "currency": "...", "line_items": [...]}
    }
  ]
}"#;

/// Extraction provider backed by the Anthropic messages API
pub struct ClaudeExtractor {
    client: reqwest::Client,
    config: ExtractionConfig,
    api_key: String,
}

impl ClaudeExtractor {
    /// Build a client from config; the key falls back to ANTHROPIC_API_KEY
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let api_key = if config.api_key.is_empty() {
            std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
        } else {
            config.api_key.clone()
        };

        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl DocumentExtractor for ClaudeExtractor {
    async fn execute(&self, task: &DocumentTask) -> Result<ExtractionReport> {
        if self.api_key.is_empty() {
            return Err(Error::Config("ANTHROPIC_API_KEY is not set".to_string()));
        }

        let pdf_data = tokio::fs::read(&task.source_path).await.map_err(|e| {
            Error::extraction(format!(
                "Failed to read '{}': {}",
                task.source_path.display(),
                e
            ))
        })?;

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Document {
                        source: DocumentSource {
                            source_type: "base64",
                            media_type: "application/pdf",
                            data: BASE64.encode(&pdf_data),
                        },
                    },
                    ContentBlock::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                ],
            }],
        };

        tracing::info!(
            "[{}] Sending {} bytes to {}",
            task.filename,
            pdf_data.len(),
            self.config.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::extraction(format!("Extraction request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::extraction(format!(
                "Extraction API returned {}: {}",
                status, body
            )));
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::extraction(format!("Malformed extraction response: {}", e)))?;

        let text = reply
            .content
            .iter()
            .find_map(|block| block.text.as_deref())
            .ok_or_else(|| Error::extraction("Extraction response contained no text"))?;

        parse_report(text, &task.filename)
    }

    fn name(&self) -> &str {
        "claude"
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Document { source: DocumentSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    vendor: Option<String>,
    #[serde(default)]
    template_created: bool,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    invoices: Vec<InvoiceRecord>,
}

/// Parse the model reply, tolerating markdown code fences around the JSON
fn parse_report(text: &str, filename: &str) -> Result<ExtractionReport> {
    let payload: ExtractionPayload = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| Error::extraction(format!("Extraction reply was not valid JSON: {}", e)))?;

    Ok(ExtractionReport::from_invoices(
        filename.to_string(),
        payload.vendor.unwrap_or_else(|| "unknown".to_string()),
        payload.template_created,
        payload.total_pages,
        payload.invoices,
    ))
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_counts_invoices() {
        let reply = r#"{
            "vendor": "Acme Corp",
            "template_created": true,
            "total_pages": 3,
            "invoices": [
                {"invoice_number": "INV-1", "page_numbers": [1], "is_valid": true, "fields": {"total": "$10.00"}},
                {"invoice_number": "INV-2", "page_numbers": [2, 3], "is_valid": false, "errors": ["missing total"]}
            ]
        }"#;

        let report = parse_report(reply, "doc.pdf").unwrap();
        assert_eq!(report.filename, "doc.pdf");
        assert_eq!(report.vendor, "Acme Corp");
        assert!(report.template_created);
        assert_eq!(report.invoices_found, 2);
        assert_eq!(report.invoices_valid, 1);
        assert_eq!(report.invoices_invalid, 1);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_parse_report_with_code_fences() {
        let reply = "```json\n{\"vendor\": \"Acme\", \"invoices\": []}\n```";
        let report = parse_report(reply, "doc.pdf").unwrap();
        assert_eq!(report.vendor, "Acme");
        assert_eq!(report.invoices_found, 0);
        assert!(report.is_valid);
    }

    #[test]
    fn test_parse_report_defaults_vendor() {
        let report = parse_report("{\"invoices\": []}", "doc.pdf").unwrap();
        assert_eq!(report.vendor, "unknown");
    }

    #[test]
    fn test_parse_report_rejects_prose() {
        let result = parse_report("Sure! Here are the invoices...", "doc.pdf");
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = ExtractionConfig {
            base_url: "https://api.anthropic.com/".to_string(),
            ..Default::default()
        };
        let extractor = ClaudeExtractor::new(&config).unwrap();
        assert_eq!(extractor.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 16000,
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock::Text {
                    text: "hello".to_string(),
                }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-20250514");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }
}
