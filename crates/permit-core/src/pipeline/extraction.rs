//! Field extraction: the PDF service's form inventory, with a visual
//! inference fallback for documents that have no form fields.

use serde::Deserialize;

use crate::error::PipelineError;
use crate::prompts::{field_inference_prompt, OCR_MAX_TOKENS};
use crate::response::parse_reply;
use crate::services::{CompletionRequest, DocumentAttachment, FormProcessor, TextCompletion};
use crate::types::{FieldPosition, RawField};

/// Result of field extraction.
///
/// `Empty` and `Failed` both leave the questionnaire empty; they are kept
/// apart so logs can tell a blank document from a bad model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Named form fields reported by the PDF service
    Fillable(Vec<RawField>),
    /// Fields located by the model on a flat document
    Inferred(Vec<RawField>),
    /// The model found nothing to fill
    Empty,
    /// The fallback call or its reply was unusable
    Failed(String),
}

impl ExtractionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionOutcome::Fillable(_) => "fillable",
            ExtractionOutcome::Inferred(_) => "inferred",
            ExtractionOutcome::Empty => "empty",
            ExtractionOutcome::Failed(_) => "failed",
        }
    }

    pub fn into_fields(self) -> Vec<RawField> {
        match self {
            ExtractionOutcome::Fillable(fields) | ExtractionOutcome::Inferred(fields) => fields,
            ExtractionOutcome::Empty | ExtractionOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// The document as known to the PDF service, with its fields
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    /// Reference the PDF service will later fill
    pub processing_url: String,
    pub outcome: ExtractionOutcome,
}

/// Entry of the model's field-inference reply
#[derive(Debug, Deserialize)]
struct InferredField {
    #[serde(alias = "name")]
    field_name: String,
    #[serde(default)]
    field_type: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    page: Option<u32>,
}

impl InferredField {
    fn into_raw(self) -> Option<RawField> {
        let name = self.field_name.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let position = match (self.x, self.y) {
            (Some(x), Some(y)) => Some(FieldPosition {
                page: self.page.unwrap_or(1).max(1),
                x: x.clamp(0.0, 100.0),
                y: y.clamp(0.0, 100.0),
            }),
            _ => None,
        };
        Some(RawField {
            name,
            field_type: self.field_type,
            position,
        })
    }
}

/// Interpret the model's field-inference reply.
pub fn parse_inferred_fields(reply: &str) -> ExtractionOutcome {
    match parse_reply::<Vec<InferredField>>(reply) {
        Ok(entries) => {
            let fields: Vec<RawField> = entries
                .into_iter()
                .filter_map(InferredField::into_raw)
                .collect();
            if fields.is_empty() {
                ExtractionOutcome::Empty
            } else {
                ExtractionOutcome::Inferred(fields)
            }
        }
        Err(e) => ExtractionOutcome::Failed(format!("unparseable field list: {}", e)),
    }
}

/// Register the document with the PDF service and enumerate its fields.
///
/// Only the PDF service calls are fatal; the model fallback degrades to
/// [`ExtractionOutcome::Empty`] or [`ExtractionOutcome::Failed`].
pub async fn extract_fields(
    forms: &dyn FormProcessor,
    llm: &dyn TextCompletion,
    jurisdiction: &str,
    file_name: &str,
    bytes: &[u8],
    public_url: &str,
) -> Result<ExtractedDocument, PipelineError> {
    let processing_url = forms
        .upload(file_name, bytes)
        .await?
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| public_url.to_string());

    let inventory: Vec<RawField> = forms
        .field_inventory(&processing_url)
        .await?
        .into_iter()
        .filter(|f| !f.name.trim().is_empty())
        .collect();

    let outcome = if !inventory.is_empty() {
        ExtractionOutcome::Fillable(inventory)
    } else {
        tracing::info!(
            "{} has no form fields, asking the model to locate them",
            file_name
        );
        let request = CompletionRequest {
            prompt: field_inference_prompt(jurisdiction),
            max_tokens: OCR_MAX_TOKENS,
            document: Some(DocumentAttachment::pdf(bytes.to_vec())),
        };
        match llm.complete(&request).await {
            Ok(reply) => parse_inferred_fields(&reply),
            Err(e) => ExtractionOutcome::Failed(e.to_string()),
        }
    };

    match &outcome {
        ExtractionOutcome::Empty => {
            tracing::warn!("No fields found in {}", file_name)
        }
        ExtractionOutcome::Failed(reason) => {
            tracing::warn!("Field inference failed for {}: {}", file_name, reason)
        }
        ExtractionOutcome::Fillable(fields) | ExtractionOutcome::Inferred(fields) => {
            tracing::info!(
                "Extracted {} {} fields from {}",
                fields.len(),
                outcome.label(),
                file_name
            )
        }
    }

    Ok(ExtractedDocument {
        processing_url,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inferred_fields_carry_positions() {
        let reply = r#"[
            {"field_name": "Applicant", "field_type": "text", "x": 12.5, "y": 30, "page": 2},
            {"name": "Date", "x": 140, "y": -3}
        ]"#;
        let ExtractionOutcome::Inferred(fields) = parse_inferred_fields(reply) else {
            panic!("expected inferred fields");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(
            fields[0].position,
            Some(FieldPosition {
                page: 2,
                x: 12.5,
                y: 30.0
            })
        );
        assert_eq!(fields[0].field_type.as_deref(), Some("text"));
        // Out-of-range coordinates are clamped, missing page defaults to 1
        assert_eq!(
            fields[1].position,
            Some(FieldPosition {
                page: 1,
                x: 100.0,
                y: 0.0
            })
        );
    }

    #[test]
    fn test_entries_without_coordinates_have_no_position() {
        let reply = r#"[{"field_name": "Owner"}]"#;
        let fields = parse_inferred_fields(reply).into_fields();
        assert_eq!(fields, vec![RawField::named("Owner")]);
    }

    #[test]
    fn test_empty_array_is_empty_not_failed() {
        assert_eq!(parse_inferred_fields("[]"), ExtractionOutcome::Empty);
        assert_eq!(
            parse_inferred_fields(r#"[{"field_name": "  "}]"#),
            ExtractionOutcome::Empty
        );
    }

    #[test]
    fn test_garbage_reply_is_failed() {
        let outcome = parse_inferred_fields("I could not read this document.");
        assert_eq!(outcome.label(), "failed");
        assert!(outcome.into_fields().is_empty());
    }
}
