//! Fill & export: route answers to named-field fills or text overlays

use crate::error::PipelineError;
use crate::services::{AnnotationOverlay, FillRequest, FormProcessor, NamedFieldFill};
use crate::types::PermitField;

/// Font size of overlay text
pub const OVERLAY_FONT_SIZE: u32 = 10;

/// Answers partitioned by fill strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillPlan {
    pub named: Vec<NamedFieldFill>,
    pub overlays: Vec<AnnotationOverlay>,
}

impl FillPlan {
    /// The single edit call to make.
    ///
    /// The PDF service takes one group per call: named fills win, so on a
    /// document with both kinds the overlays are not sent.
    pub fn into_request(self) -> Option<FillRequest> {
        if !self.named.is_empty() {
            if !self.overlays.is_empty() {
                tracing::warn!(
                    "Dropping {} overlay answers; filling {} named fields",
                    self.overlays.len(),
                    self.named.len()
                );
            }
            Some(FillRequest::NamedFields(self.named))
        } else if !self.overlays.is_empty() {
            Some(FillRequest::Annotations(self.overlays))
        } else {
            None
        }
    }
}

/// Partition answered fields. Positioned fields become overlays, the rest
/// named-field fills; unanswered fields are left out.
pub fn plan_fill(fields: &[PermitField]) -> FillPlan {
    let mut plan = FillPlan::default();

    for field in fields {
        let Some(answer) = field.answered() else {
            continue;
        };
        match field.position() {
            Some(position) => plan.overlays.push(AnnotationOverlay {
                text: answer.to_string(),
                x: position.x,
                y: position.y,
                size: OVERLAY_FONT_SIZE,
                pages: position.page.to_string(),
            }),
            None => plan.named.push(NamedFieldFill {
                field_name: field.field_name.clone(),
                pages: field.page_number.unwrap_or(1).to_string(),
                text: answer.to_string(),
            }),
        }
    }

    plan
}

/// Result of an export attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Reference to the filled document
    Exported(String),
    /// The PDF service answered without a usable reference
    NoDocument,
    /// No field has an answer; nothing was sent
    NothingToFill,
}

impl ExportOutcome {
    /// Reference as reported to clients; empty unless exported.
    pub fn reference(&self) -> &str {
        match self {
            ExportOutcome::Exported(url) => url,
            ExportOutcome::NoDocument | ExportOutcome::NothingToFill => "",
        }
    }
}

/// Send the session's answers to the PDF service.
pub async fn export_answers(
    forms: &dyn FormProcessor,
    document_url: &str,
    fields: &[PermitField],
) -> Result<ExportOutcome, PipelineError> {
    let Some(request) = plan_fill(fields).into_request() else {
        return Ok(ExportOutcome::NothingToFill);
    };

    let kind = match &request {
        FillRequest::NamedFields(_) => "named fields",
        FillRequest::Annotations(_) => "overlays",
    };
    tracing::info!("Filling {} {}", request.len(), kind);

    let outcome = match forms.fill(document_url, &request).await? {
        Some(url) if !url.trim().is_empty() => ExportOutcome::Exported(url),
        _ => ExportOutcome::NoDocument,
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputKind;
    use pretty_assertions::assert_eq;

    fn field(name: &str, answer: Option<&str>, position: Option<(u32, f64, f64)>) -> PermitField {
        PermitField {
            id: format!("id-{}", name),
            session_id: "s1".into(),
            field_name: name.into(),
            question: String::new(),
            helper: String::new(),
            input_type: InputKind::Text,
            dropdown_options: vec![],
            step_number: 1,
            answer: answer.map(String::from),
            page_number: position.map(|p| p.0),
            x_position: position.map(|p| p.1),
            y_position: position.map(|p| p.2),
        }
    }

    #[test]
    fn test_fields_are_routed_by_position() {
        let fields = vec![
            field("owner", Some("Jane Doe"), None),
            field("lot", Some("42"), Some((2, 15.0, 60.0))),
            field("blank", None, None),
            field("whitespace", Some("   "), Some((1, 1.0, 1.0))),
        ];
        let plan = plan_fill(&fields);
        assert_eq!(
            plan.named,
            vec![NamedFieldFill {
                field_name: "owner".into(),
                pages: "1".into(),
                text: "Jane Doe".into(),
            }]
        );
        assert_eq!(
            plan.overlays,
            vec![AnnotationOverlay {
                text: "42".into(),
                x: 15.0,
                y: 60.0,
                size: OVERLAY_FONT_SIZE,
                pages: "2".into(),
            }]
        );
    }

    #[test]
    fn test_named_fills_take_precedence() {
        let plan = plan_fill(&[
            field("owner", Some("Jane"), None),
            field("lot", Some("42"), Some((1, 5.0, 5.0))),
        ]);
        assert!(matches!(
            plan.into_request(),
            Some(FillRequest::NamedFields(fills)) if fills.len() == 1
        ));
    }

    #[test]
    fn test_overlay_only_documents_send_annotations() {
        let plan = plan_fill(&[field("lot", Some("42"), Some((1, 5.0, 5.0)))]);
        assert!(matches!(
            plan.into_request(),
            Some(FillRequest::Annotations(overlays)) if overlays.len() == 1
        ));
    }

    #[test]
    fn test_unanswered_session_has_no_request() {
        assert_eq!(plan_fill(&[field("a", None, None)]).into_request(), None);
    }

    #[test]
    fn test_overlay_serializes_for_pdf_service() {
        let json = serde_json::to_value(NamedFieldFill {
            field_name: "owner".into(),
            pages: "1".into(),
            text: "Jane".into(),
        })
        .unwrap();
        assert_eq!(json["fieldName"], "owner");
    }
}
