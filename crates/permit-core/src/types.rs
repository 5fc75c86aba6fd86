//! Domain types shared by the pipeline, the HTTP clients and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locality used when the issuing municipality cannot be determined
pub const UNKNOWN_MUNICIPALITY: &str = "Unknown";

/// Lifecycle of a permit-filling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::NotStarted => write!(f, "not_started"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// How a questionnaire answer should be collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum InputKind {
    #[default]
    Text,
    Date,
    Number,
    Dropdown,
}

impl InputKind {
    /// Lenient parse; anything unrecognised is collected as free text.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "date" => InputKind::Date,
            "number" | "numeric" | "integer" => InputKind::Number,
            "dropdown" | "select" | "choice" => InputKind::Dropdown,
            _ => InputKind::Text,
        }
    }
}

impl From<String> for InputKind {
    fn from(value: String) -> Self {
        InputKind::parse(&value)
    }
}

/// Page-relative location of a field inferred from the rendered document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    /// 1-based page number
    pub page: u32,
    pub x: f64,
    pub y: f64,
}

/// A field as reported by the PDF service or inferred by the model
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub name: String,
    pub field_type: Option<String>,
    /// Only set for fields found through the OCR fallback
    pub position: Option<FieldPosition>,
}

impl RawField {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            position: None,
        }
    }
}

/// One questionnaire entry as returned by the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub field_name: String,
    pub question: String,
    #[serde(default)]
    pub helper: String,
    #[serde(default)]
    pub input_type: InputKind,
    #[serde(default)]
    pub dropdown_options: Option<Vec<String>>,
    #[serde(default)]
    pub step_number: Option<u32>,
}

/// Detected document title and issuing locality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitMetadata {
    pub permit_name: String,
    #[serde(default)]
    pub municipality: String,
}

/// Session row as stored in the document database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub permit_name: String,
    pub municipality: String,
    pub original_pdf_url: String,
    pub pdf_co_url: String,
    pub status: SessionStatus,
    pub current_step: u32,
    pub total_steps: u32,
    pub file_name: String,
    #[serde(default)]
    pub completed_pdf_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A filled document has been exported for this session
    pub fn is_exported(&self) -> bool {
        self.completed_pdf_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

/// Session row to insert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSession {
    pub user_id: String,
    pub permit_name: String,
    pub municipality: String,
    pub original_pdf_url: String,
    pub pdf_co_url: String,
    pub status: SessionStatus,
    pub current_step: u32,
    pub total_steps: u32,
    pub file_name: String,
}

/// Questionnaire field row as stored in the document database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermitField {
    pub id: String,
    pub session_id: String,
    pub field_name: String,
    pub question: String,
    pub helper: String,
    pub input_type: InputKind,
    #[serde(with = "crate::json_text", default)]
    pub dropdown_options: Vec<String>,
    pub step_number: u32,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub x_position: Option<f64>,
    #[serde(default)]
    pub y_position: Option<f64>,
}

impl PermitField {
    /// Recorded OCR position; all three coordinates must be present.
    pub fn position(&self) -> Option<FieldPosition> {
        match (self.page_number, self.x_position, self.y_position) {
            (Some(page), Some(x), Some(y)) => Some(FieldPosition { page, x, y }),
            _ => None,
        }
    }

    /// The answer, if one was given and is not blank
    pub fn answered(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .filter(|answer| !answer.trim().is_empty())
    }
}

/// Questionnaire field row to insert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewField {
    pub session_id: String,
    pub field_name: String,
    pub question: String,
    pub helper: String,
    pub input_type: InputKind,
    #[serde(with = "crate::json_text")]
    pub dropdown_options: Vec<String>,
    pub step_number: u32,
    pub page_number: Option<u32>,
    pub x_position: Option<f64>,
    pub y_position: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_kind_parse_is_lenient() {
        assert_eq!(InputKind::parse("Dropdown"), InputKind::Dropdown);
        assert_eq!(InputKind::parse(" date "), InputKind::Date);
        assert_eq!(InputKind::parse("number"), InputKind::Number);
        assert_eq!(InputKind::parse("signature"), InputKind::Text);
    }

    #[test]
    fn test_question_deserializes_unknown_input_type_as_text() {
        let json = r#"{"field_name":"sig","question":"Sign here?","input_type":"signature"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.input_type, InputKind::Text);
        assert_eq!(q.helper, "");
        assert!(q.dropdown_options.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        assert_eq!(SessionStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_position_requires_all_coordinates() {
        let mut field = PermitField {
            id: "f1".into(),
            session_id: "s1".into(),
            field_name: "owner".into(),
            question: "Who owns the property?".into(),
            helper: String::new(),
            input_type: InputKind::Text,
            dropdown_options: vec![],
            step_number: 1,
            answer: Some("  ".into()),
            page_number: Some(2),
            x_position: Some(10.0),
            y_position: None,
        };
        assert_eq!(field.position(), None);
        assert_eq!(field.answered(), None);

        field.y_position = Some(40.5);
        assert_eq!(
            field.position(),
            Some(FieldPosition {
                page: 2,
                x: 10.0,
                y: 40.5
            })
        );
    }
}
