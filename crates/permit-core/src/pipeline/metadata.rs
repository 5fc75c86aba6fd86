//! Detection of the permit title and issuing locality

use std::path::Path;

use crate::prompts::{metadata_prompt, METADATA_MAX_TOKENS};
use crate::response::parse_reply;
use crate::services::{CompletionRequest, TextCompletion};
use crate::types::{PermitMetadata, UNKNOWN_MUNICIPALITY};

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataOutcome {
    Detected(PermitMetadata),
    /// Filename-derived fallback, with the reason detection was abandoned
    Defaulted {
        metadata: PermitMetadata,
        reason: String,
    },
}

impl MetadataOutcome {
    pub fn into_metadata(self) -> PermitMetadata {
        match self {
            MetadataOutcome::Detected(metadata) => metadata,
            MetadataOutcome::Defaulted { metadata, .. } => metadata,
        }
    }
}

/// Title from the filename without its extension, locality unknown
pub fn default_metadata(file_name: &str) -> PermitMetadata {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name);
    PermitMetadata {
        permit_name: stem.to_string(),
        municipality: UNKNOWN_MUNICIPALITY.to_string(),
    }
}

/// Interpret the model's metadata reply.
pub fn parse_metadata(reply: &str, file_name: &str) -> MetadataOutcome {
    match parse_reply::<PermitMetadata>(reply) {
        Ok(meta) if !meta.permit_name.trim().is_empty() => {
            let municipality = match meta.municipality.trim() {
                "" => UNKNOWN_MUNICIPALITY.to_string(),
                m => m.to_string(),
            };
            MetadataOutcome::Detected(PermitMetadata {
                permit_name: meta.permit_name.trim().to_string(),
                municipality,
            })
        }
        Ok(_) => MetadataOutcome::Defaulted {
            metadata: default_metadata(file_name),
            reason: "blank permit name".to_string(),
        },
        Err(e) => MetadataOutcome::Defaulted {
            metadata: default_metadata(file_name),
            reason: e,
        },
    }
}

/// Never fails: every problem falls back to [`default_metadata`].
pub async fn detect_metadata(
    llm: &dyn TextCompletion,
    jurisdiction: &str,
    field_names: &[String],
    file_name: &str,
) -> MetadataOutcome {
    let request = CompletionRequest {
        prompt: metadata_prompt(jurisdiction, field_names),
        max_tokens: METADATA_MAX_TOKENS,
        document: None,
    };

    let outcome = match llm.complete(&request).await {
        Ok(reply) => parse_metadata(&reply, file_name),
        Err(e) => MetadataOutcome::Defaulted {
            metadata: default_metadata(file_name),
            reason: e.to_string(),
        },
    };

    if let MetadataOutcome::Defaulted { reason, .. } = &outcome {
        tracing::warn!("Metadata detection fell back to defaults: {}", reason);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strips_extension() {
        let meta = default_metadata("Deck Permit.pdf");
        assert_eq!(meta.permit_name, "Deck Permit");
        assert_eq!(meta.municipality, "Unknown");
        assert_eq!(default_metadata("noext").permit_name, "noext");
    }

    #[test]
    fn test_detected_metadata_is_trimmed() {
        let outcome = parse_metadata(
            r#"{"permit_name": " Building Permit ", "municipality": "Toronto"}"#,
            "x.pdf",
        );
        assert_eq!(
            outcome,
            MetadataOutcome::Detected(PermitMetadata {
                permit_name: "Building Permit".into(),
                municipality: "Toronto".into(),
            })
        );
    }

    #[test]
    fn test_unparseable_reply_defaults() {
        let outcome = parse_metadata("Sorry, I can't tell.", "fence.pdf");
        assert!(matches!(outcome, MetadataOutcome::Defaulted { .. }));
        assert_eq!(outcome.into_metadata().permit_name, "fence");
    }

    #[test]
    fn test_blank_locality_becomes_unknown() {
        let outcome = parse_metadata(r#"{"permit_name": "Sign Permit", "municipality": ""}"#, "a.pdf");
        assert_eq!(outcome.into_metadata().municipality, UNKNOWN_MUNICIPALITY);
    }

    #[test]
    fn test_missing_locality_keeps_detected_title() {
        let outcome = parse_metadata(r#"{"permit_name": "Deck Permit"}"#, "scan-0042.pdf");
        assert_eq!(
            outcome,
            MetadataOutcome::Detected(PermitMetadata {
                permit_name: "Deck Permit".into(),
                municipality: UNKNOWN_MUNICIPALITY.into(),
            })
        );
    }
}
