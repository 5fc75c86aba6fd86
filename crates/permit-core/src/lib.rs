//! Permit intake and fill pipeline
//!
//! Turns an uploaded permit PDF into a plain-language questionnaire,
//! tracks answers step by step, and exports a filled PDF. PDF handling,
//! language generation and persistence are delegated to external services
//! behind the traits in [`services`]:
//!
//! - [`services::DocumentStore`] - session/field rows and object storage
//! - [`services::FormProcessor`] - form-field inventory and fill
//! - [`services::TextCompletion`] - single-turn language-model completions
//! - [`services::IdentityVerifier`] - bearer-token verification
//!
//! [`clients`] implements them over HTTP; [`PermitPipeline`] wires them
//! together.

pub mod clients;
pub mod error;
pub mod json_text;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use error::{PipelineError, ServiceError};
pub use pipeline::{
    AnswerReceipt, ExportOutcome, ExtractionOutcome, MetadataOutcome, PermitPipeline,
    PipelineConfig, SessionDetail, UploadedPermit, MAX_UPLOAD_BYTES,
};
pub use services::{
    AnnotationOverlay, CompletionRequest, DocumentAttachment, DocumentStore, FillRequest,
    FormProcessor, IdentityVerifier, NamedFieldFill, TextCompletion,
};
pub use types::{
    FieldPosition, InputKind, NewField, NewSession, PermitField, PermitMetadata, Question,
    RawField, Session, SessionStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
