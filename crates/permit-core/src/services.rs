//! Capability traits for the external collaborators.
//!
//! The pipeline only ever talks to these traits; [`crate::clients`] holds
//! the network implementations and [`crate::testing`] the in-memory ones.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ServiceError;
use crate::types::{NewField, NewSession, PermitField, RawField, Session, SessionStatus};

/// Document database plus object storage.
///
/// Every session-scoped call takes the owner so that rows belonging to
/// another user are indistinguishable from missing rows.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store bytes at `path` and return a publicly resolvable URL
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceError>;

    async fn insert_session(&self, session: &NewSession) -> Result<Session, ServiceError>;

    async fn insert_fields(&self, fields: &[NewField]) -> Result<Vec<PermitField>, ServiceError>;

    async fn find_session(
        &self,
        session_id: &str,
        owner: &str,
    ) -> Result<Option<Session>, ServiceError>;

    /// Owner's sessions, newest first
    async fn list_sessions(&self, owner: &str) -> Result<Vec<Session>, ServiceError>;

    /// Session fields ordered by step ordinal
    async fn list_fields(&self, session_id: &str) -> Result<Vec<PermitField>, ServiceError>;

    /// Write an answer to a field of the given session and return the
    /// field's step ordinal, or `None` when no such field exists there.
    async fn record_answer(
        &self,
        session_id: &str,
        field_id: &str,
        answer: &str,
    ) -> Result<Option<u32>, ServiceError>;

    async fn update_progress(
        &self,
        session_id: &str,
        current_step: u32,
        status: SessionStatus,
    ) -> Result<(), ServiceError>;

    /// Persist the filled document reference and mark the session completed
    async fn mark_exported(&self, session_id: &str, completed_url: &str)
        -> Result<(), ServiceError>;

    async fn delete_fields(&self, session_id: &str) -> Result<(), ServiceError>;

    /// Returns whether a row was removed
    async fn delete_session(&self, session_id: &str, owner: &str) -> Result<bool, ServiceError>;
}

/// Text drawn at an absolute coordinate on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationOverlay {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: u32,
    /// Page selector as the PDF service expects it (e.g. "1")
    pub pages: String,
}

/// Text written into the form field with a matching name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedFieldFill {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub pages: String,
    pub text: String,
}

/// One edit call against the PDF service
#[derive(Debug, Clone, PartialEq)]
pub enum FillRequest {
    NamedFields(Vec<NamedFieldFill>),
    Annotations(Vec<AnnotationOverlay>),
}

impl FillRequest {
    pub fn len(&self) -> usize {
        match self {
            FillRequest::NamedFields(fills) => fills.len(),
            FillRequest::Annotations(overlays) => overlays.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// PDF field-inventory and fill service
#[async_trait]
pub trait FormProcessor: Send + Sync {
    /// Upload the document; `None` when the service did not return a
    /// reference of its own.
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<Option<String>, ServiceError>;

    /// Fillable form fields of the document at `document_url`
    async fn field_inventory(&self, document_url: &str) -> Result<Vec<RawField>, ServiceError>;

    /// Apply the edit and return the filled document reference, or `None`
    /// when the service answered without a usable one.
    async fn fill(
        &self,
        document_url: &str,
        request: &FillRequest,
    ) -> Result<Option<String>, ServiceError>;
}

/// Binary document attached to a completion request
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAttachment {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentAttachment {
    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            media_type: "application/pdf".to_string(),
            bytes,
        }
    }
}

/// Single-turn completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub document: Option<DocumentAttachment>,
}

/// Language-model completion service
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Text of the model's reply
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Bearer-token verification against the identity service
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Subject (user id) of a valid token, `None` for a rejected one
    async fn verify(&self, token: &str) -> Result<Option<String>, ServiceError>;
}
