//! Request and response bodies

use permit_core::{Session, SessionStatus, UploadedPermit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Reply to a successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub permit_name: String,
    pub municipality: String,
    pub total_fields: usize,
    /// Raw field names in step order
    pub fields_preview: Vec<String>,
}

impl From<UploadedPermit> for UploadResponse {
    fn from(uploaded: UploadedPermit) -> Self {
        Self {
            total_fields: uploaded.fields.len(),
            fields_preview: uploaded
                .fields
                .into_iter()
                .map(|f| f.field_name)
                .collect(),
            session_id: uploaded.session.id,
            permit_name: uploaded.session.permit_name,
            municipality: uploaded.session.municipality,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    pub session_id: String,
    pub field_id: String,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub next_step: u32,
    pub status: SessionStatus,
}

#[derive(Debug, Deserialize)]
pub struct CompletePermitRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompletePermitResponse {
    /// Empty when the PDF service produced no document
    pub completed_pdf_url: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}
