//! HTTP handlers for the permit API

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use permit_core::SessionDetail;

use crate::auth::{AuthUser, BearerToken};
use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Multipart field carrying the document
const FILE_FIELD: &str = "file";

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "permit-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Filename and bytes of the `file` part
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError::InvalidRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// Handler: POST /upload-permit
///
/// The body is read and size-checked before the token is verified, so an
/// oversized upload is rejected without any external call.
pub async fn upload_permit(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;
    let file_name = state.pipeline.check_upload(&file_name, bytes.len())?;

    let owner = state.authenticate(&token).await?;
    tracing::info!("Upload of {} ({} bytes) by {}", file_name, bytes.len(), owner);

    let uploaded = state
        .pipeline
        .upload_permit(&owner, &file_name, bytes)
        .await?;

    Ok(Json(uploaded.into()))
}

/// Handler: GET /session/:id
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let detail = state.pipeline.get_session(&owner, &session_id).await?;
    Ok(Json(detail))
}

/// Handler: GET /sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.pipeline.list_sessions(&owner).await?;
    Ok(Json(SessionsResponse { sessions }))
}

/// Handler: POST /save-answer
pub async fn save_answer(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<Json<SaveAnswerResponse>, ApiError> {
    let receipt = state
        .pipeline
        .save_answer(&owner, &req.session_id, &req.field_id, &req.answer)
        .await?;

    Ok(Json(SaveAnswerResponse {
        saved: true,
        next_step: receipt.next_step,
        status: receipt.status,
    }))
}

/// Handler: POST /complete-permit
pub async fn complete_permit(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(req): Json<CompletePermitRequest>,
) -> Result<Json<CompletePermitResponse>, ApiError> {
    let outcome = state
        .pipeline
        .complete_permit(&owner, &req.session_id)
        .await?;

    Ok(Json(CompletePermitResponse {
        completed_pdf_url: outcome.reference().to_string(),
    }))
}

/// Handler: DELETE /session/:id
pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.pipeline.delete_session(&owner, &session_id).await?;
    Ok(Json(DeleteResponse { deleted: true }))
}
