//! The permit intake and fill pipeline.
//!
//! Upload: ingest -> field extraction -> question synthesis -> metadata
//! detection -> session + fields written. After that, answers are recorded
//! one field at a time and the filled document is exported on request.

pub mod extraction;
pub mod fill;
pub mod ingest;
pub mod metadata;
pub mod progress;
pub mod synthesis;


use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::services::{DocumentStore, FormProcessor, TextCompletion};
use crate::types::{NewField, NewSession, PermitField, Session, SessionStatus};

pub use extraction::{ExtractedDocument, ExtractionOutcome};
pub use fill::{ExportOutcome, FillPlan};
pub use ingest::MAX_UPLOAD_BYTES;
pub use metadata::MetadataOutcome;
pub use progress::Progress;
pub use synthesis::PlannedField;

/// Jurisdiction assumed when none is configured
pub const DEFAULT_JURISDICTION: &str = "Ontario, Canada";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Region the permits come from; shapes every prompt
    pub jurisdiction: String,
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jurisdiction: DEFAULT_JURISDICTION.to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

/// A freshly created session with its questionnaire
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedPermit {
    pub session: Session,
    pub fields: Vec<PermitField>,
    pub extraction: &'static str,
}

/// A session with its fields ordered by step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub fields: Vec<PermitField>,
}

/// Progress after an answer was saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerReceipt {
    pub next_step: u32,
    pub status: SessionStatus,
}

pub struct PermitPipeline {
    store: Arc<dyn DocumentStore>,
    forms: Arc<dyn FormProcessor>,
    llm: Arc<dyn TextCompletion>,
    config: PipelineConfig,
}

impl PermitPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        forms: Arc<dyn FormProcessor>,
        llm: Arc<dyn TextCompletion>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            forms,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reject oversized or nameless uploads without any external call.
    pub fn check_upload(&self, file_name: &str, size: usize) -> Result<String, PipelineError> {
        ingest::check_upload(file_name, size, self.config.max_upload_bytes)
    }

    /// Run the whole intake pipeline and create the session.
    pub async fn upload_permit(
        &self,
        owner: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedPermit, PipelineError> {
        let file_name = self.check_upload(file_name, bytes.len())?;
        let jurisdiction = self.config.jurisdiction.as_str();

        let public_url =
            ingest::store_original(self.store.as_ref(), owner, &file_name, &bytes).await?;

        let extracted = extraction::extract_fields(
            self.forms.as_ref(),
            self.llm.as_ref(),
            jurisdiction,
            &file_name,
            &bytes,
            &public_url,
        )
        .await?;
        let extraction = extracted.outcome.label();
        let raw_fields = extracted.outcome.into_fields();

        let planned =
            synthesis::synthesize_questions(self.llm.as_ref(), jurisdiction, &raw_fields).await?;

        let names: Vec<String> = raw_fields.iter().map(|f| f.name.clone()).collect();
        let metadata =
            metadata::detect_metadata(self.llm.as_ref(), jurisdiction, &names, &file_name)
                .await
                .into_metadata();

        let session = self
            .store
            .insert_session(&NewSession {
                user_id: owner.to_string(),
                permit_name: metadata.permit_name,
                municipality: metadata.municipality,
                original_pdf_url: public_url,
                pdf_co_url: extracted.processing_url,
                status: SessionStatus::NotStarted,
                current_step: 1,
                total_steps: planned.len() as u32,
                file_name: file_name.clone(),
            })
            .await?;

        let fields = self.insert_fields_or_rollback(&session, &planned).await?;

        tracing::info!(
            "Created session {} for {} with {} steps ({} extraction)",
            session.id,
            file_name,
            fields.len(),
            extraction
        );

        Ok(UploadedPermit {
            session,
            fields,
            extraction,
        })
    }

    /// Insert the questionnaire; on failure remove the session so no
    /// field-less session is left behind.
    async fn insert_fields_or_rollback(
        &self,
        session: &Session,
        planned: &[PlannedField],
    ) -> Result<Vec<PermitField>, PipelineError> {
        if planned.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<NewField> = planned
            .iter()
            .map(|p| p.to_new_field(&session.id))
            .collect();

        match self.store.insert_fields(&rows).await {
            Ok(mut fields) => {
                fields.sort_by_key(|f| f.step_number);
                Ok(fields)
            }
            Err(e) => {
                tracing::error!(
                    "Field insert failed for session {}, removing it: {}",
                    session.id,
                    e
                );
                if let Err(cleanup) = self
                    .store
                    .delete_session(&session.id, &session.user_id)
                    .await
                {
                    tracing::error!("Could not remove session {}: {}", session.id, cleanup);
                }
                Err(e.into())
            }
        }
    }

    async fn owned_session(&self, owner: &str, session_id: &str) -> Result<Session, PipelineError> {
        if !is_record_id(session_id) {
            return Err(PipelineError::SessionNotFound(session_id.to_string()));
        }
        self.store
            .find_session(session_id, owner)
            .await?
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))
    }

    pub async fn get_session(
        &self,
        owner: &str,
        session_id: &str,
    ) -> Result<SessionDetail, PipelineError> {
        let session = self.owned_session(owner, session_id).await?;
        let mut fields = self.store.list_fields(&session.id).await?;
        fields.sort_by_key(|f| f.step_number);
        Ok(SessionDetail { session, fields })
    }

    /// Owner's sessions, newest first
    pub async fn list_sessions(&self, owner: &str) -> Result<Vec<Session>, PipelineError> {
        let mut sessions = self.store.list_sessions(owner).await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Record an answer and move the session cursor past its step.
    ///
    /// An exported session keeps its completed status; only the cursor moves.
    pub async fn save_answer(
        &self,
        owner: &str,
        session_id: &str,
        field_id: &str,
        answer: &str,
    ) -> Result<AnswerReceipt, PipelineError> {
        if !is_record_id(field_id) {
            return Err(PipelineError::FieldNotFound {
                session_id: session_id.to_string(),
                field_id: field_id.to_string(),
            });
        }
        let session = self.owned_session(owner, session_id).await?;

        let step = self
            .store
            .record_answer(&session.id, field_id, answer)
            .await?
            .ok_or_else(|| PipelineError::FieldNotFound {
                session_id: session.id.clone(),
                field_id: field_id.to_string(),
            })?;

        let next = progress::advance(step, session.total_steps, session.is_exported());
        self.store
            .update_progress(&session.id, next.current_step, next.status)
            .await?;

        tracing::info!(
            "Session {}: answered step {}/{}, now {}",
            session.id,
            step,
            session.total_steps,
            next.status
        );

        Ok(AnswerReceipt {
            next_step: next.current_step,
            status: next.status,
        })
    }

    /// Fill the document with the stored answers.
    ///
    /// Only a successful export completes the session; otherwise the
    /// returned outcome carries no reference and the session is untouched.
    pub async fn complete_permit(
        &self,
        owner: &str,
        session_id: &str,
    ) -> Result<ExportOutcome, PipelineError> {
        let session = self.owned_session(owner, session_id).await?;
        let fields = self.store.list_fields(&session.id).await?;

        let outcome = fill::export_answers(self.forms.as_ref(), &session.pdf_co_url, &fields).await?;

        match &outcome {
            ExportOutcome::Exported(url) => {
                self.store.mark_exported(&session.id, url).await?;
                tracing::info!("Session {} exported to {}", session.id, url);
            }
            ExportOutcome::NoDocument => {
                tracing::warn!(
                    "Session {}: PDF service returned no document reference",
                    session.id
                );
            }
            ExportOutcome::NothingToFill => {
                tracing::warn!("Session {}: no answers to fill", session.id);
            }
        }

        Ok(outcome)
    }

    /// Delete a session and its fields. Ownership is checked before
    /// anything is removed.
    pub async fn delete_session(&self, owner: &str, session_id: &str) -> Result<(), PipelineError> {
        let session = self.owned_session(owner, session_id).await?;
        self.store.delete_fields(&session.id).await?;
        self.store.delete_session(&session.id, owner).await?;
        tracing::info!("Deleted session {}", session.id);
        Ok(())
    }
}

/// Session and field ids are database-issued UUIDs; anything else cannot
/// name a row.
fn is_record_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}
