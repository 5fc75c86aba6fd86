//! In-memory implementations of the capability traits for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use crate::error::ServiceError;
use crate::services::{
    CompletionRequest, DocumentStore, FillRequest, FormProcessor, IdentityVerifier,
    TextCompletion,
};
use crate::types::{NewField, NewSession, PermitField, RawField, Session, SessionStatus};

#[derive(Default)]
struct StoreInner {
    objects: HashMap<String, Vec<u8>>,
    sessions: Vec<Session>,
    fields: Vec<PermitField>,
    created: i64,
}

/// Document database and object storage held in memory
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    calls: AtomicUsize,
    fail_field_insert: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose field inserts always fail
    pub fn failing_field_insert() -> Self {
        Self {
            fail_field_insert: true,
            ..Self::default()
        }
    }

    /// Number of trait calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn object_paths(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut paths: Vec<String> = inner.objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.inner.lock().unwrap().sessions.clone()
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions().into_iter().find(|s| s.id == session_id)
    }

    pub fn fields_of(&self, session_id: &str) -> Vec<PermitField> {
        let inner = self.inner.lock().unwrap();
        let mut fields: Vec<PermitField> = inner
            .fields
            .iter()
            .filter(|f| f.session_id == session_id)
            .cloned()
            .collect();
        fields.sort_by_key(|f| f.step_number);
        fields
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ServiceError> {
        self.touch();
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(path.to_string(), bytes);
        Ok(format!("memory://permits/{}", path))
    }

    async fn insert_session(&self, session: &NewSession) -> Result<Session, ServiceError> {
        self.touch();
        let mut inner = self.inner.lock().unwrap();
        inner.created += 1;
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_else(Utc::now)
            + Duration::seconds(inner.created);
        let row = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: session.user_id.clone(),
            permit_name: session.permit_name.clone(),
            municipality: session.municipality.clone(),
            original_pdf_url: session.original_pdf_url.clone(),
            pdf_co_url: session.pdf_co_url.clone(),
            status: session.status,
            current_step: session.current_step,
            total_steps: session.total_steps,
            file_name: session.file_name.clone(),
            completed_pdf_url: None,
            created_at: Some(created_at),
        };
        inner.sessions.push(row.clone());
        Ok(row)
    }

    async fn insert_fields(&self, fields: &[NewField]) -> Result<Vec<PermitField>, ServiceError> {
        self.touch();
        if self.fail_field_insert {
            return Err(ServiceError::unavailable("database", "field insert rejected"));
        }
        let rows: Vec<PermitField> = fields
            .iter()
            .map(|f| PermitField {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: f.session_id.clone(),
                field_name: f.field_name.clone(),
                question: f.question.clone(),
                helper: f.helper.clone(),
                input_type: f.input_type,
                dropdown_options: f.dropdown_options.clone(),
                step_number: f.step_number,
                answer: None,
                page_number: f.page_number,
                x_position: f.x_position,
                y_position: f.y_position,
            })
            .collect();
        self.inner.lock().unwrap().fields.extend(rows.clone());
        Ok(rows)
    }

    async fn find_session(
        &self,
        session_id: &str,
        owner: &str,
    ) -> Result<Option<Session>, ServiceError> {
        self.touch();
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == owner)
            .cloned())
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<Session>, ServiceError> {
        self.touch();
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<Session> = inner
            .sessions
            .iter()
            .filter(|s| s.user_id == owner)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn list_fields(&self, session_id: &str) -> Result<Vec<PermitField>, ServiceError> {
        self.touch();
        Ok(self.fields_of(session_id))
    }

    async fn record_answer(
        &self,
        session_id: &str,
        field_id: &str,
        answer: &str,
    ) -> Result<Option<u32>, ServiceError> {
        self.touch();
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .fields
            .iter_mut()
            .find(|f| f.id == field_id && f.session_id == session_id)
            .map(|f| {
                f.answer = Some(answer.to_string());
                f.step_number
            }))
    }

    async fn update_progress(
        &self,
        session_id: &str,
        current_step: u32,
        status: SessionStatus,
    ) -> Result<(), ServiceError> {
        self.touch();
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            session.current_step = current_step;
            session.status = status;
        }
        Ok(())
    }

    async fn mark_exported(
        &self,
        session_id: &str,
        completed_url: &str,
    ) -> Result<(), ServiceError> {
        self.touch();
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            session.completed_pdf_url = Some(completed_url.to_string());
            session.status = SessionStatus::Completed;
        }
        Ok(())
    }

    async fn delete_fields(&self, session_id: &str) -> Result<(), ServiceError> {
        self.touch();
        self.inner
            .lock()
            .unwrap()
            .fields
            .retain(|f| f.session_id != session_id);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str, owner: &str) -> Result<bool, ServiceError> {
        self.touch();
        let mut inner = self.inner.lock().unwrap();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|s| !(s.id == session_id && s.user_id == owner));
        Ok(inner.sessions.len() < before)
    }
}

/// PDF service with a fixed field inventory
pub struct StubFormProcessor {
    inventory: Vec<RawField>,
    upload_url: Option<String>,
    fill_url: Option<String>,
    fills: Mutex<Vec<(String, FillRequest)>>,
    calls: AtomicUsize,
}

impl StubFormProcessor {
    /// Document with named form fields
    pub fn fillable(names: &[&str]) -> Self {
        Self {
            inventory: names.iter().map(|n| RawField::named(*n)).collect(),
            upload_url: Some("https://pdf.example/uploaded.pdf".to_string()),
            fill_url: Some("https://pdf.example/filled.pdf".to_string()),
            fills: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Flat document without form fields
    pub fn flat() -> Self {
        Self::fillable(&[])
    }

    /// Fill calls answer without a document reference
    pub fn without_fill_url(mut self) -> Self {
        self.fill_url = None;
        self
    }

    /// Upload calls answer without a document reference
    pub fn without_upload_url(mut self) -> Self {
        self.upload_url = None;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fill requests received, with the document they targeted
    pub fn fills(&self) -> Vec<(String, FillRequest)> {
        self.fills.lock().unwrap().clone()
    }
}

#[async_trait]
impl FormProcessor for StubFormProcessor {
    async fn upload(&self, _file_name: &str, _bytes: &[u8]) -> Result<Option<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.upload_url.clone())
    }

    async fn field_inventory(&self, _document_url: &str) -> Result<Vec<RawField>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inventory.clone())
    }

    async fn fill(
        &self,
        document_url: &str,
        request: &FillRequest,
    ) -> Result<Option<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fills
            .lock()
            .unwrap()
            .push((document_url.to_string(), request.clone()));
        Ok(self.fill_url.clone())
    }
}

/// How [`ScriptedCompletion`] answers one kind of prompt
#[derive(Debug, Clone)]
pub enum Reply {
    /// Well-formed questionnaire for the names in the prompt
    Echo,
    Text(String),
    Fail,
}

impl Reply {
    pub fn text(reply: impl Into<String>) -> Self {
        Reply::Text(reply.into())
    }
}

/// Language model answering by prompt kind: document-attached prompts are
/// field inference, prompts asking for `permit_name` are metadata, the rest
/// are questionnaires.
pub struct ScriptedCompletion {
    ocr: Reply,
    questionnaire: Reply,
    metadata: Reply,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self {
            ocr: Reply::text("[]"),
            questionnaire: Reply::Echo,
            metadata: Reply::text(r#"{"permit_name": "Building Permit", "municipality": "Toronto"}"#),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ocr(mut self, reply: Reply) -> Self {
        self.ocr = reply;
        self
    }

    pub fn on_questionnaire(mut self, reply: Reply) -> Self {
        self.questionnaire = reply;
        self
    }

    pub fn on_metadata(mut self, reply: Reply) -> Self {
        self.metadata = reply;
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn echo_questionnaire(prompt: &str) -> String {
        let names: Vec<String> = prompt
            .lines()
            .find_map(|line| line.split_once("extracted from the permit: "))
            .and_then(|(_, list)| serde_json::from_str(list.trim()).ok())
            .unwrap_or_default();
        let questions: Vec<serde_json::Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                serde_json::json!({
                    "field_name": name,
                    "question": format!("What should go in {}?", name),
                    "helper": format!("The {} field is required.", name),
                    "input_type": "text",
                    "dropdown_options": null,
                    "step_number": i + 1,
                })
            })
            .collect();
        serde_json::Value::Array(questions).to_string()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = if request.document.is_some() {
            &self.ocr
        } else if request.prompt.contains("\"permit_name\"") {
            &self.metadata
        } else {
            &self.questionnaire
        };
        match reply {
            Reply::Echo => Ok(Self::echo_questionnaire(&request.prompt)),
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail => Err(ServiceError::unavailable("language model", "scripted failure")),
        }
    }
}

/// Identity service with a fixed token table
#[derive(Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, user_id: &str) -> Self {
        self.tokens.insert(token.to_string(), user_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentity {
    async fn verify(&self, token: &str) -> Result<Option<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokens.get(token).cloned())
    }
}
