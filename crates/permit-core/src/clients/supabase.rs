//! Supabase REST client: PostgREST tables, storage and auth.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use super::{check_status, http_client, read_json, trim_base};
use crate::error::ServiceError;
use crate::services::{DocumentStore, IdentityVerifier};
use crate::types::{NewField, NewSession, PermitField, Session, SessionStatus};

const SERVICE: &str = "supabase";
const SESSIONS: &str = "permit_sessions";
const FIELDS: &str = "permit_fields";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

/// Row returned by an answer update
#[derive(Debug, Deserialize)]
struct StepRow {
    step_number: u32,
}

/// Subset of the auth user object
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

impl SupabaseClient {
    pub fn new(
        base_url: &str,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(SERVICE, timeout)?,
            base_url: trim_base(base_url),
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Service-role request against a table
    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn returning(builder: RequestBuilder) -> RequestBuilder {
        builder.header("Prefer", "return=representation")
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        builder
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))
    }
}

/// PostgREST equality filter value
fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Storage endpoint URL with each path segment percent-encoded
fn storage_url(base_url: &str, prefix: &[&str], path: &str) -> Result<Url, ServiceError> {
    let mut url =
        Url::parse(base_url).map_err(|e| ServiceError::unavailable(SERVICE, e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ServiceError::unavailable(SERVICE, "base URL cannot hold a path"))?;
        segments.pop_if_empty();
        segments.extend(prefix);
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url)
}

pub(crate) fn object_url(base_url: &str, bucket: &str, path: &str) -> Result<Url, ServiceError> {
    storage_url(base_url, &["storage", "v1", "object", bucket], path)
}

pub(crate) fn public_object_url(
    base_url: &str,
    bucket: &str,
    path: &str,
) -> Result<Url, ServiceError> {
    storage_url(base_url, &["storage", "v1", "object", "public", bucket], path)
}

fn single<T>(mut rows: Vec<T>, what: &str) -> Result<T, ServiceError> {
    if rows.is_empty() {
        return Err(ServiceError::decode(
            SERVICE,
            format!("insert into {} returned no rows", what),
        ));
    }
    Ok(rows.swap_remove(0))
}

impl SupabaseClient {
    fn upload_request(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<RequestBuilder, ServiceError> {
        let url = object_url(&self.base_url, &self.bucket, path)?;
        Ok(self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes))
    }

    fn insert_session_request(&self, session: &NewSession) -> RequestBuilder {
        Self::returning(self.table(Method::POST, SESSIONS).json(session))
    }

    fn insert_fields_request(&self, fields: &[NewField]) -> RequestBuilder {
        Self::returning(self.table(Method::POST, FIELDS).json(fields))
    }

    fn find_session_request(&self, session_id: &str, owner: &str) -> RequestBuilder {
        self.table(Method::GET, SESSIONS).query(&[
            ("select", "*".to_string()),
            ("id", eq(session_id)),
            ("user_id", eq(owner)),
        ])
    }

    fn list_sessions_request(&self, owner: &str) -> RequestBuilder {
        self.table(Method::GET, SESSIONS).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner)),
            ("order", "created_at.desc".to_string()),
        ])
    }

    fn list_fields_request(&self, session_id: &str) -> RequestBuilder {
        self.table(Method::GET, FIELDS).query(&[
            ("select", "*".to_string()),
            ("session_id", eq(session_id)),
            ("order", "step_number.asc".to_string()),
        ])
    }

    /// Answer update scoped to the field's own session
    fn record_answer_request(
        &self,
        session_id: &str,
        field_id: &str,
        answer: &str,
    ) -> RequestBuilder {
        Self::returning(
            self.table(Method::PATCH, FIELDS)
                .query(&[
                    ("id", eq(field_id)),
                    ("session_id", eq(session_id)),
                    ("select", "step_number".to_string()),
                ])
                .json(&json!({ "answer": answer })),
        )
    }

    fn update_progress_request(
        &self,
        session_id: &str,
        current_step: u32,
        status: SessionStatus,
    ) -> RequestBuilder {
        self.table(Method::PATCH, SESSIONS)
            .query(&[("id", eq(session_id))])
            .json(&json!({ "current_step": current_step, "status": status }))
    }

    fn mark_exported_request(&self, session_id: &str, completed_url: &str) -> RequestBuilder {
        self.table(Method::PATCH, SESSIONS)
            .query(&[("id", eq(session_id))])
            .json(&json!({
                "completed_pdf_url": completed_url,
                "status": SessionStatus::Completed,
            }))
    }

    fn delete_fields_request(&self, session_id: &str) -> RequestBuilder {
        self.table(Method::DELETE, FIELDS)
            .query(&[("session_id", eq(session_id))])
    }

    /// Owner-scoped delete returning the removed ids
    fn delete_session_request(&self, session_id: &str, owner: &str) -> RequestBuilder {
        Self::returning(self.table(Method::DELETE, SESSIONS).query(&[
            ("id", eq(session_id)),
            ("user_id", eq(owner)),
            ("select", "id".to_string()),
        ]))
    }

    /// Auth lookup carrying the caller's token rather than the service key
    fn user_request(&self, token: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
    }
}

#[async_trait]
impl DocumentStore for SupabaseClient {
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceError> {
        let response = Self::send(self.upload_request(path, bytes, content_type)?).await?;
        check_status(SERVICE, response).await?;

        Ok(public_object_url(&self.base_url, &self.bucket, path)?.to_string())
    }

    async fn insert_session(&self, session: &NewSession) -> Result<Session, ServiceError> {
        let response = Self::send(self.insert_session_request(session)).await?;
        let rows: Vec<Session> = read_json(SERVICE, response).await?;
        single(rows, SESSIONS)
    }

    async fn insert_fields(&self, fields: &[NewField]) -> Result<Vec<PermitField>, ServiceError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let response = Self::send(self.insert_fields_request(fields)).await?;
        read_json(SERVICE, response).await
    }

    async fn find_session(
        &self,
        session_id: &str,
        owner: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let response = Self::send(self.find_session_request(session_id, owner)).await?;
        let rows: Vec<Session> = read_json(SERVICE, response).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<Session>, ServiceError> {
        let response = Self::send(self.list_sessions_request(owner)).await?;
        read_json(SERVICE, response).await
    }

    async fn list_fields(&self, session_id: &str) -> Result<Vec<PermitField>, ServiceError> {
        let response = Self::send(self.list_fields_request(session_id)).await?;
        read_json(SERVICE, response).await
    }

    async fn record_answer(
        &self,
        session_id: &str,
        field_id: &str,
        answer: &str,
    ) -> Result<Option<u32>, ServiceError> {
        let response =
            Self::send(self.record_answer_request(session_id, field_id, answer)).await?;
        let rows: Vec<StepRow> = read_json(SERVICE, response).await?;
        Ok(rows.first().map(|r| r.step_number))
    }

    async fn update_progress(
        &self,
        session_id: &str,
        current_step: u32,
        status: SessionStatus,
    ) -> Result<(), ServiceError> {
        let response =
            Self::send(self.update_progress_request(session_id, current_step, status)).await?;
        check_status(SERVICE, response).await?;
        Ok(())
    }

    async fn mark_exported(
        &self,
        session_id: &str,
        completed_url: &str,
    ) -> Result<(), ServiceError> {
        let response = Self::send(self.mark_exported_request(session_id, completed_url)).await?;
        check_status(SERVICE, response).await?;
        Ok(())
    }

    async fn delete_fields(&self, session_id: &str) -> Result<(), ServiceError> {
        let response = Self::send(self.delete_fields_request(session_id)).await?;
        check_status(SERVICE, response).await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str, owner: &str) -> Result<bool, ServiceError> {
        let response = Self::send(self.delete_session_request(session_id, owner)).await?;
        let rows: Vec<serde_json::Value> = read_json(SERVICE, response).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseClient {
    async fn verify(&self, token: &str) -> Result<Option<String>, ServiceError> {
        let response = Self::send(self.user_request(token)).await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => {
                let user: AuthUser = read_json(SERVICE, response).await?;
                Ok(Some(user.id).filter(|id| !id.is_empty()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_urls_encode_segments() {
        let url = object_url("https://db.example.co", "permits", "user-1/Deck Permit.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "https://db.example.co/storage/v1/object/permits/user-1/Deck%20Permit.pdf"
        );

        let public =
            public_object_url("https://db.example.co/", "permits", "user-1/a.pdf").unwrap();
        assert_eq!(
            public.as_str(),
            "https://db.example.co/storage/v1/object/public/permits/user-1/a.pdf"
        );
    }

    #[test]
    fn test_object_url_rejects_bad_base() {
        assert!(object_url("not a url", "permits", "a.pdf").is_err());
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let client = SupabaseClient::new(
            "https://db.example.co/",
            "key",
            "permits",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.table_url(SESSIONS),
            "https://db.example.co/rest/v1/permit_sessions"
        );
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("abc"), "eq.abc");
    }

    #[test]
    fn test_session_rows_decode() {
        let row = r#"[{
            "id": "5f1c", "user_id": "u1", "permit_name": "Deck Permit",
            "municipality": "Toronto", "original_pdf_url": "https://x/a.pdf",
            "pdf_co_url": "https://pdf/a.pdf", "status": "in_progress",
            "current_step": 2, "total_steps": 4, "file_name": "a.pdf",
            "completed_pdf_url": null,
            "created_at": "2024-05-01T12:30:00.123456+00:00"
        }]"#;
        let rows: Vec<Session> = serde_json::from_str(row).unwrap();
        assert_eq!(rows[0].status, SessionStatus::InProgress);
        assert!(rows[0].created_at.is_some());
        assert_eq!(single(rows, SESSIONS).unwrap().current_step, 2);
    }

    #[test]
    fn test_empty_insert_result_is_decode_error() {
        let err = single(Vec::<Session>::new(), SESSIONS).unwrap_err();
        assert!(matches!(err, ServiceError::Decode { .. }));
    }

    fn client() -> SupabaseClient {
        SupabaseClient::new(
            "https://db.example.co",
            "service-key",
            "permits",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn query(request: &reqwest::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    fn header<'a>(request: &'a reqwest::Request, name: &str) -> Option<&'a str> {
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn json_body(request: &reqwest::Request) -> serde_json::Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_table_requests_use_service_key() {
        let request = client().list_sessions_request("u1").build().unwrap();
        assert_eq!(header(&request, "apikey"), Some("service-key"));
        assert_eq!(header(&request, "authorization"), Some("Bearer service-key"));
        assert_eq!(request.url().path(), "/rest/v1/permit_sessions");
    }

    #[test]
    fn test_find_session_filters_by_owner() {
        let request = client().find_session_request("s1", "u1").build().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            query(&request),
            vec![pair("select", "*"), pair("id", "eq.s1"), pair("user_id", "eq.u1")]
        );
    }

    #[test]
    fn test_list_sessions_newest_first() {
        let request = client().list_sessions_request("u1").build().unwrap();
        assert_eq!(
            query(&request),
            vec![
                pair("select", "*"),
                pair("user_id", "eq.u1"),
                pair("order", "created_at.desc"),
            ]
        );
    }

    #[test]
    fn test_list_fields_in_step_order() {
        let request = client().list_fields_request("s1").build().unwrap();
        assert_eq!(request.url().path(), "/rest/v1/permit_fields");
        assert_eq!(
            query(&request),
            vec![
                pair("select", "*"),
                pair("session_id", "eq.s1"),
                pair("order", "step_number.asc"),
            ]
        );
    }

    #[test]
    fn test_record_answer_scoped_to_session() {
        let request = client()
            .record_answer_request("s1", "f1", "Jane Doe")
            .build()
            .unwrap();
        assert_eq!(request.method(), Method::PATCH);
        assert_eq!(request.url().path(), "/rest/v1/permit_fields");
        assert_eq!(
            query(&request),
            vec![
                pair("id", "eq.f1"),
                pair("session_id", "eq.s1"),
                pair("select", "step_number"),
            ]
        );
        assert_eq!(header(&request, "prefer"), Some("return=representation"));
        assert_eq!(json_body(&request), json!({ "answer": "Jane Doe" }));
    }

    #[test]
    fn test_delete_session_filters_by_owner() {
        let request = client().delete_session_request("s1", "u1").build().unwrap();
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(
            query(&request),
            vec![pair("id", "eq.s1"), pair("user_id", "eq.u1"), pair("select", "id")]
        );
        assert_eq!(header(&request, "prefer"), Some("return=representation"));
    }

    #[test]
    fn test_delete_fields_by_session() {
        let request = client().delete_fields_request("s1").build().unwrap();
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(query(&request), vec![pair("session_id", "eq.s1")]);
        assert_eq!(header(&request, "prefer"), None);
    }

    #[test]
    fn test_progress_and_export_updates() {
        let c = client();
        let progress = c
            .update_progress_request("s1", 3, SessionStatus::Completed)
            .build()
            .unwrap();
        assert_eq!(progress.method(), Method::PATCH);
        assert_eq!(query(&progress), vec![pair("id", "eq.s1")]);
        assert_eq!(
            json_body(&progress),
            json!({ "current_step": 3, "status": "completed" })
        );

        let exported = c
            .mark_exported_request("s1", "https://pdf.example/filled.pdf")
            .build()
            .unwrap();
        assert_eq!(
            json_body(&exported),
            json!({
                "completed_pdf_url": "https://pdf.example/filled.pdf",
                "status": "completed",
            })
        );
    }

    #[test]
    fn test_inserts_return_rows() {
        let fields = vec![NewField {
            session_id: "s1".to_string(),
            field_name: "Applicant Name".to_string(),
            question: "What is your name?".to_string(),
            helper: String::new(),
            input_type: crate::types::InputKind::Text,
            dropdown_options: Vec::new(),
            step_number: 1,
            page_number: None,
            x_position: None,
            y_position: None,
        }];
        let request = client().insert_fields_request(&fields).build().unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(header(&request, "prefer"), Some("return=representation"));
        assert_eq!(json_body(&request)[0]["step_number"], 1);
    }

    #[test]
    fn test_upload_request_upserts_object() {
        let request = client()
            .upload_request("u1/a.pdf", vec![1, 2, 3], "application/pdf")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://db.example.co/storage/v1/object/permits/u1/a.pdf"
        );
        assert_eq!(header(&request, "x-upsert"), Some("true"));
        assert_eq!(header(&request, "content-type"), Some("application/pdf"));
    }

    #[test]
    fn test_user_request_carries_caller_token() {
        let request = client().user_request("user-jwt").build().unwrap();
        assert_eq!(request.url().path(), "/auth/v1/user");
        assert_eq!(header(&request, "authorization"), Some("Bearer user-jwt"));
        assert_eq!(header(&request, "apikey"), Some("service-key"));
    }
}
