//! PDF.co client: base64 upload, form-field inventory and edit/add fill.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{http_client, read_json, trim_base};
use crate::error::ServiceError;
use crate::services::{FillRequest, FormProcessor};
use crate::types::RawField;

const SERVICE: &str = "pdf.co";

pub const DEFAULT_PDFCO_URL: &str = "https://api.pdf.co";

pub struct PdfCoClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Field entry of `/v1/pdf/info/fields`
#[derive(Debug, Deserialize)]
struct InventoryField {
    #[serde(rename = "fieldName", default)]
    field_name: Option<String>,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryResponse {
    #[serde(default)]
    fields: Vec<InventoryField>,
}

impl PdfCoClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(SERVICE, timeout)?,
            base_url: DEFAULT_PDFCO_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base(url);
        self
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ServiceError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        read_json(SERVICE, response).await
    }
}

/// `url` of a PDF.co reply when it is a non-empty string
fn result_url(reply: &Value) -> Option<String> {
    reply
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// PDF.co reports failures in the body as `{"error": true, "message": ...}`
fn reported_error(reply: &Value) -> Option<String> {
    match reply.get("error") {
        Some(Value::Bool(true)) => Some(
            reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error")
                .to_string(),
        ),
        _ => None,
    }
}

/// Named fields of an inventory reply. A body-reported error fails the
/// inventory rather than reading as a flat document.
fn parse_inventory(reply: Value) -> Result<Vec<RawField>, ServiceError> {
    if let Some(message) = reported_error(&reply) {
        tracing::warn!("PDF.co field inventory reported: {}", message);
        return Err(ServiceError::unavailable(SERVICE, message));
    }
    let inventory: InventoryResponse =
        serde_json::from_value(reply).map_err(|e| ServiceError::decode(SERVICE, e.to_string()))?;
    Ok(inventory
        .fields
        .into_iter()
        .filter_map(|f| {
            let name = f.field_name?;
            Some(RawField {
                name,
                field_type: f.field_type,
                position: None,
            })
        })
        .collect())
}

/// Body of an `/v1/pdf/edit/add` call
fn fill_body(document_url: &str, request: &FillRequest) -> Result<Value, ServiceError> {
    let encode = |e: serde_json::Error| ServiceError::decode(SERVICE, e.to_string());
    Ok(match request {
        FillRequest::NamedFields(fills) => json!({
            "url": document_url,
            "fieldsString": serde_json::to_string(fills).map_err(encode)?,
            "async": false,
        }),
        FillRequest::Annotations(overlays) => json!({
            "url": document_url,
            "annotationsString": serde_json::to_string(overlays).map_err(encode)?,
            "async": false,
        }),
    })
}

#[async_trait]
impl FormProcessor for PdfCoClient {
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<Option<String>, ServiceError> {
        let reply = self
            .post(
                "/v1/file/upload/base64",
                &json!({ "name": file_name, "file": STANDARD.encode(bytes) }),
            )
            .await?;
        if let Some(message) = reported_error(&reply) {
            tracing::warn!("PDF.co upload of {} reported: {}", file_name, message);
        }
        Ok(result_url(&reply))
    }

    async fn field_inventory(&self, document_url: &str) -> Result<Vec<RawField>, ServiceError> {
        let reply = self
            .post(
                "/v1/pdf/info/fields",
                &json!({ "url": document_url, "async": false }),
            )
            .await?;
        parse_inventory(reply)
    }

    async fn fill(
        &self,
        document_url: &str,
        request: &FillRequest,
    ) -> Result<Option<String>, ServiceError> {
        let reply = self
            .post("/v1/pdf/edit/add", &fill_body(document_url, request)?)
            .await?;
        if let Some(message) = reported_error(&reply) {
            tracing::warn!("PDF.co fill reported: {}", message);
        }
        Ok(result_url(&reply))
    }
}
