//! HTTP implementations of the capability traits.
//!
//! - [`SupabaseClient`] - PostgREST tables, storage bucket and token
//!   verification ([`DocumentStore`](crate::services::DocumentStore) and
//!   [`IdentityVerifier`](crate::services::IdentityVerifier))
//! - [`PdfCoClient`] - form-field inventory and fill
//! - [`AnthropicClient`] - Messages API completions

mod anthropic;
mod pdfco;
mod supabase;

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

pub use anthropic::{AnthropicClient, DEFAULT_ANTHROPIC_MODEL, DEFAULT_ANTHROPIC_URL};
pub use pdfco::{PdfCoClient, DEFAULT_PDFCO_URL};
pub use supabase::SupabaseClient;

/// Default timeout for every outbound request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

fn http_client(service: &'static str, timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::transport(service, e))
}

/// Pass through 2xx responses, turn the rest into [`ServiceError::Status`].
async fn check_status(service: &'static str, response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("{} returned {}: {}", service, status, body);
    Err(ServiceError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Check the status and decode the JSON body.
async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, ServiceError> {
    let response = check_status(service, response).await?;
    let text = response
        .text()
        .await
        .map_err(|e| ServiceError::transport(service, e))?;
    serde_json::from_str(&text).map_err(|e| ServiceError::decode(service, e.to_string()))
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
