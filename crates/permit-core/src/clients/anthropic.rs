//! Anthropic Messages API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, read_json, trim_base};
use crate::error::ServiceError;
use crate::services::{CompletionRequest, TextCompletion};

const SERVICE: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Document { source: DocumentSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ReplyBlock>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(SERVICE, timeout)?,
            base_url: DEFAULT_ANTHROPIC_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base(url);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// A single user turn: the attached document (if any) followed by the prompt
fn build_request<'a>(model: &'a str, request: &CompletionRequest) -> MessagesRequest<'a> {
    let mut content = Vec::with_capacity(2);
    if let Some(document) = &request.document {
        content.push(ContentBlock::Document {
            source: DocumentSource {
                kind: "base64",
                media_type: document.media_type.clone(),
                data: STANDARD.encode(&document.bytes),
            },
        });
    }
    content.push(ContentBlock::Text {
        text: request.prompt.clone(),
    });

    MessagesRequest {
        model,
        max_tokens: request.max_tokens,
        messages: vec![Message {
            role: "user",
            content,
        }],
    }
}

/// Text of the first text block
fn reply_text(response: MessagesResponse) -> Result<String, ServiceError> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| ServiceError::decode(SERVICE, "reply has no text block"))
}

#[async_trait]
impl TextCompletion for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let start = Instant::now();
        let body = build_request(&self.model, request);

        tracing::debug!(
            "Sending {} prompt chars to {} (document: {})",
            request.prompt.len(),
            self.model,
            request.document.is_some()
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let text = reply_text(read_json(SERVICE, response).await?)?;
        tracing::debug!(
            "{} replied with {} chars in {}ms",
            self.model,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}
