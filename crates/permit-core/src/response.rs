//! Parsing of language-model replies that are supposed to be bare JSON

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

lazy_static! {
    static ref OUTER_FENCE: Regex =
        Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap();
}

/// Remove a single outer code fence the model may have added.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |body| body.as_str().trim()),
        None => trimmed,
    }
}

/// Parse a reply as JSON. Anything besides the JSON value (other than an
/// outer fence) is a parse failure.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, String> {
    let body = strip_code_fence(reply);
    if body.is_empty() {
        return Err("empty reply".to_string());
    }
    serde_json::from_str(body).map_err(|e| e.to_string())
}
