//! Pull the structured block out of free-form collaborator replies

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```json\s*([\s\S]*?)```").expect("fence pattern compiles"));

/// Body of the first fenced block tagged `json` (tag matched case-insensitively).
pub fn fenced_block(raw: &str) -> Option<&str> {
    FENCED_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str())
}

/// Parse the first fenced block as JSON. Missing blocks and parse failures
/// both mean "no structured content".
pub fn extract_document(raw: &str) -> Option<Value> {
    let body = fenced_block(raw)?;
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Fenced block is not valid JSON: {}", e);
            None
        }
    }
}
