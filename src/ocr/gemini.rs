//! Gemini vision client
//!
//! Calls the `generateContent` REST endpoint with the crop inlined as a
//! base64 PNG payload. The API key travels as a query credential and must
//! never appear in logs or error messages.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{OcrError, OcrModel, OcrResponse, TextRecognizer, EXTRACTION_PROMPT};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini-backed implementation of [`TextRecognizer`]
pub struct GeminiOcr {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiOcr {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Build the generateContent request payload for one crop
    fn request_body(png: &[u8]) -> Value {
        json!({
            "contents": [{
                "parts": [
                    { "text": EXTRACTION_PROMPT },
                    {
                        "inline_data": {
                            "mime_type": "image/png",
                            "data": BASE64.encode(png),
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": 0.4,
                "topK": 32,
                "topP": 1,
                "maxOutputTokens": 2048,
            }
        })
    }

    /// Map a non-success status plus its body into the error taxonomy
    ///
    /// 400 and 403 are classified by status so the orchestrator can apply
    /// the fallback and permission policies; anything else prefers the
    /// service's own error message when the body carries one.
    fn classify_failure(status: u16, body: &str) -> OcrError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        match status {
            400 => OcrError::MalformedRequest(
                message.unwrap_or_else(|| "malformed request".to_string()),
            ),
            403 => OcrError::PermissionDenied,
            _ => match message {
                Some(msg) => OcrError::Api(msg),
                None => OcrError::Http(status),
            },
        }
    }

    /// Classify a 2xx response body into text / empty / embedded error
    fn parse_success(body: &Value) -> Result<OcrResponse, OcrError> {
        if let Some(text) = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
        {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(OcrResponse::Text(trimmed.to_string()));
            }
        }

        // Some failures arrive with a 200 status and an error object
        if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
            return Err(OcrError::Api(message.to_string()));
        }

        Ok(OcrResponse::Empty)
    }
}

#[async_trait]
impl TextRecognizer for GeminiOcr {
    async fn recognize(&self, png: &[u8], model: OcrModel) -> Result<OcrResponse, OcrError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE,
            model.id(),
            self.api_key
        );

        debug!(model = model.id(), bytes = png.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(png))
            .send()
            .await
            // without_url strips the request URL, which embeds the key
            .map_err(|e| OcrError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                model = model.id(),
                status = status.as_u16(),
                "Gemini API returned an error status"
            );
            return Err(Self::classify_failure(status.as_u16(), &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OcrError::Transport(e.without_url().to_string()))?;

        Self::parse_success(&body)
    }
}
