//! OCR capability boundary
//!
//! Typed interface to the external vision service: image bytes plus a fixed
//! extraction instruction in, extracted text / empty indicator / typed
//! failure out. The concrete Gemini client lives in [`gemini`]; the
//! orchestrator depends only on the [`TextRecognizer`] trait.

pub mod gemini;

pub use gemini::GeminiOcr;

use async_trait::async_trait;
use thiserror::Error;

/// Fixed instruction sent with every crop. Plain-text extraction only, no
/// explanatory wrapper, scoped to the three supported languages.
pub const EXTRACTION_PROMPT: &str = "Extract all text from this image. \
Return ONLY the extracted text without any explanation. \
Support Nepali, Hindi, and English text.";

/// Which model a recognition call targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrModel {
    /// First-choice model for every box
    Primary,
    /// Lower-capability model, used only after a malformed-request failure
    Fallback,
}

impl OcrModel {
    /// Service-side model identifier
    pub fn id(&self) -> &'static str {
        match self {
            OcrModel::Primary => "gemini-1.5-pro",
            OcrModel::Fallback => "gemini-1.0-pro-vision",
        }
    }
}

/// Successful service response, before outcome classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrResponse {
    /// Trimmed, non-empty extracted text
    Text(String),
    /// The service answered but produced no usable text
    Empty,
}

/// Typed failures from the OCR capability
///
/// All variants are non-fatal at the batch level: the orchestrator encodes
/// them into the record's reviewable text instead of aborting.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// Error message reported in the service's JSON error body
    #[error("API Error: {0}")]
    Api(String),
    /// 400-class malformed request; triggers the single fallback retry
    #[error("request rejected: {0}")]
    MalformedRequest(String),
    /// 403-class: the Generative Language API is not enabled for this key
    #[error("Enable Generative Language API in Google Cloud Console")]
    PermissionDenied,
    /// Any other non-2xx status without a usable error body
    #[error("HTTP {0}")]
    Http(u16),
    /// Network or transport failure before a status was received
    #[error("{0}")]
    Transport(String),
}

/// External OCR capability consumed by the extraction orchestrator
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Extract text from a lossless PNG crop using the selected model
    async fn recognize(&self, png: &[u8], model: OcrModel) -> Result<OcrResponse, OcrError>;
}
