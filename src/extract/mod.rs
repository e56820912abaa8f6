//! Extraction Orchestrator
//!
//! Consumes the box store plus the current image: crops a lossless PNG per
//! box, invokes the OCR capability strictly sequentially in box order,
//! classifies every outcome into reviewable text, and emits extraction
//! records. The only component that performs network I/O.

use std::io::Cursor;
use std::time::Instant;

use anyhow::{bail, Result};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::annotate::{AdvanceOutcome, AnnotationSession, BoundingBox};
use crate::config::OcrSettings;
use crate::ocr::{OcrError, OcrModel, OcrResponse, TextRecognizer};

/// Placeholder confidence: the service provides no real confidence signal
pub const PLACEHOLDER_CONFIDENCE: f32 = 0.95;

/// Marker recorded when the service succeeds but finds no text
pub const NO_TEXT_MARKER: &str = "[No text detected]";

/// Marker recorded when the fallback model also finds no text
pub const NO_TEXT_FALLBACK_MARKER: &str = "[No text detected with alternative model]";

/// Review status of an extraction record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

/// One reviewable extraction: a cropped region plus its OCR result
///
/// Created here in batches, one per box, in box order. Mutated only by the
/// review state machine; never deleted (rejection is a terminal status).
#[derive(Debug, Clone)]
pub struct ExtractionRecord {
    /// Globally unique across the session
    pub id: Uuid,
    /// Back-reference to the source image (not ownership)
    pub image_id: u32,
    /// Denormalized for display
    pub source_image_name: String,
    /// Position of the box within its image's list at extraction time
    pub box_index: usize,
    /// Snapshot of the source box
    pub bounds: BoundingBox,
    /// Lossless PNG crop of the box region
    pub cropped_png: Vec<u8>,
    /// Extracted text, or a bracketed diagnostic marker
    pub text: String,
    /// Fixed placeholder score
    pub confidence: f32,
    pub status: RecordStatus,
}

/// Precondition failures that stop a batch before it starts
///
/// These are the only errors that prevent record creation; everything that
/// happens per box is encoded into the record text instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("draw at least one bounding box before extracting")]
    NoBoxes,
    /// The caller should route the user to configuration
    #[error("Gemini API key is not set; add it in settings")]
    MissingApiKey,
    #[error("no image is loaded")]
    NoImage,
}

/// Result of one extraction batch
#[derive(Debug)]
pub struct BatchOutcome {
    /// Records produced, in box order
    pub records: Vec<ExtractionRecord>,
    /// True when the cancellation token fired between boxes
    pub cancelled: bool,
    /// Where the session moved next; `None` for a cancelled batch
    pub advance: Option<AdvanceOutcome>,
}

/// Extract text for every box on the session's current image
///
/// Strictly sequential: a box's extraction never begins before the previous
/// one completes, and records append in that same order, so `box_index`
/// deterministically matches source position. On completion the image is
/// marked processed, the box store is cleared, and the session advances.
/// The cancellation token is observed between boxes, never mid-box; a
/// cancelled batch keeps its records and leaves the image unprocessed.
pub async fn extract_current(
    session: &mut AnnotationSession,
    recognizer: &dyn TextRecognizer,
    settings: &OcrSettings,
    cancel: &CancellationToken,
) -> Result<BatchOutcome, ExtractError> {
    if session.boxes().is_empty() {
        return Err(ExtractError::NoBoxes);
    }
    if !settings.has_api_key() {
        return Err(ExtractError::MissingApiKey);
    }

    let image = session.current_image().ok_or(ExtractError::NoImage)?;
    let image_id = image.id;
    let image_name = image.display_name.clone();
    let boxes: Vec<BoundingBox> = session.boxes().boxes().to_vec();

    let started = Instant::now();
    info!(
        image = %image_name,
        boxes = boxes.len(),
        "Starting extraction batch"
    );

    let mut records = Vec::with_capacity(boxes.len());
    let mut cancelled = false;

    for (box_index, bounds) in boxes.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                image = %image_name,
                completed = records.len(),
                "Extraction batch cancelled"
            );
            cancelled = true;
            break;
        }

        let (cropped_png, text) = match crop_region(&image.pixels, bounds) {
            Ok(png) => {
                let text = recognize_box(recognizer, &png).await;
                (png, text)
            }
            Err(e) => {
                warn!(box_index, "Failed to crop box region: {e}");
                (Vec::new(), format!("[Error: {e}]"))
            }
        };

        records.push(ExtractionRecord {
            id: Uuid::new_v4(),
            image_id,
            source_image_name: image_name.clone(),
            box_index,
            bounds: *bounds,
            cropped_png,
            text,
            confidence: PLACEHOLDER_CONFIDENCE,
            status: RecordStatus::Pending,
        });
    }

    if cancelled {
        return Ok(BatchOutcome {
            records,
            cancelled: true,
            advance: None,
        });
    }

    session.mark_current_processed();
    session.boxes_mut().clear();
    let advance = session.advance_after_extraction();

    debug!(
        image = %image_name,
        records = records.len(),
        elapsed = ?started.elapsed(),
        "Extraction batch complete"
    );

    Ok(BatchOutcome {
        records,
        cancelled: false,
        advance: Some(advance),
    })
}

/// Run one box through the primary model with the single fallback retry
///
/// Classification is total: every path produces either the extracted text
/// or a bracketed diagnostic marker, never a batch-level error.
async fn recognize_box(recognizer: &dyn TextRecognizer, png: &[u8]) -> String {
    match recognizer.recognize(png, OcrModel::Primary).await {
        Ok(OcrResponse::Text(text)) => text,
        Ok(OcrResponse::Empty) => NO_TEXT_MARKER.to_string(),
        Err(OcrError::MalformedRequest(reason)) => {
            warn!(%reason, "Primary model rejected the request; retrying with the fallback model");
            match recognizer.recognize(png, OcrModel::Fallback).await {
                Ok(OcrResponse::Text(text)) => text,
                Ok(OcrResponse::Empty) => NO_TEXT_FALLBACK_MARKER.to_string(),
                Err(err) => {
                    warn!(error = %err, "Fallback model failed");
                    format!("[Alternative model failed: {err}]")
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "Extraction failed for box");
            failure_marker(&err)
        }
    }
}

/// Encode a capability failure as the record's diagnostic text
fn failure_marker(err: &OcrError) -> String {
    match err {
        OcrError::Api(msg) => format!("[API Error: {msg}]"),
        OcrError::PermissionDenied => {
            "[Error 403: Enable Generative Language API in Google Cloud Console]".to_string()
        }
        OcrError::Http(status) => format!("[HTTP {status}]"),
        OcrError::Transport(msg) => format!("[Error: {msg}]"),
        OcrError::MalformedRequest(msg) => format!("[API Error: {msg}]"),
    }
}

/// Crop the box rectangle out of the source raster as lossless PNG bytes
///
/// The rectangle is clamped to the image bounds; a box with no intersection
/// at all is an error, surfaced as a per-record diagnostic by the caller.
fn crop_region(image: &DynamicImage, bounds: &BoundingBox) -> Result<Vec<u8>> {
    let (img_w, img_h) = (image.width(), image.height());

    let x = bounds.x.max(0.0).floor() as u32;
    let y = bounds.y.max(0.0).floor() as u32;
    if x >= img_w || y >= img_h {
        bail!("box lies outside the image bounds");
    }

    let width = (bounds.width.round() as u32).clamp(1, img_w - x);
    let height = (bounds.height.round() as u32).clamp(1, img_h - y);

    let crop = image.crop_imm(x, y, width, height);
    let mut buffer = Cursor::new(Vec::new());
    crop.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoxCandidate;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Recognizer that replays a scripted sequence of outcomes
    struct ScriptedRecognizer {
        script: Mutex<VecDeque<Result<OcrResponse, OcrError>>>,
        calls: Mutex<Vec<OcrModel>>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<Result<OcrResponse, OcrError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn ok(text: &str) -> Result<OcrResponse, OcrError> {
            Ok(OcrResponse::Text(text.to_string()))
        }

        fn calls(&self) -> Vec<OcrModel> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        async fn recognize(&self, _png: &[u8], model: OcrModel) -> Result<OcrResponse, OcrError> {
            self.calls.lock().unwrap().push(model);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(OcrResponse::Empty))
        }
    }

    fn settings_with_key() -> OcrSettings {
        OcrSettings {
            api_key: "test-key".to_string(),
            ..OcrSettings::default()
        }
    }

    fn session_with_images(count: usize) -> AnnotationSession {
        AnnotationSession::new(
            (0..count)
                .map(|i| {
                    (
                        format!("img{i}.png"),
                        DynamicImage::new_rgba8(200, 150),
                    )
                })
                .collect(),
        )
    }

    fn add_boxes(session: &mut AnnotationSession, count: usize) {
        for i in 0..count {
            session.boxes_mut().add(BoxCandidate {
                x: 10.0 * i as f32,
                y: 5.0,
                width: 40.0,
                height: 20.0,
            });
        }
    }

    #[tokio::test]
    async fn test_empty_box_list_fails_fast() {
        let mut session = session_with_images(1);
        let recognizer = ScriptedRecognizer::new(vec![]);

        let result = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap_err(), ExtractError::NoBoxes);
        assert!(recognizer.calls().is_empty());
        assert!(!session.images()[0].processed);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 1);
        let recognizer = ScriptedRecognizer::new(vec![]);

        let result = extract_current(
            &mut session,
            &recognizer,
            &OcrSettings::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap_err(), ExtractError::MissingApiKey);
        // Boxes survive so the user can extract after configuring the key
        assert_eq!(session.boxes().len(), 1);
    }

    #[tokio::test]
    async fn test_n_boxes_produce_n_records_in_order() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 3);
        let recognizer = ScriptedRecognizer::new(vec![
            ScriptedRecognizer::ok("first"),
            ScriptedRecognizer::ok("second"),
            ScriptedRecognizer::ok("third"),
        ]);

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.records.len(), 3);
        for (i, record) in outcome.records.iter().enumerate() {
            assert_eq!(record.box_index, i);
            assert_eq!(record.image_id, 0);
            assert_eq!(record.source_image_name, "img0.png");
            assert_eq!(record.status, RecordStatus::Pending);
            assert!((record.confidence - PLACEHOLDER_CONFIDENCE).abs() < f32::EPSILON);
            assert!(!record.cropped_png.is_empty());
        }
        assert_eq!(outcome.records[0].text, "first");
        assert_eq!(outcome.records[2].text, "third");

        // Record ids are globally unique
        let ids: std::collections::HashSet<_> =
            outcome.records.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);

        // Post-conditions: processed, cleared, all done
        assert!(session.images()[0].processed);
        assert!(session.boxes().is_empty());
        assert_eq!(outcome.advance, Some(AdvanceOutcome::AllProcessed));
    }

    #[tokio::test]
    async fn test_malformed_request_retries_fallback_once() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 1);
        let recognizer = ScriptedRecognizer::new(vec![
            Err(OcrError::MalformedRequest("bad payload".to_string())),
            ScriptedRecognizer::ok("fallback text"),
        ]);

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // The record carries the fallback's text, not an error marker
        assert_eq!(outcome.records[0].text, "fallback text");
        assert_eq!(recognizer.calls(), vec![OcrModel::Primary, OcrModel::Fallback]);
    }

    #[tokio::test]
    async fn test_fallback_failure_becomes_the_diagnostic() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 1);
        let recognizer = ScriptedRecognizer::new(vec![
            Err(OcrError::MalformedRequest("bad payload".to_string())),
            Err(OcrError::Http(500)),
        ]);

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome.records[0].text,
            "[Alternative model failed: HTTP 500]"
        );
        // Exactly one retry, never more
        assert_eq!(recognizer.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_empty_result_marker() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 1);
        let recognizer = ScriptedRecognizer::new(vec![
            Err(OcrError::MalformedRequest("bad payload".to_string())),
            Ok(OcrResponse::Empty),
        ]);

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.records[0].text, NO_TEXT_FALLBACK_MARKER);
    }

    #[tokio::test]
    async fn test_permission_error_marker() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 1);
        let recognizer = ScriptedRecognizer::new(vec![Err(OcrError::PermissionDenied)]);

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome.records[0].text,
            "[Error 403: Enable Generative Language API in Google Cloud Console]"
        );
        // 403 never triggers the fallback
        assert_eq!(recognizer.calls(), vec![OcrModel::Primary]);
    }

    #[tokio::test]
    async fn test_one_bad_box_does_not_abort_the_batch() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 3);
        let recognizer = ScriptedRecognizer::new(vec![
            ScriptedRecognizer::ok("good"),
            Err(OcrError::Transport("connection reset".to_string())),
            Ok(OcrResponse::Empty),
        ]);

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0].text, "good");
        assert_eq!(outcome.records[1].text, "[Error: connection reset]");
        assert_eq!(outcome.records[2].text, NO_TEXT_MARKER);
        assert!(session.images()[0].processed);
    }

    #[tokio::test]
    async fn test_two_image_scenario_auto_advances_then_finishes() {
        let mut session = session_with_images(2);
        add_boxes(&mut session, 2);
        let recognizer = ScriptedRecognizer::new(vec![
            ScriptedRecognizer::ok("a"),
            ScriptedRecognizer::ok("b"),
            ScriptedRecognizer::ok("c"),
        ]);
        let settings = settings_with_key();
        let cancel = CancellationToken::new();

        let first = extract_current(&mut session, &recognizer, &settings, &cancel)
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        // Auto-advanced to image 2 without manual navigation
        assert_eq!(first.advance, Some(AdvanceOutcome::NextImage(1)));
        assert_eq!(session.current_index(), 1);

        add_boxes(&mut session, 1);
        let second = extract_current(&mut session, &recognizer, &settings, &cancel)
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.advance, Some(AdvanceOutcome::AllProcessed));

        let total = first.records.len() + second.records.len();
        assert_eq!(total, 3);
        assert!(session.images().iter().all(|i| i.processed));
    }

    #[tokio::test]
    async fn test_cancellation_between_boxes() {
        let mut session = session_with_images(1);
        add_boxes(&mut session, 2);
        let recognizer = ScriptedRecognizer::new(vec![ScriptedRecognizer::ok("ignored")]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = extract_current(
            &mut session,
            &recognizer,
            &settings_with_key(),
            &cancel,
        )
        .await
        .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.records.is_empty());
        assert!(outcome.advance.is_none());
        // Nothing consumed: image unprocessed, boxes retained for a re-run
        assert!(!session.images()[0].processed);
        assert_eq!(session.boxes().len(), 2);
    }

    #[test]
    fn test_crop_region_clamps_to_image_bounds() {
        let image = DynamicImage::new_rgba8(100, 80);
        let bounds = BoundingBox {
            id: crate::annotate::BoxId(1),
            x: 90.0,
            y: 70.0,
            width: 50.0,
            height: 50.0,
        };

        let png = crop_region(&image, &bounds).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 10);
        assert_eq!(decoded.height(), 10);
    }

    #[test]
    fn test_crop_region_outside_bounds_is_an_error() {
        let image = DynamicImage::new_rgba8(100, 80);
        let bounds = BoundingBox {
            id: crate::annotate::BoxId(1),
            x: 150.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
        };

        assert!(crop_region(&image, &bounds).is_err());
    }
}
