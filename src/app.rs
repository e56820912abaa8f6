//! Pipeline wiring
//!
//! Central session state tying the stages together: annotation session,
//! review queue, settings store, view transform, and the current pipeline
//! stage. Commands from the keyboard surface are applied here; the
//! extract → review transition is enforced by the transition function, not
//! by whoever happens to re-render.

use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::annotate::{AdvanceOutcome, AnnotationSession};
use crate::config::SettingsStore;
use crate::extract::{extract_current, ExtractError};
use crate::geometry::ViewTransform;
use crate::keymap::{command_for, Command, KeyInput, Stage};
use crate::ocr::TextRecognizer;
use crate::review::ReviewQueue;

/// Everything one annotation-to-export session owns
pub struct AppSession {
    stage: Stage,
    pub session: AnnotationSession,
    pub review: ReviewQueue,
    pub settings: SettingsStore,
    pub view: ViewTransform,
    cancel: CancellationToken,
}

impl AppSession {
    pub fn new(images: Vec<(String, DynamicImage)>, settings: SettingsStore) -> Self {
        Self {
            stage: Stage::Annotate,
            session: AnnotationSession::new(images),
            review: ReviewQueue::new(),
            settings,
            view: ViewTransform::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Token observed between boxes by a running extraction batch
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Apply a key event through the command table
    ///
    /// Synchronous commands are applied in place. `Extract` is handed back
    /// to the caller, which owns the recognizer and the async context.
    /// Returns the resolved command, or `None` for unbound keys.
    pub fn handle_key(&mut self, key: KeyInput) -> Option<Command> {
        let command = command_for(self.stage, key)?;
        match command {
            Command::Extract => return Some(Command::Extract),
            Command::UndoLastBox => {
                self.session.boxes_mut().undo_last();
            }
            Command::NextImage => {
                self.session.next_image();
            }
            Command::Approve => self.review.approve(),
            Command::Reject => self.review.reject(),
            Command::ToggleEdit => self.review.toggle_edit(),
            Command::NavigatePrev => self.review.navigate(-1),
            Command::NavigateNext => self.review.navigate(1),
        }
        Some(command)
    }

    /// Extract the current image's boxes and fold the batch into review
    ///
    /// When the whole batch is done the pipeline transitions to the review
    /// stage with the cursor reset to the first record.
    pub async fn extract_boxes(
        &mut self,
        recognizer: &dyn TextRecognizer,
    ) -> Result<(), ExtractError> {
        let outcome = extract_current(
            &mut self.session,
            recognizer,
            self.settings.get(),
            &self.cancel,
        )
        .await?;

        let all_processed = matches!(outcome.advance, Some(AdvanceOutcome::AllProcessed));
        self.review.append_batch(outcome.records);

        if all_processed {
            self.enter_review();
        }
        Ok(())
    }

    /// Move the pipeline to the review stage, cursor at the first record
    pub fn enter_review(&mut self) {
        info!(records = self.review.len(), "Entering review stage");
        self.stage = Stage::Review;
        self.review.reset_cursor();
    }
}
