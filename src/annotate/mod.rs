//! Annotation session state
//!
//! Owns the uploaded image batch, the active-image cursor, and the box
//! store for the image currently being annotated.

pub mod boxes;

use image::DynamicImage;

pub use boxes::{BoundingBox, BoxId, BoxStore};

/// One uploaded image in the session batch
pub struct SourceImage {
    /// Stable zero-based id within the upload batch
    pub id: u32,
    /// Original file name, kept for display and record denormalization
    pub display_name: String,
    /// Decoded raster content
    pub pixels: DynamicImage,
    /// Set once this image's boxes have been extracted at least once
    pub processed: bool,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("dimensions", &(self.pixels.width(), self.pixels.height()))
            .field("processed", &self.processed)
            .finish()
    }
}

/// Where the session advances after an extraction batch completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next unprocessed image
    NextImage(u32),
    /// No unprocessed images remain; the pipeline moves to review
    AllProcessed,
}

/// The in-memory annotation session: image batch + active box store
#[derive(Debug)]
pub struct AnnotationSession {
    images: Vec<SourceImage>,
    current_index: usize,
    boxes: BoxStore,
}

impl AnnotationSession {
    /// Build a session from named rasters, assigning zero-based ids in order
    pub fn new(images: Vec<(String, DynamicImage)>) -> Self {
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, (display_name, pixels))| SourceImage {
                id: i as u32,
                display_name,
                pixels,
                processed: false,
            })
            .collect();
        Self {
            images,
            current_index: 0,
            boxes: BoxStore::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The image currently being annotated
    pub fn current_image(&self) -> Option<&SourceImage> {
        self.images.get(self.current_index)
    }

    pub fn images(&self) -> &[SourceImage] {
        &self.images
    }

    pub fn boxes(&self) -> &BoxStore {
        &self.boxes
    }

    pub fn boxes_mut(&mut self) -> &mut BoxStore {
        &mut self.boxes
    }

    /// Mark the current image as processed
    pub fn mark_current_processed(&mut self) {
        if let Some(image) = self.images.get_mut(self.current_index) {
            image.processed = true;
        }
    }

    /// Manual advance to the next image (the `n` key)
    ///
    /// Clamped at the last image; clears the box store when the cursor
    /// actually moves, since boxes belong to exactly one image.
    pub fn next_image(&mut self) -> bool {
        if self.current_index + 1 < self.images.len() {
            self.current_index += 1;
            self.boxes.clear();
            true
        } else {
            false
        }
    }

    /// Post-extraction advance: move to the next unprocessed image, or
    /// report that the whole batch is done
    pub fn advance_after_extraction(&mut self) -> AdvanceOutcome {
        let next = self
            .images
            .iter()
            .enumerate()
            .skip(self.current_index + 1)
            .find(|(_, img)| !img.processed);
        match next {
            Some((index, img)) => {
                let id = img.id;
                self.current_index = index;
                AdvanceOutcome::NextImage(id)
            }
            None => AdvanceOutcome::AllProcessed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoxCandidate;

    fn blank(name: &str) -> (String, DynamicImage) {
        (name.to_string(), DynamicImage::new_rgba8(64, 64))
    }

    fn session(count: usize) -> AnnotationSession {
        AnnotationSession::new((0..count).map(|i| blank(&format!("img{i}.png"))).collect())
    }

    #[test]
    fn test_ids_are_zero_based_and_stable() {
        let session = session(3);
        let ids: Vec<u32> = session.images().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(session.images().iter().all(|i| !i.processed));
    }

    #[test]
    fn test_next_image_clears_boxes_and_clamps() {
        let mut session = session(2);
        session.boxes_mut().add(BoxCandidate {
            x: 0.0,
            y: 0.0,
            width: 20.0,
            height: 20.0,
        });

        assert!(session.next_image());
        assert_eq!(session.current_index(), 1);
        assert!(session.boxes().is_empty());

        // Already at the last image
        assert!(!session.next_image());
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn test_advance_after_extraction_skips_processed() {
        let mut session = session(3);
        session.mark_current_processed();
        assert_eq!(
            session.advance_after_extraction(),
            AdvanceOutcome::NextImage(1)
        );

        session.mark_current_processed();
        assert_eq!(
            session.advance_after_extraction(),
            AdvanceOutcome::NextImage(2)
        );

        session.mark_current_processed();
        assert_eq!(
            session.advance_after_extraction(),
            AdvanceOutcome::AllProcessed
        );
    }

    #[test]
    fn test_debug_shows_dimensions_not_pixels() {
        let session = session(1);
        let rendered = format!("{:?}", session.current_image().unwrap());
        assert!(rendered.contains("img0.png"));
        assert!(rendered.contains("64"));
    }
}
