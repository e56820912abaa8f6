//! Build labeled OCR training pairs from annotated images
//!
//! The pipeline: a human draws bounding boxes over text regions
//! ([`geometry`], [`annotate`]), an external vision service extracts text
//! for each box ([`ocr`], [`extract`]), a human reviews and corrects each
//! extraction ([`review`]), and approved pairs are exported as matched
//! image/text artifact sets ([`export`]). Data flows strictly forward;
//! only the review stage navigates backward.

pub mod annotate;
pub mod app;
pub mod config;
pub mod export;
pub mod extract;
pub mod geometry;
pub mod keymap;
pub mod ocr;
pub mod review;
