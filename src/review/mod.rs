//! Review State Machine
//!
//! Holds the full ordered list of extraction records across all images,
//! tracks the review cursor, and applies approve/reject/edit transitions.
//! Every transition is total: the cursor is clamped to the record range and
//! the edit buffer is cleared on any cursor change, so stale text can never
//! leak into an unrelated record.

use crate::extract::{ExtractionRecord, RecordStatus};

/// Aggregate review statistics, derived on demand from the record list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewCounts {
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
}

/// Record list plus review cursor and edit buffer
#[derive(Debug, Default)]
pub struct ReviewQueue {
    records: Vec<ExtractionRecord>,
    cursor: usize,
    edit_buffer: Option<String>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a freshly extracted batch, preserving arrival order
    pub fn append_batch(&mut self, records: Vec<ExtractionRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The record under the cursor
    pub fn current(&self) -> Option<&ExtractionRecord> {
        self.records.get(self.cursor)
    }

    /// Rewind to the first record (entering the review stage)
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
        self.edit_buffer = None;
    }

    pub fn is_editing(&self) -> bool {
        self.edit_buffer.is_some()
    }

    pub fn edit_text(&self) -> Option<&str> {
        self.edit_buffer.as_deref()
    }

    /// Enter edit mode seeded with the current record's text, or leave it
    /// discarding the buffer. Commit happens only through [`approve`].
    ///
    /// [`approve`]: ReviewQueue::approve
    pub fn toggle_edit(&mut self) {
        if self.edit_buffer.is_some() {
            self.edit_buffer = None;
        } else if let Some(record) = self.records.get(self.cursor) {
            self.edit_buffer = Some(record.text.clone());
        }
    }

    /// Replace the edit buffer contents while in edit mode
    pub fn set_edit_text(&mut self, text: impl Into<String>) {
        if self.edit_buffer.is_some() {
            self.edit_buffer = Some(text.into());
        }
    }

    /// Approve the current record, committing the edit buffer first if one
    /// is active, then advance the cursor (no-op at the last record)
    pub fn approve(&mut self) {
        let buffer = self.edit_buffer.take();
        if let Some(record) = self.records.get_mut(self.cursor) {
            if let Some(text) = buffer {
                record.text = text;
            }
            record.status = RecordStatus::Approved;
            self.advance_cursor();
        }
    }

    /// Reject the current record. The edit buffer is discarded WITHOUT
    /// committing, then the cursor advances as for approve.
    pub fn reject(&mut self) {
        self.edit_buffer = None;
        if let Some(record) = self.records.get_mut(self.cursor) {
            record.status = RecordStatus::Rejected;
            self.advance_cursor();
        }
    }

    /// Move the cursor by the given offset, clamped to [0, len-1]
    ///
    /// Clears the edit buffer whenever the cursor actually moves.
    pub fn navigate(&mut self, offset: isize) {
        if self.records.is_empty() {
            return;
        }
        let last = self.records.len() - 1;
        let target = self
            .cursor
            .saturating_add_signed(offset)
            .min(last);
        if target != self.cursor {
            self.cursor = target;
            self.edit_buffer = None;
        }
    }

    /// Derived approved/rejected/pending totals
    pub fn counts(&self) -> ReviewCounts {
        let mut counts = ReviewCounts::default();
        for record in &self.records {
            match record.status {
                RecordStatus::Approved => counts.approved += 1,
                RecordStatus::Rejected => counts.rejected += 1,
                RecordStatus::Pending => counts.pending += 1,
            }
        }
        counts
    }

    fn advance_cursor(&mut self) {
        if self.cursor + 1 < self.records.len() {
            self.cursor += 1;
        }
    }
}
