//! Export Stage
//!
//! Pairs every approved record into matched image/text artifacts under a
//! shared unique identifier and delivers them through an export sink.
//! Sinks that cannot absorb back-to-back deliveries (browser-style download
//! surfaces drop near-simultaneous triggers) declare it and get a fixed
//! inter-pair delay.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::extract::{ExtractionRecord, RecordStatus};

/// Delay between successive artifact pairs for throttled sinks.
/// A rate-limiting workaround, not a performance knob.
pub const PAIR_STAGGER: Duration = Duration::from_millis(200);

/// Suffix of the raster artifact
pub const IMAGE_SUFFIX: &str = ".png";
/// Suffix of the ground-truth text artifact
pub const TEXT_SUFFIX: &str = ".gt.txt";

/// Destination surface for export artifacts
#[async_trait]
pub trait ExportSink: Send {
    /// Deliver one artifact; `name` is the shared pair identifier plus suffix
    async fn deliver(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Whether successive pairs must be separated by [`PAIR_STAGGER`]
    fn requires_stagger(&self) -> bool {
        false
    }
}

/// Outcome of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No approved records; the sink was never touched
    NothingToExport,
    /// Number of artifact pairs delivered
    Exported { pairs: usize },
}

/// Export every approved record as a (raster, text) artifact pair
///
/// Pairs are generated in record-list order. The identifier is a fresh UUID
/// per pair, so ids never collide across repeated exports in one session.
/// The text artifact is exactly the record's current text, UTF-8, with no
/// trailing transformation.
pub async fn export_approved(
    records: &[ExtractionRecord],
    sink: &mut dyn ExportSink,
) -> Result<ExportOutcome> {
    let approved: Vec<&ExtractionRecord> = records
        .iter()
        .filter(|r| r.status == RecordStatus::Approved)
        .collect();

    if approved.is_empty() {
        info!("No approved records to export");
        return Ok(ExportOutcome::NothingToExport);
    }

    for (index, record) in approved.iter().enumerate() {
        if index > 0 && sink.requires_stagger() {
            tokio::time::sleep(PAIR_STAGGER).await;
        }

        let pair_id = Uuid::new_v4().simple().to_string();
        sink.deliver(&format!("{pair_id}{IMAGE_SUFFIX}"), &record.cropped_png)
            .await?;
        sink.deliver(&format!("{pair_id}{TEXT_SUFFIX}"), record.text.as_bytes())
            .await?;
    }

    info!(pairs = approved.len(), "Export complete");
    Ok(ExportOutcome::Exported {
        pairs: approved.len(),
    })
}

/// Sink writing artifact pairs into a directory
///
/// Filesystem writes are atomic from the caller's perspective, so no
/// staggering is needed here; the delay exists for download-surface sinks.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating export directory {}", dir.display()))?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn deliver(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
