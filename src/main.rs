//! OCR Dataset Builder - labeled OCR training pairs from annotated images
//!
//! Boxes come in through an annotation manifest, text is extracted per box
//! through the Gemini vision API, a review pass approves or rejects each
//! record, and approved pairs are exported as matched .png/.gt.txt
//! artifacts.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ocr_dataset_builder::app::AppSession;
use ocr_dataset_builder::config::{self, OcrSettings, SettingsStore};
use ocr_dataset_builder::export::{export_approved, DirectorySink, ExportOutcome};
use ocr_dataset_builder::extract::ExtractError;
use ocr_dataset_builder::geometry::BoxCandidate;
use ocr_dataset_builder::keymap::{Command, KeyInput, Stage};
use ocr_dataset_builder::ocr::GeminiOcr;

/// Build labeled OCR training pairs from annotated images
#[derive(Parser, Debug)]
#[command(name = "ocr-dataset-builder")]
#[command(about = "Extract, review and export OCR ground-truth pairs")]
struct Args {
    /// Annotation manifest: JSON list of images with their bounding boxes
    manifest: PathBuf,

    /// Directory receiving the exported .png/.gt.txt artifact pairs
    #[arg(short, long, default_value = "dataset")]
    out: PathBuf,

    /// Settings file override (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Approve every record without interactive review
    #[arg(long)]
    approve_all: bool,
}

/// One manifest entry: an image plus its hand-drawn boxes
#[derive(Debug, serde::Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    boxes: Vec<ManifestBox>,
}

/// Box rectangle in canvas display coordinates
#[derive(Debug, serde::Deserialize)]
struct ManifestBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("OCR Dataset Builder starting...");

    let settings_path = match &args.config {
        Some(path) => path.clone(),
        None => config::get_config_dir()?.join("settings.toml"),
    };
    let settings = load_or_default_settings(&settings_path);

    let store = if settings.auto_save {
        let path = settings_path.clone();
        SettingsStore::with_persistence(
            settings,
            Box::new(move |s| {
                if let Err(e) = config::save_settings(s, &path) {
                    warn!("Failed to persist settings: {e}");
                }
            }),
        )
    } else {
        SettingsStore::new(settings)
    };

    let manifest = load_manifest(&args.manifest)?;
    if manifest.is_empty() {
        bail!("manifest contains no images");
    }

    let mut images = Vec::with_capacity(manifest.len());
    for entry in &manifest {
        let pixels = image::open(&entry.path)
            .with_context(|| format!("loading image {}", entry.path.display()))?;
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.path.display().to_string());
        images.push((name, pixels));
    }
    info!(images = images.len(), "Loaded image batch");

    let recognizer = GeminiOcr::new(store.get().api_key.clone());
    let mut app = AppSession::new(images, store);

    // Ctrl-C stops the batch between boxes, keeping what was extracted
    let cancel = app.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current box");
            cancel.cancel();
        }
    });

    run_extraction(&mut app, &recognizer, &manifest, &settings_path).await?;

    if app.review.is_empty() {
        bail!("no records were extracted; nothing to review");
    }

    if args.approve_all {
        info!(records = app.review.len(), "Approving all records");
        for _ in 0..app.review.len() {
            app.review.approve();
        }
    } else {
        run_review_loop(&mut app)?;
    }

    let counts = app.review.counts();
    info!(
        approved = counts.approved,
        rejected = counts.rejected,
        pending = counts.pending,
        "Review finished"
    );

    let mut sink = DirectorySink::new(&args.out)?;
    match export_approved(app.review.records(), &mut sink).await? {
        ExportOutcome::NothingToExport => {
            println!("No approved records; nothing exported.");
        }
        ExportOutcome::Exported { pairs } => {
            println!(
                "Exported {pairs} image-text pairs to {}",
                args.out.display()
            );
        }
    }

    Ok(())
}

/// Load settings from file or fall back to defaults
fn load_or_default_settings(path: &Path) -> OcrSettings {
    if path.exists() {
        match config::load_settings(path) {
            Ok(settings) => {
                info!("Loaded settings from {:?}", path);
                return settings;
            }
            Err(e) => warn!("Failed to read settings ({e}); using defaults"),
        }
    }
    OcrSettings::default()
}

fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest = serde_json::from_str(&content)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(manifest)
}

/// Drive extraction across the whole image batch
async fn run_extraction(
    app: &mut AppSession,
    recognizer: &GeminiOcr,
    manifest: &[ManifestEntry],
    settings_path: &Path,
) -> Result<()> {
    while app.stage() == Stage::Annotate {
        let index = app.session.current_index();
        seed_boxes(app, &manifest[index]);

        if app.session.boxes().is_empty() {
            warn!(image = index, "No usable boxes for image; skipping");
            if !app.session.next_image() {
                app.enter_review();
            }
            continue;
        }

        match app.extract_boxes(recognizer).await {
            Ok(()) => {
                if app.cancellation_token().is_cancelled() {
                    warn!("Extraction cancelled; reviewing what was extracted so far");
                    app.enter_review();
                }
            }
            Err(ExtractError::MissingApiKey) => {
                bail!(
                    "Gemini API key is not set. Add `api_key` to {} and re-run.",
                    settings_path.display()
                );
            }
            Err(e) => bail!("extraction failed: {e}"),
        }
    }
    Ok(())
}

/// Commit a manifest entry's boxes through the same minimum-size gate the
/// canvas applies to drawn candidates
fn seed_boxes(app: &mut AppSession, entry: &ManifestEntry) {
    for b in &entry.boxes {
        let candidate = BoxCandidate {
            x: b.x,
            y: b.y,
            width: b.width,
            height: b.height,
        };
        if candidate.meets_minimum_size() {
            app.session.boxes_mut().add(candidate);
        } else {
            warn!(?candidate, "Discarding box below the minimum size");
        }
    }
}

/// Interactive stdin review: one command per line
fn run_review_loop(app: &mut AppSession) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    println!(
        "Review {} records: [a]pprove [x]reject [e]dit [p]rev [n]ext [d]one",
        app.review.len()
    );

    loop {
        let Some(record) = app.review.current() else {
            break;
        };
        println!(
            "--- {}/{} | {} | box #{} | {:?}",
            app.review.cursor() + 1,
            app.review.len(),
            record.source_image_name,
            record.box_index + 1,
            record.status
        );
        println!("{}", app.review.edit_text().unwrap_or(record.text.as_str()));
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();

        // The terminal has no arrow-key events; p/n stand in for them here
        let key = match input {
            "d" | "done" => break,
            "p" | "prev" => Some(KeyInput::ArrowLeft),
            "n" | "next" => Some(KeyInput::ArrowRight),
            other => other.chars().next().map(KeyInput::Char),
        };

        let Some(key) = key else { continue };
        match app.handle_key(key) {
            Some(Command::ToggleEdit) if app.review.is_editing() => {
                print!("new text> ");
                std::io::stdout().flush()?;
                if let Some(edited) = lines.next() {
                    app.review.set_edit_text(edited?);
                    println!("(edit staged; approve to commit, reject or navigate to discard)");
                }
            }
            Some(_) => {}
            None => println!("unbound key: {input}"),
        }
    }
    Ok(())
}
