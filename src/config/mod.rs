//! Application Configuration
//!
//! User settings stored in TOML format under the platform config directory.
//! The pipeline reads only the in-memory value; persistence happens through
//! an injected on-change hook so the core never touches the storage
//! mechanism directly.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User settings for the OCR pipeline
///
/// `parallel_processing` and `auto_deskew` are reserved flags: persisted and
/// surfaced in configuration, but extraction stays strictly sequential and
/// no deskew pass runs.
#[derive(Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Gemini API key. Secret: never logged, redacted from Debug output.
    pub api_key: String,
    /// Persist settings automatically on change
    pub auto_save: bool,
    /// Reserved: advertised parallel extraction (no effect)
    pub parallel_processing: bool,
    /// Reserved: automatic skew correction (no effect)
    pub auto_deskew: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auto_save: true,
            parallel_processing: true,
            auto_deskew: true,
        }
    }
}

impl OcrSettings {
    /// Whether a credential has been configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for OcrSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrSettings")
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("auto_save", &self.auto_save)
            .field("parallel_processing", &self.parallel_processing)
            .field("auto_deskew", &self.auto_deskew)
            .finish()
    }
}

/// Persist-on-change callback
pub type PersistHook = Box<dyn Fn(&OcrSettings) + Send + Sync>;

/// In-memory settings with an optional persistence hook
///
/// Loaded once at startup; every mutation through [`SettingsStore::update`]
/// re-runs the hook so the stored copy never drifts from the live one.
pub struct SettingsStore {
    settings: OcrSettings,
    on_change: Option<PersistHook>,
}

impl SettingsStore {
    /// A store that keeps settings in memory only
    pub fn new(settings: OcrSettings) -> Self {
        Self {
            settings,
            on_change: None,
        }
    }

    /// A store that re-persists through `hook` after every change
    pub fn with_persistence(settings: OcrSettings, hook: PersistHook) -> Self {
        Self {
            settings,
            on_change: Some(hook),
        }
    }

    pub fn get(&self) -> &OcrSettings {
        &self.settings
    }

    /// Apply a mutation and run the persistence hook
    pub fn update(&mut self, mutate: impl FnOnce(&mut OcrSettings)) {
        mutate(&mut self.settings);
        if let Some(hook) = &self.on_change {
            hook(&self.settings);
        }
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.settings)
            .field("persistent", &self.on_change.is_some())
            .finish()
    }
}

/// Get the configuration directory for this application
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "ocrdatasetbuilder", "OcrDatasetBuilder")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Load settings from file
pub fn load_settings(path: &Path) -> Result<OcrSettings> {
    let content = std::fs::read_to_string(path)?;
    let settings: OcrSettings = toml::from_str(&content)?;
    Ok(settings)
}

/// Save settings to file
pub fn save_settings(settings: &OcrSettings, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
