//! User settings
//!
//! Stored as pretty JSON under the XDG config dir. A missing file is created
//! from defaults so users have something to edit; environment variables
//! override file values, and command line flags override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::constants::{config, validation};
use crate::storage::JsonFileStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Logical-to-physical scale factor; detected from the X server when unset
    #[serde(default)]
    pub ui_scale: Option<u32>,

    /// X display to connect to; `$DISPLAY` when unset
    #[serde(default)]
    pub x11_display: Option<String>,

    /// Favorites file; the XDG data dir when unset
    #[serde(default)]
    pub favorites_path: Option<PathBuf>,
}

impl Settings {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    /// Load settings, falling back to defaults on any problem
    pub fn load() -> Self {
        let config_path = Self::config_path();
        let mut settings = match fs::read_to_string(&config_path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    info!(path = %config_path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    error!(path = %config_path.display(), error = %e, "Failed to parse settings file, using defaults");
                    error!(path = %config_path.display(), "The file has been preserved - fix it and restart.");
                    Settings::default()
                }
            },
            Err(_) => {
                let settings = Settings::default();
                match settings.save() {
                    Ok(()) => info!(path = %config_path.display(), "Generated settings file for user to edit"),
                    Err(e) => warn!(error = ?e, "Failed to write default settings"),
                }
                settings
            }
        };

        settings.apply_env_overrides();
        settings.validate_and_clamp();
        settings
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;
        fs::write(&path, contents)
            .context(format!("Failed to write settings file to {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var(config::ENV_SCALE) {
            match raw.trim().parse::<u32>() {
                Ok(scale) => self.ui_scale = Some(scale),
                Err(e) => error!(var = config::ENV_SCALE, value = %raw, error = ?e, "failed to parse env var"),
            }
        }
        if let Ok(raw) = env::var(config::ENV_FAVORITES)
            && !raw.trim().is_empty()
        {
            self.favorites_path = Some(PathBuf::from(raw.trim()));
        }
    }

    /// Clamp values to supported ranges
    pub fn validate_and_clamp(&mut self) {
        if let Some(scale) = self.ui_scale {
            let clamped = scale.clamp(validation::MIN_UI_SCALE, validation::MAX_UI_SCALE);
            if clamped != scale {
                warn!(ui_scale = scale, using = clamped, "ui_scale out of range, clamping");
                self.ui_scale = Some(clamped);
            }
        }
        if self.x11_display.as_deref().is_some_and(|d| d.trim().is_empty()) {
            warn!("x11_display is blank, using $DISPLAY");
            self.x11_display = None;
        }
    }

    pub fn favorites_store(&self) -> JsonFileStore {
        JsonFileStore::new(
            self.favorites_path
                .clone()
                .unwrap_or_else(JsonFileStore::default_path),
        )
    }
}
