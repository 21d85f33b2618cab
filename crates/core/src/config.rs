//! Application configuration.
//!
//! Values come from `<config dir>/slotdeck/config.toml` and are overridden by
//! `SLOTDECK_*` environment variables.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backup::BackupManager;

const APP_DIR: &str = "slotdeck";
const CONFIG_FILE: &str = "config.toml";

/// Runtime configuration for the saves panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the slot files.
    pub save_root: PathBuf,
    /// Directory backups are written to.
    pub backup_root: PathBuf,
    /// Host option string file.
    pub options_file: PathBuf,
    /// Rows visible in the slot list.
    pub slot_window: usize,
    /// Rows visible in the progress card list.
    pub card_window: usize,
    /// UI tick period in milliseconds.
    pub tick_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let save_root = data_root().join("saves");
        Self {
            options_file: save_root.join("options"),
            save_root,
            backup_root: BackupManager::default_root(),
            slot_window: 12,
            card_window: 4,
            tick_ms: 100,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("save_root", defaults.save_root.to_string_lossy().to_string())?
            .set_default(
                "backup_root",
                defaults.backup_root.to_string_lossy().to_string(),
            )?
            .set_default(
                "options_file",
                defaults.options_file.to_string_lossy().to_string(),
            )?
            .set_default("slot_window", defaults.slot_window as i64)?
            .set_default("card_window", defaults.card_window as i64)?
            .set_default("tick_ms", defaults.tick_ms as i64)?
            .add_source(File::from(config_path()).required(false))
            .add_source(Environment::with_prefix("SLOTDECK"))
            .build()
            .context("failed to read configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(config.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.slot_window = self.slot_window.max(1);
        self.card_window = self.card_window.max(1);
        self.tick_ms = self.tick_ms.max(10);
        self
    }

    /// Render as TOML for the default config file.
    pub fn to_toml(&self) -> String {
        format!(
            "# slotdeck configuration. SLOTDECK_* environment variables override these.\nsave_root = {:?}\nbackup_root = {:?}\noptions_file = {:?}\nslot_window = {}\ncard_window = {}\ntick_ms = {}\n",
            self.save_root.to_string_lossy(),
            self.backup_root.to_string_lossy(),
            self.options_file.to_string_lossy(),
            self.slot_window,
            self.card_window,
            self.tick_ms,
        )
    }
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Location of the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Write a default config file when none exists yet.
pub fn ensure_default_config() -> Result<()> {
    let path = config_path();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, AppConfig::default().to_toml())
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}
