mod app;
mod theme;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use slotdeck_core::{
    config::{self, AppConfig},
    BackupManager, FsProgressionStore, HostOptions, SaveNameStore, SavesPanel, SlotStorage,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(
        save_root = %config.save_root.display(),
        backup_root = %config.backup_root.display(),
        "starting slotdeck"
    );

    let mut names = SaveNameStore::default();
    let options = HostOptions::load(&config.options_file, &mut names)
        .with_context(|| format!("failed to read {}", config.options_file.display()))?;
    let store = FsProgressionStore::new(SlotStorage::new(&config.save_root), options.save_slot);
    let panel = SavesPanel::new(store, names.shared(), options, &config);
    let backups = BackupManager::new(&config.save_root, &config.backup_root);

    let mut app = app::SlotdeckApp::new(config, panel, backups);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("slotdeck.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotdeck=info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
