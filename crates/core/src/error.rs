//! Error taxonomy for the slot panel.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{models::SlotIndex, progression::LoadResult};

/// Errors surfaced by slot operations.
///
/// Most of these never leave the panel: load failures are resolved into the
/// switch machine's failure state and scan contention is simply dropped.
#[derive(Debug, Error)]
pub enum SlotError {
    /// A directory scan is already in flight.
    #[error("slot scan already in progress")]
    ScanBusy,
    /// The progression store could not load a slot.
    #[error("failed to load save slot {slot}: {result}")]
    LoadFailed {
        /// Slot that was being loaded.
        slot: SlotIndex,
        /// Failing load result.
        result: LoadResult,
    },
    /// A persisted slot name could not be decoded.
    #[error("malformed slot name entry: {0}")]
    MalformedName(String),
    /// A slot artifact could not be removed from disk.
    #[error("failed to delete {}: {source}", path.display())]
    DeleteFailed {
        /// Artifact path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The panel is waiting on the progression store.
    #[error("save slots are busy")]
    Busy,
    /// Progression or option storage failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SlotError {
    /// Short user-facing text used for notice dialogs.
    pub fn user_message(&self) -> String {
        match self {
            Self::ScanBusy => "Still scanning save slots.".to_string(),
            Self::LoadFailed { result, .. } => result.describe(),
            Self::MalformedName(entry) => format!("Ignored invalid slot name: {entry}"),
            Self::DeleteFailed { path, source } => format!(
                "Could not delete {}:\n{source}",
                path.file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string())
            ),
            Self::Busy => "Please wait for the save slot to finish loading.".to_string(),
            Self::Storage(err) => format!("{err:#}"),
        }
    }
}
