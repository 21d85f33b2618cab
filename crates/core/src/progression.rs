//! Progression store contract and its filesystem implementation.
//!
//! The store owns the actual slot data. The panel only commands it: destroy
//! the data of a slot, begin loading another one, wipe, delete. Loads are
//! asynchronous and resolve a one-shot [`LoadTicket`].

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    models::SlotIndex,
    storage::{ArtifactKind, SlotStorage},
};

/// Outcome of a slot load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    /// No data existed; a fresh file was created.
    CreatedNewFile,
    /// Existing data was read.
    LoadedExistingFile,
    /// The file exists but holds no data; treated as a fresh slot.
    MissingDataButOk,
    /// The data could not be parsed. Carries the raw error when known.
    ReadFailed(Option<String>),
    /// Any other failure.
    OtherFailure,
}

impl LoadResult {
    /// Whether the slot is usable after this result.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::CreatedNewFile | Self::LoadedExistingFile | Self::MissingDataButOk
        )
    }

    /// Error text for the failure dialog, including the raw detail when available.
    pub fn describe(&self) -> String {
        match self {
            Self::ReadFailed(Some(detail)) => format!("{self}\n{detail}"),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for LoadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreatedNewFile => "SUCCESS_CREATE_NEW_FILE",
            Self::LoadedExistingFile => "SUCCESS_LOAD_EXISTING_FILE",
            Self::MissingDataButOk => "ERROR_SAVE_DATA_MISSING",
            Self::ReadFailed(_) => "ERROR_READ_FAILED",
            Self::OtherFailure => "ERROR_OTHER",
        };
        f.write_str(text)
    }
}

/// Pending result of [`ProgressionStore::begin_load`].
///
/// Dropping the ticket unregisters interest in the load; a late completion
/// is discarded.
#[derive(Debug)]
pub struct LoadTicket {
    receiver: oneshot::Receiver<LoadResult>,
}

impl LoadTicket {
    /// Pair a ticket with the sender that completes it.
    pub fn channel() -> (oneshot::Sender<LoadResult>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Non-blocking check, called once per tick.
    ///
    /// A load whose producer went away without answering counts as a failure.
    pub fn poll(&mut self) -> Option<LoadResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(LoadResult::OtherFailure),
        }
    }

    /// Wait for the result.
    pub async fn wait(self) -> LoadResult {
        self.receiver.await.unwrap_or(LoadResult::OtherFailure)
    }
}

/// Progress of one campaign inside a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignProgress {
    /// Campaign name.
    pub name: String,
    /// Current karma level.
    #[serde(default)]
    pub karma: u32,
    /// Highest karma cap reached.
    #[serde(default)]
    pub karma_cap: u32,
    /// Food pips stored.
    #[serde(default)]
    pub food: u32,
    /// Cycle counter.
    #[serde(default)]
    pub cycle: u32,
    /// Play time in seconds.
    #[serde(default)]
    pub elapsed_seconds: u64,
}

/// In-memory copy of a slot's data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionSnapshot {
    /// Per-campaign progress.
    #[serde(default)]
    pub campaigns: Vec<CampaignProgress>,
    /// Unlocked side content (arenas, sandbox items). Survives a reset.
    #[serde(default)]
    pub unlocks: Vec<String>,
    /// Last time the slot was written.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Subsystem owning slot data.
pub trait ProgressionStore {
    /// Slot whose data is (or is being) held.
    fn current_slot(&self) -> SlotIndex;

    /// Drop the in-memory data of `slot` if it is the one held.
    fn destroy(&mut self, slot: SlotIndex);

    /// Drop the in-memory data of the current slot.
    fn destroy_current(&mut self) {
        let slot = self.current_slot();
        self.destroy(slot);
    }

    /// Start loading `slot`. The store holds `slot` from now on.
    fn begin_load(&mut self, slot: SlotIndex) -> LoadTicket;

    /// `false` while a load is outstanding or after a destroy.
    fn is_loaded(&self) -> bool;

    /// Reset the current slot's progression, keeping unlocked side content.
    fn wipe_all(&mut self) -> Result<()>;

    /// Remove the current slot's primary file.
    fn delete_save(&mut self) -> Result<()>;

    /// Copy of the loaded data, if any.
    fn snapshot(&self) -> Option<ProgressionSnapshot>;
}

/// Progression store keeping one JSON document per slot in the save directory.
#[derive(Clone)]
pub struct FsProgressionStore {
    storage: SlotStorage,
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    slot: SlotIndex,
    generation: u64,
    loaded: bool,
    snapshot: Option<ProgressionSnapshot>,
}

impl FsProgressionStore {
    /// Store over `storage`, initially holding nothing for `slot`.
    pub fn new(storage: SlotStorage, slot: SlotIndex) -> Self {
        Self {
            storage,
            inner: Arc::new(RwLock::new(Inner {
                slot,
                generation: 0,
                loaded: false,
                snapshot: None,
            })),
        }
    }

    fn save_path(&self, slot: SlotIndex) -> PathBuf {
        self.storage.artifact_path(ArtifactKind::Save, slot)
    }

    fn write_snapshot(&self, slot: SlotIndex, snapshot: &ProgressionSnapshot) -> Result<()> {
        let path = self.save_path(slot);
        write_document(&path, snapshot)
    }
}

impl ProgressionStore for FsProgressionStore {
    fn current_slot(&self) -> SlotIndex {
        self.inner.read().slot
    }

    fn destroy(&mut self, slot: SlotIndex) {
        let mut inner = self.inner.write();
        if inner.slot != slot {
            return;
        }
        debug!(slot, "destroying progression");
        inner.generation += 1;
        inner.loaded = false;
        inner.snapshot = None;
    }

    fn begin_load(&mut self, slot: SlotIndex) -> LoadTicket {
        let generation = {
            let mut inner = self.inner.write();
            inner.generation += 1;
            inner.slot = slot;
            inner.loaded = false;
            inner.snapshot = None;
            inner.generation
        };

        let (sender, ticket) = LoadTicket::channel();
        let path = self.save_path(slot);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let (result, snapshot) = read_slot(path).await;
            {
                let mut inner = inner.write();
                if inner.generation != generation {
                    debug!(slot, "discarding stale progression load");
                    return;
                }
                inner.loaded = true;
                inner.snapshot = snapshot;
            }
            let _ = sender.send(result);
        });
        ticket
    }

    fn is_loaded(&self) -> bool {
        self.inner.read().loaded
    }

    fn wipe_all(&mut self) -> Result<()> {
        let (slot, snapshot) = {
            let mut inner = self.inner.write();
            let slot = inner.slot;
            if !inner.loaded {
                return Err(anyhow!("progression for slot {slot} is not loaded"));
            }
            let snapshot = inner.snapshot.get_or_insert_with(ProgressionSnapshot::default);
            snapshot.campaigns.clear();
            snapshot.saved_at = Some(Utc::now());
            (slot, snapshot.clone())
        };
        info!(slot, unlocks = snapshot.unlocks.len(), "wiped progression");
        self.write_snapshot(slot, &snapshot)
    }

    fn delete_save(&mut self) -> Result<()> {
        let slot = self.current_slot();
        let path = self.save_path(slot);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("failed to delete {}", path.display()))
            }
        }
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.loaded = false;
        inner.snapshot = None;
        Ok(())
    }

    fn snapshot(&self) -> Option<ProgressionSnapshot> {
        self.inner.read().snapshot.clone()
    }
}

async fn read_slot(path: PathBuf) -> (LoadResult, Option<ProgressionSnapshot>) {
    match tokio::fs::read_to_string(&path).await {
        Ok(content) if content.trim().is_empty() => (
            LoadResult::MissingDataButOk,
            Some(ProgressionSnapshot::default()),
        ),
        Ok(content) => match serde_json::from_str::<ProgressionSnapshot>(&content) {
            Ok(snapshot) => (LoadResult::LoadedExistingFile, Some(snapshot)),
            Err(err) => {
                warn!(path = %path.display(), "unreadable save data: {err}");
                (LoadResult::ReadFailed(Some(err.to_string())), None)
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let snapshot = ProgressionSnapshot {
                saved_at: Some(Utc::now()),
                ..ProgressionSnapshot::default()
            };
            match write_document(&path, &snapshot) {
                Ok(()) => (LoadResult::CreatedNewFile, Some(snapshot)),
                Err(err) => {
                    warn!(path = %path.display(), "failed to create save: {err:#}");
                    (LoadResult::OtherFailure, None)
                }
            }
        }
        Err(err) => {
            warn!(path = %path.display(), "failed to read save: {err}");
            (LoadResult::OtherFailure, None)
        }
    }
}

fn write_document(path: &Path, snapshot: &ProgressionSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialised = serde_json::to_vec_pretty(snapshot)?;
    fs::write(path, serialised).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn campaign(name: &str, cycle: u32) -> CampaignProgress {
        CampaignProgress {
            name: name.to_string(),
            karma: 2,
            karma_cap: 4,
            food: 3,
            cycle,
            elapsed_seconds: 600,
        }
    }

    #[test]
    fn describe_embeds_read_detail() {
        let failure = LoadResult::ReadFailed(Some("bad checksum".to_string()));
        assert_eq!(failure.describe(), "ERROR_READ_FAILED\nbad checksum");
        assert_eq!(LoadResult::ReadFailed(None).describe(), "ERROR_READ_FAILED");
        assert!(!LoadResult::OtherFailure.is_success());
        assert!(LoadResult::MissingDataButOk.is_success());
    }

    #[test]
    fn dropped_sender_resolves_as_failure() {
        let (sender, mut ticket) = LoadTicket::channel();
        assert_eq!(ticket.poll(), None);
        drop(sender);
        assert_eq!(ticket.poll(), Some(LoadResult::OtherFailure));
    }

    #[tokio::test]
    async fn missing_file_is_created() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        let mut store = FsProgressionStore::new(storage.clone(), 0);

        let result = store.begin_load(3).wait().await;
        assert_eq!(result, LoadResult::CreatedNewFile);
        assert!(store.is_loaded());
        assert_eq!(store.current_slot(), 3);
        assert!(storage.exists("sav4"));
        Ok(())
    }

    #[tokio::test]
    async fn classifies_existing_empty_and_corrupt_files() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        let snapshot = ProgressionSnapshot {
            campaigns: vec![campaign("Survivor", 7)],
            unlocks: vec!["arena:sky".to_string()],
            saved_at: None,
        };
        fs::write(storage.path("sav"), serde_json::to_string(&snapshot)?)?;
        fs::write(storage.path("sav2"), "  \n")?;
        fs::write(storage.path("sav3"), "{ not json")?;

        let mut store = FsProgressionStore::new(storage, 0);
        assert_eq!(store.begin_load(0).wait().await, LoadResult::LoadedExistingFile);
        assert_eq!(store.snapshot(), Some(snapshot));

        assert_eq!(store.begin_load(1).wait().await, LoadResult::MissingDataButOk);

        match store.begin_load(2).wait().await {
            LoadResult::ReadFailed(Some(detail)) => assert!(!detail.is_empty()),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(store.snapshot().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn wipe_keeps_unlocks() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        let snapshot = ProgressionSnapshot {
            campaigns: vec![campaign("Monk", 3), campaign("Hunter", 9)],
            unlocks: vec!["sandbox:lantern".to_string()],
            saved_at: None,
        };
        fs::write(storage.path("sav2"), serde_json::to_string(&snapshot)?)?;

        let mut store = FsProgressionStore::new(storage.clone(), 1);
        store.begin_load(1).wait().await;
        store.wipe_all()?;

        let on_disk: ProgressionSnapshot =
            serde_json::from_str(&fs::read_to_string(storage.path("sav2"))?)?;
        assert!(on_disk.campaigns.is_empty());
        assert_eq!(on_disk.unlocks, vec!["sandbox:lantern".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn destroy_discards_outstanding_load() -> Result<()> {
        let dir = tempdir()?;
        let mut store = FsProgressionStore::new(SlotStorage::new(dir.path()), 0);
        let ticket = store.begin_load(0);
        store.destroy(0);
        // The stale load never reports back.
        assert_eq!(ticket.wait().await, LoadResult::OtherFailure);
        assert!(!store.is_loaded());
        Ok(())
    }

    #[tokio::test]
    async fn delete_save_removes_primary_file() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        let mut store = FsProgressionStore::new(storage.clone(), 2);
        store.begin_load(2).wait().await;
        assert!(storage.exists("sav3"));

        store.delete_save()?;
        assert!(!storage.exists("sav3"));
        assert!(!store.is_loaded());
        Ok(())
    }
}
