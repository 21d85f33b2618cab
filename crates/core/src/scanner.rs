//! Asynchronous enumeration of existing save slots.

use std::{collections::BTreeSet, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{sync::oneshot, task};
use tracing::debug;

use crate::{
    error::SlotError,
    models::{SlotEntry, SlotIndex},
    names::SaveNameStore,
    storage::{ArtifactKind, SlotStorage},
};

static SAVE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sav(\d+)$").expect("invalid save file regex"));

/// Slot a primary save file belongs to, from its numeric suffix.
///
/// The suffix is one-based. The bare baseline file has no suffix and is not
/// matched here; slot `0` is always assumed to exist.
pub fn parse_save_slot(file_name: &str) -> Option<SlotIndex> {
    let caps = SAVE_FILE_RE.captures(file_name)?;
    let number: SlotIndex = caps.get(1)?.as_str().parse().ok()?;
    number.checked_sub(1)
}

/// Result of a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Slots with a primary save on disk. Always contains `0`.
    pub existing: BTreeSet<SlotIndex>,
    /// Highest slot the list must show besides the "create new" row.
    pub max_slot: SlotIndex,
}

impl ScanResult {
    /// Derive the result from the slots found on disk and the current slot.
    pub fn derive(found: impl IntoIterator<Item = SlotIndex>, current: SlotIndex) -> Self {
        let mut existing: BTreeSet<SlotIndex> = found.into_iter().collect();
        existing.insert(0);
        let max_slot = existing.iter().copied().max().unwrap_or(0).max(current);
        Self { existing, max_slot }
    }

    /// Row count of the slot list: every slot up to `max_slot` plus the trailing "create new" row.
    pub fn list_len(&self) -> usize {
        self.max_slot + 2
    }

    /// Whether `slot` has data on disk.
    pub fn exists(&self, slot: SlotIndex) -> bool {
        self.existing.contains(&slot)
    }

    /// Build every row with names taken from `names`.
    pub fn rows(&self, names: &SaveNameStore) -> Vec<SlotEntry> {
        (0..self.list_len())
            .map(|index| SlotEntry::new(index, names.get(index).map(str::to_string), self.exists(index)))
            .collect()
    }

    /// Refresh the `exists` flag of rows that are kept.
    pub fn recolor(&self, rows: &mut [SlotEntry]) {
        for row in rows {
            row.exists = self.exists(row.index);
        }
    }
}

/// How a scan result is applied to the slot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Discard all rows and rebuild `list_len` of them.
    FullRebuild,
    /// Keep the rows, only update whether each slot exists.
    ColorOnly,
}

impl RefreshMode {
    /// Mode after switching to `target` in a list that had `row_count` rows.
    ///
    /// Only a switch into the trailing "create new" row grows the list.
    pub fn after_switch(target: SlotIndex, row_count: usize) -> Self {
        if row_count == 0 || target + 1 >= row_count {
            Self::FullRebuild
        } else {
            Self::ColorOnly
        }
    }

    /// Mode actually usable for `result` given the current row count.
    pub fn resolve(self, result: &ScanResult, row_count: usize) -> Self {
        if result.list_len() == row_count {
            self
        } else {
            Self::FullRebuild
        }
    }
}

/// Runs at most one directory scan at a time.
#[derive(Debug)]
pub struct SlotDirectoryScanner {
    storage: SlotStorage,
    pending: Option<oneshot::Receiver<Result<ScanResult>>>,
}

impl SlotDirectoryScanner {
    /// Scanner over the save directory `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            storage: SlotStorage::new(root),
            pending: None,
        }
    }

    /// Whether a scan is in flight.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a scan. A request made while one is in flight is dropped.
    pub fn request(&mut self, current: SlotIndex) -> Result<(), SlotError> {
        if self.is_busy() {
            debug!(current, "slot scan dropped, one is already running");
            return Err(SlotError::ScanBusy);
        }
        let (sender, receiver) = oneshot::channel();
        let storage = self.storage.clone();
        tokio::spawn(async move {
            let result = scan_directory(storage, current).await;
            let _ = sender.send(result);
        });
        self.pending = Some(receiver);
        Ok(())
    }

    /// Take the finished scan, if any. Called once per tick.
    pub fn poll(&mut self) -> Option<Result<ScanResult>> {
        let receiver = self.pending.as_mut()?;
        let outcome = match receiver.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(anyhow::anyhow!("slot scan task ended without a result"))
            }
        };
        self.pending = None;
        Some(outcome)
    }
}

/// List the save directory and derive the slot set.
pub async fn scan_directory(storage: SlotStorage, current: SlotIndex) -> Result<ScanResult> {
    let root = storage.root().to_path_buf();
    let prefix = ArtifactKind::Save.file_name(0);
    let names = task::spawn_blocking(move || storage.list_files(&prefix))
        .await
        .with_context(|| format!("slot scan of {} was aborted", root.display()))??;
    let result = ScanResult::derive(names.iter().filter_map(|name| parse_save_slot(name)), current);
    debug!(
        root = %root.display(),
        max_slot = result.max_slot,
        existing = result.existing.len(),
        "slot scan finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, time::Duration};
    use tempfile::tempdir;

    async fn wait_for(scanner: &mut SlotDirectoryScanner) -> Result<ScanResult> {
        for _ in 0..200 {
            if let Some(result) = scanner.poll() {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        anyhow::bail!("scan did not finish")
    }

    #[test]
    fn parses_one_based_suffixes() {
        assert_eq!(parse_save_slot("sav1"), Some(0));
        assert_eq!(parse_save_slot("sav2"), Some(1));
        assert_eq!(parse_save_slot("sav12"), Some(11));
        assert_eq!(parse_save_slot("sav"), None);
        assert_eq!(parse_save_slot("sav0"), None);
        assert_eq!(parse_save_slot("savx"), None);
        assert_eq!(parse_save_slot("sav3.bak"), None);
        assert_eq!(parse_save_slot("expCore3"), None);
    }

    #[test]
    fn list_length_covers_current_slot_and_placeholder() {
        let result = ScanResult::derive([2, 5], 1);
        assert_eq!(result.max_slot, 5);
        assert_eq!(result.list_len(), 7);
        assert!(result.exists(0));
        assert!(!result.exists(1));

        let result = ScanResult::derive([], 4);
        assert_eq!(result.max_slot, 4);
        assert_eq!(result.list_len(), 6);
    }

    #[test]
    fn rows_carry_names_and_existence() {
        let mut names = SaveNameStore::default();
        names.set(2, "Rivulet");
        let rows = ScanResult::derive([2], 0).rows(&names);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].exists);
        assert!(!rows[1].exists);
        assert_eq!(rows[2].label(), "Rivulet");
        assert!(!rows[3].exists);
    }

    #[test]
    fn only_switching_into_placeholder_rebuilds() {
        assert_eq!(RefreshMode::after_switch(4, 5), RefreshMode::FullRebuild);
        assert_eq!(RefreshMode::after_switch(1, 5), RefreshMode::ColorOnly);

        let grown = ScanResult::derive([4], 4);
        assert_eq!(
            RefreshMode::ColorOnly.resolve(&grown, 5),
            RefreshMode::FullRebuild
        );
        assert_eq!(
            RefreshMode::ColorOnly.resolve(&grown, 6),
            RefreshMode::ColorOnly
        );
    }

    #[tokio::test]
    async fn scans_directory() -> Result<()> {
        let dir = tempdir()?;
        for name in ["sav", "sav3", "sav6", "expCore9", "options"] {
            fs::write(dir.path().join(name), "")?;
        }
        let mut scanner = SlotDirectoryScanner::new(dir.path());
        scanner.request(1)?;
        assert!(scanner.is_busy());
        assert!(matches!(scanner.request(1), Err(SlotError::ScanBusy)));

        let result = wait_for(&mut scanner).await?;
        assert_eq!(result.existing, BTreeSet::from([0, 2, 5]));
        assert_eq!(result.list_len(), 7);
        assert!(!scanner.is_busy());
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_yields_baseline_only() -> Result<()> {
        let dir = tempdir()?;
        let result = scan_directory(SlotStorage::new(dir.path().join("absent")), 0).await?;
        assert_eq!(result.existing, BTreeSet::from([0]));
        assert_eq!(result.list_len(), 2);
        Ok(())
    }
}
