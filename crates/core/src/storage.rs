//! On-disk layout of slot artifacts.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{error::SlotError, models::SlotIndex};

/// Prefix of primary save files.
pub const SAVE_PREFIX: &str = "sav";
/// Prefix of the per-slot core artifact.
pub const CORE_PREFIX: &str = "expCore";
/// Prefix of the per-slot expedition artifact.
pub const EXPEDITION_PREFIX: &str = "exp";
/// Prefix of the per-slot journey directory.
pub const JOURNEY_PREFIX: &str = "SJ_";

/// Kinds of files and directories that belong to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Primary progression file, owned by the progression store.
    Save,
    /// Core artifact.
    Core,
    /// Expedition artifact.
    Expedition,
    /// Journey directory.
    Journey,
}

impl ArtifactKind {
    /// Artifacts the panel removes itself when a slot is deleted.
    /// The primary save is removed through the progression store.
    pub const SIDE_ARTIFACTS: [ArtifactKind; 3] = [
        ArtifactKind::Core,
        ArtifactKind::Expedition,
        ArtifactKind::Journey,
    ];

    /// File or directory name used for `slot`.
    pub fn file_name(self, slot: SlotIndex) -> String {
        match self {
            Self::Save if slot == 0 => SAVE_PREFIX.to_string(),
            Self::Save => format!("{SAVE_PREFIX}{}", slot + 1),
            Self::Core => format!("{CORE_PREFIX}{}", slot + 1),
            Self::Expedition => format!("{EXPEDITION_PREFIX}{}", slot + 1),
            Self::Journey => format!("{JOURNEY_PREFIX}{slot}"),
        }
    }
}

/// Filesystem access rooted at the save directory.
#[derive(Debug, Clone)]
pub struct SlotStorage {
    root: PathBuf,
}

impl SlotStorage {
    /// Storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Save directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an entry in the save directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of the `kind` artifact for `slot`.
    pub fn artifact_path(&self, kind: ArtifactKind, slot: SlotIndex) -> PathBuf {
        self.path(&kind.file_name(slot))
    }

    /// Whether an entry exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Names of the entries whose name starts with `prefix`, sorted.
    pub fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a file or directory. A missing entry is not an error.
    pub fn delete(&self, name: &str) -> Result<(), SlotError> {
        let path = self.path(name);
        let outcome = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match outcome {
            Ok(()) => {
                debug!(path = %path.display(), "deleted slot artifact");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SlotError::DeleteFailed { path, source }),
        }
    }

    /// Remove every artifact of `slot` except the primary save.
    ///
    /// Stops at the first failure.
    pub fn delete_side_artifacts(&self, slot: SlotIndex) -> Result<(), SlotError> {
        for kind in ArtifactKind::SIDE_ARTIFACTS {
            self.delete(&kind.file_name(slot))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn artifact_names_follow_slot_numbering() {
        assert_eq!(ArtifactKind::Save.file_name(0), "sav");
        assert_eq!(ArtifactKind::Save.file_name(1), "sav2");
        assert_eq!(ArtifactKind::Save.file_name(9), "sav10");
        assert_eq!(ArtifactKind::Core.file_name(0), "expCore1");
        assert_eq!(ArtifactKind::Expedition.file_name(4), "exp5");
        assert_eq!(ArtifactKind::Journey.file_name(3), "SJ_3");
    }

    #[test]
    fn deletes_side_artifacts_only() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        fs::write(storage.path("sav6"), "{}")?;
        fs::write(storage.path("expCore6"), "core")?;
        fs::create_dir_all(storage.path("SJ_5").join("nested"))?;
        fs::write(storage.path("SJ_5").join("nested").join("page"), "journey")?;

        storage.delete_side_artifacts(5)?;

        assert!(storage.exists("sav6"));
        assert!(!storage.exists("expCore6"));
        assert!(!storage.exists("SJ_5"));
        Ok(())
    }

    #[test]
    fn missing_artifacts_are_not_errors() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        storage.delete_side_artifacts(12)?;
        storage.delete("sav13")?;
        Ok(())
    }

    #[test]
    fn lists_by_prefix() -> Result<()> {
        let dir = tempdir()?;
        let storage = SlotStorage::new(dir.path());
        for name in ["sav", "sav3", "expCore1", "options"] {
            fs::write(storage.path(name), "")?;
        }
        assert_eq!(storage.list_files("sav")?, vec!["sav", "sav3"]);
        assert!(SlotStorage::new(dir.path().join("missing"))
            .list_files("sav")?
            .is_empty());
        Ok(())
    }
}
