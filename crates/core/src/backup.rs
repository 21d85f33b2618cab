//! Backups of slot artifacts.
//!
//! The built-in backup only knows a fixed set of low-numbered slots per
//! artifact category. Files of higher slots are picked up by a supplementary
//! pass, and restored as a side effect of restoring slot 0's primary save.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::storage::{ArtifactKind, CORE_PREFIX, EXPEDITION_PREFIX, SAVE_PREFIX};

/// Root directory under the user's data directory used for backups.
pub const DEFAULT_BACKUP_DIR: &str = "slotdeck/backups";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Category of per-slot file with the slots the built-in backup covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupCategory {
    /// File name prefix.
    pub prefix: &'static str,
    /// Suffix number of slot 0.
    pub origin: usize,
    /// Slots `0..baseline_slots` are handled by the built-in backup.
    pub baseline_slots: usize,
}

/// Categories known to the built-in backup.
pub const CATEGORIES: [BackupCategory; 3] = [
    BackupCategory {
        prefix: SAVE_PREFIX,
        origin: 1,
        baseline_slots: 4,
    },
    BackupCategory {
        prefix: CORE_PREFIX,
        origin: 1,
        baseline_slots: 5,
    },
    BackupCategory {
        prefix: EXPEDITION_PREFIX,
        origin: 1,
        baseline_slots: 2,
    },
];

/// How a file is handled by backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupClass {
    /// Covered by the built-in backup.
    Baseline,
    /// Needs the supplementary pass.
    Extra,
}

impl BackupCategory {
    /// Slot of `file_name` in this category, if it belongs to it.
    ///
    /// A bare prefix is the category's slot 0.
    pub fn slot_of(&self, file_name: &str) -> Option<usize> {
        let rest = file_name.strip_prefix(self.prefix)?;
        if rest.is_empty() {
            return Some(0);
        }
        if !rest.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        rest.parse::<usize>().ok()?.checked_sub(self.origin)
    }
}

/// Classify a file of the save directory. `None` for files no category owns.
pub fn classify(file_name: &str) -> Option<BackupClass> {
    CATEGORIES.iter().find_map(|category| {
        category.slot_of(file_name).map(|slot| {
            if slot >= category.baseline_slots {
                BackupClass::Extra
            } else {
                BackupClass::Baseline
            }
        })
    })
}

/// Whether `file_name` belongs to a slot above the built-in baseline.
pub fn is_extra(file_name: &str) -> bool {
    classify(file_name) == Some(BackupClass::Extra)
}

/// Whether restoring `file_name` should also restore every extra file.
pub fn is_restore_anchor(file_name: &str) -> bool {
    file_name == ArtifactKind::Save.file_name(0)
}

/// Metadata describing a backup on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Backup directory.
    pub path: PathBuf,
    /// When the backup was taken.
    pub created_at: DateTime<Utc>,
    /// Number of files it holds.
    pub files: usize,
}

impl BackupEntry {
    /// Name of the backup directory.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Creates and restores timestamped backups of the save directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    save_root: PathBuf,
    backup_root: PathBuf,
}

impl BackupManager {
    /// Manager copying between `save_root` and `backup_root`.
    pub fn new(save_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            save_root: save_root.into(),
            backup_root: backup_root.into(),
        }
    }

    /// Default backup location under the user's data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_BACKUP_DIR)
    }

    /// All backups, most recent first.
    pub fn entries(&self) -> Result<Vec<BackupEntry>> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backup_root)
            .with_context(|| format!("failed to read {}", self.backup_root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(created_at) = parse_timestamp(&name) else {
                warn!("ignoring unrecognised backup directory {name}");
                continue;
            };
            entries.push(BackupEntry {
                files: count_files(&entry.path()),
                path: entry.path(),
                created_at,
            });
        }
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.path.cmp(&a.path)));
        Ok(entries)
    }

    /// Take a backup: the built-in baseline pass, then the extra-slot pass.
    pub fn create(&self) -> Result<BackupEntry> {
        let created_at = Utc::now();
        let dir = self.unique_dir(created_at);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let baseline = copy_matching(&self.save_root, &dir, |name| {
            classify(name) == Some(BackupClass::Baseline)
        })?;
        let extra = copy_matching(&self.save_root, &dir, is_extra)?;
        info!(path = %dir.display(), baseline, extra, "backup created");

        Ok(BackupEntry {
            path: dir,
            created_at,
            files: baseline + extra,
        })
    }

    /// Restore one file from `backup`. Restoring slot 0's primary save also
    /// restores every extra-slot file. Returns the number of files written.
    pub fn restore(&self, backup: &BackupEntry, file_name: &str) -> Result<usize> {
        let source = backup.path.join(file_name);
        if !source.is_file() {
            return Ok(0);
        }
        fs::create_dir_all(&self.save_root)
            .with_context(|| format!("failed to create {}", self.save_root.display()))?;
        fs::copy(&source, self.save_root.join(file_name))
            .with_context(|| format!("failed to restore {file_name}"))?;
        let mut restored = 1;

        if is_restore_anchor(file_name) {
            let extra = copy_matching(&backup.path, &self.save_root, is_extra)?;
            debug!(extra, "restored extra slot files");
            restored += extra;
        }
        Ok(restored)
    }

    /// Restore every baseline file of `backup`, extra files included.
    pub fn restore_all(&self, backup: &BackupEntry) -> Result<usize> {
        let mut restored = 0;
        for name in file_names(&backup.path)? {
            if classify(&name) == Some(BackupClass::Baseline) {
                restored += self.restore(backup, &name)?;
            }
        }
        info!(path = %backup.path.display(), restored, "backup restored");
        Ok(restored)
    }

    fn unique_dir(&self, created_at: DateTime<Utc>) -> PathBuf {
        let stamp = created_at.format(TIMESTAMP_FORMAT).to_string();
        let mut dir = self.backup_root.join(&stamp);
        let mut attempt = 1;
        while dir.exists() {
            dir = self.backup_root.join(format!("{stamp}-{attempt}"));
            attempt += 1;
        }
        dir
    }
}

fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.split('-').next()?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}

fn copy_matching(from: &Path, to: &Path, keep: impl Fn(&str) -> bool) -> Result<usize> {
    if !from.is_dir() {
        return Ok(0);
    }
    let mut copied = 0;
    for name in file_names(from)? {
        if !keep(&name) {
            continue;
        }
        fs::copy(from.join(&name), to.join(&name))
            .with_context(|| format!("failed to copy {name} to {}", to.display()))?;
        copied += 1;
    }
    Ok(copied)
}
