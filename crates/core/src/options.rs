//! Host option string.
//!
//! Options persist as one flat string of `key<optB>value<optA>` entries. The
//! host understands a few built-in keys; entries it does not recognise are
//! offered to the slot-name store, and anything still unclaimed is kept
//! verbatim so other owners do not lose their data on save.

use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    models::SlotIndex,
    names::{SaveNameStore, NAME_OPTION_KEY},
};

/// Terminates every entry.
pub const ENTRY_SEPARATOR: &str = "<optA>";
/// Separates key and value inside an entry.
pub const VALUE_SEPARATOR: &str = "<optB>";

const SAVE_SLOT_KEY: &str = "SaveSlot";

/// Options owned by the host, plus passthrough entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOptions {
    /// Currently selected save slot.
    pub save_slot: SlotIndex,
    passthrough: Vec<(String, String)>,
}

impl HostOptions {
    /// Parse an option string, routing slot names into `names`.
    pub fn parse(text: &str, names: &mut SaveNameStore) -> Self {
        let mut options = Self::default();
        for entry in text.split(ENTRY_SEPARATOR) {
            if entry.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = entry.split_once(VALUE_SEPARATOR) else {
                debug!(entry, "skipping option entry without a value");
                continue;
            };
            if key == SAVE_SLOT_KEY {
                match value.trim().parse() {
                    Ok(slot) => options.save_slot = slot,
                    Err(err) => warn!(value, "invalid save slot option: {err}"),
                }
                continue;
            }
            if names.apply_option(key, value) {
                continue;
            }
            options
                .passthrough
                .push((key.to_string(), value.to_string()));
        }
        options
    }

    /// Render the option string including one entry per named slot.
    pub fn serialize(&self, names: &SaveNameStore) -> String {
        let mut out = String::new();
        push_entry(&mut out, SAVE_SLOT_KEY, &self.save_slot.to_string());
        for (key, value) in &self.passthrough {
            push_entry(&mut out, key, value);
        }
        for value in names.option_values() {
            push_entry(&mut out, NAME_OPTION_KEY, &value);
        }
        out
    }

    /// Entries kept verbatim for other owners.
    pub fn passthrough(&self) -> &[(String, String)] {
        &self.passthrough
    }

    /// Load options from `path`. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>, names: &mut SaveNameStore) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text, names)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// Write options to `path`, creating parent directories if needed.
    pub fn save(&self, path: impl AsRef<Path>, names: &SaveNameStore) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.serialize(names))
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

fn push_entry(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(VALUE_SEPARATOR);
    out.push_str(value);
    out.push_str(ENTRY_SEPARATOR);
}
