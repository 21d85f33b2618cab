//! Custom display names for save slots.
//!
//! Names are persisted through the host option string under
//! [`NAME_OPTION_KEY`], one entry per named slot, with the name base64-encoded
//! so it can never contain the option-string delimiters.

use std::{collections::BTreeMap, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::RwLock;
use tracing::debug;

use crate::{error::SlotError, models::SlotIndex};

/// Option key claimed for slot names.
pub const NAME_OPTION_KEY: &str = "unlimitedsaves:name";

/// Handle shared by the panel and the option serializer.
pub type SharedNames = Arc<RwLock<SaveNameStore>>;

/// Mapping from slot to custom display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveNameStore {
    names: BTreeMap<SlotIndex, String>,
}

impl SaveNameStore {
    /// Wrap a store in a shared handle.
    pub fn shared(self) -> SharedNames {
        Arc::new(RwLock::new(self))
    }

    /// Name of `slot`, if one is set.
    pub fn get(&self, slot: SlotIndex) -> Option<&str> {
        self.names.get(&slot).map(String::as_str)
    }

    /// Set the name of `slot`. A blank name removes it instead.
    pub fn set(&mut self, slot: SlotIndex, name: impl Into<String>) {
        let name = name.into();
        if name.trim().is_empty() {
            self.remove(slot);
        } else {
            self.names.insert(slot, name);
        }
    }

    /// Forget the name of `slot`.
    pub fn remove(&mut self, slot: SlotIndex) -> Option<String> {
        self.names.remove(&slot)
    }

    /// Number of named slots.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` when no slot is named.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Named slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &str)> {
        self.names.iter().map(|(slot, name)| (*slot, name.as_str()))
    }

    /// Option values to persist, one per named slot.
    pub fn option_values(&self) -> Vec<String> {
        self.iter().map(|(slot, name)| encode_entry(slot, name)).collect()
    }

    /// Offer an option entry the host did not recognise.
    ///
    /// Returns `true` when the key belongs to this store. Malformed values are
    /// skipped.
    pub fn apply_option(&mut self, key: &str, value: &str) -> bool {
        if key != NAME_OPTION_KEY {
            return false;
        }
        match decode_entry(value) {
            Ok((slot, name)) => self.set(slot, name),
            Err(err) => debug!("skipping slot name entry: {err}"),
        }
        true
    }
}

/// Encode one entry as `<slot>,<base64 name>`.
pub fn encode_entry(slot: SlotIndex, name: &str) -> String {
    format!("{slot},{}", STANDARD.encode(name.as_bytes()))
}

/// Decode an entry produced by [`encode_entry`].
pub fn decode_entry(value: &str) -> Result<(SlotIndex, String), SlotError> {
    let malformed = || SlotError::MalformedName(value.to_string());
    let (slot, encoded) = value.split_once(',').ok_or_else(malformed)?;
    let slot: SlotIndex = slot.trim().parse().map_err(|_| malformed())?;
    let bytes = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let name = String::from_utf8(bytes).map_err(|_| malformed())?;
    Ok((slot, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_removed() {
        let mut store = SaveNameStore::default();
        store.set(3, "Gourmand");
        assert_eq!(store.get(3), Some("Gourmand"));
        store.set(3, "  \t");
        assert_eq!(store.get(3), None);
        assert!(store.is_empty());
    }

    #[test]
    fn names_survive_encoding_with_delimiters() {
        let tricky = [
            "plain",
            "comma, separated",
            "<optA>inside<optB>",
            "ümlaut ✓ 名前",
            "trailing,",
        ];
        for (slot, name) in tricky.iter().enumerate() {
            let encoded = encode_entry(slot, name);
            assert!(!encoded.contains("<opt"));
            let (decoded_slot, decoded_name) = decode_entry(&encoded).expect("decodes");
            assert_eq!(decoded_slot, slot);
            assert_eq!(decoded_name, *name);
        }
    }

    #[test]
    fn malformed_entries_are_swallowed() {
        let mut store = SaveNameStore::default();
        assert!(store.apply_option(NAME_OPTION_KEY, "no-comma"));
        assert!(store.apply_option(NAME_OPTION_KEY, "x,SGk="));
        assert!(store.apply_option(NAME_OPTION_KEY, "2,***"));
        assert!(store.is_empty());

        assert!(store.apply_option(NAME_OPTION_KEY, "2,SGk="));
        assert_eq!(store.get(2), Some("Hi"));
        assert!(!store.apply_option("saveslot", "2"));
    }

    #[test]
    fn option_values_are_ordered_by_slot() {
        let mut store = SaveNameStore::default();
        store.set(7, "b");
        store.set(1, "a");
        assert_eq!(store.option_values(), vec!["1,YQ==", "7,Yg=="]);
    }
}
