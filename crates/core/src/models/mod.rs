//! Shared domain models.

use serde::{Deserialize, Serialize};

use crate::progression::{CampaignProgress, ProgressionSnapshot};

/// Numbered save slot. Slot `0` is always a valid baseline slot.
pub type SlotIndex = usize;

/// One row of the slot list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    /// Slot this row selects.
    pub index: SlotIndex,
    /// Custom name assigned by the user, if any.
    pub display_name: Option<String>,
    /// `false` for the trailing "create new" row and for gaps in the numbering.
    pub exists: bool,
}

impl SlotEntry {
    /// Build a row for `index`.
    pub fn new(index: SlotIndex, display_name: Option<String>, exists: bool) -> Self {
        Self {
            index,
            display_name,
            exists,
        }
    }

    /// Label shown on the row: the custom name or `SAVE SLOT <n>`.
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => default_slot_label(self.index),
        }
    }
}

/// Default label for a slot without a custom name.
pub fn default_slot_label(index: SlotIndex) -> String {
    format!("SAVE SLOT {}", index + 1)
}

/// Read-only summary card for one campaign of the loaded slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEntry {
    /// Campaign title.
    pub title: String,
    /// Current karma level.
    pub karma: u32,
    /// Karma cap reached so far.
    pub karma_cap: u32,
    /// Food pips stored.
    pub food: u32,
    /// Cycle counter.
    pub cycle: u32,
    /// Total play time in seconds.
    pub elapsed_seconds: u64,
}

impl CardEntry {
    /// Derive a card from a campaign's progress.
    pub fn from_campaign(campaign: &CampaignProgress) -> Self {
        Self {
            title: campaign.name.clone(),
            karma: campaign.karma,
            karma_cap: campaign.karma_cap,
            food: campaign.food,
            cycle: campaign.cycle,
            elapsed_seconds: campaign.elapsed_seconds,
        }
    }

    /// Cards for every campaign in a snapshot, in document order.
    pub fn from_snapshot(snapshot: &ProgressionSnapshot) -> Vec<Self> {
        snapshot.campaigns.iter().map(Self::from_campaign).collect()
    }

    /// Play time formatted as `h:mm:ss`.
    pub fn elapsed_label(&self) -> String {
        let hours = self.elapsed_seconds / 3600;
        let minutes = (self.elapsed_seconds % 3600) / 60;
        let seconds = self.elapsed_seconds % 60;
        format!("{hours}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_slot_number() {
        let named = SlotEntry::new(2, Some("Hunter run".to_string()), true);
        assert_eq!(named.label(), "Hunter run");

        let blank = SlotEntry::new(2, Some("   ".to_string()), true);
        assert_eq!(blank.label(), "SAVE SLOT 3");

        let unnamed = SlotEntry::new(0, None, false);
        assert_eq!(unnamed.label(), "SAVE SLOT 1");
    }

    #[test]
    fn elapsed_label_formats_hours() {
        let card = CardEntry {
            title: "Survivor".to_string(),
            karma: 3,
            karma_cap: 5,
            food: 2,
            cycle: 14,
            elapsed_seconds: 3 * 3600 + 4 * 60 + 5,
        };
        assert_eq!(card.elapsed_label(), "3:04:05");
    }
}
