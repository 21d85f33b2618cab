#![warn(clippy::all, missing_docs)]

//! Core logic of the slotdeck save slot panel.
//!
//! This crate hosts the virtualized list, the slot directory scanner, the
//! slot switch state machine, slot naming and backups, plus the progression
//! store contract the panel drives. Frontends render [`panel::SavesPanel`]
//! and feed it input and ticks.

pub mod backup;
pub mod config;
pub mod dialog;
pub mod error;
pub mod list;
pub mod models;
pub mod names;
pub mod options;
pub mod panel;
pub mod progression;
pub mod scanner;
pub mod storage;
pub mod switch;

pub use backup::{BackupEntry, BackupManager};
pub use config::AppConfig;
pub use dialog::{DialogHost, DialogPurpose, DialogRequest};
pub use error::SlotError;
pub use list::VirtualizedList;
pub use models::{CardEntry, SlotEntry, SlotIndex};
pub use names::{SaveNameStore, SharedNames};
pub use options::HostOptions;
pub use panel::{BackupsRedirect, PanelControl, PanelList, ResetOutcome, SavesPanel, Screen};
pub use progression::{FsProgressionStore, LoadResult, LoadTicket, ProgressionStore};
pub use scanner::{RefreshMode, ScanResult, SlotDirectoryScanner};
pub use storage::SlotStorage;
pub use switch::{SlotSwitchStateMachine, SwitchEvent, SwitchState};
