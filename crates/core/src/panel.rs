//! The save slot panel.
//!
//! [`SavesPanel`] owns both lists, the switch machine and the directory
//! scanner, and exposes the actions the host menu wires to its controls. The
//! host calls [`SavesPanel::tick`] once per frame.

use std::{ops::Range, path::PathBuf};

use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    dialog::{DialogHost, DialogPurpose, DialogRequest},
    error::SlotError,
    list::VirtualizedList,
    models::{CardEntry, SlotEntry, SlotIndex},
    names::SharedNames,
    options::HostOptions,
    progression::ProgressionStore,
    scanner::{RefreshMode, ScanResult, SlotDirectoryScanner},
    storage::{ArtifactKind, SlotStorage},
    switch::{SlotSwitchStateMachine, SwitchEvent, SwitchState},
};

/// Which of the panel's two lists an input targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelList {
    /// Slot buttons.
    Slots,
    /// Progress cards of the loaded slot.
    Cards,
}

/// Controls that carry a description line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelControl {
    /// Leave to the main menu.
    Back,
    /// Open the backups screen.
    Backups,
    /// Hold-to-confirm reset.
    Reset,
    /// Whether reset deletes the slot.
    DeleteToggle,
    /// Slot name field.
    Rename,
    /// Slot list.
    Slots,
}

/// What a confirmed reset did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Progression wiped, side content kept.
    Wiped,
    /// Slot files removed and the slot is being created again.
    Deleted,
}

/// Screens of the host menu the panel navigates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Host main menu.
    MainMenu,
    /// This panel.
    Saves,
    /// Backup management.
    Backups,
}

/// One-shot redirect for the backups screen's back action.
#[derive(Debug, Default)]
pub struct BackupsRedirect {
    armed: bool,
}

impl BackupsRedirect {
    /// Make the next back action return to the saves panel.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Whether the redirect is pending.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Where back leads from the backups screen. Consumes the redirect.
    pub fn back_target(&mut self) -> Screen {
        if std::mem::take(&mut self.armed) {
            info!("backups redirect taken, returning to the saves panel");
            Screen::Saves
        } else {
            Screen::MainMenu
        }
    }
}

/// Slot selection panel over a progression store.
pub struct SavesPanel<S: ProgressionStore> {
    store: S,
    storage: SlotStorage,
    names: SharedNames,
    options: HostOptions,
    options_path: PathBuf,
    switch: SlotSwitchStateMachine,
    scanner: SlotDirectoryScanner,
    slots: VirtualizedList<SlotEntry>,
    cards: VirtualizedList<CardEntry>,
    name_field: String,
    delete_armed: bool,
    switch_refresh: Option<RefreshMode>,
    scan_refresh: Option<RefreshMode>,
    rescan: Option<RefreshMode>,
    scroll_to_tail: bool,
    pause_held: bool,
}

impl<S: ProgressionStore> SavesPanel<S> {
    /// Build the panel and start loading the configured slot.
    ///
    /// Falls back to slot 0 when the configured slot has no save file.
    pub fn new(mut store: S, names: SharedNames, mut options: HostOptions, config: &AppConfig) -> Self {
        let storage = SlotStorage::new(&config.save_root);
        let mut current = options.save_slot;
        if current != 0 && !storage.exists(&ArtifactKind::Save.file_name(current)) {
            info!(slot = current, "save slot has no data, falling back to slot 0");
            current = 0;
        }
        options.save_slot = current;

        let mut switch = SlotSwitchStateMachine::new(current);
        if store.current_slot() != current || !store.is_loaded() {
            store.destroy_current();
            if let Err(err) = switch.reload(&mut store) {
                warn!("initial slot load not started: {err}");
            }
        }

        let name_field = names.read().get(current).unwrap_or_default().to_string();
        let mut panel = Self {
            scanner: SlotDirectoryScanner::new(&config.save_root),
            store,
            storage,
            names,
            options,
            options_path: config.options_file.clone(),
            switch,
            slots: VirtualizedList::new(config.slot_window),
            cards: VirtualizedList::new(config.card_window),
            name_field,
            delete_armed: false,
            switch_refresh: None,
            scan_refresh: None,
            rescan: None,
            scroll_to_tail: false,
            pause_held: false,
        };
        panel.rebuild_cards();
        panel.request_scan(RefreshMode::FullRebuild);
        panel
    }

    /// Slot the panel points at.
    pub fn current_slot(&self) -> SlotIndex {
        self.switch.current_slot()
    }

    /// Composite busy predicate: a switch is outstanding or the store has no data.
    pub fn is_busy(&self) -> bool {
        self.switch.is_busy() || !self.store.is_loaded()
    }

    /// Whether a directory scan is outstanding.
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_busy()
    }

    /// State of the switch machine.
    pub fn switch_state(&self) -> &SwitchState {
        self.switch.state()
    }

    /// The slot list.
    pub fn slots(&self) -> &VirtualizedList<SlotEntry> {
        &self.slots
    }

    /// The card list.
    pub fn cards(&self) -> &VirtualizedList<CardEntry> {
        &self.cards
    }

    /// Contents of the name field.
    pub fn name_field(&self) -> &str {
        &self.name_field
    }

    /// Whether reset deletes the slot.
    pub fn delete_armed(&self) -> bool {
        self.delete_armed
    }

    /// Handle to the shared name store.
    pub fn names(&self) -> &SharedNames {
        &self.names
    }

    /// Per-frame update.
    pub fn tick<D: DialogHost>(&mut self, dialogs: &mut D) -> Option<SwitchEvent> {
        let event = self.switch.tick(dialogs);
        if let Some(SwitchEvent::Succeeded { slot, .. }) = &event {
            let slot = *slot;
            self.on_switch_succeeded(slot);
        }
        self.poll_scan();
        self.slots.tick();
        self.cards.tick();
        event
    }

    /// Activate slot `target`, switching to it.
    pub fn select_slot(&mut self, target: SlotIndex) -> Result<Option<SwitchEvent>, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        let row_count = self.slots.len();
        let event = self.switch.request_switch(target, &mut self.store)?;
        self.slots.select(Some(target).filter(|index| *index < row_count));
        if event.is_some() {
            self.switch_refresh = Some(RefreshMode::after_switch(target, row_count));
            self.scroll_to_tail = row_count > 0 && target + 1 == row_count;
            self.load_name_field(target);
            self.rebuild_cards();
        }
        Ok(event)
    }

    /// Move the selection by `delta` rows, switching to the new row.
    pub fn step_selection(&mut self, delta: isize) -> Result<Option<SwitchEvent>, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        let Some(last) = self.slots.len().checked_sub(1) else {
            return Ok(None);
        };
        let from = self.slots.selected().unwrap_or(self.current_slot()) as isize;
        let target = (from + delta).clamp(0, last as isize) as SlotIndex;
        self.select_slot(target)
    }

    /// Replace the current slot's name. A blank name clears it.
    pub fn rename(&mut self, text: impl Into<String>) {
        self.name_field = text.into();
        let slot = self.current_slot();
        let stored = {
            let mut names = self.names.write();
            names.set(slot, self.name_field.clone());
            names.get(slot).map(str::to_string)
        };
        if let Some(row) = self.slots.items_mut().get_mut(slot) {
            row.display_name = stored;
        }
    }

    /// Flip the delete toggle. Returns the new state.
    pub fn toggle_delete(&mut self) -> bool {
        self.delete_armed = !self.delete_armed;
        self.delete_armed
    }

    /// The reset gesture completed: wipe, or delete when the toggle is on.
    pub fn confirm_reset<D: DialogHost>(&mut self, dialogs: &mut D) -> Result<ResetOutcome, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        if self.delete_armed {
            return self.delete_current(dialogs);
        }
        let slot = self.current_slot();
        info!(slot, "resetting save slot");
        if let Err(err) = self.store.wipe_all() {
            let err = SlotError::from(err);
            notify(dialogs, &err);
            return Err(err);
        }
        self.rebuild_cards();
        self.request_scan(RefreshMode::ColorOnly);
        Ok(ResetOutcome::Wiped)
    }

    fn delete_current<D: DialogHost>(&mut self, dialogs: &mut D) -> Result<ResetOutcome, SlotError> {
        let slot = self.current_slot();
        info!(slot, "deleting save slot");
        if let Err(err) = self.storage.delete_side_artifacts(slot) {
            notify(dialogs, &err);
            return Err(err);
        }
        if let Err(err) = self.store.delete_save() {
            let err = SlotError::from(err);
            notify(dialogs, &err);
            return Err(err);
        }

        self.names.write().remove(slot);
        self.name_field.clear();
        if let Some(row) = self.slots.items_mut().get_mut(slot) {
            row.display_name = None;
        }
        self.delete_armed = false;
        self.switch_refresh = Some(RefreshMode::ColorOnly);
        self.switch.reload(&mut self.store)?;
        self.rebuild_cards();
        Ok(ResetOutcome::Deleted)
    }

    /// Route a dialog confirmation back by its purpose.
    pub fn confirm_dialog(&mut self, purpose: DialogPurpose) -> Option<SwitchEvent> {
        match purpose {
            DialogPurpose::Notice => None,
            DialogPurpose::SlotLoadFailed => {
                let event = self.switch.confirm_failure(&mut self.store);
                if let SwitchEvent::Reverting { slot } = event {
                    self.switch_refresh = Some(RefreshMode::after_switch(slot, self.slots.len()));
                    self.scroll_to_tail = false;
                    self.slots.select(Some(slot).filter(|index| *index < self.slots.len()));
                    self.load_name_field(slot);
                    self.rebuild_cards();
                }
                Some(event)
            }
        }
    }

    /// Back action. Greyed out while busy.
    pub fn back(&mut self) -> Result<Screen, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        self.persist_options();
        Ok(Screen::MainMenu)
    }

    /// Open the backups screen, arming its redirect back to this panel.
    /// Greyed out while busy.
    pub fn open_backups(&mut self, redirect: &mut BackupsRedirect) -> Result<Screen, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        self.persist_options();
        redirect.arm();
        info!("opening backups, back will return to the saves panel");
        Ok(Screen::Backups)
    }

    /// Feed the pause key state. Back fires on the press edge only when no
    /// dialog is up and back is available.
    pub fn pause_input<D: DialogHost>(&mut self, pressed: bool, dialogs: &D) -> Option<Screen> {
        let rising = pressed && !self.pause_held;
        self.pause_held = pressed;
        if !rising || dialogs.is_open() {
            return None;
        }
        self.back().ok()
    }

    /// Scroll a list by wheel ticks at `column`.
    pub fn wheel(&mut self, list: PanelList, column: u16, delta: isize) -> bool {
        match list {
            PanelList::Slots => self.slots.wheel(column, delta),
            PanelList::Cards => self.cards.wheel(column, delta),
        }
    }

    /// Set a list's scroll position from its scrollbar.
    pub fn drag_scrollbar(&mut self, list: PanelList, fraction: f64) {
        match list {
            PanelList::Slots => self.slots.set_fraction(fraction),
            PanelList::Cards => self.cards.set_fraction(fraction),
        }
    }

    /// Record where a list is drawn so wheel input can be filtered.
    pub fn set_extent(&mut self, list: PanelList, columns: Range<u16>) {
        match list {
            PanelList::Slots => self.slots.set_extent(columns),
            PanelList::Cards => self.cards.set_extent(columns),
        }
    }

    /// Limit a list's window to the rows the host has room to draw.
    pub fn fit_window(&mut self, list: PanelList, rows: usize) {
        match list {
            PanelList::Slots => self.slots.fit_window(rows),
            PanelList::Cards => self.cards.fit_window(rows),
        }
    }

        /// Description line for `control`.
    pub fn info_text(&self, control: PanelControl) -> &'static str {
        match control {
            PanelControl::Back => "Return to the main menu",
            PanelControl::Backups => "Create or restore backups of every save slot",
            PanelControl::Reset if self.delete_armed => {
                "Hold to delete this save slot and all of its files"
            }
            PanelControl::Reset => "Hold to reset progress on this save slot",
            PanelControl::DeleteToggle => "When enabled, reset deletes the save slot entirely",
            PanelControl::Rename => "Give this save slot a custom name",
            PanelControl::Slots => "Choose the active save slot",
        }
    }

    /// Warning shown while the reset gesture is held.
    pub fn reset_warning(&self) -> &'static str {
        if self.delete_armed {
            "WARNING: This will permanently delete the save slot!"
        } else {
            "WARNING: This will erase all progress in the save slot!"
        }
    }

    /// Write the current slot and slot names to the options file.
    pub fn persist_options(&mut self) {
        self.options.save_slot = self.current_slot();
        let names = self.names.read();
        match self.options.save(&self.options_path, &names) {
            Ok(()) => debug!(slot = self.options.save_slot, "options saved"),
            Err(err) => warn!("failed to save options: {err:#}"),
        }
    }

    fn on_switch_succeeded(&mut self, slot: SlotIndex) {
        self.options.save_slot = slot;
        self.rebuild_cards();
        let mode = self.switch_refresh.take().unwrap_or(RefreshMode::ColorOnly);
        self.request_scan(mode);
    }

    fn request_scan(&mut self, mode: RefreshMode) {
        match self.scanner.request(self.current_slot()) {
            Ok(()) => self.scan_refresh = Some(mode),
            Err(_) => {
                self.rescan = Some(match self.rescan {
                    Some(RefreshMode::FullRebuild) => RefreshMode::FullRebuild,
                    _ => mode,
                });
            }
        }
    }

    fn poll_scan(&mut self) {
        let Some(outcome) = self.scanner.poll() else {
            return;
        };
        let mode = self.scan_refresh.take().unwrap_or(RefreshMode::FullRebuild);
        match outcome {
            Ok(result) => self.apply_scan(&result, mode),
            Err(err) => warn!("slot scan failed: {err:#}"),
        }
        if let Some(mode) = self.rescan.take() {
            debug!("re-issuing dropped slot scan");
            self.request_scan(mode);
        }
    }

    fn apply_scan(&mut self, result: &ScanResult, mode: RefreshMode) {
        let current = self.current_slot();
        match mode.resolve(result, self.slots.len()) {
            RefreshMode::FullRebuild => {
                let rows = result.rows(&self.names.read());
                self.slots.replace_items(rows);
                if std::mem::take(&mut self.scroll_to_tail) {
                    self.slots.scroll_to_end();
                }
            }
            RefreshMode::ColorOnly => result.recolor(self.slots.items_mut()),
        }
        self.slots.select(Some(current));
    }

    fn rebuild_cards(&mut self) {
        let cards = self
            .store
            .snapshot()
            .map(|snapshot| CardEntry::from_snapshot(&snapshot))
            .unwrap_or_default();
        self.cards.replace_items(cards);
    }

    fn load_name_field(&mut self, slot: SlotIndex) {
        self.name_field = self.names.read().get(slot).unwrap_or_default().to_string();
    }
}

fn notify<D: DialogHost>(dialogs: &mut D, err: &SlotError) {
    error!("{err}");
    if dialogs.is_open() {
        debug!("notice suppressed, a dialog is already open");
        return;
    }
    dialogs.show(DialogRequest::new(err.user_message(), DialogPurpose::Notice));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_fires_once() {
        let mut redirect = BackupsRedirect::default();
        assert_eq!(redirect.back_target(), Screen::MainMenu);
        redirect.arm();
        assert!(redirect.is_armed());
        assert_eq!(redirect.back_target(), Screen::Saves);
        assert_eq!(redirect.back_target(), Screen::MainMenu);
    }
}
