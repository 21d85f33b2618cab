//! Slot switching.
//!
//! Switching destroys the data of the slot being left, then asks the
//! progression store to load the target. The load result arrives on a later
//! tick. Failures are reported through exactly one modal; confirming it
//! switches back to the slot that was left, once. A failure while switching
//! back only returns to idle.

use tracing::{debug, error, info};

use crate::{
    dialog::{load_failed_message, DialogHost, DialogPurpose, DialogRequest},
    error::SlotError,
    models::SlotIndex,
    progression::{LoadResult, LoadTicket, ProgressionStore},
};

/// State of the switch machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchState {
    /// Nothing outstanding.
    Idle,
    /// Waiting for the store to load `target`.
    AwaitingLoad {
        /// Slot to return to on failure. `None` while already returning.
        previous: Option<SlotIndex>,
        /// Slot being loaded.
        target: SlotIndex,
    },
    /// A failure dialog is up for `target`.
    ReportingFailure {
        /// Slot to return to on confirmation.
        previous: Option<SlotIndex>,
        /// Slot that failed.
        target: SlotIndex,
        /// The failing result.
        result: LoadResult,
    },
}

/// What a machine step did, for the caller to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    /// A load was issued.
    Started {
        /// Slot left behind, if this is not a revert or reload.
        previous: Option<SlotIndex>,
        /// Slot being loaded.
        target: SlotIndex,
    },
    /// The target loaded.
    Succeeded {
        /// Slot now current.
        slot: SlotIndex,
        /// How it loaded.
        result: LoadResult,
    },
    /// A failure dialog was shown.
    FailureReported {
        /// Slot that failed.
        slot: SlotIndex,
        /// The failing result.
        result: LoadResult,
    },
    /// A failure arrived while the dialog was already displayed.
    FailureSuppressed,
    /// The dialog was confirmed and the previous slot is being loaded again.
    Reverting {
        /// Slot being restored.
        slot: SlotIndex,
    },
    /// The dialog was confirmed with nothing to revert to.
    Dismissed,
}

/// Coordinates destroy/load of slots for one panel.
#[derive(Debug)]
pub struct SlotSwitchStateMachine {
    state: SwitchState,
    current: SlotIndex,
    ticket: Option<LoadTicket>,
    dialog_displaying: bool,
}

impl SlotSwitchStateMachine {
    /// Idle machine on `current`.
    pub fn new(current: SlotIndex) -> Self {
        Self {
            state: SwitchState::Idle,
            current,
            ticket: None,
            dialog_displaying: false,
        }
    }

    /// Slot the panel currently points at.
    pub fn current_slot(&self) -> SlotIndex {
        self.current
    }

    /// Current state.
    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    /// `true` unless idle.
    pub fn is_busy(&self) -> bool {
        self.state != SwitchState::Idle
    }

    /// Whether the failure dialog is up.
    pub fn dialog_displaying(&self) -> bool {
        self.dialog_displaying
    }

    /// Switch to `target`. Switching to the current slot does nothing.
    pub fn request_switch<S: ProgressionStore>(
        &mut self,
        target: SlotIndex,
        store: &mut S,
    ) -> Result<Option<SwitchEvent>, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        if target == self.current {
            return Ok(None);
        }
        info!(from = self.current, to = target, "switching save slot");
        Ok(Some(self.begin_switch(Some(self.current), target, store)))
    }

    /// Destroy and load the current slot again without a revert target.
    pub fn reload<S: ProgressionStore>(&mut self, store: &mut S) -> Result<SwitchEvent, SlotError> {
        if self.is_busy() {
            return Err(SlotError::Busy);
        }
        info!(slot = self.current, "reloading save slot");
        Ok(self.begin_switch(None, self.current, store))
    }

    /// Per-tick update: pick up a finished load, re-check a latched failure.
    pub fn tick<D: DialogHost>(&mut self, dialogs: &mut D) -> Option<SwitchEvent> {
        match &self.state {
            SwitchState::Idle => None,
            SwitchState::AwaitingLoad { .. } => {
                let result = self.ticket.as_mut()?.poll()?;
                self.ticket = None;
                Some(self.load_completed(result, dialogs))
            }
            SwitchState::ReportingFailure { result, .. } => {
                let result = result.clone();
                Some(self.load_completed(result, dialogs))
            }
        }
    }

    /// Handle a load completion.
    pub fn load_completed<D: DialogHost>(
        &mut self,
        result: LoadResult,
        dialogs: &mut D,
    ) -> SwitchEvent {
        if result.is_success() {
            debug!(slot = self.current, %result, "save slot change succeeded");
            self.ticket = None;
            self.state = SwitchState::Idle;
            return SwitchEvent::Succeeded {
                slot: self.current,
                result,
            };
        }

        if self.dialog_displaying {
            debug!(slot = self.current, %result, "failure dialog already displayed");
            return SwitchEvent::FailureSuppressed;
        }

        let failure = SlotError::LoadFailed {
            slot: self.current,
            result: result.clone(),
        };
        error!(slot = self.current, "{failure}");
        let previous = match &self.state {
            SwitchState::AwaitingLoad { previous, .. }
            | SwitchState::ReportingFailure { previous, .. } => *previous,
            SwitchState::Idle => None,
        };
        self.ticket = None;
        self.dialog_displaying = true;
        self.state = SwitchState::ReportingFailure {
            previous,
            target: self.current,
            result: result.clone(),
        };
        dialogs.show(DialogRequest::new(
            load_failed_message(&failure.user_message()),
            DialogPurpose::SlotLoadFailed,
        ));
        SwitchEvent::FailureReported {
            slot: self.current,
            result,
        }
    }

    /// The failure dialog was confirmed.
    pub fn confirm_failure<S: ProgressionStore>(&mut self, store: &mut S) -> SwitchEvent {
        self.dialog_displaying = false;
        match std::mem::replace(&mut self.state, SwitchState::Idle) {
            SwitchState::ReportingFailure {
                previous: Some(previous),
                ..
            } => {
                info!(slot = previous, "returning to previous save slot");
                self.begin_switch(None, previous, store);
                SwitchEvent::Reverting { slot: previous }
            }
            SwitchState::ReportingFailure { previous: None, .. } => SwitchEvent::Dismissed,
            other => {
                self.state = other;
                SwitchEvent::Dismissed
            }
        }
    }

    fn begin_switch<S: ProgressionStore>(
        &mut self,
        previous: Option<SlotIndex>,
        target: SlotIndex,
        store: &mut S,
    ) -> SwitchEvent {
        // Drop interest in any older load before issuing the next one.
        self.ticket = None;
        store.destroy(self.current);
        self.current = target;
        self.ticket = Some(store.begin_load(target));
        self.state = SwitchState::AwaitingLoad { previous, target };
        SwitchEvent::Started { previous, target }
    }
}
