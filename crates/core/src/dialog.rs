//! Contract of the host's modal dialog facility.

/// Rough size a dialog needs for its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogSize {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
}

impl DialogSize {
    const MIN_WIDTH: u16 = 30;
    const MAX_WIDTH: u16 = 80;

    /// Size that fits `text` plus borders and a confirmation row.
    pub fn for_text(text: &str) -> Self {
        let longest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        let width = u16::try_from(longest)
            .unwrap_or(u16::MAX)
            .saturating_add(4)
            .clamp(Self::MIN_WIDTH, Self::MAX_WIDTH);
        let inner = (width - 4).max(1) as usize;
        let rows: usize = text
            .lines()
            .map(|line| line.chars().count().max(1).div_ceil(inner))
            .sum();
        Self {
            width,
            height: u16::try_from(rows).unwrap_or(u16::MAX).saturating_add(4),
        }
    }
}

/// Why a dialog is shown. Confirmation is routed back by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPurpose {
    /// A slot failed to load; confirming reverts to the previous slot.
    SlotLoadFailed,
    /// Plain notice; confirming only closes it.
    Notice,
}

/// A single-action modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRequest {
    /// Message text, possibly multi-line.
    pub message: String,
    /// Size hint.
    pub size: DialogSize,
    /// Routing tag for the confirmation.
    pub purpose: DialogPurpose,
}

impl DialogRequest {
    /// Build a request sized for `message`.
    pub fn new(message: impl Into<String>, purpose: DialogPurpose) -> Self {
        let message = message.into();
        let size = DialogSize::for_text(&message);
        Self {
            message,
            size,
            purpose,
        }
    }
}

/// The host side of modal dialogs.
///
/// The host renders the dialog and, when the user confirms, hands the
/// request's purpose back to the panel.
pub trait DialogHost {
    /// Present a dialog.
    fn show(&mut self, request: DialogRequest);

    /// Whether a dialog is on screen.
    fn is_open(&self) -> bool;
}

/// Text of the load-failure dialog.
pub fn load_failed_message(error_text: &str) -> String {
    "Failed to load the save slot:\n{ERROR}\n\nPress OK to return to the previous slot."
        .replace("{ERROR}", error_text)
}
