//! Windowed single-selection list shared by the slot rows and the summary cards.
//!
//! Only `window` rows are ever on screen. Every row keeps its state while it
//! is scrolled away; the renderer asks [`VirtualizedList::visibility`] where a
//! row currently sits instead of rebuilding rows on scroll.
//!
//! The scroll offset is stored the way rows are positioned: it is `<= 0` and
//! row `i` sits at window slot `i + scroll_offset`.

use std::ops::Range;

/// Where a row sits relative to the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowVisibility {
    /// Scrolled off the top.
    Above,
    /// On screen at the given window slot.
    Visible(usize),
    /// Scrolled off the bottom.
    Below,
}

/// Lowest valid scroll offset for a list of `item_count` rows in a window of `window`.
pub fn min_scroll_offset(item_count: usize, window: usize) -> isize {
    (window as isize - item_count as isize).min(0)
}

/// Map a scrollbar value (`1` with the first row at the top, `0` scrolled to
/// the end) to a scroll offset.
pub fn scroll_offset_from_fraction(fraction: f64, item_count: usize, window: usize) -> isize {
    let span = min_scroll_offset(item_count, window) as f64;
    let fraction = fraction.clamp(0.0, 1.0);
    ((1.0 - fraction) * span).floor() as isize
}

/// Map a scroll offset back to a scrollbar fraction.
///
/// Lists that fit in the window have nothing to scroll and report `0`.
pub fn fraction_from_scroll_offset(offset: isize, item_count: usize, window: usize) -> f64 {
    let span = min_scroll_offset(item_count, window);
    if span == 0 {
        return 0.0;
    }
    1.0 - offset as f64 / span as f64
}

/// Virtualized single-select list over rows of type `T`.
#[derive(Debug, Clone)]
pub struct VirtualizedList<T> {
    items: Vec<T>,
    window: usize,
    max_window: usize,
    scroll_offset: isize,
    selected: Option<usize>,
    pending_wheel: isize,
    extent: Option<Range<u16>>,
}

impl<T> VirtualizedList<T> {
    /// Create an empty list showing `window` rows at a time.
    pub fn new(window: usize) -> Self {
        Self {
            items: Vec::new(),
            window: window.max(1),
            max_window: window.max(1),
            scroll_offset: 0,
            selected: None,
            pending_wheel: 0,
            extent: None,
        }
    }

    /// Number of rows visible at once.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Shrink the window to the `rows` the host can actually draw, never
    /// beyond the size the list was created with.
    pub fn fit_window(&mut self, rows: usize) {
        let window = self.max_window.min(rows).max(1);
        if window != self.window {
            self.window = window;
            self.clamp_offset();
        }
    }

    /// All rows, visible or not.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Mutable access to rows for in-place refreshes. The row count cannot change.
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Total row count.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when the list has no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discard every row and replace them, keeping selection and scroll within bounds.
    pub fn replace_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.selected = self.selected.map(|index| index.min(self.items.len().saturating_sub(1)));
        if self.items.is_empty() {
            self.selected = None;
        }
        self.clamp_offset();
    }

    /// Current scroll offset (always `<= 0`).
    pub fn scroll_offset(&self) -> isize {
        self.scroll_offset
    }

    /// Index of the selected row.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Select a row, clamping to the last one. `None` clears the selection.
    pub fn select(&mut self, index: Option<usize>) {
        self.selected = match index {
            Some(_) if self.items.is_empty() => None,
            Some(index) => Some(index.min(self.items.len() - 1)),
            None => None,
        };
    }

    /// Move the selection by `delta` rows. Selects the first row if nothing was selected.
    pub fn move_selection(&mut self, delta: isize) {
        if self.items.is_empty() {
            return;
        }
        let next = match self.selected {
            Some(current) => (current as isize + delta).clamp(0, self.items.len() as isize - 1),
            None => 0,
        };
        self.selected = Some(next as usize);
    }

    /// Where row `index` sits relative to the window.
    pub fn visibility(&self, index: usize) -> RowVisibility {
        let slot = index as isize + self.scroll_offset;
        if slot < 0 {
            RowVisibility::Above
        } else if slot >= self.window as isize {
            RowVisibility::Below
        } else {
            RowVisibility::Visible(slot as usize)
        }
    }

    /// Indices of the rows currently on screen.
    pub fn visible_range(&self) -> Range<usize> {
        let start = (-self.scroll_offset) as usize;
        let start = start.min(self.items.len());
        let end = (start + self.window).min(self.items.len());
        start..end
    }

    /// Scrollbar position for the current offset.
    pub fn fraction(&self) -> f64 {
        fraction_from_scroll_offset(self.scroll_offset, self.items.len(), self.window)
    }

    /// Move the window from a scrollbar drag.
    pub fn set_fraction(&mut self, fraction: f64) {
        self.scroll_offset = scroll_offset_from_fraction(fraction, self.items.len(), self.window);
        self.clamp_offset();
    }

    /// Scroll so the last row is on screen.
    pub fn scroll_to_end(&mut self) {
        self.scroll_offset = min_scroll_offset(self.items.len(), self.window);
    }

    /// Columns the list occupies; wheel input outside them is ignored.
    pub fn set_extent(&mut self, columns: Range<u16>) {
        self.extent = Some(columns);
    }

    /// Queue a wheel movement reported at pointer column `column`.
    ///
    /// Returns `false` when the pointer is outside the list.
    pub fn wheel(&mut self, column: u16, delta: isize) -> bool {
        match &self.extent {
            Some(extent) if extent.contains(&column) => {
                self.pending_wheel += delta;
                true
            }
            _ => false,
        }
    }

    /// Per-tick update: apply wheel input, keep the selection visible, clamp.
    ///
    /// The order matters: clamping before the snap would let the snap push
    /// the offset out of bounds again after the list shrank.
    pub fn tick(&mut self) {
        self.scroll_offset += std::mem::take(&mut self.pending_wheel);

        if let Some(local) = self.selected {
            let local = local as isize;
            let slot = local + self.scroll_offset;
            if slot < 0 || slot >= self.window as isize {
                self.scroll_offset = slot.clamp(0, self.window as isize - 1) - local;
            }
        }

        self.clamp_offset();
    }

    fn clamp_offset(&mut self) {
        let min = min_scroll_offset(self.items.len(), self.window);
        self.scroll_offset = self.scroll_offset.clamp(min, 0);
    }
}
