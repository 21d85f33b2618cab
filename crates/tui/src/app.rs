use std::{
    io,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Gauge, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Wrap,
    },
    Frame, Terminal,
};
use slotdeck_core::{
    list::RowVisibility,
    models::default_slot_label,
    AppConfig, BackupEntry, BackupManager, BackupsRedirect, DialogHost, DialogPurpose,
    DialogRequest, FsProgressionStore, PanelControl, PanelList, ResetOutcome, SavesPanel, Screen,
    SlotError, SwitchEvent,
};
use tokio::{sync::mpsc, task};
use tracing::{debug, error, info, warn};

use crate::theme::{load_theme, Theme};

const RESET_HOLD: Duration = Duration::from_millis(1500);
const HOLD_GAP: Duration = Duration::from_millis(600);
const PULSE_PERIOD_MS: u128 = 400;
const MAX_SLOT_NAME_LEN: usize = 48;
const CARD_HEIGHT: u16 = 3;
const MENU_ITEMS: [&str; 3] = ["Save Slots", "Backups", "Quit"];

enum AppEvent {
    Input(Event),
    Tick,
    BackupFinished(Result<String>),
}

#[derive(Debug, Clone)]
enum BackupJob {
    Create,
    Restore(BackupEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Slots,
    Rename,
    Reset,
    DeleteToggle,
    Backups,
    Back,
}

impl Focus {
    const ORDER: [Focus; 6] = [
        Focus::Slots,
        Focus::Rename,
        Focus::Reset,
        Focus::DeleteToggle,
        Focus::Backups,
        Focus::Back,
    ];

    fn step(self, delta: isize) -> Self {
        let len = Self::ORDER.len() as isize;
        let index = Self::ORDER
            .iter()
            .position(|focus| *focus == self)
            .unwrap_or(0) as isize;
        Self::ORDER[(index + delta).rem_euclid(len) as usize]
    }

    fn control(self) -> PanelControl {
        match self {
            Focus::Slots => PanelControl::Slots,
            Focus::Rename => PanelControl::Rename,
            Focus::Reset => PanelControl::Reset,
            Focus::DeleteToggle => PanelControl::DeleteToggle,
            Focus::Backups => PanelControl::Backups,
            Focus::Back => PanelControl::Back,
        }
    }
}

/// Single modal slot the panel reports through.
#[derive(Debug, Default)]
struct ModalHost {
    current: Option<DialogRequest>,
}

impl ModalHost {
    fn confirm(&mut self) -> Option<DialogPurpose> {
        self.current.take().map(|request| request.purpose)
    }
}

impl DialogHost for ModalHost {
    fn show(&mut self, request: DialogRequest) {
        if self.current.is_some() {
            warn!(message = %request.message, "dialog already open, dropping request");
            return;
        }
        self.current = Some(request);
    }

    fn is_open(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum HoldStatus {
    Idle,
    Filling(f64),
    Complete,
}

/// Hold-to-confirm gesture fed by key repeats.
///
/// Terminals report no key release, so the hold ends when repeats stop
/// arriving for longer than [`HOLD_GAP`].
#[derive(Debug, Default)]
struct HoldGesture {
    started: Option<Instant>,
    last_seen: Option<Instant>,
}

impl HoldGesture {
    fn press(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
        self.last_seen = Some(now);
    }

    fn cancel(&mut self) {
        self.started = None;
        self.last_seen = None;
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default()
    }

    fn poll(&mut self, now: Instant) -> HoldStatus {
        let (Some(started), Some(last_seen)) = (self.started, self.last_seen) else {
            return HoldStatus::Idle;
        };
        if now.saturating_duration_since(last_seen) > HOLD_GAP {
            self.cancel();
            return HoldStatus::Idle;
        }
        let progress =
            now.saturating_duration_since(started).as_secs_f64() / RESET_HOLD.as_secs_f64();
        if progress >= 1.0 {
            self.cancel();
            HoldStatus::Complete
        } else {
            HoldStatus::Filling(progress)
        }
    }
}

#[derive(Debug, Clone)]
struct NameEditor {
    input: String,
    cursor: usize,
}

impl NameEditor {
    fn new(initial: &str) -> Self {
        let input: String = initial
            .chars()
            .filter(|ch| ch.is_ascii() && !ch.is_ascii_control())
            .take(MAX_SLOT_NAME_LEN)
            .collect();
        Self {
            cursor: input.len(),
            input,
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let next = (self.cursor as isize + delta).clamp(0, self.input.len() as isize);
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    fn insert(&mut self, ch: char) {
        if self.input.len() >= MAX_SLOT_NAME_LEN {
            return;
        }
        if ch.is_ascii() && !ch.is_ascii_control() {
            self.input.insert(self.cursor, ch);
            self.cursor += 1;
        }
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.input.remove(self.cursor);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.input.len() {
            self.input.remove(self.cursor);
        }
    }

    fn value(&self) -> String {
        self.input.trim().to_string()
    }
}

struct UiState {
    status: String,
    should_quit: bool,
    menu_cursor: usize,
    backup_cursor: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            should_quit: false,
            menu_cursor: 0,
            backup_cursor: 0,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn move_menu_cursor(&mut self, delta: isize) {
        let last = MENU_ITEMS.len() as isize - 1;
        self.menu_cursor = (self.menu_cursor as isize + delta).clamp(0, last) as usize;
    }

    fn move_backup_cursor(&mut self, delta: isize, total: usize) {
        if total == 0 {
            self.backup_cursor = 0;
            return;
        }
        let next = (self.backup_cursor as isize + delta).clamp(0, total as isize - 1);
        self.backup_cursor = next as usize;
    }
}

/// Terminal host for the saves panel.
pub struct SlotdeckApp {
    config: AppConfig,
    panel: SavesPanel<FsProgressionStore>,
    backups: BackupManager,
    backup_entries: Vec<BackupEntry>,
    backup_running: bool,
    redirect: BackupsRedirect,
    modal: ModalHost,
    screen: Screen,
    focus: Focus,
    editor: Option<NameEditor>,
    hold: HoldGesture,
    pause_pressed: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    state: UiState,
    theme: Theme,
    slots_area: Rect,
    cards_area: Rect,
}

impl SlotdeckApp {
    pub fn new(
        config: AppConfig,
        panel: SavesPanel<FsProgressionStore>,
        backups: BackupManager,
    ) -> Self {
        let (theme, theme_status) = load_theme();
        let mut state = UiState::default();
        state.set_status(theme_status);
        Self {
            config,
            panel,
            backups,
            backup_entries: Vec::new(),
            backup_running: false,
            redirect: BackupsRedirect::default(),
            modal: ModalHost::default(),
            screen: Screen::MainMenu,
            focus: Focus::Slots,
            editor: None,
            hold: HoldGesture::default(),
            pause_pressed: false,
            event_tx: None,
            state,
            theme,
            slots_area: Rect::default(),
            cards_area: Rect::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone(), Duration::from_millis(self.config.tick_ms));
        self.event_tx = Some(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }
        }

        self.panel.persist_options();
        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    error!(?err, "input handling failed");
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Tick) => {
                self.handle_tick(Instant::now());
                true
            }
            Some(AppEvent::BackupFinished(result)) => {
                self.backup_running = false;
                match result {
                    Ok(message) => {
                        info!("{message}");
                        self.state.set_status(message);
                    }
                    Err(err) => {
                        error!(?err, "backup job failed");
                        self.state.set_status(format!("Backup failed: {err:#}"));
                    }
                }
                self.refresh_backups();
                true
            }
            None => false,
        }
    }

    fn handle_tick(&mut self, now: Instant) {
        if let Some(event) = self.panel.tick(&mut self.modal) {
            self.on_switch_event(event);
        }

        if self.screen == Screen::Saves {
            let pressed = std::mem::take(&mut self.pause_pressed);
            if let Some(target) = self.panel.pause_input(pressed, &self.modal) {
                self.navigate(target);
            }
        }

        if self.panel.is_busy() || self.focus != Focus::Reset {
            self.hold.cancel();
        }
        if self.hold.poll(now) == HoldStatus::Complete {
            self.finish_reset();
        }
    }

    fn on_switch_event(&mut self, event: SwitchEvent) {
        match event {
            SwitchEvent::Started { target, .. } => {
                self.hold.cancel();
                self.state
                    .set_status(format!("Loading {}...", default_slot_label(target)));
            }
            SwitchEvent::Succeeded { slot, result } => {
                self.state
                    .set_status(format!("{} ready ({result})", default_slot_label(slot)));
            }
            SwitchEvent::FailureReported { slot, .. } => {
                self.state
                    .set_status(format!("{} failed to load", default_slot_label(slot)));
            }
            SwitchEvent::Reverting { slot } => {
                self.state
                    .set_status(format!("Returning to {}...", default_slot_label(slot)));
            }
            SwitchEvent::Dismissed => {
                self.state.set_status("Load failure dismissed");
            }
            SwitchEvent::FailureSuppressed => {}
        }
    }

    fn finish_reset(&mut self) {
        match self.panel.confirm_reset(&mut self.modal) {
            Ok(ResetOutcome::Wiped) => self.state.set_status("Save slot reset"),
            Ok(ResetOutcome::Deleted) => self.state.set_status("Save slot deleted"),
            Err(err) => self.report(err),
        }
    }

    fn report(&mut self, err: SlotError) {
        debug!("{err}");
        self.state.set_status(err.user_message());
    }

    fn navigate(&mut self, screen: Screen) {
        info!(from = ?self.screen, to = ?screen, "navigating");
        self.hold.cancel();
        self.editor = None;
        match screen {
            Screen::Saves => self.focus = Focus::Slots,
            Screen::Backups => self.refresh_backups(),
            Screen::MainMenu => {}
        }
        self.screen = screen;
    }

    fn refresh_backups(&mut self) {
        match self.backups.entries() {
            Ok(entries) => {
                self.backup_entries = entries;
                let total = self.backup_entries.len();
                self.state.move_backup_cursor(0, total);
            }
            Err(err) => {
                error!(?err, "failed to list backups");
                self.state.set_status(format!("Failed to list backups: {err:#}"));
            }
        }
    }

    fn start_backup_job(&mut self, job: BackupJob) {
        if self.backup_running {
            self.state.set_status("A backup operation is already running");
            return;
        }
        let Some(sender) = self.event_tx.clone() else {
            return;
        };
        let manager = self.backups.clone();
        self.backup_running = true;
        self.state.set_status(match &job {
            BackupJob::Create => "Creating backup...".to_string(),
            BackupJob::Restore(entry) => format!("Restoring {}...", entry.name()),
        });
        tokio::spawn(async move {
            let outcome = task::spawn_blocking(move || match job {
                BackupJob::Create => manager
                    .create()
                    .map(|entry| format!("Created backup {} ({} files)", entry.name(), entry.files)),
                BackupJob::Restore(entry) => manager
                    .restore_all(&entry)
                    .map(|count| format!("Restored {count} files from {}", entry.name())),
            })
            .await;
            let result = outcome.map_err(anyhow::Error::from).and_then(|result| result);
            let _ = sender.send(AppEvent::BackupFinished(result)).await;
        });
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => match self.screen {
                Screen::MainMenu => self.handle_menu_key(key),
                Screen::Saves => self.handle_saves_key(key),
                Screen::Backups => self.handle_backups_key(key),
            },
            Event::Mouse(mouse) if self.screen == Screen::Saves && !self.modal.is_open() => {
                self.handle_saves_mouse(mouse);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_menu_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.state.should_quit = true;
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.move_menu_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_menu_cursor(-1),
            KeyCode::Enter => match self.state.menu_cursor {
                0 => self.navigate(Screen::Saves),
                1 => self.navigate(Screen::Backups),
                _ => self.state.should_quit = true,
            },
            _ => {}
        }
    }

    fn handle_saves_key(&mut self, key: KeyEvent) {
        if self.modal.is_open() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                if let Some(purpose) = self.modal.confirm() {
                    if let Some(event) = self.panel.confirm_dialog(purpose) {
                        self.on_switch_event(event);
                    }
                }
            }
            return;
        }

        if let Some(editor) = self.editor.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let value = editor.value();
                    self.editor = None;
                    self.panel.rename(value);
                    self.state.set_status("Slot name saved");
                }
                KeyCode::Esc => {
                    self.editor = None;
                    self.state.set_status("Rename cancelled");
                }
                KeyCode::Left => editor.move_cursor(-1),
                KeyCode::Right => editor.move_cursor(1),
                KeyCode::Home => editor.move_home(),
                KeyCode::End => editor.move_end(),
                KeyCode::Backspace => editor.backspace(),
                KeyCode::Delete => editor.delete(),
                KeyCode::Char(ch) => editor.insert(ch),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.pause_pressed = true,
            KeyCode::Tab | KeyCode::Right => self.focus = self.focus.step(1),
            KeyCode::BackTab | KeyCode::Left => self.focus = self.focus.step(-1),
            KeyCode::Up | KeyCode::Char('k') if self.focus == Focus::Slots => self.step_slot(-1),
            KeyCode::Down | KeyCode::Char('j') if self.focus == Focus::Slots => self.step_slot(1),
            KeyCode::PageUp => self.scroll_page(PanelList::Slots, 1),
            KeyCode::PageDown => self.scroll_page(PanelList::Slots, -1),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate_focus(),
            _ => {}
        }
    }

    fn step_slot(&mut self, delta: isize) {
        if let Err(err) = self.panel.step_selection(delta) {
            self.report(err);
        }
    }

    fn scroll_page(&mut self, list: PanelList, direction: isize) {
        let (area, window) = match list {
            PanelList::Slots => (self.slots_area, self.panel.slots().window()),
            PanelList::Cards => (self.cards_area, self.panel.cards().window()),
        };
        self.panel.wheel(list, area.x, direction * window as isize);
    }

    fn activate_focus(&mut self) {
        match self.focus {
            Focus::Slots => {}
            Focus::Rename => {
                self.editor = Some(NameEditor::new(self.panel.name_field()));
            }
            Focus::Reset => {
                if self.panel.is_busy() {
                    self.report(SlotError::Busy);
                } else {
                    self.hold.press(Instant::now());
                }
            }
            Focus::DeleteToggle => {
                let armed = self.panel.toggle_delete();
                self.state.set_status(if armed {
                    "Reset will delete the save slot"
                } else {
                    "Reset will keep the save slot files"
                });
            }
            Focus::Backups => match self.panel.open_backups(&mut self.redirect) {
                Ok(target) => self.navigate(target),
                Err(err) => self.report(err),
            },
            Focus::Back => match self.panel.back() {
                Ok(target) => self.navigate(target),
                Err(err) => self.report(err),
            },
        }
    }

    fn handle_saves_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                let _ = self.panel.wheel(PanelList::Slots, mouse.column, 1)
                    || self.panel.wheel(PanelList::Cards, mouse.column, 1);
            }
            MouseEventKind::ScrollDown => {
                let _ = self.panel.wheel(PanelList::Slots, mouse.column, -1)
                    || self.panel.wheel(PanelList::Cards, mouse.column, -1);
            }
            MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => {
                for (list, area) in [
                    (PanelList::Slots, self.slots_area),
                    (PanelList::Cards, self.cards_area),
                ] {
                    if let Some(fraction) = scrollbar_fraction(area, mouse.column, mouse.row) {
                        self.panel.drag_scrollbar(list, fraction);
                        return;
                    }
                }
                if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
                    self.click_slot(mouse.column, mouse.row);
                }
            }
            _ => {}
        }
    }

    fn click_slot(&mut self, column: u16, row: u16) {
        let inner = inner_rect(self.slots_area);
        if !contains(inner, column, row) {
            return;
        }
        let window_row = (row - inner.y) as usize;
        if window_row >= self.panel.slots().window() {
            return;
        }
        let index = self.panel.slots().visible_range().start + window_row;
        if index >= self.panel.slots().len() {
            return;
        }
        self.focus = Focus::Slots;
        if let Err(err) = self.panel.select_slot(index) {
            self.report(err);
        }
    }

    fn handle_backups_key(&mut self, key: KeyEvent) {
        let total = self.backup_entries.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                let target = self.redirect.back_target();
                self.navigate(target);
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.move_backup_cursor(1, total),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_backup_cursor(-1, total),
            KeyCode::Char('n') | KeyCode::Char('c') => self.start_backup_job(BackupJob::Create),
            KeyCode::Enter => {
                if let Some(entry) = self.backup_entries.get(self.state.backup_cursor).cloned() {
                    self.start_backup_job(BackupJob::Restore(entry));
                } else {
                    self.state.set_status("No backups available");
                }
            }
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        match self.screen {
            Screen::MainMenu => self.draw_menu(frame),
            Screen::Saves => self.draw_saves(frame),
            Screen::Backups => self.draw_backups(frame),
        }
        if let Some(request) = &self.modal.current {
            self.render_modal(frame, request);
        }
    }

    fn draw_menu(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(area);

        let title = Paragraph::new(Line::from(Span::styled(
            "S L O T D E C K",
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, layout[0]);

        let menu_height = (MENU_ITEMS.len() as u16)
            .saturating_mul(2)
            .saturating_add(2)
            .min(layout[1].height);
        let menu_width = 28.min(layout[1].width.max(1));
        let menu_area = centered_rect(menu_width, menu_height, layout[1]);
        let menu_lines: Vec<Line> = MENU_ITEMS
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                if idx == self.state.menu_cursor {
                    Line::from(Span::styled(
                        format!("▶ {item}"),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("  {item}"),
                        Style::default().fg(self.theme.primary_fg),
                    ))
                }
            })
            .collect();
        let menu = Paragraph::new(menu_lines)
            .block(Block::default().borders(Borders::ALL).title("Menu"))
            .alignment(Alignment::Center);
        frame.render_widget(menu, menu_area);
        self.render_status(frame, layout[2]);
    }

    fn draw_saves(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(rows[0]);

        self.slots_area = body[0];
        self.cards_area = body[1];
        self.panel
            .set_extent(PanelList::Slots, body[0].x..body[0].x + body[0].width);
        self.panel
            .set_extent(PanelList::Cards, body[1].x..body[1].x + body[1].width);
        self.panel
            .fit_window(PanelList::Slots, inner_rect(body[0]).height as usize);
        self.panel.fit_window(
            PanelList::Cards,
            (inner_rect(body[1]).height / CARD_HEIGHT) as usize,
        );

        self.render_slot_list(frame, body[0]);
        self.render_cards(frame, body[1]);
        self.render_controls(frame, rows[1]);
        self.render_info(frame, rows[2]);
        self.render_status(frame, rows[3]);
    }

    fn render_slot_list(&self, frame: &mut Frame, area: Rect) {
        let busy = self.panel.is_busy();
        let title = if busy { "Save Slots (loading)" } else { "Save Slots" };
        let border_style = if self.focus == Focus::Slots {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let slots = self.panel.slots();
        let current = self.panel.current_slot();
        for index in slots.visible_range() {
            let RowVisibility::Visible(position) = slots.visibility(index) else {
                continue;
            };
            let position = position as u16;
            if position >= inner.height {
                break;
            }
            let Some(row) = slots.items().get(index) else {
                continue;
            };
            let mut style = if busy {
                Style::default().fg(self.theme.muted)
            } else if row.exists {
                Style::default().fg(self.theme.primary_fg)
            } else {
                Style::default().fg(self.theme.create)
            };
            if slots.selected() == Some(index) {
                style = style
                    .bg(self.theme.selection_bg)
                    .add_modifier(Modifier::BOLD);
            }
            let marker = if index == current { "▶ " } else { "  " };
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(self.theme.success)),
                Span::styled(row.label(), style),
            ]);
            let row_area = Rect::new(inner.x, inner.y + position, inner.width.saturating_sub(1), 1);
            frame.render_widget(Paragraph::new(line), row_area);
        }

        render_scrollbar(frame, area, slots.len(), slots.window(), slots.fraction());
    }

    fn render_cards(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Progress");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let cards = self.panel.cards();
        if cards.is_empty() {
            let message = if self.panel.is_busy() {
                "Loading..."
            } else {
                "No campaigns started in this slot"
            };
            frame.render_widget(
                Paragraph::new(message).style(Style::default().fg(self.theme.muted)),
                inner,
            );
            return;
        }

        for index in cards.visible_range() {
            let RowVisibility::Visible(position) = cards.visibility(index) else {
                continue;
            };
            let top = position as u16 * CARD_HEIGHT;
            if top + CARD_HEIGHT > inner.height {
                break;
            }
            let Some(card) = cards.items().get(index) else {
                continue;
            };
            let lines = vec![
                Line::from(Span::styled(
                    card.title.clone(),
                    Style::default()
                        .fg(self.theme.accent)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(format!(
                    "Karma {}/{}  Food {}  Cycle {}",
                    card.karma, card.karma_cap, card.food, card.cycle
                )),
                Line::from(Span::styled(
                    format!("Time {}", card.elapsed_label()),
                    Style::default().fg(self.theme.muted),
                )),
            ];
            let card_area = Rect::new(
                inner.x,
                inner.y + top,
                inner.width.saturating_sub(1),
                CARD_HEIGHT,
            );
            frame.render_widget(Paragraph::new(lines), card_area);
        }

        render_scrollbar(frame, area, cards.len(), cards.window(), cards.fraction());
    }

    fn render_controls(&self, frame: &mut Frame, area: Rect) {
        let busy = self.panel.is_busy();
        let name = match &self.editor {
            Some(editor) => editor.input.clone(),
            None if self.panel.name_field().is_empty() => {
                default_slot_label(self.panel.current_slot())
            }
            None => self.panel.name_field().to_string(),
        };
        let delete_box = if self.panel.delete_armed() { "[x]" } else { "[ ]" };
        let controls = [
            (Focus::Rename, format!("Name: {name}"), false),
            (Focus::Reset, "Hold to reset".to_string(), busy),
            (Focus::DeleteToggle, format!("{delete_box} Delete"), false),
            (Focus::Backups, "Backups".to_string(), busy),
            (Focus::Back, "Back".to_string(), busy),
        ];

        let mut spans = Vec::new();
        for (focus, label, greyed) in controls {
            let style = if greyed {
                Style::default().fg(self.theme.muted)
            } else if self.focus == focus {
                Style::default()
                    .fg(self.theme.selection_fg)
                    .bg(self.theme.selection_bg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.primary_fg)
            };
            spans.push(Span::styled(format!(" {label} "), style));
            spans.push(Span::raw("  "));
        }
        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("Slot"));
        frame.render_widget(paragraph, area);

        if let Some(editor) = &self.editor {
            let offset = " Name: ".len() as u16 + editor.cursor as u16;
            let cursor_x = (area.x + 1 + offset).min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + 1);
        }
    }

    fn render_info(&self, frame: &mut Frame, area: Rect) {
        let now = Instant::now();
        let held = self.hold.elapsed(now);
        if !held.is_zero() {
            let pulse = (held.as_millis() / PULSE_PERIOD_MS) % 2 == 0;
            let color = if pulse {
                self.theme.danger
            } else {
                self.theme.warning
            };
            let ratio = (held.as_secs_f64() / RESET_HOLD.as_secs_f64()).clamp(0.0, 1.0);
            let gauge = Gauge::default()
                .block(Block::default().borders(Borders::ALL).title("Reset"))
                .gauge_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .ratio(ratio)
                .label(self.panel.reset_warning());
            frame.render_widget(gauge, area);
            return;
        }

        let paragraph = Paragraph::new(self.panel.info_text(self.focus.control()))
            .style(Style::default().fg(self.theme.muted))
            .block(Block::default().borders(Borders::ALL).title("Info"));
        frame.render_widget(paragraph, area);
    }

    fn draw_backups(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(3), Constraint::Length(3)])
            .split(area);

        let lines: Vec<Line> = if self.backup_entries.is_empty() {
            vec![Line::from(Span::styled(
                "No backups yet",
                Style::default().fg(self.theme.muted),
            ))]
        } else {
            self.backup_entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    let created = entry
                        .created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M:%S");
                    let text = format!("{created}  {} files  ({})", entry.files, entry.name());
                    if idx == self.state.backup_cursor {
                        Line::from(Span::styled(
                            format!("▶ {text}"),
                            Style::default()
                                .fg(self.theme.selection_fg)
                                .bg(self.theme.selection_bg)
                                .add_modifier(Modifier::BOLD),
                        ))
                    } else {
                        Line::from(Span::styled(
                            format!("  {text}"),
                            Style::default().fg(self.theme.primary_fg),
                        ))
                    }
                })
                .collect()
        };
        let title = if self.backup_running {
            "Backups (working)"
        } else {
            "Backups"
        };
        let list = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(list, rows[0]);

        let back_hint = if self.redirect.is_armed() {
            "back to save slots"
        } else {
            "back to menu"
        };
        let help = Line::from(vec![
            Span::styled("n", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" new backup  "),
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" restore  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(" {back_hint}")),
        ]);
        frame.render_widget(
            Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Keys")),
            rows[1],
        );
        self.render_status(frame, rows[2]);
    }

    fn render_modal(&self, frame: &mut Frame, request: &DialogRequest) {
        let area = centered_rect(request.size.width, request.size.height, frame.size());
        frame.render_widget(Clear, area);
        let (title, color) = match request.purpose {
            DialogPurpose::SlotLoadFailed => ("Save slot error", self.theme.danger),
            DialogPurpose::Notice => ("Notice", self.theme.warning),
        };
        let mut lines: Vec<Line> = request.message.lines().map(Line::from).collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "[ OK ]",
            Style::default()
                .fg(self.theme.selection_fg)
                .bg(self.theme.selection_bg)
                .add_modifier(Modifier::BOLD),
        )));
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color))
                    .title(title),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let paragraph = Paragraph::new(Line::from(self.state.status.clone()))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn render_scrollbar(frame: &mut Frame, area: Rect, len: usize, window: usize, fraction: f64) {
    let span = len.saturating_sub(window);
    if span == 0 {
        return;
    }
    let position = ((1.0 - fraction) * span as f64).round() as usize;
    let mut state = ScrollbarState::new(span).position(position);
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        area,
        &mut state,
    );
}

/// Scrollbar value for a pointer on the right border of `area`.
fn scrollbar_fraction(area: Rect, column: u16, row: u16) -> Option<f64> {
    if area.width == 0 || area.height < 3 || column != area.right().saturating_sub(1) {
        return None;
    }
    let top = area.y + 1;
    let bottom = area.bottom().saturating_sub(2);
    if row < top || row > bottom {
        return None;
    }
    let track = bottom.saturating_sub(top).max(1) as f64;
    Some(1.0 - f64::from(row - top) / track)
}

fn inner_rect(area: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(area)
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

/// Forward terminal input and emit a tick at least every `tick_rate`, even
/// while key repeats keep the input queue busy.
fn spawn_input_thread(sender: mpsc::Sender<AppEvent>, tick_rate: Duration) {
    thread::spawn(move || {
        let mut last_tick = Instant::now();
        loop {
            let timeout = tick_rate.saturating_sub(last_tick.elapsed());
            match event::poll(timeout) {
                Ok(true) => match event::read() {
                    Ok(evt) => {
                        if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
            if last_tick.elapsed() >= tick_rate {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
                last_tick = Instant::now();
            }
        }
    });
}
