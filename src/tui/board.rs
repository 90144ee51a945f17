//! Kanban board interface.
//!
//! Three columns (To Do, In Progress, Done Today) for the current board
//! context, plus the dashboard, brain dump, focus, reflection and shutdown
//! screens. Every change goes through [`App`]; this module only translates
//! keys into requests and renders what comes back.

use std::io;

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};

use glowup::app::{App, AppEvent, FocusEntry, Modal, Outcome};
use glowup::db::SnapshotStore;
use glowup::fields::*;
use glowup::task::{Task, TaskPatch};

use crate::tui::colors::{energy_color, mode_color, mood_color, BLOCKED_RED, CARD_GRAY, DONE_GREEN};
use crate::tui::enums::{CheckInRow, InputPurpose};
use crate::tui::input::InputField;

const BOARD_COLUMNS: [Status; 3] = [Status::Todo, Status::InProgress, Status::Done];
const TABS: [AppView; 4] = [AppView::Dashboard, AppView::Board, AppView::BrainDump, AppView::Reflection];
const CARD_HEIGHT: usize = 4;

/// A start that is waiting on the energy confirmation popup.
#[derive(Debug, Clone, Copy)]
struct PendingStart {
    task_id: u64,
    target: Status,
    then_focus: bool,
}

pub struct BoardApp<S: SnapshotStore> {
    app: App<S>,
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; 3],
    list_selected: usize,
    subtask_selected: usize,
    status_message: String,
    show_task_detail: bool,
    input: Option<(InputPurpose, InputField)>,
    mood_idx: usize,
    energy_idx: usize,
    check_in_row: CheckInRow,
    pending: Option<PendingStart>,
    focus_started: Option<DateTime<Utc>>,
    parked: Option<usize>,
}

impl<S: SnapshotStore> BoardApp<S> {
    pub fn new(app: App<S>) -> Self {
        let (mood_idx, energy_idx) = app
            .user_state()
            .map(|us| {
                (
                    Mood::ALL.iter().position(|&m| m == us.mood).unwrap_or(0),
                    EnergyLevel::ALL.iter().position(|&e| e == us.energy).unwrap_or(1),
                )
            })
            .unwrap_or((0, 1));
        BoardApp {
            app,
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; 3],
            list_selected: 0,
            subtask_selected: 0,
            status_message: String::new(),
            show_task_detail: false,
            input: None,
            mood_idx,
            energy_idx,
            check_in_row: CheckInRow::Mood,
            pending: None,
            focus_started: None,
            parked: None,
        }
    }

    pub fn into_app(self) -> App<S> {
        self.app
    }

    /// Main event loop. Timers are ticked on every pass.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            let now = Utc::now();
            self.app.tick(now);
            self.absorb_events();
            terminal.draw(|f| self.render(f, now))?;

            if self.handle_input(now)? {
                break;
            }
        }
        Ok(())
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    fn absorb_events(&mut self) {
        for event in self.app.drain_events() {
            match event {
                AppEvent::Celebrate { task_id } => {
                    let title = self.app.task(task_id).map(|t| t.title.clone()).unwrap_or_default();
                    self.set_status_message(format!("Done: {title}. Nice work!"));
                }
                AppEvent::BridgeReady { .. } => {}
                AppEvent::Notice(r) => self.set_status_message(r.to_string()),
            }
        }
        if let Some(e) = self.app.take_save_error() {
            self.set_status_message(format!("Error saving: {e}"));
        }
    }

    // -----------------------------------------------------------------------
    // Column bookkeeping
    // -----------------------------------------------------------------------

    fn column_ids(&self, column: usize, now: DateTime<Utc>) -> Vec<u64> {
        self.app.column(BOARD_COLUMNS[column], now).iter().map(|t| t.id).collect()
    }

    fn selected_task_id(&self, now: DateTime<Utc>) -> Option<u64> {
        self.column_ids(self.selected_column, now).get(self.selected_card).copied()
    }

    fn clamp_selection(&mut self, now: DateTime<Utc>) {
        let len = self.column_ids(self.selected_column, now).len();
        if len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= len {
            self.selected_card = len - 1;
        }
    }

    /// Keep the cursor on a card after it changed column.
    fn follow(&mut self, task_id: u64, status: Status, now: DateTime<Utc>) {
        if let Some(col) = BOARD_COLUMNS.iter().position(|&s| s == status) {
            self.selected_column = col;
            if let Some(pos) = self.column_ids(col, now).iter().position(|&id| id == task_id) {
                self.selected_card = pos;
            }
        }
        self.clamp_selection(now);
    }

    fn brain_dump_ids(&self) -> Vec<u64> {
        self.app.brain_dump_items().iter().map(|t| t.id).collect()
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    fn request_move(&mut self, task_id: u64, target: Status, now: DateTime<Utc>) {
        if self.app.confirmation_needed(task_id, target).is_some() {
            self.pending = Some(PendingStart { task_id, target, then_focus: false });
            self.app.open_modal(Modal::ConfirmEnergy(task_id));
            return;
        }
        match self.app.move_task(task_id, target, now, |_| true) {
            Ok(Outcome::Applied(moved)) => {
                if moved.to != Status::Done {
                    self.set_status_message(format!("Moved to {}", moved.to));
                }
                self.follow(task_id, moved.to, now);
            }
            Ok(Outcome::Rejected(_)) => {}
            Err(e) => self.set_status_message(format!("Error: {e}")),
        }
    }

    fn request_adjacent(&mut self, direction: MoveDirection, now: DateTime<Utc>) {
        let Some(id) = self.selected_task_id(now) else { return };
        let status = BOARD_COLUMNS[self.selected_column];
        if let Some(target) = glowup::board::adjacent_status(status, direction) {
            self.request_move(id, target, now);
        }
    }

    fn start_suggested(&mut self, task_id: u64, now: DateTime<Utc>) {
        if self.app.confirmation_needed(task_id, Status::InProgress).is_some() {
            self.pending = Some(PendingStart { task_id, target: Status::InProgress, then_focus: true });
            self.app.open_modal(Modal::ConfirmEnergy(task_id));
            return;
        }
        self.resolve_start(task_id, Status::InProgress, true, true, now);
    }

    fn enter_focus(&mut self, task_id: u64, now: DateTime<Utc>) {
        match self.app.enter_focus(task_id) {
            Ok(entry) => self.after_focus_entry(entry, now),
            Err(e) => self.set_status_message(format!("Error: {e}")),
        }
    }

    fn after_focus_entry(&mut self, entry: FocusEntry, now: DateTime<Utc>) {
        match entry {
            FocusEntry::Started(_) => {
                self.focus_started = Some(now);
                self.subtask_selected = 0;
            }
            FocusEntry::NeedsDuration(id) => self.input = Some((InputPurpose::Duration(id), InputField::new())),
        }
    }

    /// Answer the energy popup. A "no" still goes through the board so the
    /// decline is recorded.
    fn answer_pending_start(&mut self, confirmed: bool, now: DateTime<Utc>) {
        let Some(p) = self.pending.take() else { return };
        self.app.close_modal();
        self.resolve_start(p.task_id, p.target, p.then_focus, confirmed, now);
    }

    fn resolve_start(&mut self, task_id: u64, target: Status, then_focus: bool, confirmed: bool, now: DateTime<Utc>) {
        if then_focus {
            match self.app.start_suggested(task_id, now, |_| confirmed) {
                Ok(Outcome::Applied(entry)) => self.after_focus_entry(entry, now),
                Ok(Outcome::Rejected(_)) => {}
                Err(e) => self.set_status_message(format!("Error: {e}")),
            }
        } else {
            match self.app.move_task(task_id, target, now, |_| confirmed) {
                Ok(Outcome::Applied(moved)) => self.follow(task_id, moved.to, now),
                Ok(Outcome::Rejected(_)) => {}
                Err(e) => self.set_status_message(format!("Error: {e}")),
            }
        }
    }

    fn submit_input(&mut self, purpose: InputPurpose, text: String, now: DateTime<Utc>) {
        let result = match purpose {
            InputPurpose::BrainDump => {
                let n = self.app.brain_dump(&text, now).len();
                self.set_status_message(format!("Captured {n} item(s)"));
                Ok(())
            }
            InputPurpose::Capture => {
                if !text.trim().is_empty() {
                    self.app.capture_thought(&text, now);
                    self.set_status_message("Thought parked in the brain dump");
                }
                Ok(())
            }
            InputPurpose::Intention => {
                self.app.set_intention(&text);
                Ok(())
            }
            InputPurpose::Duration(id) => match text.trim().parse::<u32>() {
                Ok(minutes) => self.app.confirm_duration(id, minutes).map(|entry| self.after_focus_entry(entry, now)),
                Err(_) => {
                    self.set_status_message("Enter a whole number of minutes");
                    self.input = Some((purpose, InputField::with_value(&text)));
                    return;
                }
            },
            InputPurpose::Title(id) => {
                self.app.update_task(id, TaskPatch { title: Some(text), ..Default::default() })
            }
            InputPurpose::Subtask(id) => {
                if text.trim().is_empty() {
                    Ok(())
                } else {
                    self.app.add_subtask(id, &text).map(|_| ())
                }
            }
        };
        if let Err(e) = result {
            self.set_status_message(format!("Error: {e}"));
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Returns true when the user asked to quit.
    fn handle_input(&mut self, now: DateTime<Utc>) -> io::Result<bool> {
        if !event::poll(std::time::Duration::from_millis(100))? {
            return Ok(false);
        }
        let Event::Key(key) = event::read()? else { return Ok(false) };
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(true);
        }

        if self.input.is_some() {
            self.handle_text_input(key, now);
            return Ok(false);
        }
        if let Some(modal) = self.app.ui().modal {
            self.handle_modal_key(modal, key, now);
            return Ok(false);
        }

        self.status_message.clear();
        let view = self.app.ui().view;
        if view != AppView::Focus {
            match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Tab => {
                    let idx = TABS.iter().position(|&v| v == view).map_or(0, |i| (i + 1) % TABS.len());
                    self.app.set_view(TABS[idx]);
                    return Ok(false);
                }
                KeyCode::Char(c @ '1'..='4') => {
                    self.app.set_view(TABS[c as usize - '1' as usize]);
                    return Ok(false);
                }
                KeyCode::Char('i') => {
                    self.app.open_modal(Modal::CheckIn);
                    return Ok(false);
                }
                KeyCode::Char('o') => {
                    self.app.open_modal(Modal::Settings);
                    return Ok(false);
                }
                KeyCode::Char('z') => {
                    self.parked = None;
                    self.app.initiate_shutdown();
                    return Ok(false);
                }
                _ => {}
            }
        }

        match view {
            AppView::Dashboard => self.handle_dashboard_key(key),
            AppView::Board => self.handle_board_key(key, now),
            AppView::BrainDump => self.handle_brain_dump_key(key, now),
            AppView::Focus => self.handle_focus_key(key, now),
            AppView::Reflection => {}
            AppView::Shutdown => self.handle_shutdown_key(key, now),
        }
        Ok(false)
    }

    fn handle_text_input(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        let Some((purpose, field)) = self.input.as_mut() else { return };
        let purpose = *purpose;
        match key.code {
            KeyCode::Esc => {
                self.input = None;
                if matches!(purpose, InputPurpose::Duration(_) | InputPurpose::Title(_)) {
                    self.app.close_modal();
                }
            }
            KeyCode::Enter => {
                let text = field.take();
                self.input = None;
                self.submit_input(purpose, text, now);
            }
            KeyCode::Backspace => field.handle_backspace(),
            KeyCode::Delete => field.handle_delete(),
            KeyCode::Left => field.move_cursor_left(),
            KeyCode::Right => field.move_cursor_right(),
            KeyCode::Char(c) => field.handle_char(c),
            _ => {}
        }
    }

    fn handle_modal_key(&mut self, modal: Modal, key: KeyEvent, now: DateTime<Utc>) {
        match modal {
            Modal::CheckIn => match key.code {
                KeyCode::Up | KeyCode::Down => {
                    self.check_in_row = match self.check_in_row {
                        CheckInRow::Mood => CheckInRow::Energy,
                        CheckInRow::Energy => CheckInRow::Mood,
                    };
                }
                KeyCode::Left => match self.check_in_row {
                    CheckInRow::Mood => self.mood_idx = (self.mood_idx + Mood::ALL.len() - 1) % Mood::ALL.len(),
                    CheckInRow::Energy => self.energy_idx = self.energy_idx.saturating_sub(1),
                },
                KeyCode::Right => match self.check_in_row {
                    CheckInRow::Mood => self.mood_idx = (self.mood_idx + 1) % Mood::ALL.len(),
                    CheckInRow::Energy => self.energy_idx = (self.energy_idx + 1).min(EnergyLevel::ALL.len() - 1),
                },
                KeyCode::Enter => {
                    let limit =
                        self.app.check_in(Mood::ALL[self.mood_idx], EnergyLevel::ALL[self.energy_idx], None, now);
                    self.set_status_message(format!("Checked in. WIP limit is now {limit}"));
                    self.clamp_selection(now);
                }
                KeyCode::Esc => self.app.close_modal(),
                _ => {}
            },
            Modal::Settings => {
                let mut settings = self.app.settings().clone();
                let changed = match key.code {
                    KeyCode::Char('p') => {
                        settings.suggestion_pool = match settings.suggestion_pool {
                            CandidatePool::Todo => CandidatePool::TodoAndBrainDump,
                            CandidatePool::TodoAndBrainDump => CandidatePool::Todo,
                        };
                        true
                    }
                    KeyCode::Char('r') => {
                        settings.reopen_policy = match settings.reopen_policy {
                            ReopenPolicy::KeepCompletedAt => ReopenPolicy::ClearCompletedAt,
                            ReopenPolicy::ClearCompletedAt => ReopenPolicy::KeepCompletedAt,
                        };
                        true
                    }
                    KeyCode::Char('+') => {
                        settings.wip_limits.max += 1;
                        true
                    }
                    KeyCode::Char('-') => {
                        settings.wip_limits.max = settings.wip_limits.max.saturating_sub(1);
                        true
                    }
                    KeyCode::Esc | KeyCode::Enter => {
                        self.app.close_modal();
                        false
                    }
                    _ => false,
                };
                if changed {
                    if let Err(e) = self.app.update_settings(settings) {
                        self.set_status_message(e.to_string());
                    }
                }
            }
            Modal::EditTask(_) | Modal::DurationPrompt(_) => {
                // The prompt was dismissed without its text field.
                if key.code == KeyCode::Esc {
                    self.app.close_modal();
                }
            }
            Modal::Backlog => {
                let ids = self.brain_dump_ids();
                match key.code {
                    KeyCode::Up => self.list_selected = self.list_selected.saturating_sub(1),
                    KeyCode::Down => {
                        if self.list_selected + 1 < ids.len() {
                            self.list_selected += 1;
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(&id) = ids.get(self.list_selected) {
                            match self.app.add_to_board(id, now) {
                                Ok(Outcome::Applied(_)) => {
                                    self.set_status_message("Added to the board");
                                    self.list_selected = self.list_selected.saturating_sub(1);
                                    self.clamp_selection(now);
                                }
                                Ok(Outcome::Rejected(_)) => {}
                                Err(e) => self.set_status_message(format!("Error: {e}")),
                            }
                        }
                    }
                    KeyCode::Esc => self.app.close_modal(),
                    _ => {}
                }
            }
            Modal::DecisionBridge { suggested } => match key.code {
                KeyCode::Enter => match suggested {
                    Some(id) => self.start_suggested(id, now),
                    None => self.app.dismiss_bridge(),
                },
                KeyCode::Esc | KeyCode::Char('b') => {
                    self.app.dismiss_bridge();
                    self.set_status_message("Take a breather");
                }
                _ => {}
            },
            Modal::ConfirmEnergy(_) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.answer_pending_start(true, now),
                KeyCode::Char('n') | KeyCode::Esc => self.answer_pending_start(false, now),
                _ => {}
            },
            Modal::ConfirmDelete(id) => {
                let confirmed = match key.code {
                    KeyCode::Char('y') => true,
                    KeyCode::Char('n') | KeyCode::Esc => false,
                    _ => return,
                };
                self.app.close_modal();
                match self.app.delete_task(id, confirmed) {
                    Ok(Outcome::Applied(task)) => self.set_status_message(format!("Deleted \"{}\"", task.title)),
                    Ok(Outcome::Rejected(_)) => {}
                    Err(e) => self.set_status_message(format!("Error: {e}")),
                }
                self.clamp_selection(now);
            }
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') => {
                let current = self.app.daily_intention().to_string();
                self.input = Some((InputPurpose::Intention, InputField::with_value(&current)));
            }
            KeyCode::Enter => self.app.set_view(AppView::Board),
            _ => {}
        }
    }

    fn handle_board_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        let selected = self.selected_task_id(now);
        match key.code {
            KeyCode::Left if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.request_adjacent(MoveDirection::Prev, now)
            }
            KeyCode::Right if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.request_adjacent(MoveDirection::Next, now)
            }
            KeyCode::Char('<') => self.request_adjacent(MoveDirection::Prev, now),
            KeyCode::Char('>') => self.request_adjacent(MoveDirection::Next, now),
            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection(now);
                }
            }
            KeyCode::Right => {
                if self.selected_column + 1 < BOARD_COLUMNS.len() {
                    self.selected_column += 1;
                    self.clamp_selection(now);
                }
            }
            KeyCode::Up => self.selected_card = self.selected_card.saturating_sub(1),
            KeyCode::Down => {
                if self.selected_card + 1 < self.column_ids(self.selected_column, now).len() {
                    self.selected_card += 1;
                }
            }
            KeyCode::Enter => self.show_task_detail = !self.show_task_detail,
            KeyCode::Char('f') => {
                if let Some(id) = selected {
                    self.enter_focus(id, now);
                }
            }
            KeyCode::Char('b') => {
                if let Some(id) = selected {
                    let blocked = self.app.task(id).is_some_and(|t| t.is_blocked);
                    match self.app.set_blocked(id, !blocked) {
                        Ok(_) => self.set_status_message(if blocked { "Unblocked" } else { "Blocked" }),
                        Err(e) => self.set_status_message(format!("Error: {e}")),
                    }
                }
            }
            KeyCode::Char('r') => {
                if let Some(id) = selected {
                    match self.app.reopen(id) {
                        Ok(Outcome::Applied(())) => self.follow(id, Status::Todo, now),
                        Ok(Outcome::Rejected(_)) => {}
                        Err(e) => self.set_status_message(format!("Error: {e}")),
                    }
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(id) = selected {
                    self.app.open_modal(Modal::ConfirmDelete(id));
                }
            }
            KeyCode::Char('e') => {
                if let Some(id) = selected {
                    let title = self.app.task(id).map(|t| t.title.clone()).unwrap_or_default();
                    self.app.open_modal(Modal::EditTask(id));
                    self.input = Some((InputPurpose::Title(id), InputField::with_value(&title)));
                }
            }
            KeyCode::Char('s') => {
                if let Some(id) = selected {
                    self.input = Some((InputPurpose::Subtask(id), InputField::new()));
                }
            }
            KeyCode::Char('c') => {
                let next = self.app.ui().board_context.cycle();
                self.app.set_board_context(next);
                self.set_status_message(format!("Showing {}", next.label()));
                self.clamp_selection(now);
            }
            KeyCode::Char('g') => {
                let on = self.app.toggle_energy_filter();
                self.set_status_message(if on { "Hiding tasks above your energy" } else { "Showing all tasks" });
                self.clamp_selection(now);
            }
            KeyCode::Char('a') => {
                self.list_selected = 0;
                self.app.open_modal(Modal::Backlog);
            }
            KeyCode::Char('h') => self.set_status_message(
                "←→↑↓: Select | Ctrl+←→ or < >: Move | f: Focus | b: Block | e: Edit | s: Subtask | x: Delete | r: Reopen | a: Backlog | c: Context | g: Energy filter",
            ),
            _ => {}
        }
    }

    fn handle_brain_dump_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        let ids = self.brain_dump_ids();
        match key.code {
            KeyCode::Char('a') | KeyCode::Enter => self.input = Some((InputPurpose::BrainDump, InputField::new())),
            KeyCode::Up => self.list_selected = self.list_selected.saturating_sub(1),
            KeyCode::Down => {
                if self.list_selected + 1 < ids.len() {
                    self.list_selected += 1;
                }
            }
            KeyCode::Char('t') => {
                if let Some(&id) = ids.get(self.list_selected) {
                    match self.app.add_to_board(id, now) {
                        Ok(Outcome::Applied(_)) => self.set_status_message("Added to the board"),
                        Ok(Outcome::Rejected(_)) => {}
                        Err(e) => self.set_status_message(format!("Error: {e}")),
                    }
                    self.list_selected = self.list_selected.min(ids.len().saturating_sub(2));
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(&id) = ids.get(self.list_selected) {
                    self.app.open_modal(Modal::ConfirmDelete(id));
                }
            }
            _ => {}
        }
    }

    fn handle_focus_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        let Some(id) = self.app.ui().focus_task else {
            self.app.exit_focus();
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.app.exit_focus();
                self.focus_started = None;
            }
            KeyCode::Char('c') => self.input = Some((InputPurpose::Capture, InputField::new())),
            KeyCode::Char('d') => {
                self.focus_started = None;
                if let Err(e) = self.app.complete_from_focus(id, now) {
                    self.set_status_message(format!("Error: {e}"));
                }
            }
            KeyCode::Up => self.subtask_selected = self.subtask_selected.saturating_sub(1),
            KeyCode::Down => {
                let n = self.app.task(id).map_or(0, |t| t.subtasks.len());
                if self.subtask_selected + 1 < n {
                    self.subtask_selected += 1;
                }
            }
            KeyCode::Char(' ') => {
                let sub = self.app.task(id).and_then(|t| t.subtasks.get(self.subtask_selected)).map(|s| s.id);
                if let Some(sub) = sub {
                    if let Err(e) = self.app.toggle_subtask(id, sub) {
                        self.set_status_message(format!("Error: {e}"));
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_shutdown_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        match key.code {
            KeyCode::Enter => match self.app.shutdown_move_wip(now) {
                Ok(n) => self.parked = Some(n),
                Err(e) => self.set_status_message(format!("Error: {e}")),
            },
            KeyCode::Char('w') => {
                self.parked = None;
                self.app.wake_up();
            }
            KeyCode::Esc => self.app.set_view(AppView::Dashboard),
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    fn accent(&self) -> Color {
        mode_color(self.app.wip_mode())
    }

    fn render(&mut self, f: &mut Frame, now: DateTime<Utc>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Body
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        match self.app.ui().view {
            AppView::Dashboard => self.render_dashboard(f, chunks[1]),
            AppView::Board => self.render_board(f, chunks[1], now),
            AppView::BrainDump => self.render_brain_dump(f, chunks[1]),
            AppView::Focus => self.render_focus(f, chunks[1], now),
            AppView::Reflection => self.render_reflection(f, chunks[1], now),
            AppView::Shutdown => self.render_shutdown(f, chunks[1]),
        }
        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail && self.app.ui().view == AppView::Board {
            self.render_task_detail_popup(f, now);
        }
        if let Some(modal) = self.app.ui().modal {
            self.render_modal(f, modal);
        }
        if let Some((purpose, field)) = &self.input {
            let area = centered_rect(60, 20, f.area());
            f.render_widget(Clear, area);
            let p = Paragraph::new(field.display())
                .block(Block::default().borders(Borders::ALL).title(purpose.prompt()))
                .style(Style::default().bg(Color::Black));
            f.render_widget(p, area);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let view = self.app.ui().view;
        let titles: Vec<Line> = TABS.iter().enumerate().map(|(i, v)| Line::from(format!("{} {:?}", i + 1, v))).collect();
        let selected = TABS.iter().position(|&v| v == view).unwrap_or(0);

        let state = match self.app.user_state() {
            Some(us) => Line::from(vec![
                Span::styled(us.mood.label(), Style::default().fg(mood_color(us.mood))),
                Span::raw(" · "),
                Span::styled(
                    format!("{} {}", us.energy.glyph(), us.energy.label()),
                    Style::default().fg(energy_color(us.energy)),
                ),
                Span::raw(format!(
                    "  WIP {}/{} ({})  {}",
                    self.app.active_wip_count(),
                    self.app.wip_limit(),
                    self.app.wip_mode().label(),
                    self.app.ui().board_context.label()
                )),
            ]),
            None => Line::from("No check-in yet (press i)"),
        };

        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("GLOWUP"))
            .select(selected)
            .highlight_style(Style::default().fg(self.accent()).add_modifier(Modifier::BOLD));
        f.render_widget(tabs, halves[0]);
        f.render_widget(
            Paragraph::new(state).block(Block::default().borders(Borders::ALL)).alignment(Alignment::Right),
            halves[1],
        );
    }

    fn render_dashboard(&self, f: &mut Frame, area: Rect) {
        let intention = self.app.daily_intention();
        let mut lines = vec![
            Line::from(Span::styled("Today's intention", Style::default().add_modifier(Modifier::BOLD))),
            Line::from(if intention.is_empty() { "(none set, press e)" } else { intention }),
            Line::from(""),
            Line::from(Span::styled(
                format!("Mode: {}", self.app.wip_mode().label()),
                Style::default().fg(self.accent()).add_modifier(Modifier::BOLD),
            )),
            Line::from(self.app.advice()),
            Line::from(""),
        ];
        match self.app.suggest_next() {
            Some(task) => lines.push(Line::from(format!("Up next: #{} {}", task.id, task.title))),
            None => lines.push(Line::from("Nothing waiting in To Do.")),
        }
        lines.push(Line::from(format!("Brain dump: {} item(s)", self.app.brain_dump_items().len())));
        lines.push(Line::from(""));
        lines.push(Line::from("Enter: Board | e: Intention | i: Check in | o: Settings | z: Shut down | q: Quit"));

        let p = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Dashboard"))
            .wrap(Wrap { trim: true });
        f.render_widget(p, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(1, 3), Constraint::Ratio(1, 3)])
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            let title = match BOARD_COLUMNS[i] {
                Status::InProgress => {
                    format!("In Progress {}/{}", self.app.active_wip_count(), self.app.wip_limit())
                }
                Status::Done => "Done Today".to_string(),
                other => other.label().to_string(),
            };
            self.render_column(f, column_area, i, &title, now);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize, title: &str, now: DateTime<Utc>) {
        let is_selected = column_index == self.selected_column;
        let border_style = if is_selected {
            Style::default().fg(self.accent()).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let block = Block::default().borders(Borders::ALL).title(title.to_string()).border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let ids = self.column_ids(column_index, now);
        if ids.is_empty() {
            return;
        }

        let visible_cards = (inner.height as usize / CARD_HEIGHT).max(1);
        let mut offset = self.column_scroll_offsets[column_index];
        if is_selected {
            if self.selected_card < offset {
                offset = self.selected_card;
            } else if self.selected_card >= offset + visible_cards {
                offset = self.selected_card + 1 - visible_cards;
            }
            self.column_scroll_offsets[column_index] = offset;
        }

        let mut y = 0usize;
        for (card_index, id) in ids.iter().enumerate().skip(offset) {
            if y + CARD_HEIGHT > inner.height as usize {
                break;
            }
            if let Some(task) = self.app.task(*id) {
                let card_area = Rect { x: inner.x, y: inner.y + y as u16, width: inner.width, height: CARD_HEIGHT as u16 };
                self.render_card(f, card_area, task, is_selected && card_index == self.selected_card);
            }
            y += CARD_HEIGHT;
        }

        if offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { x: inner.x, y: inner.y, width: inner.width, height: 1 });
        }
        let shown = y / CARD_HEIGHT;
        let remaining = ids.len().saturating_sub(offset + shown);
        if remaining > 0 && inner.height > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { x: inner.x, y: inner.y + inner.height - 1, width: inner.width, height: 1 });
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, is_selected: bool) {
        let bg = if task.is_blocked {
            BLOCKED_RED
        } else if task.status == Status::Done {
            DONE_GREEN
        } else {
            CARD_GRAY
        };
        let style = if is_selected {
            Style::default().bg(self.accent()).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(bg)
        };

        let (done, total) = task.progress();
        let mut meta = format!("{} · {} {}", task.priority.label(), task.required_energy.glyph(), task.category);
        if total > 0 {
            meta.push_str(&format!(" · {done}/{total}"));
        }
        if task.is_blocked {
            meta.push_str(" · blocked");
        }
        let text = vec![
            Line::from(Span::styled(format!("#{} {}", task.id, task.title), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(meta),
        ];
        let card = Paragraph::new(text).block(Block::default().borders(Borders::ALL)).style(style).wrap(Wrap { trim: true });
        f.render_widget(card, area);
    }

    fn render_brain_dump(&self, f: &mut Frame, area: Rect) {
        let items = self.app.brain_dump_items();
        let mut lines: Vec<Line> = items
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let style = if i == self.list_selected {
                    Style::default().bg(self.accent()).fg(Color::Black)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(format!("#{} {} [{}]", t.id, t.title, t.category), style))
            })
            .collect();
        if lines.is_empty() {
            lines.push(Line::from("Your head is clear. Press a to dump a thought."));
        }
        let p = Paragraph::new(lines).block(
            Block::default().borders(Borders::ALL).title("Brain Dump (a: Add | t: To board | x: Delete)"),
        );
        f.render_widget(p, area);
    }

    fn render_focus(&self, f: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let Some(task) = self.app.ui().focus_task.and_then(|id| self.app.task(id)) else { return };
        let mut lines = vec![
            Line::from(Span::styled(task.title.clone(), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(task.description.clone().unwrap_or_default()),
            Line::from(""),
        ];
        if let (Some(minutes), Some(started)) = (task.estimated_minutes, self.focus_started) {
            let left = i64::from(minutes) * 60 - (now - started).num_seconds();
            let text = if left > 0 {
                format!("{:02}:{:02} remaining", left / 60, left % 60)
            } else {
                "Time's up. Finish or take a break.".to_string()
            };
            lines.push(Line::from(Span::styled(text, Style::default().fg(self.accent()))));
            lines.push(Line::from(""));
        }
        for (i, sub) in task.subtasks.iter().enumerate() {
            let mark = if sub.is_completed { "[x]" } else { "[ ]" };
            let style = if i == self.subtask_selected { Style::default().add_modifier(Modifier::REVERSED) } else { Style::default() };
            lines.push(Line::from(Span::styled(format!("{mark} {}", sub.label), style)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from("d: Done | c: Capture a thought | Space: Toggle subtask | Esc: Leave focus"));
        let p = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Focus"))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(p, area);
    }

    fn render_reflection(&self, f: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let review = self.app.weekly_review(now);
        let mut lines = vec![
            Line::from(Span::styled(
                format!("Finished this week: {}", review.completed),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        for (category, count) in &review.by_category {
            lines.push(Line::from(format!("  {category}: {count}")));
        }
        lines.push(Line::from(""));
        let moods: Vec<String> = review.moods.iter().map(|(m, n)| format!("{}: {n}", m.label())).collect();
        lines.push(Line::from(format!("Moods  {}", moods.join("  "))));
        let energies: Vec<String> = review.energies.iter().map(|(e, n)| format!("{}: {n}", e.label())).collect();
        lines.push(Line::from(format!("Energy {}", energies.join("  "))));
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Pushed through on low energy: {}", review.pushed_through)));
        if let Some(avg) = review.average_cycle_minutes {
            lines.push(Line::from(format!("Average start-to-done: {avg} min")));
        }
        let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Weekly Reflection"));
        f.render_widget(p, area);
    }

    fn render_shutdown(&self, f: &mut Frame, area: Rect) {
        let lines = match self.parked {
            None => vec![
                Line::from("Time to close the day."),
                Line::from(""),
                Line::from("Enter: Park everything in progress back in To Do"),
                Line::from("Esc: Not yet"),
            ],
            Some(n) => vec![
                Line::from(format!("Parked {n} task(s). Rest well.")),
                Line::from(""),
                Line::from("w: Wake up and start fresh"),
            ],
        };
        let p = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Shutdown"))
            .alignment(Alignment::Center);
        f.render_widget(p, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let filter = if self.app.ui().energy_filter { " [Energy filter]" } else { "" };
            format!("Tab/1-4: Views | i: Check in | o: Settings | h: Help | q: Quit{filter}")
        };
        let p = Paragraph::new(text).style(Style::default().bg(self.accent()).fg(Color::Black));
        f.render_widget(p, area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame, now: DateTime<Utc>) {
        let Some(task) = self.selected_task_id(now).and_then(|id| self.app.task(id)) else { return };
        let area = centered_rect(70, 70, f.area());
        f.render_widget(Clear, area);

        let stamp = |t: Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into());
        let mut lines = vec![
            Line::from(Span::styled(format!("Task #{}: {}", task.id, task.title), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(""),
            Line::from(format!("Status:     {}", task.status)),
            Line::from(format!("Category:   {}", task.category)),
            Line::from(format!("Priority:   {}", task.priority)),
            Line::from(format!("Energy:     {}", task.required_energy)),
            Line::from(format!("Board:      {}", task.board_context.map_or("-", |c| c.label()))),
            Line::from(format!("Estimate:   {}", task.estimated_minutes.map_or("-".into(), |m| format!("{m} min")))),
            Line::from(format!("Started:    {}", stamp(task.started_at))),
            Line::from(format!("Completed:  {}", stamp(task.completed_at))),
        ];
        if let Some(ctx) = task.start_context {
            lines.push(Line::from(format!("Started as: {} / {}", ctx.mood, ctx.energy)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(task.description.clone().unwrap_or_else(|| "-".into())));
        for sub in &task.subtasks {
            lines.push(Line::from(format!("{} {}", if sub.is_completed { "[x]" } else { "[ ]" }, sub.label)));
        }

        let p = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Task Details (Enter to close)")
                    .title_alignment(Alignment::Center)
                    .border_style(Style::default().fg(self.accent())),
            )
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(p, area);
    }

    fn render_modal(&self, f: &mut Frame, modal: Modal) {
        let (title, lines): (String, Vec<Line>) = match modal {
            Modal::CheckIn => {
                let row_style = |row: CheckInRow| {
                    if self.check_in_row == row { Style::default().add_modifier(Modifier::BOLD) } else { Style::default() }
                };
                let mood = Mood::ALL[self.mood_idx];
                let energy = EnergyLevel::ALL[self.energy_idx];
                (
                    "How are you arriving?".into(),
                    vec![
                        Line::from(vec![
                            Span::styled("Mood:   ", row_style(CheckInRow::Mood)),
                            Span::styled(format!("◀ {} ▶", mood.label()), Style::default().fg(mood_color(mood))),
                        ]),
                        Line::from(vec![
                            Span::styled("Energy: ", row_style(CheckInRow::Energy)),
                            Span::styled(format!("◀ {} ▶", energy.label()), Style::default().fg(energy_color(energy))),
                        ]),
                        Line::from(""),
                        Line::from("↑↓: Row | ←→: Choose | Enter: Check in"),
                    ],
                )
            }
            Modal::Settings => {
                let s = self.app.settings();
                (
                    "Settings".into(),
                    vec![
                        Line::from(format!(
                            "WIP limits: protective {} · sustainable {} · max {} (+/-)",
                            s.wip_limits.protective, s.wip_limits.sustainable, s.wip_limits.max
                        )),
                        Line::from(format!("Suggestion pool: {:?} (p)", s.suggestion_pool)),
                        Line::from(format!("Reopen policy: {:?} (r)", s.reopen_policy)),
                        Line::from(format!("Bridge delay: {} ms", s.bridge_delay_ms)),
                        Line::from(""),
                        Line::from("Esc: Close"),
                    ],
                )
            }
            Modal::Backlog => {
                let items = self.app.brain_dump_items();
                let mut lines: Vec<Line> = items
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let style = if i == self.list_selected { Style::default().add_modifier(Modifier::REVERSED) } else { Style::default() };
                        Line::from(Span::styled(format!("#{} {}", t.id, t.title), style))
                    })
                    .collect();
                if lines.is_empty() {
                    lines.push(Line::from("Brain dump is empty."));
                }
                (format!("Add to {} board (Enter)", self.app.ui().board_context.placement().label()), lines)
            }
            Modal::DecisionBridge { suggested } => {
                let body = match suggested.and_then(|id| self.app.task(id)) {
                    Some(t) => vec![
                        Line::from("Nice. Keep the momentum?"),
                        Line::from(""),
                        Line::from(Span::styled(format!("#{} {}", t.id, t.title), Style::default().add_modifier(Modifier::BOLD))),
                        Line::from(format!("{} · {}", t.priority.label(), t.required_energy.label())),
                        Line::from(""),
                        Line::from("Enter: Start it | b/Esc: Take a break"),
                    ],
                    None => vec![Line::from("All clear. Take a break."), Line::from(""), Line::from("Enter/Esc: Close")],
                };
                ("What's next".into(), body)
            }
            Modal::ConfirmEnergy(id) => {
                let msg = self
                    .app
                    .energy_warning_for(id)
                    .map(|w| w.message())
                    .unwrap_or_else(|| "Start this task anyway?".into());
                ("Energy check".into(), vec![Line::from(msg), Line::from(""), Line::from("y: Start | n: Not now")])
            }
            Modal::ConfirmDelete(id) => {
                let title = self.app.task(id).map(|t| t.title.clone()).unwrap_or_default();
                ("Delete".into(), vec![Line::from(format!("Delete \"{title}\"?")), Line::from(""), Line::from("y: Delete | n: Keep")])
            }
            // Drawn by the text input overlay.
            Modal::EditTask(_) | Modal::DurationPrompt(_) => return,
        };

        let area = centered_rect(60, 40, f.area());
        f.render_widget(Clear, area);
        let p = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_alignment(Alignment::Center)
                    .border_style(Style::default().fg(self.accent()).add_modifier(Modifier::BOLD)),
            )
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(p, area);
    }
}

/// A rectangle of the given percentages centred in `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    Rect::new(area.x + (area.width - width) / 2, area.y + (area.height - height) / 2, width, height)
}
