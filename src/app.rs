//! Application state aggregate and controller.
//!
//! `App` owns the task collection, check-ins, settings and transient UI state.
//! Every mutation goes through one of its methods, each of which either
//! applies completely or not at all, and snapshots to the store afterwards.

use chrono::{DateTime, Duration, Local, Utc};
use tracing::{debug, error, info, warn};

use crate::board::{self, EnergyWarning, Gate, Rejection};
use crate::checkin::UserState;
use crate::db::{Snapshot, SnapshotStore};
use crate::error::{Error, Result};
use crate::fields::*;
use crate::onboarding;
use crate::ranking;
use crate::review::{self, WeeklyReview};
use crate::settings::{SystemSettings, MAX_BRIDGE_DELAY_MS};
use crate::task::{Subtask, Task, TaskDraft, TaskPatch, DISTRACTION_CATEGORY};
use crate::timer::{TimerQueue, TimerToken};
use crate::wip::{self, WipMode};

/// Result of an operation the board rules may refuse.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Applied(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Outcome::Rejected(r) => Some(*r),
            Outcome::Applied(_) => None,
        }
    }
}

/// Summary of an accepted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved {
    pub task_id: u64,
    pub from: Status,
    pub to: Status,
    pub first_start: bool,
}

/// Signals for the presentation layer, drained with [`App::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A task was completed; play the celebration.
    Celebrate { task_id: u64 },
    /// The decision bridge opened with this suggestion.
    BridgeReady { suggested: Option<u64> },
    /// A user-visible refusal.
    Notice(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    CheckIn,
    Settings,
    EditTask(u64),
    Backlog,
    DurationPrompt(u64),
    DecisionBridge { suggested: Option<u64> },
    ConfirmEnergy(u64),
    ConfirmDelete(u64),
}

/// Per-view state. Never persisted.
#[derive(Debug, Clone)]
pub struct UiState {
    pub view: AppView,
    pub previous_view: AppView,
    pub board_context: BoardContext,
    pub modal: Option<Modal>,
    pub focus_task: Option<u64>,
    pub energy_filter: bool,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            view: AppView::Dashboard,
            previous_view: AppView::Board,
            board_context: BoardContext::Together,
            modal: None,
            focus_task: None,
            energy_filter: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEntry {
    Started(u64),
    /// A duration prompt was opened; call [`App::confirm_duration`].
    NeedsDuration(u64),
}

pub struct App<S: SnapshotStore> {
    store: S,
    state: Snapshot,
    ui: UiState,
    timers: TimerQueue,
    pending_bridge: Option<TimerToken>,
    events: Vec<AppEvent>,
    save_error: Option<Error>,
}

impl<S: SnapshotStore> App<S> {
    /// Load from the store, falling back to defaults and seeding the tutorial
    /// on a first run.
    pub fn open(store: S, now: DateTime<Utc>) -> Result<Self> {
        let mut state = store.load(now)?.unwrap_or_default();
        let first_run = state.tasks.is_empty() && state.user_state.is_none();
        if first_run {
            let demo = onboarding::demo_tasks(&mut state.next_task_id, now);
            info!(count = demo.len(), "first run, seeding tutorial tasks");
            state.tasks.extend(demo);
        }

        let mut ui = UiState::default();
        if state.user_state.is_none() {
            ui.modal = Some(Modal::CheckIn);
        }

        let mut app = App {
            store,
            state,
            ui,
            timers: TimerQueue::new(),
            pending_bridge: None,
            events: Vec::new(),
            save_error: None,
        };
        if first_run {
            app.persist();
        }
        Ok(app)
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn task(&self, id: u64) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    pub fn user_state(&self) -> Option<&UserState> {
        self.state.user_state.as_ref()
    }

    pub fn check_in_history(&self) -> &[UserState] {
        &self.state.check_in_history
    }

    pub fn wip_limit(&self) -> u32 {
        self.state.wip_limit
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.state.settings
    }

    pub fn daily_intention(&self) -> &str {
        &self.state.daily_intention
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn active_wip_count(&self) -> usize {
        board::active_wip_count(&self.state.tasks)
    }

    pub fn wip_mode(&self) -> WipMode {
        WipMode::classify(self.state.wip_limit, &self.state.settings)
    }

    pub fn advice(&self) -> String {
        wip::system_advice(self.state.wip_limit, &self.state.settings)
    }

    /// Tasks of one status visible in the current board context.
    ///
    /// To Do is smart-sorted once a check-in exists (and optionally hides work
    /// needing more energy than the user has); Done only shows tasks finished
    /// since local midnight.
    pub fn column(&self, status: Status, now: DateTime<Utc>) -> Vec<&Task> {
        let view = self.ui.board_context;
        let visible = self.state.tasks.iter().filter(|t| t.status == status && t.in_context(view));
        match status {
            Status::Todo => match self.user_state() {
                Some(us) => {
                    let energy = us.energy;
                    let filter = self.ui.energy_filter;
                    ranking::sort_for_backlog(visible.filter(|t| !filter || t.required_energy <= energy), energy)
                }
                None => visible.collect(),
            },
            Status::Done => {
                let today = now.with_timezone(&Local).date_naive();
                visible
                    .filter(|t| t.completed_at.is_some_and(|c| c.with_timezone(&Local).date_naive() == today))
                    .collect()
            }
            Status::BrainDump | Status::InProgress => visible.collect(),
        }
    }

    /// Untriaged intake, oldest first. Not filtered by context.
    pub fn brain_dump_items(&self) -> Vec<&Task> {
        let mut items: Vec<&Task> = self.state.tasks.iter().filter(|t| t.status == Status::BrainDump).collect();
        items.sort_by_key(|t| (t.created_at, t.id));
        items
    }

    /// The task the decision bridge would offer right now.
    pub fn suggest_next(&self) -> Option<&Task> {
        let energy = self.user_state()?.energy;
        ranking::next_optimal_task(&self.state.tasks, energy, self.state.settings.suggestion_pool)
    }

    pub fn weekly_review(&self, now: DateTime<Utc>) -> WeeklyReview {
        review::weekly_review(&self.state.tasks, &self.state.check_in_history, now)
    }

    pub fn bridge_pending(&self) -> bool {
        self.pending_bridge.is_some()
    }

    // -----------------------------------------------------------------------
    // Events and persistence
    // -----------------------------------------------------------------------

    pub fn drain_events(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.events)
    }

    /// The most recent save failure, if any, cleared on read.
    pub fn take_save_error(&mut self) -> Option<Error> {
        self.save_error.take()
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.state) {
            error!(error = %e, "failed to save snapshot");
            self.save_error = Some(e);
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.state.next_task_id;
        self.state.next_task_id = id.saturating_add(1);
        id
    }

    fn index_of(&self, id: u64) -> Result<usize> {
        self.state.tasks.iter().position(|t| t.id == id).ok_or(Error::TaskNotFound(id))
    }

    fn notice(&mut self, rejection: Rejection) {
        if !rejection.is_silent() {
            warn!(code = rejection.code(), "{rejection}");
            self.events.push(AppEvent::Notice(rejection));
        }
    }

    // -----------------------------------------------------------------------
    // Check-in and settings
    // -----------------------------------------------------------------------

    /// Record a check-in and recompute the WIP limit. Returns the new limit.
    pub fn check_in(&mut self, mood: Mood, energy: EnergyLevel, note: Option<String>, now: DateTime<Utc>) -> u32 {
        let state = UserState::recorded(mood, energy, note, now);
        let limit = wip::calculate_wip_limit(mood, energy, &self.state.settings);
        info!(mood = %mood, energy = %energy, limit, "check-in");
        self.state.check_in_history.push(state.clone());
        self.state.user_state = Some(state);
        self.state.wip_limit = limit;
        if self.ui.modal == Some(Modal::CheckIn) {
            self.ui.modal = None;
        }
        self.persist();
        limit
    }

    /// Replace the settings wholesale. Invalid settings leave everything as is.
    pub fn update_settings(&mut self, settings: SystemSettings) -> Result<()> {
        settings.validate()?;
        self.state.settings = settings;
        if let Some(us) = &self.state.user_state {
            self.state.wip_limit = wip::calculate_wip_limit(us.mood, us.energy, &self.state.settings);
        }
        info!(limit = self.state.wip_limit, "settings replaced");
        self.persist();
        Ok(())
    }

    pub fn set_intention(&mut self, intention: &str) {
        self.state.daily_intention = intention.trim().to_string();
        self.persist();
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// One brain dump item per non-empty line.
    pub fn brain_dump(&mut self, text: &str, now: DateTime<Utc>) -> Vec<u64> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let mut ids = Vec::with_capacity(lines.len());
        for line in lines {
            let id = self.allocate_id();
            self.state.tasks.push(Task::new(id, line, now));
            ids.push(id);
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "brain dump captured");
            self.persist();
        }
        ids
    }

    /// Import partial records as brain dump items with fresh ids.
    pub fn import_drafts(&mut self, drafts: Vec<TaskDraft>, now: DateTime<Utc>) -> Vec<u64> {
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = self.allocate_id();
            self.state.tasks.push(draft.into_task(id, now));
            ids.push(id);
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "tasks imported");
            self.persist();
        }
        ids
    }

    /// Park a distracting thought without leaving focus.
    pub fn capture_thought(&mut self, text: &str, now: DateTime<Utc>) -> u64 {
        let id = self.allocate_id();
        let mut task = Task::new(id, text, now);
        task.category = DISTRACTION_CATEGORY.to_string();
        task.priority = Priority::Low;
        task.required_energy = EnergyLevel::Low;
        self.state.tasks.push(task);
        debug!(id, "thought captured");
        self.persist();
        id
    }

    /// Triage a brain dump item onto the board in the current context.
    pub fn add_to_board(&mut self, id: u64, now: DateTime<Utc>) -> Result<Outcome<Moved>> {
        let placement = self.ui.board_context.placement();
        let idx = self.index_of(id)?;
        if self.state.tasks[idx].status != Status::BrainDump {
            return Ok(Outcome::Rejected(Rejection::NoOp));
        }
        let outcome = self.apply_transition(id, Status::Todo, now, Some(placement), |_| false)?;
        if outcome.is_applied() {
            if self.ui.modal == Some(Modal::Backlog) {
                self.ui.modal = None;
            }
            self.persist();
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Request a status change through the board rules. `confirm` is asked
    /// only when starting a high-energy task on low energy.
    pub fn move_task<F>(&mut self, id: u64, target: Status, now: DateTime<Utc>, confirm: F) -> Result<Outcome<Moved>>
    where
        F: FnOnce(&EnergyWarning) -> bool,
    {
        let outcome = self.apply_transition(id, target, now, None, confirm)?;
        if outcome.is_applied() {
            self.persist();
        }
        Ok(outcome)
    }

    /// Move one column left or right.
    pub fn move_adjacent<F>(
        &mut self,
        id: u64,
        direction: MoveDirection,
        now: DateTime<Utc>,
        confirm: F,
    ) -> Result<Outcome<Moved>>
    where
        F: FnOnce(&EnergyWarning) -> bool,
    {
        let status = self.task(id).ok_or(Error::TaskNotFound(id))?.status;
        match board::adjacent_status(status, direction) {
            Some(target) => self.move_task(id, target, now, confirm),
            None => Ok(Outcome::Rejected(Rejection::NoOp)),
        }
    }

    /// The warning `move_task(id, InProgress, ..)` would raise, so a UI can
    /// ask before calling.
    pub fn energy_warning_for(&self, id: u64) -> Option<EnergyWarning> {
        board::energy_warning(self.task(id)?, self.user_state())
    }

    /// The warning a move to `target` would stop on, if the move is gated and
    /// would get past WIP admission. Nothing is recorded.
    pub fn confirmation_needed(&self, id: u64, target: Status) -> Option<EnergyWarning> {
        let task = self.task(id)?;
        if board::rule(task.status, target) != board::Rule::Gated {
            return None;
        }
        if self.active_wip_count() >= self.state.wip_limit as usize {
            return None;
        }
        self.energy_warning_for(id)
    }

    fn apply_transition<F>(
        &mut self,
        id: u64,
        target: Status,
        now: DateTime<Utc>,
        placement: Option<BoardContext>,
        confirm: F,
    ) -> Result<Outcome<Moved>>
    where
        F: FnOnce(&EnergyWarning) -> bool,
    {
        let idx = self.index_of(id)?;
        let decision = {
            let gate = Gate {
                wip_limit: self.state.wip_limit,
                user_state: self.state.user_state.as_ref(),
                tasks: &self.state.tasks,
                now,
                reopen_policy: self.state.settings.reopen_policy,
                placement: placement.unwrap_or(self.ui.board_context),
            };
            board::attempt_transition(&self.state.tasks[idx], target, &gate, confirm)
        };

        let transition = match decision {
            Ok(t) => t,
            Err(rejection) => {
                self.notice(rejection);
                return Ok(Outcome::Rejected(rejection));
            }
        };

        info!(id, from = %transition.from, to = %transition.to, "task moved");
        let moved = Moved {
            task_id: id,
            from: transition.from,
            to: transition.to,
            first_start: transition.first_start,
        };
        let completes = transition.completes();
        self.state.tasks[idx] = transition.task;
        if completes {
            self.on_completed(id, now);
        }
        Ok(Outcome::Applied(moved))
    }

    /// Completion side effects, owed exactly once per accepted move into Done.
    fn on_completed(&mut self, id: u64, now: DateTime<Utc>) {
        self.events.push(AppEvent::Celebrate { task_id: id });
        if self.state.user_state.is_none() {
            return;
        }
        if let Some(old) = self.pending_bridge.take() {
            self.timers.cancel(old);
        }
        let delay = Duration::milliseconds(self.state.settings.bridge_delay_ms.min(MAX_BRIDGE_DELAY_MS) as i64);
        let due = now.checked_add_signed(delay).unwrap_or(now);
        self.pending_bridge = Some(self.timers.schedule(due));
    }

    /// Fire due timers. The bridge suggestion is computed from the task set as
    /// it is at fire time.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Modal> {
        let mut opened = None;
        for token in self.timers.take_due(now) {
            if self.pending_bridge != Some(token) {
                continue;
            }
            self.pending_bridge = None;
            if self.state.user_state.is_none() || self.ui.view == AppView::Focus {
                continue;
            }
            let suggested = self.suggest_next().map(|t| t.id);
            info!(suggested = ?suggested, "decision bridge opened");
            let modal = Modal::DecisionBridge { suggested };
            self.ui.modal = Some(modal);
            self.events.push(AppEvent::BridgeReady { suggested });
            opened = Some(modal);
        }
        opened
    }

    fn close_bridge(&mut self) {
        if let Some(token) = self.pending_bridge.take() {
            self.timers.cancel(token);
        }
        if matches!(self.ui.modal, Some(Modal::DecisionBridge { .. })) {
            self.ui.modal = None;
        }
    }

    /// "Take a break": dismiss the bridge.
    pub fn dismiss_bridge(&mut self) {
        self.close_bridge();
    }

    /// Start the suggested task: into In Progress through the board rules,
    /// then straight into focus.
    pub fn start_suggested<F>(&mut self, id: u64, now: DateTime<Utc>, confirm: F) -> Result<Outcome<FocusEntry>>
    where
        F: FnOnce(&EnergyWarning) -> bool,
    {
        self.close_bridge();
        if self.task(id).ok_or(Error::TaskNotFound(id))?.status != Status::InProgress {
            if let Outcome::Rejected(r) = self.move_task(id, Status::InProgress, now, confirm)? {
                return Ok(Outcome::Rejected(r));
            }
        }
        Ok(Outcome::Applied(self.enter_focus(id)?))
    }

    /// Raw Done -> To Do write, outside the board rules.
    pub fn reopen(&mut self, id: u64) -> Result<Outcome<()>> {
        let idx = self.index_of(id)?;
        let policy = self.state.settings.reopen_policy;
        let task = &mut self.state.tasks[idx];
        if task.status != Status::Done {
            return Ok(Outcome::Rejected(Rejection::NoOp));
        }
        task.status = Status::Todo;
        if policy == ReopenPolicy::ClearCompletedAt {
            task.completed_at = None;
        }
        if task.board_context.is_none() {
            task.board_context = Some(self.ui.board_context.placement());
        }
        info!(id, "task reopened");
        self.persist();
        Ok(Outcome::Applied(()))
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    pub fn update_task(&mut self, id: u64, patch: TaskPatch) -> Result<()> {
        let idx = self.index_of(id)?;
        if patch.is_empty() {
            return Ok(());
        }
        patch.apply(&mut self.state.tasks[idx]);
        if self.ui.modal == Some(Modal::EditTask(id)) {
            self.ui.modal = None;
        }
        debug!(id, "task edited");
        self.persist();
        Ok(())
    }

    /// Returns whether anything changed.
    pub fn set_blocked(&mut self, id: u64, blocked: bool) -> Result<bool> {
        let idx = self.index_of(id)?;
        if self.state.tasks[idx].is_blocked == blocked {
            return Ok(false);
        }
        self.state.tasks[idx].is_blocked = blocked;
        if !blocked && self.state.tasks[idx].status == Status::InProgress {
            let active = self.active_wip_count();
            if active > self.state.wip_limit as usize {
                warn!(id, active, limit = self.state.wip_limit, "unblocked task puts board over its WIP limit");
            }
        }
        info!(id, blocked, "blocked flag changed");
        self.persist();
        Ok(true)
    }

    /// Delete a task. Without confirmation nothing happens.
    pub fn delete_task(&mut self, id: u64, confirmed: bool) -> Result<Outcome<Task>> {
        let idx = self.index_of(id)?;
        if !confirmed {
            self.notice(Rejection::DeleteNotConfirmed);
            return Ok(Outcome::Rejected(Rejection::DeleteNotConfirmed));
        }
        let removed = self.state.tasks.remove(idx);
        if self.ui.focus_task == Some(id) {
            self.exit_focus();
        }
        if matches!(
            self.ui.modal,
            Some(Modal::EditTask(m) | Modal::DurationPrompt(m) | Modal::ConfirmEnergy(m) | Modal::ConfirmDelete(m)) if m == id
        ) {
            self.ui.modal = None;
        }
        info!(id, "task deleted");
        self.persist();
        Ok(Outcome::Applied(removed))
    }

    pub fn add_subtask(&mut self, id: u64, label: &str) -> Result<u64> {
        let idx = self.index_of(id)?;
        let task = &mut self.state.tasks[idx];
        let sub_id = task.next_subtask_id();
        task.subtasks.push(Subtask { id: sub_id, label: label.trim().to_string(), is_completed: false });
        self.persist();
        Ok(sub_id)
    }

    /// Flip a subtask. Returns its new completion state.
    pub fn toggle_subtask(&mut self, id: u64, subtask_id: u64) -> Result<bool> {
        let idx = self.index_of(id)?;
        let sub = self.state.tasks[idx]
            .subtask_mut(subtask_id)
            .ok_or(Error::SubtaskNotFound { task: id, subtask: subtask_id })?;
        sub.is_completed = !sub.is_completed;
        let done = sub.is_completed;
        self.persist();
        Ok(done)
    }

    pub fn remove_subtask(&mut self, id: u64, subtask_id: u64) -> Result<()> {
        let idx = self.index_of(id)?;
        let task = &mut self.state.tasks[idx];
        let before = task.subtasks.len();
        task.subtasks.retain(|s| s.id != subtask_id);
        if task.subtasks.len() == before {
            return Err(Error::SubtaskNotFound { task: id, subtask: subtask_id });
        }
        self.persist();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Focus sessions
    // -----------------------------------------------------------------------

    /// Enter focus on a task, prompting for a duration if none is known.
    pub fn enter_focus(&mut self, id: u64) -> Result<FocusEntry> {
        let task = self.task(id).ok_or(Error::TaskNotFound(id))?;
        if !task.has_duration() {
            self.ui.modal = Some(Modal::DurationPrompt(id));
            return Ok(FocusEntry::NeedsDuration(id));
        }
        self.start_focus(id);
        Ok(FocusEntry::Started(id))
    }

    /// Answer the duration prompt and start focus.
    pub fn confirm_duration(&mut self, id: u64, minutes: u32) -> Result<FocusEntry> {
        if minutes == 0 {
            return Err(Error::MissingDuration);
        }
        let idx = self.index_of(id)?;
        self.state.tasks[idx].estimated_minutes = Some(minutes);
        if self.ui.modal == Some(Modal::DurationPrompt(id)) {
            self.ui.modal = None;
        }
        self.persist();
        self.start_focus(id);
        Ok(FocusEntry::Started(id))
    }

    fn start_focus(&mut self, id: u64) {
        if self.ui.view != AppView::Focus {
            self.ui.previous_view = self.ui.view;
        }
        self.ui.view = AppView::Focus;
        self.ui.focus_task = Some(id);
        self.close_bridge();
        info!(id, "focus session started");
    }

    pub fn exit_focus(&mut self) {
        if self.ui.view == AppView::Focus {
            self.ui.view = self.ui.previous_view;
        }
        self.ui.focus_task = None;
    }

    /// Finish the focused task: Done with the usual completion side effects,
    /// then leave focus.
    pub fn complete_from_focus(&mut self, id: u64, now: DateTime<Utc>) -> Result<Outcome<Moved>> {
        let outcome = self.move_task(id, Status::Done, now, |_| true)?;
        if self.ui.focus_task == Some(id) {
            self.exit_focus();
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Navigation and shutdown
    // -----------------------------------------------------------------------

    pub fn set_view(&mut self, view: AppView) {
        self.ui.view = view;
    }

    pub fn set_board_context(&mut self, context: BoardContext) {
        self.ui.board_context = context;
    }

    pub fn toggle_energy_filter(&mut self) -> bool {
        self.ui.energy_filter = !self.ui.energy_filter;
        self.ui.energy_filter
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.ui.modal = Some(modal);
    }

    /// Closing a prompt cancels only the pending interaction.
    pub fn close_modal(&mut self) {
        if matches!(self.ui.modal, Some(Modal::DecisionBridge { .. })) {
            self.close_bridge();
        } else {
            self.ui.modal = None;
        }
    }

    pub fn initiate_shutdown(&mut self) {
        self.ui.view = AppView::Shutdown;
    }

    /// Park every active task back in To Do. Returns how many moved.
    pub fn shutdown_move_wip(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let active: Vec<u64> = self.state.tasks.iter().filter(|t| t.is_active_wip()).map(|t| t.id).collect();
        let mut moved = 0;
        for id in active {
            if self.apply_transition(id, Status::Todo, now, None, |_| false)?.is_applied() {
                moved += 1;
            }
        }
        info!(moved, "shutdown parked active tasks");
        self.persist();
        Ok(moved)
    }

    pub fn wake_up(&mut self) {
        self.state.daily_intention.clear();
        self.ui.view = AppView::Dashboard;
        self.persist();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::settings::WipThresholds;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    /// An app with one check-in so onboarding does not run.
    fn app_with(mood: Mood, energy: EnergyLevel) -> App<MemoryStore> {
        let mut app = App::open(MemoryStore::new(), t0()).unwrap();
        app.state.tasks.clear();
        app.check_in(mood, energy, None, t0());
        app
    }

    fn todo(app: &mut App<MemoryStore>, title: &str, energy: EnergyLevel) -> u64 {
        let id = app.brain_dump(title, t0())[0];
        app.update_task(id, TaskPatch { required_energy: Some(energy), ..Default::default() }).unwrap();
        assert!(app.add_to_board(id, t0()).unwrap().is_applied());
        id
    }

    #[test]
    fn test_first_run_seeds_tutorial_and_asks_for_check_in() {
        let app = App::open(MemoryStore::new(), t0()).unwrap();
        assert_eq!(app.tasks().len(), 3);
        assert_eq!(app.ui().modal, Some(Modal::CheckIn));
        assert_eq!(app.store().save_count(), 1);
        assert_eq!(app.wip_limit(), crate::db::DEFAULT_WIP_LIMIT);
    }

    #[test]
    fn test_check_in_sets_limit_and_history() {
        let mut app = App::open(MemoryStore::new(), t0()).unwrap();
        assert_eq!(app.check_in(Mood::Anxious, EnergyLevel::High, None, t0()), 1);
        assert_eq!(app.check_in(Mood::Calm, EnergyLevel::High, Some("good sleep".into()), t0()), 3);
        assert_eq!(app.check_in_history().len(), 2);
        assert_eq!(app.check_in_history()[0].mood, Mood::Anxious);
        assert!(app.ui().modal.is_none());
    }

    #[test]
    fn test_settings_update_recomputes_limit_and_rejects_invalid() {
        let mut app = app_with(Mood::Calm, EnergyLevel::High);
        let mut s = app.settings().clone();
        s.wip_limits = WipThresholds { protective: 1, sustainable: 3, max: 5 };
        app.update_settings(s).unwrap();
        assert_eq!(app.wip_limit(), 5);

        let mut bad = app.settings().clone();
        bad.wip_limits.protective = 9;
        assert!(app.update_settings(bad).is_err());
        assert_eq!(app.settings().wip_limits.max, 5);
    }

    #[test]
    fn test_admission_denied_then_allowed_after_completion() {
        let mut app = app_with(Mood::Tired, EnergyLevel::Medium);
        assert_eq!(app.wip_limit(), 2);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let b = todo(&mut app, "b", EnergyLevel::Medium);
        let c = todo(&mut app, "c", EnergyLevel::Medium);
        assert!(app.move_task(a, Status::InProgress, t0(), |_| true).unwrap().is_applied());
        assert!(app.move_task(b, Status::InProgress, t0(), |_| true).unwrap().is_applied());

        let denied = app.move_task(c, Status::InProgress, t0(), |_| true).unwrap();
        assert_eq!(denied.rejection().map(|r| r.code()), Some("ADMISSION_DENIED_WIP"));
        assert_eq!(app.task(c).unwrap().status, Status::Todo);
        assert!(app.drain_events().contains(&AppEvent::Notice(Rejection::WipLimitReached { active: 2, limit: 2 })));

        assert!(app.move_task(a, Status::Done, t0(), |_| true).unwrap().is_applied());
        assert!(app.move_task(c, Status::InProgress, t0(), |_| true).unwrap().is_applied());
        assert_eq!(app.active_wip_count(), 2);
    }

    #[test]
    fn test_completion_celebrates_once_and_schedules_bridge() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let b = todo(&mut app, "b", EnergyLevel::Medium);
        app.move_task(a, Status::InProgress, t0(), |_| true).unwrap();
        app.drain_events();

        app.move_task(a, Status::Done, t0(), |_| true).unwrap();
        assert_eq!(app.drain_events(), vec![AppEvent::Celebrate { task_id: a }]);
        assert!(app.bridge_pending());

        assert_eq!(app.tick(t0()), None);
        let opened = app.tick(t0() + Duration::seconds(1));
        assert_eq!(opened, Some(Modal::DecisionBridge { suggested: Some(b) }));
        assert_eq!(app.drain_events(), vec![AppEvent::BridgeReady { suggested: Some(b) }]);
        assert!(!app.bridge_pending());
    }

    #[test]
    fn test_bridge_rereads_state_at_fire_time() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let b = todo(&mut app, "b", EnergyLevel::Medium);
        app.move_task(a, Status::Done, t0(), |_| true).unwrap();
        app.delete_task(b, true).unwrap();
        assert_eq!(app.tick(t0() + Duration::seconds(5)), Some(Modal::DecisionBridge { suggested: None }));
    }

    #[test]
    fn test_second_completion_replaces_pending_bridge() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let b = todo(&mut app, "b", EnergyLevel::Medium);
        app.move_task(a, Status::Done, t0(), |_| true).unwrap();
        app.move_task(b, Status::Done, t0() + Duration::milliseconds(500), |_| true).unwrap();
        assert_eq!(app.tick(t0() + Duration::milliseconds(1200)), None);
        assert!(app.tick(t0() + Duration::milliseconds(1500)).is_some());
        let celebrations = app.drain_events().iter().filter(|e| matches!(e, AppEvent::Celebrate { .. })).count();
        assert_eq!(celebrations, 2);
    }

    #[test]
    fn test_entering_focus_cancels_bridge() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let b = todo(&mut app, "b", EnergyLevel::Medium);
        app.move_task(a, Status::Done, t0(), |_| true).unwrap();
        app.confirm_duration(b, 20).unwrap();
        assert!(!app.bridge_pending());
        assert_eq!(app.tick(t0() + Duration::seconds(2)), None);
    }

    #[test]
    fn test_focus_duration_prompt_and_completion() {
        let mut app = app_with(Mood::Focused, EnergyLevel::High);
        app.set_view(AppView::Board);
        let a = todo(&mut app, "a", EnergyLevel::High);
        let b = todo(&mut app, "b", EnergyLevel::Low);
        app.move_task(a, Status::InProgress, t0(), |_| true).unwrap();

        assert_eq!(app.enter_focus(a).unwrap(), FocusEntry::NeedsDuration(a));
        assert_eq!(app.ui().modal, Some(Modal::DurationPrompt(a)));
        assert!(matches!(app.confirm_duration(a, 0), Err(Error::MissingDuration)));
        assert_eq!(app.confirm_duration(a, 25).unwrap(), FocusEntry::Started(a));
        assert_eq!(app.ui().view, AppView::Focus);

        let done = app.complete_from_focus(a, t0()).unwrap();
        assert!(done.is_applied());
        assert_eq!(app.ui().view, AppView::Board);
        assert!(app.ui().focus_task.is_none());
        assert_eq!(app.tick(t0() + Duration::seconds(1)), Some(Modal::DecisionBridge { suggested: Some(b) }));
    }

    #[test]
    fn test_start_suggested_goes_through_board_rules() {
        let mut app = app_with(Mood::Tired, EnergyLevel::Low);
        let heavy = todo(&mut app, "heavy", EnergyLevel::High);
        let declined = app.start_suggested(heavy, t0(), |_| false).unwrap();
        assert_eq!(declined, Outcome::Rejected(Rejection::EnergyMismatchDeclined));
        assert_eq!(app.task(heavy).unwrap().status, Status::Todo);

        let started = app.start_suggested(heavy, t0(), |_| true).unwrap();
        assert_eq!(started, Outcome::Applied(FocusEntry::NeedsDuration(heavy)));
        let task = app.task(heavy).unwrap();
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.start_context.map(|c| c.energy), Some(EnergyLevel::Low));
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let saves = app.store().save_count();
        let outcome = app.delete_task(a, false).unwrap();
        assert_eq!(outcome.rejection(), Some(Rejection::DeleteNotConfirmed));
        assert!(app.task(a).is_some());
        assert_eq!(app.store().save_count(), saves);

        assert!(app.delete_task(a, true).unwrap().is_applied());
        assert!(app.task(a).is_none());
        let fresh = app.brain_dump("new", t0())[0];
        assert!(fresh > a, "ids are never reused");
    }

    #[test]
    fn test_add_to_board_uses_view_context() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let ids = app.brain_dump("one\n\n  two  \n", t0());
        assert_eq!(ids.len(), 2);
        app.set_board_context(BoardContext::Work);
        app.add_to_board(ids[0], t0()).unwrap();
        app.set_board_context(BoardContext::Together);
        app.add_to_board(ids[1], t0()).unwrap();
        assert_eq!(app.task(ids[0]).unwrap().board_context, Some(BoardContext::Work));
        assert_eq!(app.task(ids[1]).unwrap().board_context, Some(BoardContext::Personal));

        app.set_board_context(BoardContext::Work);
        let visible: Vec<u64> = app.column(Status::Todo, t0()).iter().map(|t| t.id).collect();
        assert_eq!(visible, vec![ids[0]]);
    }

    #[test]
    fn test_import_defaults_priority_and_status() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let drafts = vec![
            TaskDraft { title: Some("first".into()), ..Default::default() },
            TaskDraft { title: Some("second".into()), category: Some("Work".into()), ..Default::default() },
        ];
        let ids = app.import_drafts(drafts, t0());
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        for id in ids {
            let t = app.task(id).unwrap();
            assert_eq!(t.priority, Priority::Medium);
            assert_eq!(t.status, Status::BrainDump);
        }
    }

    #[test]
    fn test_energy_filter_hides_demanding_todo() {
        let mut app = app_with(Mood::Tired, EnergyLevel::Medium);
        let easy = todo(&mut app, "easy", EnergyLevel::Low);
        let hard = todo(&mut app, "hard", EnergyLevel::High);
        assert_eq!(app.column(Status::Todo, t0()).len(), 2);
        assert!(app.toggle_energy_filter());
        let ids: Vec<u64> = app.column(Status::Todo, t0()).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![easy]);
        assert!(app.task(hard).is_some());
    }

    #[test]
    fn test_done_column_only_shows_today() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        let old = todo(&mut app, "old", EnergyLevel::Medium);
        let fresh = todo(&mut app, "fresh", EnergyLevel::Medium);
        app.move_task(old, Status::Done, t0() - Duration::days(3), |_| true).unwrap();
        app.move_task(fresh, Status::Done, t0(), |_| true).unwrap();
        let ids: Vec<u64> = app.column(Status::Done, t0()).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![fresh]);
    }

    #[test]
    fn test_shutdown_parks_active_tasks() {
        let mut app = app_with(Mood::Calm, EnergyLevel::High);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let b = todo(&mut app, "b", EnergyLevel::Medium);
        app.move_task(a, Status::InProgress, t0(), |_| true).unwrap();
        app.move_task(b, Status::InProgress, t0(), |_| true).unwrap();
        app.set_blocked(b, true).unwrap();
        app.set_intention("finish the draft");

        app.initiate_shutdown();
        assert_eq!(app.shutdown_move_wip(t0()).unwrap(), 1);
        assert_eq!(app.task(a).unwrap().status, Status::Todo);
        assert_eq!(app.task(b).unwrap().status, Status::InProgress);

        app.wake_up();
        assert_eq!(app.daily_intention(), "");
        assert_eq!(app.ui().view, AppView::Dashboard);
    }

    #[test]
    fn test_reopen_is_raw_and_honours_policy() {
        let mut app = app_with(Mood::Calm, EnergyLevel::High);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        assert_eq!(app.reopen(a).unwrap(), Outcome::Rejected(Rejection::NoOp));
        app.move_task(a, Status::Done, t0(), |_| true).unwrap();

        let mut s = app.settings().clone();
        s.reopen_policy = ReopenPolicy::ClearCompletedAt;
        app.update_settings(s).unwrap();
        assert!(app.reopen(a).unwrap().is_applied());
        let t = app.task(a).unwrap();
        assert_eq!(t.status, Status::Todo);
        assert!(t.completed_at.is_none());
    }

    #[test]
    fn test_subtasks() {
        let mut app = app_with(Mood::Calm, EnergyLevel::High);
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        let s1 = app.add_subtask(a, "outline").unwrap();
        let s2 = app.add_subtask(a, "draft").unwrap();
        assert!(app.toggle_subtask(a, s1).unwrap());
        assert_eq!(app.task(a).unwrap().progress(), (1, 2));
        app.remove_subtask(a, s2).unwrap();
        assert!(matches!(app.toggle_subtask(a, s2), Err(Error::SubtaskNotFound { .. })));
    }

    #[test]
    fn test_capture_thought_lands_in_brain_dump() {
        let mut app = app_with(Mood::Focused, EnergyLevel::High);
        let id = app.capture_thought("buy milk", t0());
        let t = app.task(id).unwrap();
        assert_eq!(t.status, Status::BrainDump);
        assert_eq!(t.category, DISTRACTION_CATEGORY);
        assert_eq!(t.priority, Priority::Low);
        assert_eq!(app.brain_dump_items().len(), 1);
    }

    #[test]
    fn test_every_mutation_is_snapshotted() {
        let mut app = app_with(Mood::Calm, EnergyLevel::High);
        let before = app.store().save_count();
        let a = app.brain_dump("x", t0())[0];
        app.set_blocked(a, true).unwrap();
        app.set_intention("hi");
        assert_eq!(app.store().save_count(), before + 3);
    }

    #[test]
    fn test_confirmation_check_records_nothing() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Low);
        let heavy = todo(&mut app, "heavy", EnergyLevel::High);
        let light = todo(&mut app, "light", EnergyLevel::Low);
        app.drain_events();

        let warning = app.confirmation_needed(heavy, Status::InProgress).unwrap();
        assert_eq!(warning.required_energy, EnergyLevel::High);
        assert!(app.confirmation_needed(light, Status::InProgress).is_none());
        assert!(app.confirmation_needed(heavy, Status::Done).is_none());
        assert!(app.drain_events().is_empty());
        assert_eq!(app.task(heavy).unwrap().status, Status::Todo);

        // A full board reports the WIP refusal instead of asking about energy.
        assert!(app.move_task(light, Status::InProgress, t0(), |_| true).unwrap().is_applied());
        assert!(app.confirmation_needed(heavy, Status::InProgress).is_none());
    }

    #[test]
    fn test_oversized_bridge_delay_is_clamped() {
        let mut app = app_with(Mood::Calm, EnergyLevel::Medium);
        app.state.settings.bridge_delay_ms = u64::MAX;
        let a = todo(&mut app, "a", EnergyLevel::Medium);
        app.move_task(a, Status::InProgress, t0(), |_| true).unwrap();
        app.move_task(a, Status::Done, t0(), |_| true).unwrap();
        assert!(app.bridge_pending());

        assert_eq!(app.tick(t0() + Duration::seconds(59)), None);
        assert!(app.tick(t0() + Duration::milliseconds(MAX_BRIDGE_DELAY_MS as i64)).is_some());
    }
}

