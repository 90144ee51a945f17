//! Task data structure and related records.
//!
//! A `Task` is plain data. Status changes go through [`crate::board`]; edits
//! that do not touch status go through [`TaskPatch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkin::UserState;
use crate::fields::*;

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DISTRACTION_CATEGORY: &str = "Distraction";
pub const UNTITLED: &str = "Untitled task";

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: Priority,
    pub required_energy: EnergyLevel,
    pub status: Status,
    /// Occupies board space without counting against WIP.
    #[serde(default)]
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Mood and energy when the task was first started.
    pub start_context: Option<StartContext>,
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub board_context: Option<BoardContext>,
}

/// Snapshot of the user's state captured on first start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartContext {
    pub mood: Mood,
    pub energy: EnergyLevel,
}

impl From<&UserState> for StartContext {
    fn from(state: &UserState) -> Self {
        StartContext { mood: state.mood, energy: state.energy }
    }
}

/// A checklist item inside a task. Display only, never gates a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl Task {
    /// Create a fresh brain dump item with default classification.
    pub fn new(id: u64, title: &str, now: DateTime<Utc>) -> Self {
        let title = title.trim();
        Task {
            id,
            title: if title.is_empty() { UNTITLED.to_string() } else { title.to_string() },
            description: None,
            category: DEFAULT_CATEGORY.to_string(),
            priority: Priority::Medium,
            required_energy: EnergyLevel::Medium,
            status: Status::BrainDump,
            is_blocked: false,
            created_at: now,
            started_at: None,
            completed_at: None,
            start_context: None,
            estimated_minutes: None,
            subtasks: Vec::new(),
            board_context: None,
        }
    }

    /// Counts against the WIP limit.
    pub fn is_active_wip(&self) -> bool {
        self.status == Status::InProgress && !self.is_blocked
    }

    /// Visible in the given board view. `Together` shows every partition.
    pub fn in_context(&self, view: BoardContext) -> bool {
        match view {
            BoardContext::Together => true,
            other => self.board_context == Some(other),
        }
    }

    /// `(completed, total)` subtask counts.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.is_completed).count();
        (done, self.subtasks.len())
    }

    pub fn has_duration(&self) -> bool {
        matches!(self.estimated_minutes, Some(m) if m > 0)
    }

    pub fn next_subtask_id(&self) -> u64 {
        self.subtasks.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    pub fn subtask_mut(&mut self, subtask_id: u64) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }
}

/// Partial record accepted by bulk import. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDraft {
    #[serde(alias = "content")]
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    #[serde(alias = "requiredEnergy")]
    pub required_energy: Option<EnergyLevel>,
    #[serde(alias = "estimatedDuration")]
    pub estimated_minutes: Option<u32>,
}

impl TaskDraft {
    /// Materialise the draft as a brain dump task with a fresh id.
    pub fn into_task(self, id: u64, now: DateTime<Utc>) -> Task {
        let mut task = Task::new(id, self.title.as_deref().unwrap_or(""), now);
        task.description = self.description.filter(|d| !d.trim().is_empty());
        if let Some(category) = self.category.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            task.category = category;
        }
        task.priority = self.priority.unwrap_or_default();
        task.required_energy = self.required_energy.unwrap_or_default();
        task.estimated_minutes = self.estimated_minutes.filter(|m| *m > 0);
        task
    }
}

/// Single-task edit. Status and timestamps are not editable here.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub required_energy: Option<EnergyLevel>,
    pub estimated_minutes: Option<u32>,
    pub board_context: Option<BoardContext>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.required_energy.is_none()
            && self.estimated_minutes.is_none()
            && self.board_context.is_none()
    }

    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            task.title = title;
        }
        if let Some(d) = self.description {
            task.description = if d.trim().is_empty() { None } else { Some(d) };
        }
        if let Some(c) = self.category.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            task.category = c;
        }
        if let Some(p) = self.priority { task.priority = p; }
        if let Some(e) = self.required_energy { task.required_energy = e; }
        if let Some(m) = self.estimated_minutes {
            task.estimated_minutes = if m == 0 { None } else { Some(m) };
        }
        // Brain dump items have no partition until they are triaged.
        if let Some(ctx) = self.board_context {
            if task.status.is_on_board() {
                task.board_context = Some(ctx.placement());
            }
        }
    }
}
