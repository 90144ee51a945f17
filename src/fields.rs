//! Enumerations and field types for tasks and check-ins.
//!
//! Every classification on the board is a closed enum so that invalid states
//! cannot be represented. Serde names are kebab-case; the upper snake case
//! spellings of older snapshots are accepted as aliases.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "BRAIN_DUMP")]
    BrainDump,
    #[serde(alias = "TODO")]
    Todo,
    #[serde(alias = "IN_PROGRESS")]
    InProgress,
    #[serde(alias = "DONE")]
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::BrainDump, Status::Todo, Status::InProgress, Status::Done];

    pub fn label(self) -> &'static str {
        match self {
            Status::BrainDump => "Brain Dump",
            Status::Todo => "To Do",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }

    /// Parse a status string as written by any snapshot version.
    pub fn parse(s: &str) -> Option<Status> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "brain-dump" => Some(Status::BrainDump),
            "todo" => Some(Status::Todo),
            "in-progress" => Some(Status::InProgress),
            "done" => Some(Status::Done),
            _ => None,
        }
    }

    /// Whether the task sits on the board (as opposed to the intake list).
    pub fn is_on_board(self) -> bool {
        self != Status::BrainDump
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Task priority. `Urgent` outranks everything regardless of energy fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    #[serde(alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "MEDIUM")]
    Medium,
    #[serde(alias = "HIGH")]
    High,
    #[serde(alias = "URGENT")]
    Urgent,
}

impl Priority {
    /// Sort rank, lower first. Urgent sits below High so a plain rank
    /// comparison never contradicts the urgent-first rule.
    pub fn rank(self) -> i8 {
        match self {
            Priority::Urgent => -1,
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse estimate of cognitive capacity, both for users and for tasks.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyLevel {
    #[serde(alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "MEDIUM")]
    Medium,
    #[serde(alias = "HIGH")]
    High,
}

impl EnergyLevel {
    pub const ALL: [EnergyLevel; 3] = [EnergyLevel::Low, EnergyLevel::Medium, EnergyLevel::High];

    pub fn label(self) -> &'static str {
        match self {
            EnergyLevel::Low => "Low",
            EnergyLevel::Medium => "Medium",
            EnergyLevel::High => "High",
        }
    }

    /// Single-glyph marker used on cards.
    pub fn glyph(self) -> &'static str {
        match self {
            EnergyLevel::Low => "▁",
            EnergyLevel::Medium => "▄",
            EnergyLevel::High => "█",
        }
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Emotional state reported at check-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Mood {
    #[serde(alias = "ANXIOUS")]
    Anxious,
    #[serde(alias = "STRESSED")]
    Stressed,
    #[serde(alias = "TIRED")]
    Tired,
    #[serde(alias = "FOCUSED")]
    Focused,
    #[serde(alias = "CALM")]
    Calm,
}

impl Mood {
    pub const ALL: [Mood; 5] = [Mood::Anxious, Mood::Stressed, Mood::Tired, Mood::Focused, Mood::Calm];

    pub fn label(self) -> &'static str {
        match self {
            Mood::Anxious => "Anxious",
            Mood::Stressed => "Stressed",
            Mood::Tired => "Tired",
            Mood::Focused => "Focused",
            Mood::Calm => "Calm",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Board partition. `Together` is a view only; tasks are never stored with it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BoardContext {
    #[default]
    #[serde(alias = "PERSONAL")]
    Personal,
    #[serde(alias = "WORK")]
    Work,
    #[serde(alias = "TOGETHER")]
    Together,
}

impl BoardContext {
    pub fn label(self) -> &'static str {
        match self {
            BoardContext::Personal => "Personal",
            BoardContext::Work => "Work",
            BoardContext::Together => "Together",
        }
    }

    /// The partition a task lands in when placed from this view.
    pub fn placement(self) -> BoardContext {
        match self {
            BoardContext::Together => BoardContext::Personal,
            other => other,
        }
    }

    /// Next view in the Personal -> Work -> Together cycle.
    pub fn cycle(self) -> BoardContext {
        match self {
            BoardContext::Personal => BoardContext::Work,
            BoardContext::Work => BoardContext::Together,
            BoardContext::Together => BoardContext::Personal,
        }
    }
}

/// Top-level navigation views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppView {
    #[default]
    Dashboard,
    Board,
    BrainDump,
    Focus,
    Reflection,
    Shutdown,
}

/// Direction for the explicit "move to adjacent column" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MoveDirection {
    Prev,
    Next,
}

/// Which tasks the post-completion suggestion may pick from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CandidatePool {
    /// Only triaged board tasks waiting in To Do.
    #[default]
    Todo,
    /// To Do plus untriaged brain dump items.
    TodoAndBrainDump,
}

impl CandidatePool {
    pub fn admits(self, status: Status) -> bool {
        match self {
            CandidatePool::Todo => status == Status::Todo,
            CandidatePool::TodoAndBrainDump => matches!(status, Status::Todo | Status::BrainDump),
        }
    }
}

/// What happens to `completed_at` when a finished task leaves Done.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReopenPolicy {
    #[default]
    KeepCompletedAt,
    ClearCompletedAt,
}
