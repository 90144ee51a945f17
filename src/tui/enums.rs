//! Enumerations for TUI state management.

/// What the active text prompt is collecting.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputPurpose {
    /// New brain dump line.
    BrainDump,
    /// Distraction parked during focus.
    Capture,
    Intention,
    /// Minutes for the focus timer of this task.
    Duration(u64),
    /// New title for this task.
    Title(u64),
    /// New subtask label on this task.
    Subtask(u64),
}

impl InputPurpose {
    pub fn prompt(self) -> &'static str {
        match self {
            InputPurpose::BrainDump => "Dump a thought",
            InputPurpose::Capture => "Park this thought for later",
            InputPurpose::Intention => "Today's intention",
            InputPurpose::Duration(_) => "How many minutes?",
            InputPurpose::Title(_) => "New title",
            InputPurpose::Subtask(_) => "New subtask",
        }
    }
}

/// Which row of the check-in popup has focus.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CheckInRow {
    #[default]
    Mood,
    Energy,
}
