//! Board state machine.
//!
//! Governs status changes of a single task: BRAIN_DUMP -> TODO -> IN_PROGRESS
//! -> DONE. Only transitions into IN_PROGRESS are gated (WIP admission and the
//! soft energy check); everything else is accepted. The machine never mutates
//! its input: an accepted transition returns the updated task, a rejected one
//! returns a [`Rejection`] and nothing changes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::checkin::UserState;
use crate::fields::*;
use crate::task::{StartContext, Task};

/// Why a requested change was not applied. These are outcomes to show the
/// user, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("task is already in that column")]
    NoOp,

    #[error("WIP limit reached ({active}/{limit}): finish something before starting something new")]
    WipLimitReached { active: usize, limit: u32 },

    #[error("energy is low and this task needs high energy; start declined")]
    EnergyMismatchDeclined,

    #[error("deletion was not confirmed")]
    DeleteNotConfirmed,
}

impl Rejection {
    /// Stable reason code.
    pub fn code(self) -> &'static str {
        match self {
            Rejection::NoOp => "VALIDATION_NO_OP",
            Rejection::WipLimitReached { .. } => "ADMISSION_DENIED_WIP",
            Rejection::EnergyMismatchDeclined => "ENERGY_MISMATCH_DECLINED",
            Rejection::DeleteNotConfirmed => "DELETE_NOT_CONFIRMED",
        }
    }

    /// No-ops are ignored silently; everything else deserves a notice.
    pub fn is_silent(self) -> bool {
        self == Rejection::NoOp
    }
}

/// How a (from, to) pair is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    NoOp,
    Open,
    Gated,
}

/// The transition table.
pub fn rule(from: Status, to: Status) -> Rule {
    use Status::*;
    match (from, to) {
        (a, b) if a == b => Rule::NoOp,
        (BrainDump | Todo | Done, InProgress) => Rule::Gated,
        (_, BrainDump | Todo | Done) => Rule::Open,
        (InProgress, InProgress) => Rule::NoOp,
    }
}

/// Shown to the user before starting a demanding task on low energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyWarning {
    pub task_id: u64,
    pub user_energy: EnergyLevel,
    pub required_energy: EnergyLevel,
}

impl EnergyWarning {
    pub fn message(&self) -> String {
        format!(
            "Your energy is {} but this task needs {} focus. Start it anyway?",
            self.user_energy.label().to_lowercase(),
            self.required_energy.label().to_lowercase()
        )
    }
}

/// Everything a transition decision reads besides the task itself.
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    pub wip_limit: u32,
    pub user_state: Option<&'a UserState>,
    pub tasks: &'a [Task],
    pub now: DateTime<Utc>,
    pub reopen_policy: ReopenPolicy,
    /// Partition given to a task leaving the brain dump without one.
    pub placement: BoardContext,
}

/// An accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub task: Task,
    pub from: Status,
    pub to: Status,
    pub first_start: bool,
}

impl Transition {
    /// Completion side effects are owed for this transition.
    pub fn completes(&self) -> bool {
        self.to == Status::Done
    }
}

/// Count of non-blocked tasks in progress across the whole board.
pub fn active_wip_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| t.is_active_wip()).count()
}

/// The warning to raise if starting `task` now would mismatch energy.
pub fn energy_warning(task: &Task, user_state: Option<&UserState>) -> Option<EnergyWarning> {
    let state = user_state?;
    (state.energy == EnergyLevel::Low && task.required_energy == EnergyLevel::High).then_some(EnergyWarning {
        task_id: task.id,
        user_energy: state.energy,
        required_energy: task.required_energy,
    })
}

/// Check whether `task` may move to `target`. `confirm` is called only when
/// the energy check trips, and at most once.
pub fn attempt_transition<F>(task: &Task, target: Status, gate: &Gate<'_>, confirm: F) -> Result<Transition, Rejection>
where
    F: FnOnce(&EnergyWarning) -> bool,
{
    match rule(task.status, target) {
        Rule::NoOp => return Err(Rejection::NoOp),
        Rule::Open => {}
        Rule::Gated => {
            let active = active_wip_count(gate.tasks);
            if active >= gate.wip_limit as usize {
                return Err(Rejection::WipLimitReached { active, limit: gate.wip_limit });
            }
            if let Some(warning) = energy_warning(task, gate.user_state) {
                if !confirm(&warning) {
                    return Err(Rejection::EnergyMismatchDeclined);
                }
            }
        }
    }

    let mut next = task.clone();
    next.status = target;

    let first_start = target == Status::InProgress && task.started_at.is_none();
    if first_start {
        next.started_at = Some(gate.now);
        // Captured once; a second start never overwrites it.
        if next.start_context.is_none() {
            next.start_context = gate.user_state.map(StartContext::from);
        }
    }

    if target == Status::Done {
        next.completed_at = Some(gate.now);
    } else if task.status == Status::Done && gate.reopen_policy == ReopenPolicy::ClearCompletedAt {
        next.completed_at = None;
    }

    if target == Status::BrainDump {
        next.board_context = None;
    } else if next.board_context.is_none() {
        next.board_context = Some(gate.placement.placement());
    }

    Ok(Transition { task: next, from: task.status, to: target, first_start })
}

/// Column reached by an explicit previous/next move, if there is one.
pub fn adjacent_status(status: Status, direction: MoveDirection) -> Option<Status> {
    match (status, direction) {
        (Status::Todo, MoveDirection::Next) => Some(Status::InProgress),
        (Status::InProgress, MoveDirection::Next) => Some(Status::Done),
        (Status::InProgress, MoveDirection::Prev) => Some(Status::Todo),
        (Status::Done, MoveDirection::Prev) => Some(Status::InProgress),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn task(id: u64, status: Status) -> Task {
        let mut t = Task::new(id, &format!("task {id}"), now());
        t.status = status;
        if status.is_on_board() {
            t.board_context = Some(BoardContext::Personal);
        }
        t
    }

    fn gate<'a>(tasks: &'a [Task], limit: u32, state: Option<&'a UserState>) -> Gate<'a> {
        Gate {
            wip_limit: limit,
            user_state: state,
            tasks,
            now: now(),
            reopen_policy: ReopenPolicy::KeepCompletedAt,
            placement: BoardContext::Together,
        }
    }

    fn yes(_: &EnergyWarning) -> bool {
        true
    }

    fn no(_: &EnergyWarning) -> bool {
        false
    }

    #[test]
    fn test_same_status_is_noop() {
        let t = task(1, Status::Todo);
        let err = attempt_transition(&t, Status::Todo, &gate(&[], 2, None), yes).unwrap_err();
        assert_eq!(err, Rejection::NoOp);
        assert!(err.is_silent());
        assert_eq!(err.code(), "VALIDATION_NO_OP");
    }

    #[test]
    fn test_wip_admission_control() {
        let mut tasks = vec![task(1, Status::InProgress), task(2, Status::InProgress), task(3, Status::Todo)];
        let err = attempt_transition(&tasks[2], Status::InProgress, &gate(&tasks, 2, None), yes).unwrap_err();
        assert_eq!(err, Rejection::WipLimitReached { active: 2, limit: 2 });
        assert_eq!(err.code(), "ADMISSION_DENIED_WIP");

        let done = attempt_transition(&tasks[0], Status::Done, &gate(&tasks, 2, None), yes).unwrap();
        tasks[0] = done.task;
        let ok = attempt_transition(&tasks[2], Status::InProgress, &gate(&tasks, 2, None), yes).unwrap();
        assert_eq!(ok.task.status, Status::InProgress);
    }

    #[test]
    fn test_blocked_tasks_do_not_count() {
        let mut tasks = vec![task(1, Status::InProgress), task(2, Status::Todo)];
        tasks[0].is_blocked = true;
        assert_eq!(active_wip_count(&tasks), 0);
        assert!(attempt_transition(&tasks[1], Status::InProgress, &gate(&tasks, 1, None), yes).is_ok());
    }

    #[test]
    fn test_energy_gate() {
        let low = UserState::new(Mood::Tired, EnergyLevel::Low);
        let mut t = task(1, Status::Todo);
        t.required_energy = EnergyLevel::High;
        let tasks = vec![t.clone()];

        let err = attempt_transition(&t, Status::InProgress, &gate(&tasks, 3, Some(&low)), no).unwrap_err();
        assert_eq!(err, Rejection::EnergyMismatchDeclined);

        let ok = attempt_transition(&t, Status::InProgress, &gate(&tasks, 3, Some(&low)), yes).unwrap();
        assert_eq!(ok.task.start_context, Some(StartContext { mood: Mood::Tired, energy: EnergyLevel::Low }));
        assert_eq!(ok.task.started_at, Some(now()));
        assert!(ok.first_start);
    }

    #[test]
    fn test_confirm_not_called_without_mismatch() {
        let high = UserState::new(Mood::Calm, EnergyLevel::High);
        let mut t = task(1, Status::Todo);
        t.required_energy = EnergyLevel::High;
        let result = attempt_transition(&t, Status::InProgress, &gate(&[], 3, Some(&high)), |_| {
            panic!("confirmation should not be requested")
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_wip_checked_before_energy() {
        let low = UserState::new(Mood::Tired, EnergyLevel::Low);
        let tasks = vec![task(1, Status::InProgress)];
        let mut t = task(2, Status::Todo);
        t.required_energy = EnergyLevel::High;
        let err = attempt_transition(&t, Status::InProgress, &gate(&tasks, 1, Some(&low)), |_| {
            panic!("confirmation should not be requested")
        })
        .unwrap_err();
        assert!(matches!(err, Rejection::WipLimitReached { .. }));
    }

    #[test]
    fn test_started_at_set_once() {
        let calm = UserState::new(Mood::Calm, EnergyLevel::High);
        let t = task(1, Status::Todo);
        let first = attempt_transition(&t, Status::InProgress, &gate(&[], 3, Some(&calm)), yes).unwrap().task;
        let back = attempt_transition(&first, Status::Todo, &gate(&[], 3, Some(&calm)), yes).unwrap().task;

        let tired = UserState::new(Mood::Tired, EnergyLevel::Medium);
        let mut later = gate(&[], 3, Some(&tired));
        later.now = now() + Duration::hours(2);
        let again = attempt_transition(&back, Status::InProgress, &later, yes).unwrap();
        assert!(!again.first_start);
        assert_eq!(again.task.started_at, Some(now()));
        assert_eq!(again.task.start_context, Some(StartContext { mood: Mood::Calm, energy: EnergyLevel::High }));
    }

    #[test]
    fn test_completed_at_updated_on_each_completion() {
        let t = task(1, Status::InProgress);
        let done = attempt_transition(&t, Status::Done, &gate(&[], 3, None), yes).unwrap();
        assert!(done.completes());
        assert_eq!(done.task.completed_at, Some(now()));

        let mut later = gate(&[], 3, None);
        later.now = now() + Duration::days(1);
        let reopened = attempt_transition(&done.task, Status::InProgress, &later, yes).unwrap().task;
        assert_eq!(reopened.completed_at, Some(now()), "kept by default policy");

        let redone = attempt_transition(&reopened, Status::Done, &later, yes).unwrap().task;
        assert_eq!(redone.completed_at, Some(later.now));
    }

    #[test]
    fn test_clear_completed_at_policy() {
        let mut t = task(1, Status::Done);
        t.completed_at = Some(now());
        let mut g = gate(&[], 3, None);
        g.reopen_policy = ReopenPolicy::ClearCompletedAt;
        let reopened = attempt_transition(&t, Status::Todo, &g, yes).unwrap().task;
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn test_board_context_follows_brain_dump() {
        let t = task(1, Status::BrainDump);
        let mut g = gate(&[], 3, None);
        g.placement = BoardContext::Work;
        let placed = attempt_transition(&t, Status::Todo, &g, yes).unwrap().task;
        assert_eq!(placed.board_context, Some(BoardContext::Work));
        let back = attempt_transition(&placed, Status::BrainDump, &g, yes).unwrap().task;
        assert!(back.board_context.is_none());
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(rule(Status::Done, Status::InProgress), Rule::Gated);
        assert_eq!(rule(Status::InProgress, Status::Todo), Rule::Open);
        assert_eq!(rule(Status::BrainDump, Status::Todo), Rule::Open);
        assert_eq!(rule(Status::Done, Status::Done), Rule::NoOp);
    }

    #[test]
    fn test_adjacent_moves() {
        assert_eq!(adjacent_status(Status::Todo, MoveDirection::Next), Some(Status::InProgress));
        assert_eq!(adjacent_status(Status::Done, MoveDirection::Prev), Some(Status::InProgress));
        assert_eq!(adjacent_status(Status::Todo, MoveDirection::Prev), None);
        assert_eq!(adjacent_status(Status::BrainDump, MoveDirection::Next), None);
        assert_eq!(adjacent_status(Status::Done, MoveDirection::Next), None);
    }
}
