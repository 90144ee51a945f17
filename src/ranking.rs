//! Smart backlog ordering and next-task selection.

use std::cmp::Ordering;

use crate::fields::{CandidatePool, EnergyLevel, Priority};
use crate::task::Task;

/// Total order used for the backlog.
///
/// Urgent first; then tasks whose required energy matches the user's; then
/// priority rank (High, Medium, Low); then oldest first. Ids break exact
/// timestamp ties so the order never depends on input order.
pub fn compare_for_backlog(a: &Task, b: &Task, energy: EnergyLevel) -> Ordering {
    let a_urgent = a.priority == Priority::Urgent;
    let b_urgent = b.priority == Priority::Urgent;
    let a_fits = a.required_energy == energy;
    let b_fits = b.required_energy == energy;

    b_urgent
        .cmp(&a_urgent)
        .then_with(|| b_fits.cmp(&a_fits))
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Return the tasks in backlog order. The input is left untouched.
pub fn sort_for_backlog<'a, I>(tasks: I, energy: EnergyLevel) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut sorted: Vec<&Task> = tasks.into_iter().collect();
    sorted.sort_by(|a, b| compare_for_backlog(a, b, energy));
    sorted
}

/// Whether a task may be suggested next under the given pool.
pub fn is_candidate(task: &Task, pool: CandidatePool) -> bool {
    !task.is_blocked && pool.admits(task.status)
}

/// Pick the single best task to do next, if any.
pub fn next_optimal_task(tasks: &[Task], energy: EnergyLevel, pool: CandidatePool) -> Option<&Task> {
    let best = tasks
        .iter()
        .filter(|t| is_candidate(t, pool))
        .min_by(|a, b| compare_for_backlog(a, b, energy));
    tracing::debug!(energy = %energy, pool = ?pool, suggested = ?best.map(|t| t.id), "next optimal task");
    best
}
