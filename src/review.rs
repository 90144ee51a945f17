//! Weekly reflection summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::checkin::UserState;
use crate::fields::{EnergyLevel, Mood, Status};
use crate::task::Task;

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReview {
    pub since: DateTime<Utc>,
    pub completed: usize,
    pub by_category: BTreeMap<String, usize>,
    /// Check-ins in the window, in `Mood::ALL` order.
    pub moods: Vec<(Mood, usize)>,
    pub energies: Vec<(EnergyLevel, usize)>,
    /// High-energy tasks finished after being started on low energy.
    pub pushed_through: usize,
    /// Mean minutes from first start to completion.
    pub average_cycle_minutes: Option<i64>,
}

/// Summarise the seven days before `now`. Check-ins without a timestamp are
/// not counted.
pub fn weekly_review(tasks: &[Task], history: &[UserState], now: DateTime<Utc>) -> WeeklyReview {
    let since = now - Duration::days(7);
    let finished: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status == Status::Done && t.completed_at.is_some_and(|c| c >= since && c <= now))
        .collect();

    let mut by_category = BTreeMap::new();
    for t in &finished {
        *by_category.entry(t.category.clone()).or_insert(0) += 1;
    }

    let pushed_through = finished
        .iter()
        .filter(|t| {
            t.required_energy == EnergyLevel::High
                && t.start_context.is_some_and(|c| c.energy == EnergyLevel::Low)
        })
        .count();

    let cycles: Vec<i64> = finished
        .iter()
        .filter_map(|t| Some((t.completed_at? - t.started_at?).num_minutes()))
        .collect();
    let average_cycle_minutes = (!cycles.is_empty()).then(|| cycles.iter().sum::<i64>() / cycles.len() as i64);

    let recent: Vec<&UserState> =
        history.iter().filter(|s| s.recorded_at.is_some_and(|at| at >= since && at <= now)).collect();
    let moods = Mood::ALL.iter().map(|&m| (m, recent.iter().filter(|s| s.mood == m).count())).collect();
    let energies = EnergyLevel::ALL
        .iter()
        .map(|&e| (e, recent.iter().filter(|s| s.energy == e).count()))
        .collect();

    WeeklyReview {
        since,
        completed: finished.len(),
        by_category,
        moods,
        energies,
        pushed_through,
        average_cycle_minutes,
    }
}
