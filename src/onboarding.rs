//! First-run demo content.

use chrono::{DateTime, Duration, Utc};

use crate::fields::*;
use crate::task::Task;

pub const TUTORIAL_CATEGORY: &str = "Tutorial";

/// Three tutorial cards placed in To Do. `next_id` is advanced past every id handed out.
pub fn demo_tasks(next_id: &mut u64, now: DateTime<Utc>) -> Vec<Task> {
    let cards = [
        (
            "Welcome! Move me to In Progress",
            "This is a kanban board. Work flows left to right. Try moving this card into the middle column.",
            Priority::High,
            EnergyLevel::Medium,
            5,
            0,
        ),
        (
            "This task needs high energy",
            "If you try to start it while your energy is low you will be asked to confirm. It protects your focus.",
            Priority::Medium,
            EnergyLevel::High,
            45,
            1,
        ),
        (
            "Try to overfill In Progress",
            "The board enforces a work-in-progress limit based on your check-in. Go past it and the move is refused.",
            Priority::Low,
            EnergyLevel::Low,
            15,
            2,
        ),
    ];

    cards
        .into_iter()
        .map(|(title, description, priority, energy, minutes, age_secs)| {
            let id = *next_id;
            *next_id += 1;
            let mut task = Task::new(id, title, now - Duration::seconds(age_secs));
            task.description = Some(description.to_string());
            task.category = TUTORIAL_CATEGORY.to_string();
            task.priority = priority;
            task.required_energy = energy;
            task.estimated_minutes = Some(minutes);
            task.status = Status::Todo;
            task.board_context = Some(BoardContext::Personal);
            task
        })
        .collect()
}
