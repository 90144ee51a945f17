//! Snapshot persistence and recovery tests.
//!
//! Each test drives `App` against a real JSON file in a temporary directory
//! and reopens it to check what survived.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use glowup::app::App;
use glowup::db::{JsonFileStore, SnapshotStore, DEFAULT_WIP_LIMIT};
use glowup::fields::*;
use glowup::onboarding::TUTORIAL_CATEGORY;
use glowup::task::DEFAULT_CATEGORY;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn open(path: &Path) -> App<JsonFileStore> {
    App::open(JsonFileStore::new(path), t0()).unwrap()
}

#[test]
fn first_run_seeds_tutorial_and_writes_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let app = open(&path);
    assert!(path.exists());
    assert_eq!(app.tasks().len(), 3);
    assert!(app.tasks().iter().all(|t| t.category == TUTORIAL_CATEGORY && t.status == Status::Todo));
    assert!(app.user_state().is_none());

    // A second start with tasks already present does not seed again.
    let again = open(&path);
    assert_eq!(again.tasks().len(), 3);
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let deleted;
    {
        let mut app = open(&path);
        app.check_in(Mood::Focused, EnergyLevel::High, Some("slept well".into()), t0());
        app.set_intention("ship the draft");
        let ids = app.brain_dump("outline\nreferences", t0());
        app.add_to_board(ids[0], t0()).unwrap();
        app.move_task(ids[0], Status::InProgress, t0(), |_| true).unwrap();
        deleted = ids[1];
        app.delete_task(deleted, true).unwrap();
        assert!(app.take_save_error().is_none());
    }

    let mut app = open(&path);
    let us = app.user_state().unwrap();
    assert_eq!((us.mood, us.energy), (Mood::Focused, EnergyLevel::High));
    assert_eq!(us.note.as_deref(), Some("slept well"));
    assert_eq!(app.wip_limit(), 3);
    assert_eq!(app.daily_intention(), "ship the draft");
    assert_eq!(app.check_in_history().len(), 1);

    let started = app.tasks().iter().find(|t| t.title == "outline").unwrap();
    assert_eq!(started.status, Status::InProgress);
    assert_eq!(started.started_at, Some(t0()));
    assert_eq!(started.start_context.map(|c| c.mood), Some(Mood::Focused));

    let fresh = app.brain_dump("new thing", t0())[0];
    assert!(fresh > deleted, "deleted ids are not handed out again");
}

#[test]
fn legacy_snapshot_is_migrated() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{
            "tasks": [
                {"id": "a1", "content": "Old idea", "status": "TODO"},
                {"id": "b2", "content": "Planned", "status": "TODO", "category": "Work", "boardContext": "WORK"},
                {"id": "c3", "content": "Doing", "status": "IN_PROGRESS", "category": "Home", "priority": "HIGH"}
            ],
            "userState": {"mood": "TIRED", "energy": "MEDIUM"}
        }"#,
    )
    .unwrap();

    let app = open(&path);
    assert_eq!(app.tasks().len(), 3, "no tutorial once a user state exists");

    let idea = app.tasks().iter().find(|t| t.title == "Old idea").unwrap();
    assert_eq!(idea.status, Status::BrainDump);
    assert_eq!(idea.category, DEFAULT_CATEGORY);
    assert_eq!(idea.priority, Priority::Medium);
    assert!(idea.board_context.is_none());

    let planned = app.tasks().iter().find(|t| t.title == "Planned").unwrap();
    assert_eq!(planned.status, Status::Todo);
    assert_eq!(planned.board_context, Some(BoardContext::Work));

    let doing = app.tasks().iter().find(|t| t.title == "Doing").unwrap();
    assert_eq!(doing.priority, Priority::High);
    assert_eq!(doing.board_context, Some(BoardContext::Personal));

    assert_eq!(app.wip_limit(), DEFAULT_WIP_LIMIT);
    let mut ids: Vec<u64> = app.tasks().iter().map(|t| t.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn corrupt_snapshot_is_moved_aside() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "{ this is not json").unwrap();

    let app = open(&path);
    assert_eq!(app.tasks().len(), 3, "falls back to a fresh start");

    let aside = dir.path().join("state.json.corrupt");
    assert_eq!(fs::read_to_string(aside).unwrap(), "{ this is not json");

    let reloaded = JsonFileStore::new(&path).load(t0()).unwrap().unwrap();
    assert_eq!(reloaded.tasks.len(), 3);
}

#[test]
fn one_bad_field_does_not_discard_the_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{
            "tasks": [
                {"id": 1, "content": "Keep me", "status": "TODO", "category": "Work"},
                {"id": 2, "content": "Half estimate", "status": "TODO", "category": "Work",
                 "estimatedDuration": 7.5, "priority": 5}
            ],
            "userState": {"mood": "CALM", "energy": "HIGH"},
            "dailyIntention": 42
        }"#,
    )
    .unwrap();

    let app = open(&path);
    assert!(!dir.path().join("state.json.corrupt").exists());
    assert_eq!(app.tasks().len(), 2, "no tutorial, nothing dropped");
    assert!(app.tasks().iter().any(|t| t.title == "Keep me"));

    let half = app.tasks().iter().find(|t| t.title == "Half estimate").unwrap();
    assert_eq!(half.estimated_minutes, Some(8));
    assert_eq!(half.priority, Priority::Medium);

    let us = app.user_state().unwrap();
    assert_eq!((us.mood, us.energy), (Mood::Calm, EnergyLevel::High));
    assert_eq!(app.wip_limit(), 3);
    assert_eq!(app.daily_intention(), "");
}

#[test]
fn completion_timestamps_persist() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let done_at = t0() + Duration::minutes(40);

    let id = {
        let mut app = open(&path);
        app.check_in(Mood::Calm, EnergyLevel::Medium, None, t0());
        let id = app.tasks()[0].id;
        app.move_task(id, Status::InProgress, t0(), |_| true).unwrap();
        app.move_task(id, Status::Done, done_at, |_| true).unwrap();
        id
    };

    let app = open(&path);
    let task = app.task(id).unwrap();
    assert_eq!(task.status, Status::Done);
    assert_eq!(task.completed_at, Some(done_at));
    assert_eq!(app.weekly_review(done_at).completed, 1);
}
