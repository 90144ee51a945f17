//! Persisted application snapshot and its storage.
//!
//! A snapshot holds everything that survives a restart. It is always read
//! through a tolerant raw shape and migrated into the canonical form, so older
//! or hand-edited files load as long as they are valid JSON.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkin::UserState;
use crate::error::Result;
use crate::fields::*;
use crate::settings::SystemSettings;
use crate::task::{StartContext, Subtask, Task, DEFAULT_CATEGORY, UNTITLED};
use crate::wip;

pub const SNAPSHOT_VERSION: u32 = 1;
pub const DEFAULT_WIP_LIMIT: u32 = 2;

/// Canonical persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Never decreases, so deleted ids are not handed out again.
    pub next_task_id: u64,
    pub tasks: Vec<Task>,
    pub user_state: Option<UserState>,
    pub check_in_history: Vec<UserState>,
    pub wip_limit: u32,
    pub settings: SystemSettings,
    pub daily_intention: String,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            next_task_id: 1,
            tasks: Vec::new(),
            user_state: None,
            check_in_history: Vec::new(),
            wip_limit: DEFAULT_WIP_LIMIT,
            settings: SystemSettings::default(),
            daily_intention: String::new(),
        }
    }
}

impl Snapshot {
    /// Parse and migrate snapshot JSON of any version.
    pub fn parse(text: &str, now: DateTime<Utc>) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(text)?;
        Ok(migrate(raw, now))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Tolerant raw shapes
// ---------------------------------------------------------------------------
//
// Every field is read as a bare JSON value and converted on its own, so one
// bad value costs that field its default and nothing else.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSnapshot {
    version: Option<Value>,
    #[serde(alias = "nextTaskId")]
    next_task_id: Option<Value>,
    tasks: Option<Value>,
    #[serde(alias = "userState")]
    user_state: Option<Value>,
    #[serde(alias = "checkInHistory")]
    check_in_history: Option<Value>,
    #[serde(alias = "wipLimit")]
    wip_limit: Option<Value>,
    settings: Option<Value>,
    #[serde(alias = "dailyIntention")]
    daily_intention: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTask {
    id: Option<Value>,
    #[serde(alias = "content")]
    title: Option<Value>,
    description: Option<Value>,
    category: Option<Value>,
    priority: Option<Value>,
    #[serde(alias = "requiredEnergy")]
    required_energy: Option<Value>,
    status: Option<Value>,
    #[serde(alias = "isBlocked")]
    is_blocked: Option<Value>,
    #[serde(alias = "createdAt")]
    created_at: Option<Value>,
    #[serde(alias = "startedAt")]
    started_at: Option<Value>,
    #[serde(alias = "completedAt")]
    completed_at: Option<Value>,
    #[serde(alias = "startContext")]
    start_context: Option<Value>,
    #[serde(alias = "estimatedDuration")]
    estimated_minutes: Option<Value>,
    subtasks: Option<Value>,
    #[serde(alias = "boardContext")]
    board_context: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSubtask {
    id: Option<Value>,
    #[serde(alias = "title", alias = "text")]
    label: Option<Value>,
    #[serde(alias = "isCompleted")]
    is_completed: Option<Value>,
}

/// Largest id accepted from disk. Anything above is treated as missing so the
/// counter always has room to grow.
pub const MAX_TASK_ID: u64 = (1 << 53) - 1;

/// Decode one value, dropping it if it does not fit `T`.
fn typed<T: DeserializeOwned>(value: Option<Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn task_id(value: Option<&Value>) -> Option<u64> {
    value?.as_u64().filter(|id| (1..=MAX_TASK_ID).contains(id))
}

/// Positive whole minutes. Fractions are rounded.
fn minutes(value: Option<&Value>) -> Option<u32> {
    let v = value?;
    let m = match v.as_u64() {
        Some(m) => m,
        None => {
            let f = v.as_f64()?.round();
            if !f.is_finite() || f < 0.0 || f > f64::from(u32::MAX) {
                return None;
            }
            f as u64
        }
    };
    u32::try_from(m).ok().filter(|m| *m > 0)
}

/// Decode each array element on its own, skipping the ones that do not fit.
fn each<T: DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else { return Vec::new() };
    let total = items.len();
    let kept: Vec<T> = items.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect();
    if kept.len() < total {
        tracing::warn!(what, dropped = total - kept.len(), "skipped unreadable entries");
    }
    kept
}

/// Accepts RFC 3339 strings and epoch milliseconds.
fn parse_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn migrate(raw: RawSnapshot, now: DateTime<Utc>) -> Snapshot {
    let version = typed::<u32>(raw.version).unwrap_or(0);
    if version > SNAPSHOT_VERSION {
        tracing::warn!(found = version, supported = SNAPSHOT_VERSION, "snapshot is newer than this build");
    }

    let raw_tasks: Vec<RawTask> = each(raw.tasks, "tasks");
    let max_id = raw_tasks.iter().filter_map(|t| task_id(t.id.as_ref())).max().unwrap_or(0);
    let stored_next = raw.next_task_id.as_ref().and_then(Value::as_u64).filter(|n| *n <= MAX_TASK_ID + 1);
    let mut next_id = stored_next.unwrap_or(0).max(max_id + 1).max(1);
    let mut seen: HashSet<u64> = HashSet::new();
    let mut reclassified = 0usize;

    let tasks: Vec<Task> = raw_tasks
        .into_iter()
        .map(|rt| {
            let id = match task_id(rt.id.as_ref()) {
                Some(id) if seen.insert(id) => id,
                _ => {
                    let id = next_id;
                    next_id += 1;
                    seen.insert(id);
                    id
                }
            };

            let category = text(rt.category).map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
            let status = match text(rt.status).as_deref().and_then(Status::parse) {
                Some(Status::Todo) if category.is_none() => {
                    reclassified += 1;
                    Status::BrainDump
                }
                Some(status) => status,
                None => {
                    reclassified += 1;
                    Status::BrainDump
                }
            };

            let board_context = if status.is_on_board() {
                Some(typed::<BoardContext>(rt.board_context).unwrap_or_default().placement())
            } else {
                None
            };

            let subtasks = each::<RawSubtask>(rt.subtasks, "subtasks")
                .into_iter()
                .enumerate()
                .map(|(i, s)| Subtask {
                    id: s.id.as_ref().and_then(Value::as_u64).unwrap_or(i as u64 + 1),
                    label: text(s.label).unwrap_or_default(),
                    is_completed: s.is_completed.as_ref().and_then(Value::as_bool).unwrap_or(false),
                })
                .collect::<Vec<_>>();

            Task {
                id,
                title: text(rt.title).map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).unwrap_or_else(|| UNTITLED.to_string()),
                description: text(rt.description).filter(|d| !d.trim().is_empty()),
                category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                priority: typed(rt.priority).unwrap_or_default(),
                required_energy: typed(rt.required_energy).unwrap_or_default(),
                status,
                is_blocked: rt.is_blocked.as_ref().and_then(Value::as_bool).unwrap_or(false),
                created_at: parse_time(rt.created_at.as_ref()).unwrap_or(now),
                started_at: parse_time(rt.started_at.as_ref()),
                completed_at: parse_time(rt.completed_at.as_ref()),
                start_context: typed::<StartContext>(rt.start_context),
                estimated_minutes: minutes(rt.estimated_minutes.as_ref()),
                subtasks: dedup_subtask_ids(subtasks),
                board_context,
            }
        })
        .collect();

    if reclassified > 0 {
        tracing::info!(count = reclassified, "moved legacy tasks into the brain dump");
    }

    let settings = match raw.settings.map(serde_json::from_value::<SystemSettings>) {
        None => SystemSettings::default(),
        Some(Ok(s)) if s.validate().is_ok() => s,
        Some(Ok(_)) | Some(Err(_)) => {
            tracing::warn!("stored settings are invalid, using defaults");
            SystemSettings::default()
        }
    };

    let user_state: Option<UserState> = typed(raw.user_state);
    // A stored limit is only trusted when nothing better is known.
    let wip_limit = match &user_state {
        Some(us) => wip::calculate_wip_limit(us.mood, us.energy, &settings),
        None => typed::<u32>(raw.wip_limit).filter(|l| *l > 0).unwrap_or(DEFAULT_WIP_LIMIT),
    };

    Snapshot {
        version: SNAPSHOT_VERSION,
        next_task_id: next_id,
        tasks,
        user_state,
        check_in_history: each(raw.check_in_history, "check-in history"),
        wip_limit,
        settings,
        daily_intention: text(raw.daily_intention).unwrap_or_default(),
    }
}

fn dedup_subtask_ids(mut subtasks: Vec<Subtask>) -> Vec<Subtask> {
    let mut seen = HashSet::new();
    let mut next = subtasks.iter().map(|s| s.id).max().unwrap_or(0) + 1;
    for s in subtasks.iter_mut() {
        if !seen.insert(s.id) {
            s.id = next;
            seen.insert(next);
            next += 1;
        }
    }
    subtasks
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where snapshots are read from and written to.
pub trait SnapshotStore {
    /// `Ok(None)` when there is nothing usable to load.
    fn load(&self, now: DateTime<Utc>) -> Result<Option<Snapshot>>;

    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn quarantine(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self, now: DateTime<Utc>) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        match Snapshot::parse(&text, now) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let aside = self.quarantine();
                tracing::warn!(path = %self.path.display(), moved_to = %aside.display(), error = %e, "unreadable snapshot, starting fresh");
                fs::rename(&self.path, &aside)?;
                Ok(None)
            }
        }
    }

    /// Atomic-ish write via temp + rename.
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = snapshot.to_json()?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store holding the serialized JSON, for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStore {
    json: RefCell<Option<String>>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(text: &str) -> Self {
        MemoryStore { json: RefCell::new(Some(text.to_string())), saves: Cell::new(0) }
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn json(&self) -> Option<String> {
        self.json.borrow().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, now: DateTime<Utc>) -> Result<Option<Snapshot>> {
        match self.json.borrow().as_deref() {
            None => Ok(None),
            Some(text) => match Snapshot::parse(text, now) {
                Ok(s) => Ok(Some(s)),
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable snapshot, starting fresh");
                    Ok(None)
                }
            },
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.json.borrow_mut() = Some(snapshot.to_json()?);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_migration_defaults_missing_fields() {
        let text = r#"{
            "tasks": [
                {"id": 4, "title": "has category", "status": "TODO", "category": "Work"},
                {"id": 9, "title": "legacy todo", "status": "TODO"},
                {"title": "no id", "status": "IN_PROGRESS", "category": "Home"},
                {"id": 4, "title": "duplicate id", "status": "mystery"}
            ]
        }"#;
        let s = Snapshot::parse(text, now()).unwrap();
        let ids: Vec<u64> = s.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 9, 10, 11]);
        assert_eq!(s.next_task_id, 12);

        assert_eq!(s.tasks[0].status, Status::Todo);
        assert_eq!(s.tasks[0].board_context, Some(BoardContext::Personal));
        assert_eq!(s.tasks[1].status, Status::BrainDump);
        assert_eq!(s.tasks[1].category, DEFAULT_CATEGORY);
        assert!(s.tasks[1].board_context.is_none());
        assert_eq!(s.tasks[2].status, Status::InProgress);
        assert_eq!(s.tasks[3].status, Status::BrainDump);
        assert!(s.tasks.iter().all(|t| t.priority == Priority::Medium && t.subtasks.is_empty()));
        assert_eq!(s.wip_limit, DEFAULT_WIP_LIMIT);
        assert_eq!(s.settings, SystemSettings::default());
    }

    #[test]
    fn test_migration_reads_original_camel_case_shape() {
        let text = r#"{
            "tasks": [{
                "id": "5f1c0b9e-uuid", "content": "Plan week", "status": "DONE",
                "category": "Work", "priority": "URGENT", "requiredEnergy": "HIGH",
                "createdAt": 1699999000000, "completedAt": 1700000000000,
                "boardContext": "WORK", "isBlocked": false,
                "subtasks": [{"id": "a", "title": "draft", "isCompleted": true}]
            }],
            "userState": {"mood": "CALM", "energy": "HIGH"},
            "wipLimit": 3,
            "dailyIntention": "ship it"
        }"#;
        let s = Snapshot::parse(text, now()).unwrap();
        let t = &s.tasks[0];
        assert_eq!(t.id, 1);
        assert_eq!(t.title, "Plan week");
        assert_eq!(t.priority, Priority::Urgent);
        assert_eq!(t.required_energy, EnergyLevel::High);
        assert_eq!(t.completed_at, DateTime::from_timestamp_millis(1_700_000_000_000));
        assert_eq!(t.board_context, Some(BoardContext::Work));
        assert_eq!(t.subtasks[0].label, "draft");
        assert!(t.subtasks[0].is_completed);
        assert_eq!(s.wip_limit, 3);
        assert_eq!(s.daily_intention, "ship it");
        assert_eq!(s.user_state.map(|u| u.mood), Some(Mood::Calm));
    }

    #[test]
    fn test_canonical_snapshot_survives_reload() {
        let mut snap = Snapshot::default();
        let mut t = Task::new(1, "a", now());
        t.status = Status::Done;
        t.board_context = Some(BoardContext::Work);
        t.completed_at = Some(now());
        snap.tasks.push(t);
        snap.next_task_id = 5;
        let again = Snapshot::parse(&snap.to_json().unwrap(), now()).unwrap();
        assert_eq!(again, snap);
    }

    #[test]
    fn test_invalid_settings_fall_back() {
        let text = r#"{"settings": {"wip_limits": {"protective": 5, "sustainable": 1, "max": 2}}}"#;
        let s = Snapshot::parse(text, now()).unwrap();
        assert_eq!(s.settings, SystemSettings::default());
    }

    #[test]
    fn test_memory_store_counts_saves_and_recovers() {
        let store = MemoryStore::with_json("{ not json");
        assert!(store.load(now()).unwrap().is_none());
        store.save(&Snapshot::default()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.load(now()).unwrap().is_some());
    }

    #[test]
    fn test_out_of_range_ids_get_fresh_ones() {
        let text = r#"{
            "tasks": [
                {"id": 18446744073709551615, "title": "huge", "status": "TODO", "category": "Work"},
                {"id": 7, "title": "normal", "status": "TODO", "category": "Work"}
            ],
            "next_task_id": 18446744073709551615
        }"#;
        let s = Snapshot::parse(text, now()).unwrap();
        let ids: Vec<u64> = s.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![8, 7]);
        assert_eq!(s.next_task_id, 9);
    }

    #[test]
    fn test_stored_limit_follows_check_in_and_settings() {
        let text = r#"{
            "userState": {"mood": "CALM", "energy": "HIGH"},
            "wipLimit": 9,
            "settings": {"wip_limits": {"protective": 4, "sustainable": 1, "max": 2}}
        }"#;
        let s = Snapshot::parse(text, now()).unwrap();
        assert_eq!(s.settings, SystemSettings::default());
        assert_eq!(s.wip_limit, 3);

        let no_check_in = Snapshot::parse(r#"{"wipLimit": 4}"#, now()).unwrap();
        assert_eq!(no_check_in.wip_limit, 4);
    }

    #[test]
    fn test_bad_field_only_costs_that_field() {
        let text = r#"{
            "tasks": [
                {"id": 1, "title": "fine", "status": "TODO", "category": "Work", "estimatedDuration": 7.5},
                {"id": 2, "title": "odd", "status": "TODO", "category": "Work",
                 "priority": "sometimes", "requiredEnergy": 3, "boardContext": "MOON",
                 "startContext": "yesterday", "isBlocked": "no", "subtasks": [1, {"title": "kept"}]},
                "not a task"
            ],
            "checkInHistory": [{"mood": "CALM", "energy": "LOW"}, {"mood": "GRUMPY"}]
        }"#;
        let s = Snapshot::parse(text, now()).unwrap();
        assert_eq!(s.tasks.len(), 2);
        assert_eq!(s.tasks[0].estimated_minutes, Some(8));

        let odd = &s.tasks[1];
        assert_eq!(odd.title, "odd");
        assert_eq!(odd.priority, Priority::Medium);
        assert_eq!(odd.required_energy, EnergyLevel::Medium);
        assert_eq!(odd.board_context, Some(BoardContext::Personal));
        assert!(odd.start_context.is_none());
        assert!(!odd.is_blocked);
        assert_eq!(odd.subtasks.len(), 1);
        assert_eq!(odd.subtasks[0].label, "kept");
        assert_eq!(s.check_in_history.len(), 1);
    }
}

