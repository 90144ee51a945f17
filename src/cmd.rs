//! Command implementations for the CLI interface.
//!
//! Each handler drives the shared [`App`] controller and prints the result.
//! Failures are reported on stderr with exit status 1; board refusals are
//! printed with their reason code.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use clap::Subcommand;
use clap_complete::{generate, Shell};

use glowup::app::{App, FocusEntry, Outcome};
use glowup::board::{EnergyWarning, Rejection};
use glowup::db::JsonFileStore;
use glowup::fields::*;
use glowup::settings::SystemSettings;
use glowup::task::{Task, TaskDraft, TaskPatch};

use crate::tui::run::run_board_tui;

type Board = App<JsonFileStore>;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive board.
    Ui,

    /// Show the current check-in, WIP usage and advice.
    Status,

    /// Record how you feel; recomputes the WIP limit.
    Checkin {
        #[arg(long, value_enum)]
        mood: Mood,
        #[arg(long, value_enum)]
        energy: EnergyLevel,
        /// Optional free-text note.
        #[arg(long)]
        note: Option<String>,
    },

    /// Inspect or change system settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Capture brain dump items, one per line. Reads stdin when no text is given.
    Dump {
        lines: Vec<String>,
    },

    /// Import a JSON array of partial tasks into the brain dump.
    Import {
        input: PathBuf,
    },

    /// Move a brain dump item onto the board.
    Triage {
        id: u64,
        /// Board to place it on; the combined view places on personal.
        #[arg(long, value_enum)]
        context: Option<BoardContext>,
    },

    /// List tasks.
    List {
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum, default_value_t = BoardContext::Together)]
        context: BoardContext,
        /// Include everything in Done, not only today's.
        #[arg(long)]
        all: bool,
    },

    /// View a single task.
    View {
        id: u64,
    },

    /// Move a task to a status.
    Move {
        id: u64,
        #[arg(value_enum)]
        status: Status,
        /// Start even if your energy is low.
        #[arg(long)]
        yes: bool,
    },

    /// Move a task one column right.
    Forward {
        id: u64,
        #[arg(long)]
        yes: bool,
    },

    /// Move a task one column left.
    Back {
        id: u64,
        #[arg(long)]
        yes: bool,
    },

    /// Edit task fields.
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        /// Pass an empty string to clear.
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, value_enum)]
        energy: Option<EnergyLevel>,
        /// Estimated minutes; 0 clears.
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long, value_enum)]
        context: Option<BoardContext>,
    },

    /// Mark a task blocked; it stops counting against WIP.
    Block {
        id: u64,
    },

    Unblock {
        id: u64,
    },

    /// Send a finished task back to To Do.
    Reopen {
        id: u64,
    },

    /// Delete a task.
    Delete {
        id: u64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Manage a task's checklist.
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Start a focus session on a task.
    Focus {
        id: u64,
        /// Session length when the task has no estimate.
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        yes: bool,
    },

    /// Finish a task and get a suggestion for what's next.
    Complete {
        id: u64,
    },

    /// Park a distracting thought in the brain dump.
    Capture {
        text: Vec<String>,
    },

    /// Show, set or clear today's intention.
    Intention {
        text: Vec<String>,
        #[arg(long)]
        clear: bool,
    },

    /// End the day: park everything in progress back in To Do.
    Shutdown,

    /// Start a new day: clear the intention.
    Wake,

    /// Summarise the last seven days.
    Review,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    Show,
    /// Write settings as TOML to a file or stdout.
    Export {
        output: Option<PathBuf>,
    },
    /// Replace settings from a TOML file.
    Load {
        file: PathBuf,
    },
    /// Change individual settings.
    Set {
        #[arg(long)]
        protective: Option<u32>,
        #[arg(long)]
        sustainable: Option<u32>,
        #[arg(long)]
        max: Option<u32>,
        #[arg(long, value_enum)]
        pool: Option<CandidatePool>,
        #[arg(long, value_enum)]
        reopen: Option<ReopenPolicy>,
        #[arg(long)]
        bridge_delay_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    Add {
        id: u64,
        label: Vec<String>,
    },
    Toggle {
        id: u64,
        subtask: u64,
    },
    Remove {
        id: u64,
        subtask: u64,
    },
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

fn or_exit<T>(result: glowup::Result<T>) -> T {
    result.unwrap_or_else(|e| fail(format!("Error: {e}")))
}

/// Print a refusal and exit unless it was a harmless no-op.
fn report_rejection(r: Rejection) {
    if r.is_silent() {
        println!("Nothing to do: {r}");
        return;
    }
    fail(format!("{r} [{}]", r.code()));
}

fn ask(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).is_ok() && matches!(line.trim(), "y" | "Y" | "yes")
}

fn energy_confirmation(yes: bool) -> impl FnOnce(&EnergyWarning) -> bool {
    move |warning: &EnergyWarning| yes || ask(&warning.message())
}

fn task_or_exit(app: &Board, id: u64) -> &Task {
    app.task(id).unwrap_or_else(|| fail(format!("Task {id} not found.")))
}

fn print_table(tasks: &[&Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    println!("{:>4}  {:<12} {:<7} {:<7} {:<10} {:<9} Title", "ID", "Status", "Prio", "Energy", "Category", "Board");
    for t in tasks {
        let board = t.board_context.map_or("-", |c| c.label());
        let blocked = if t.is_blocked { " (blocked)" } else { "" };
        println!(
            "{:>4}  {:<12} {:<7} {:<7} {:<10} {:<9} {}{}",
            t.id,
            t.status.label(),
            t.priority.label(),
            t.required_energy.label(),
            t.category,
            board,
            t.title,
            blocked
        );
    }
}

/// Launch the terminal user interface.
pub fn cmd_ui(app: Board) -> Board {
    match run_board_tui(app) {
        Ok(app) => app,
        Err(e) => fail(format!("UI error: {e}")),
    }
}

pub fn cmd_status(app: &Board) {
    match app.user_state() {
        Some(us) => println!("Check-in:   {} / {} energy", us.mood, us.energy),
        None => println!("Check-in:   none yet (glowup checkin --mood calm --energy medium)"),
    }
    println!("WIP:        {}/{} ({})", app.active_wip_count(), app.wip_limit(), app.wip_mode().label());
    println!("Advice:     {}", app.advice());
    let intention = app.daily_intention();
    println!("Intention:  {}", if intention.is_empty() { "-" } else { intention });
    println!("Brain dump: {} item(s)", app.brain_dump_items().len());
    if let Some(next) = app.suggest_next() {
        println!("Up next:    #{} {}", next.id, next.title);
    }
}

pub fn cmd_checkin(app: &mut Board, mood: Mood, energy: EnergyLevel, note: Option<String>, now: DateTime<Utc>) {
    let limit = app.check_in(mood, energy, note, now);
    println!("Checked in as {mood} with {energy} energy. WIP limit: {limit} ({}).", app.wip_mode().label());
    println!("{}", app.advice());
}

pub fn cmd_settings(app: &mut Board, action: SettingsAction) {
    match action {
        SettingsAction::Show => print!("{}", or_exit(app.settings().to_toml_string())),
        SettingsAction::Export { output } => {
            let text = or_exit(app.settings().to_toml_string());
            match output {
                Some(path) => {
                    if let Err(e) = fs::write(&path, text) {
                        fail(format!("Failed to write {}: {e}", path.display()));
                    }
                    println!("Settings exported to {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        SettingsAction::Load { file } => {
            let settings = or_exit(SystemSettings::load_file(&file));
            or_exit(app.update_settings(settings));
            println!("Settings loaded. WIP limit: {}", app.wip_limit());
        }
        SettingsAction::Set { protective, sustainable, max, pool, reopen, bridge_delay_ms } => {
            let mut s = app.settings().clone();
            if let Some(v) = protective { s.wip_limits.protective = v; }
            if let Some(v) = sustainable { s.wip_limits.sustainable = v; }
            if let Some(v) = max { s.wip_limits.max = v; }
            if let Some(v) = pool { s.suggestion_pool = v; }
            if let Some(v) = reopen { s.reopen_policy = v; }
            if let Some(v) = bridge_delay_ms { s.bridge_delay_ms = v; }
            or_exit(app.update_settings(s));
            println!("Settings updated. WIP limit: {}", app.wip_limit());
        }
    }
}

pub fn cmd_dump(app: &mut Board, lines: Vec<String>, now: DateTime<Utc>) {
    let text = if lines.is_empty() {
        let mut buf = String::new();
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) => {
                    buf.push_str(&l);
                    buf.push('\n');
                }
                Err(e) => fail(format!("Failed to read stdin: {e}")),
            }
        }
        buf
    } else {
        lines.join("\n")
    };
    let ids = app.brain_dump(&text, now);
    println!("Captured {} item(s): {}", ids.len(), ids.iter().map(|i| format!("#{i}")).collect::<Vec<_>>().join(", "));
}

pub fn cmd_import(app: &mut Board, input: PathBuf, now: DateTime<Utc>) {
    let text = fs::read_to_string(&input).unwrap_or_else(|e| fail(format!("Failed to read {}: {e}", input.display())));
    let drafts: Vec<TaskDraft> =
        serde_json::from_str(&text).unwrap_or_else(|e| fail(format!("Invalid import file {}: {e}", input.display())));
    let ids = app.import_drafts(drafts, now);
    println!("Imported {} task(s) into the brain dump.", ids.len());
}

pub fn cmd_triage(app: &mut Board, id: u64, context: Option<BoardContext>, now: DateTime<Utc>) {
    if let Some(c) = context {
        app.set_board_context(c);
    }
    match or_exit(app.add_to_board(id, now)) {
        Outcome::Applied(_) => {
            let board = app.task(id).and_then(|t| t.board_context).map_or("-", |c| c.label());
            println!("Task {id} added to the {board} board.");
        }
        Outcome::Rejected(Rejection::NoOp) => fail(format!("Task {id} is not in the brain dump.")),
        Outcome::Rejected(r) => report_rejection(r),
    }
}

pub fn cmd_list(app: &mut Board, status: Option<Status>, context: BoardContext, all: bool, now: DateTime<Utc>) {
    app.set_board_context(context);
    let statuses: Vec<Status> = match status {
        Some(s) => vec![s],
        None => Status::ALL.to_vec(),
    };
    let mut rows: Vec<&Task> = Vec::new();
    for s in statuses {
        match s {
            Status::BrainDump => rows.extend(app.brain_dump_items()),
            Status::Done if all => {
                rows.extend(app.tasks().iter().filter(|t| t.status == Status::Done && t.in_context(context)))
            }
            other => rows.extend(app.column(other, now)),
        }
    }
    print_table(&rows);
}

pub fn cmd_view(app: &Board, id: u64) {
    let task = task_or_exit(app, id);
    let stamp = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "-".into())
    };
    println!("ID:          {}", task.id);
    println!("Title:       {}", task.title);
    println!("Status:      {}{}", task.status, if task.is_blocked { " (blocked)" } else { "" });
    println!("Category:    {}", task.category);
    println!("Priority:    {}", task.priority);
    println!("Energy:      {}", task.required_energy);
    println!("Board:       {}", task.board_context.map_or("-", |c| c.label()));
    println!("Estimate:    {}", task.estimated_minutes.map_or("-".to_string(), |m| format!("{m} min")));
    println!("Created:     {}", stamp(Some(task.created_at)));
    println!("Started:     {}", stamp(task.started_at));
    println!("Completed:   {}", stamp(task.completed_at));
    if let Some(ctx) = task.start_context {
        println!("Started as:  {} / {} energy", ctx.mood, ctx.energy);
    }
    println!("Description:\n{}\n", task.description.as_deref().unwrap_or("-"));
    if !task.subtasks.is_empty() {
        let (done, total) = task.progress();
        println!("Subtasks ({done}/{total}):");
        for s in &task.subtasks {
            println!("  [{}] {}. {}", if s.is_completed { "x" } else { " " }, s.id, s.label);
        }
    }
}

fn print_moved(app: &Board, id: u64, to: Status) {
    println!("Task {id} moved to {to}.");
    if to == Status::Done {
        println!("Nice work!");
        if app.user_state().is_some() {
            match app.suggest_next() {
                Some(next) => println!("Up next: #{} {}", next.id, next.title),
                None => println!("Nothing waiting. Take a break."),
            }
        }
    }
}

pub fn cmd_move(app: &mut Board, id: u64, status: Status, yes: bool, now: DateTime<Utc>) {
    match or_exit(app.move_task(id, status, now, energy_confirmation(yes))) {
        Outcome::Applied(m) => print_moved(app, id, m.to),
        Outcome::Rejected(r) => report_rejection(r),
    }
}

pub fn cmd_step(app: &mut Board, id: u64, direction: MoveDirection, yes: bool, now: DateTime<Utc>) {
    match or_exit(app.move_adjacent(id, direction, now, energy_confirmation(yes))) {
        Outcome::Applied(m) => print_moved(app, id, m.to),
        Outcome::Rejected(Rejection::NoOp) => println!("Task {id} has no column in that direction."),
        Outcome::Rejected(r) => report_rejection(r),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_edit(
    app: &mut Board,
    id: u64,
    title: Option<String>,
    desc: Option<String>,
    category: Option<String>,
    priority: Option<Priority>,
    energy: Option<EnergyLevel>,
    minutes: Option<u32>,
    context: Option<BoardContext>,
) {
    let patch = TaskPatch {
        title,
        description: desc,
        category,
        priority,
        required_energy: energy,
        estimated_minutes: minutes,
        board_context: context,
    };
    if patch.is_empty() {
        println!("No changes given.");
        return;
    }
    or_exit(app.update_task(id, patch));
    println!("Updated {id}");
}

pub fn cmd_block(app: &mut Board, id: u64, blocked: bool) {
    if or_exit(app.set_blocked(id, blocked)) {
        println!("Task {id} {}.", if blocked { "blocked" } else { "unblocked" });
    } else {
        println!("Task {id} was already {}.", if blocked { "blocked" } else { "unblocked" });
    }
    if !blocked && app.active_wip_count() > app.wip_limit() as usize {
        println!("Heads up: {} tasks active against a limit of {}.", app.active_wip_count(), app.wip_limit());
    }
}

pub fn cmd_reopen(app: &mut Board, id: u64) {
    match or_exit(app.reopen(id)) {
        Outcome::Applied(()) => println!("Reopened {id}"),
        Outcome::Rejected(_) => fail(format!("Task {id} is not done.")),
    }
}

pub fn cmd_delete(app: &mut Board, id: u64, yes: bool) {
    let title = task_or_exit(app, id).title.clone();
    let confirmed = yes || ask(&format!("Delete \"{title}\"?"));
    match or_exit(app.delete_task(id, confirmed)) {
        Outcome::Applied(t) => println!("Deleted {} ({})", t.id, t.title),
        Outcome::Rejected(r) => report_rejection(r),
    }
}

pub fn cmd_subtask(app: &mut Board, action: SubtaskAction) {
    match action {
        SubtaskAction::Add { id, label } => {
            let label = label.join(" ");
            if label.trim().is_empty() {
                fail("Subtask label is empty.");
            }
            let sub = or_exit(app.add_subtask(id, &label));
            println!("Added subtask {sub} to task {id}.");
        }
        SubtaskAction::Toggle { id, subtask } => {
            let done = or_exit(app.toggle_subtask(id, subtask));
            println!("Subtask {subtask} {}.", if done { "done" } else { "open" });
        }
        SubtaskAction::Remove { id, subtask } => {
            or_exit(app.remove_subtask(id, subtask));
            println!("Removed subtask {subtask}.");
        }
    }
}

/// Session length for a focus run: the task's estimate, else `--minutes`.
fn focus_minutes(task: &Task, minutes: Option<u32>) -> Result<Option<u32>, &'static str> {
    match minutes {
        Some(0) => Err("Focus length must be at least one minute."),
        Some(m) => Ok(Some(m)),
        None if task.has_duration() => Ok(None),
        None => Err("This task has no estimate; pass --minutes."),
    }
}

pub fn cmd_focus(app: &mut Board, id: u64, minutes: Option<u32>, yes: bool, now: DateTime<Utc>) {
    let task = task_or_exit(app, id);
    let override_minutes = focus_minutes(task, minutes).unwrap_or_else(|msg| fail(msg));
    if task.status != Status::InProgress {
        if let Outcome::Rejected(r) = or_exit(app.move_task(id, Status::InProgress, now, energy_confirmation(yes))) {
            report_rejection(r);
        }
    }
    let entry = match override_minutes {
        Some(m) => or_exit(app.confirm_duration(id, m)),
        None => or_exit(app.enter_focus(id)),
    };
    if let FocusEntry::Started(_) = entry {
        let task = task_or_exit(app, id);
        println!("Focus: {} for {} minutes. Park distractions with `glowup capture`.", task.title, task.estimated_minutes.unwrap_or(0));
    }
}

pub fn cmd_complete(app: &mut Board, id: u64, now: DateTime<Utc>) {
    match or_exit(app.complete_from_focus(id, now)) {
        Outcome::Applied(m) => print_moved(app, id, m.to),
        Outcome::Rejected(r) => report_rejection(r),
    }
}

pub fn cmd_capture(app: &mut Board, text: Vec<String>, now: DateTime<Utc>) {
    let text = text.join(" ");
    if text.trim().is_empty() {
        fail("Nothing to capture.");
    }
    let id = app.capture_thought(&text, now);
    println!("Parked as #{id}. Back to it.");
}

pub fn cmd_intention(app: &mut Board, text: Vec<String>, clear: bool) {
    if clear {
        app.set_intention("");
        println!("Intention cleared.");
    } else if text.is_empty() {
        let current = app.daily_intention();
        println!("{}", if current.is_empty() { "No intention set." } else { current });
    } else {
        app.set_intention(&text.join(" "));
        println!("Intention: {}", app.daily_intention());
    }
}

pub fn cmd_shutdown(app: &mut Board, now: DateTime<Utc>) {
    app.initiate_shutdown();
    let parked = or_exit(app.shutdown_move_wip(now));
    println!("Parked {parked} task(s) back in To Do. Rest well.");
}

pub fn cmd_wake(app: &mut Board) {
    app.wake_up();
    println!("Good morning. Check in with `glowup checkin` to set today's limit.");
}

pub fn cmd_review(app: &Board, now: DateTime<Utc>) {
    let r = app.weekly_review(now);
    println!("Since {}:", r.since.with_timezone(&Local).format("%Y-%m-%d"));
    println!("  Finished: {}", r.completed);
    for (category, n) in &r.by_category {
        println!("    {category}: {n}");
    }
    let moods: Vec<String> = r.moods.iter().filter(|(_, n)| *n > 0).map(|(m, n)| format!("{m} {n}")).collect();
    println!("  Moods: {}", if moods.is_empty() { "-".to_string() } else { moods.join(", ") });
    let energies: Vec<String> = r.energies.iter().filter(|(_, n)| *n > 0).map(|(e, n)| format!("{e} {n}")).collect();
    println!("  Energy: {}", if energies.is_empty() { "-".to_string() } else { energies.join(", ") });
    println!("  High-energy tasks finished from a low-energy start: {}", r.pushed_through);
    if let Some(avg) = r.average_cycle_minutes {
        println!("  Average start to done: {avg} min");
    }
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
