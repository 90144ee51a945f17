//! # glowup
//!
//! Command-line front end and terminal board for the GlowUp kanban.
//!
//! ## Quick Start
//!
//! ```bash
//! # Tell the board how you are doing
//! glowup checkin --mood calm --energy high
//!
//! # Empty your head, then pick what goes on the board
//! glowup dump "reply to Sam" "book dentist"
//! glowup triage 4 --context personal
//!
//! # Work it
//! glowup forward 4
//! glowup complete 4
//!
//! # Or do all of it interactively
//! glowup ui
//! ```
//!
//! State is one JSON snapshot, by default `~/.glowup/state.json`. Set
//! `GLOWUP_LOG=glowup=debug` to see what the board decides and why.

use std::fs::OpenOptions;
use std::sync::Mutex;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use glowup::app::App;
use glowup::config::{Config, DEFAULT_LOG_FILTER};
use glowup::db::JsonFileStore;
use glowup::fields::MoveDirection;

mod cli;
mod cmd;
mod tui {
    pub mod board;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod run;
}

use cli::Cli;
use cmd::*;

const UI_LOG_FILE: &str = "glowup.log";

/// Logs go to stderr, except under the full-screen board where they would
/// corrupt the display and go to a file next to the snapshot instead.
fn init_logging(config: &Config, full_screen: bool) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if full_screen {
        let path = config.data_dir().join(UI_LOG_FILE);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init(),
            Err(e) => eprintln!("Logging disabled, cannot open {}: {e}", path.display()),
        }
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    let config = match Config::resolve(cli.db) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to prepare data directory: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config, matches!(cli.command, Commands::Ui));

    let now = Utc::now();
    let store = JsonFileStore::new(&config.snapshot_path);
    let mut app = match App::open(store, now) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config.snapshot_path.display());
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Ui => app = cmd_ui(app),
        Commands::Status => cmd_status(&app),
        Commands::Checkin { mood, energy, note } => cmd_checkin(&mut app, mood, energy, note, now),
        Commands::Settings { action } => cmd_settings(&mut app, action),
        Commands::Dump { lines } => cmd_dump(&mut app, lines, now),
        Commands::Import { input } => cmd_import(&mut app, input, now),
        Commands::Triage { id, context } => cmd_triage(&mut app, id, context, now),
        Commands::List { status, context, all } => cmd_list(&mut app, status, context, all, now),
        Commands::View { id } => cmd_view(&app, id),
        Commands::Move { id, status, yes } => cmd_move(&mut app, id, status, yes, now),
        Commands::Forward { id, yes } => cmd_step(&mut app, id, MoveDirection::Next, yes, now),
        Commands::Back { id, yes } => cmd_step(&mut app, id, MoveDirection::Prev, yes, now),
        Commands::Edit { id, title, desc, category, priority, energy, minutes, context } =>
            cmd_edit(&mut app, id, title, desc, category, priority, energy, minutes, context),
        Commands::Block { id } => cmd_block(&mut app, id, true),
        Commands::Unblock { id } => cmd_block(&mut app, id, false),
        Commands::Reopen { id } => cmd_reopen(&mut app, id),
        Commands::Delete { id, yes } => cmd_delete(&mut app, id, yes),
        Commands::Subtask { action } => cmd_subtask(&mut app, action),
        Commands::Focus { id, minutes, yes } => cmd_focus(&mut app, id, minutes, yes, now),
        Commands::Complete { id } => cmd_complete(&mut app, id, now),
        Commands::Capture { text } => cmd_capture(&mut app, text, now),
        Commands::Intention { text, clear } => cmd_intention(&mut app, text, clear),
        Commands::Shutdown => cmd_shutdown(&mut app, now),
        Commands::Wake => cmd_wake(&mut app),
        Commands::Review => cmd_review(&app, now),
        Commands::Completions { .. } => unreachable!("completions handled above"),
    }

    if let Some(e) = app.take_save_error() {
        eprintln!("Failed to save {}: {e}", config.snapshot_path.display());
        std::process::exit(1);
    }
}
