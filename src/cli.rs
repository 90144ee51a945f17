use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Mood-aware personal kanban.
/// State lives in $GLOWUP_HOME/state.json, ~/.glowup/state.json, or the path passed via --db.
#[derive(Parser)]
#[command(name = "glowup", version, about = "Mood and energy aware kanban board")]
pub struct Cli {
    /// Path to the JSON snapshot file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
