//! Terminal setup and teardown around the board.

use std::io;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};

use glowup::app::App;
use glowup::db::SnapshotStore;

use crate::tui::board::BoardApp;

/// Run the board until the user quits. The terminal is restored even when the
/// loop fails.
pub fn run_board_tui<S: SnapshotStore>(app: App<S>) -> io::Result<App<S>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut board = BoardApp::new(app);
    let result = board.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result?;
    Ok(board.into_app())
}
