//! Color constants for the terminal user interface.

use ratatui::style::Color;

use glowup::fields::{EnergyLevel, Mood};
use glowup::wip::WipMode;

/// Accent for the protective WIP mode and anxious moods.
pub const DUSK_PURPLE: Color = Color::Rgb(126, 87, 194);
/// Accent for the sustainable WIP mode.
pub const SAGE: Color = Color::Rgb(102, 160, 120);
/// Accent for the high-flow WIP mode.
pub const SUNRISE: Color = Color::Rgb(255, 183, 77);
pub const DONE_GREEN: Color = Color::Rgb(0, 110, 60);
pub const BLOCKED_RED: Color = Color::Rgb(150, 30, 30);
pub const CARD_GRAY: Color = Color::Rgb(48, 48, 56);

pub fn mode_color(mode: WipMode) -> Color {
    match mode {
        WipMode::Protective => DUSK_PURPLE,
        WipMode::Sustainable => SAGE,
        WipMode::HighFlow => SUNRISE,
    }
}

pub fn energy_color(energy: EnergyLevel) -> Color {
    match energy {
        EnergyLevel::Low => Color::LightBlue,
        EnergyLevel::Medium => Color::Yellow,
        EnergyLevel::High => Color::LightRed,
    }
}

pub fn mood_color(mood: Mood) -> Color {
    match mood {
        Mood::Anxious | Mood::Stressed => DUSK_PURPLE,
        Mood::Tired => Color::Gray,
        Mood::Focused => SUNRISE,
        Mood::Calm => SAGE,
    }
}
