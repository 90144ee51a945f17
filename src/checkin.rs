//! Check-in snapshots of mood and energy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{EnergyLevel, Mood};

/// One self-reported check-in. Never mutated once recorded; history order is
/// the check-in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub mood: Mood,
    pub energy: EnergyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl UserState {
    pub fn new(mood: Mood, energy: EnergyLevel) -> Self {
        UserState { mood, energy, note: None, recorded_at: None }
    }

    pub fn recorded(mood: Mood, energy: EnergyLevel, note: Option<String>, at: DateTime<Utc>) -> Self {
        UserState {
            mood,
            energy,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            recorded_at: Some(at),
        }
    }
}
