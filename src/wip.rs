//! Adaptive work-in-progress limit.
//!
//! Maps a check-in (mood, energy) onto one of the three configured bounds.

use crate::fields::{EnergyLevel, Mood};
use crate::settings::SystemSettings;

/// Compute the WIP limit for a check-in.
///
/// Low energy or an anxious/stressed mood selects the protective bound; calm or
/// focused with medium or high energy selects the max bound; everything else
/// is sustainable. The result always lies in `[protective, max]`, even for
/// settings that were never validated.
pub fn calculate_wip_limit(mood: Mood, energy: EnergyLevel, settings: &SystemSettings) -> u32 {
    let w = settings.wip_limits;
    let low = w.protective;
    let high = w.max.max(low);

    let chosen = match (mood, energy) {
        (_, EnergyLevel::Low) => w.protective,
        (Mood::Anxious | Mood::Stressed, _) => w.protective,
        (Mood::Calm | Mood::Focused, EnergyLevel::Medium | EnergyLevel::High) => w.max,
        (Mood::Tired, EnergyLevel::Medium | EnergyLevel::High) => w.sustainable,
    };
    chosen.clamp(low, high)
}

/// Which regime a limit falls in, for labelling the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipMode {
    Protective,
    Sustainable,
    HighFlow,
}

impl WipMode {
    pub fn classify(limit: u32, settings: &SystemSettings) -> WipMode {
        if limit <= settings.wip_limits.protective {
            WipMode::Protective
        } else if limit >= settings.wip_limits.max {
            WipMode::HighFlow
        } else {
            WipMode::Sustainable
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WipMode::Protective => "Protective",
            WipMode::Sustainable => "Sustainable",
            WipMode::HighFlow => "High Flow",
        }
    }
}

/// One line of guidance shown next to the current limit.
pub fn system_advice(limit: u32, settings: &SystemSettings) -> String {
    match WipMode::classify(limit, settings) {
        WipMode::Protective => format!(
            "Protective mode: {limit} task at a time. Finish or park something before starting more."
        ),
        WipMode::Sustainable => format!(
            "Sustainable pace: up to {limit} tasks in progress. Keep an eye on energy."
        ),
        WipMode::HighFlow => format!(
            "High flow: up to {limit} tasks in progress. Good moment for demanding work."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::WipThresholds;

    fn settings(p: u32, s: u32, m: u32) -> SystemSettings {
        SystemSettings { wip_limits: WipThresholds { protective: p, sustainable: s, max: m }, ..Default::default() }
    }

    #[test]
    fn test_limit_within_bounds_for_every_combination() {
        for cfg in [settings(1, 2, 3), settings(2, 2, 2), settings(1, 4, 9), settings(3, 1, 2)] {
            for mood in Mood::ALL {
                for energy in EnergyLevel::ALL {
                    let limit = calculate_wip_limit(mood, energy, &cfg);
                    assert!(limit >= cfg.wip_limits.protective, "{mood:?}/{energy:?}");
                    assert!(limit <= cfg.wip_limits.max.max(cfg.wip_limits.protective), "{mood:?}/{energy:?}");
                    assert_eq!(limit, calculate_wip_limit(mood, energy, &cfg));
                }
            }
        }
    }

    #[test]
    fn test_design_intent() {
        let cfg = settings(1, 2, 3);
        assert_eq!(calculate_wip_limit(Mood::Calm, EnergyLevel::Low, &cfg), 1);
        assert_eq!(calculate_wip_limit(Mood::Anxious, EnergyLevel::High, &cfg), 1);
        assert_eq!(calculate_wip_limit(Mood::Stressed, EnergyLevel::Medium, &cfg), 1);
        assert_eq!(calculate_wip_limit(Mood::Focused, EnergyLevel::Medium, &cfg), 3);
        assert_eq!(calculate_wip_limit(Mood::Calm, EnergyLevel::High, &cfg), 3);
        assert_eq!(calculate_wip_limit(Mood::Tired, EnergyLevel::High, &cfg), 2);
    }

    #[test]
    fn test_mode_classification() {
        let cfg = settings(1, 2, 3);
        assert_eq!(WipMode::classify(1, &cfg), WipMode::Protective);
        assert_eq!(WipMode::classify(2, &cfg), WipMode::Sustainable);
        assert_eq!(WipMode::classify(3, &cfg), WipMode::HighFlow);
        assert!(system_advice(3, &cfg).starts_with("High flow"));
    }
}
