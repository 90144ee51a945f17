//! User-tunable system settings.
//!
//! Settings are persisted inside the snapshot and only ever replaced as a
//! whole. They can also be exchanged as a TOML file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::{CandidatePool, ReopenPolicy};

pub const DEFAULT_BRIDGE_DELAY_MS: u64 = 1000;
pub const MAX_BRIDGE_DELAY_MS: u64 = 60_000;

/// Bounds the WIP calculator chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipThresholds {
    pub protective: u32,
    pub sustainable: u32,
    pub max: u32,
}

impl Default for WipThresholds {
    fn default() -> Self {
        WipThresholds { protective: 1, sustainable: 2, max: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub wip_limits: WipThresholds,
    pub suggestion_pool: CandidatePool,
    pub reopen_policy: ReopenPolicy,
    pub bridge_delay_ms: u64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        SystemSettings {
            wip_limits: WipThresholds::default(),
            suggestion_pool: CandidatePool::default(),
            reopen_policy: ReopenPolicy::default(),
            bridge_delay_ms: DEFAULT_BRIDGE_DELAY_MS,
        }
    }
}

impl SystemSettings {
    /// Check `1 <= protective <= sustainable <= max` and that the bridge delay
    /// is at most a minute.
    pub fn validate(&self) -> Result<()> {
        let w = self.wip_limits;
        if w.protective == 0 {
            return Err(Error::InvalidSettings("protective limit must be at least 1".into()));
        }
        if w.protective > w.sustainable || w.sustainable > w.max {
            return Err(Error::InvalidSettings(format!(
                "limits must satisfy protective <= sustainable <= max (got {} / {} / {})",
                w.protective, w.sustainable, w.max
            )));
        }
        if self.bridge_delay_ms > MAX_BRIDGE_DELAY_MS {
            return Err(Error::InvalidSettings(format!(
                "bridge delay must be at most {MAX_BRIDGE_DELAY_MS} ms (got {})",
                self.bridge_delay_ms
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: SystemSettings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SystemSettings::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let mut s = SystemSettings::default();
        s.wip_limits = WipThresholds { protective: 3, sustainable: 2, max: 4 };
        assert!(matches!(s.validate(), Err(Error::InvalidSettings(_))));
        s.wip_limits = WipThresholds { protective: 0, sustainable: 2, max: 4 };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_bridge_delay() {
        let mut s = SystemSettings::default();
        s.bridge_delay_ms = MAX_BRIDGE_DELAY_MS;
        assert!(s.validate().is_ok());
        s.bridge_delay_ms = 100_000_000_000_000_000;
        assert!(matches!(s.validate(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn test_toml_round_trip_keeps_missing_fields_default() {
        let s = SystemSettings::from_toml_str(
            "suggestion_pool = \"todo-and-brain-dump\"\n[wip_limits]\nprotective = 1\nsustainable = 3\nmax = 5\n",
        )
        .unwrap();
        assert_eq!(s.wip_limits.max, 5);
        assert_eq!(s.suggestion_pool, CandidatePool::TodoAndBrainDump);
        assert_eq!(s.bridge_delay_ms, DEFAULT_BRIDGE_DELAY_MS);

        let text = s.to_toml_string().unwrap();
        assert_eq!(SystemSettings::from_toml_str(&text).unwrap(), s);
    }

    #[test]
    fn test_invalid_toml_file_is_rejected() {
        let err = SystemSettings::from_toml_str("[wip_limits]\nprotective = 4\nsustainable = 2\nmax = 3\n");
        assert!(err.is_err());
    }
}
