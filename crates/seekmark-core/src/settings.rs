// crates/seekmark-core/src/settings.rs
//
// Tunables shared by the media worker and the front end. Every field has a
// default so a partial settings file (or none at all) is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotations::ConfidenceFilter;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Period of the worker's drain tick.
    pub tick_interval_ms:      u64,
    /// Coarse navigation step in seconds; converted to frames per video.
    pub second_step:           f64,
    /// Forward-decode budget, in frames' worth of wall-clock time, before a
    /// linear scan gives up and reseeks. Depends on decoder throughput.
    pub stall_frames:          f64,
    /// Reseeks allowed when the demuxer lands past the target before falling
    /// back to a scan from the nearest known keyframe.
    pub max_overshoot_retries: u32,
    /// Threshold used when jumping between events of the same kind.
    pub event_filter:          ConfidenceFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms:      50,
            second_step:           5.0,
            stall_frames:          50.0,
            max_overshoot_retries: 3,
            event_filter:          ConfidenceFilter { threshold: 0.5, above: true },
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.tick_interval_ms == 0 {
            return Err(SettingsError::Invalid {
                field:  "tick_interval_ms",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.second_step.is_finite() && self.second_step > 0.0) {
            return Err(SettingsError::Invalid {
                field:  "second_step",
                reason: format!("{} is not a positive number of seconds", self.second_step),
            });
        }
        if !(self.stall_frames.is_finite() && self.stall_frames >= 0.0) {
            return Err(SettingsError::Invalid {
                field:  "stall_frames",
                reason: format!("{} is not a non-negative frame count", self.stall_frames),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert_eq!(s.tick_interval(), Duration::from_millis(50));
        assert_eq!(s.stall_frames, 50.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"stall_frames": 10}"#).unwrap();
        assert_eq!(s.stall_frames, 10.0);
        assert_eq!(s.max_overshoot_retries, 3);
    }

    #[test]
    fn rejects_zero_tick() {
        let s = Settings { tick_interval_ms: 0, ..Settings::default() };
        assert!(matches!(s.validate(), Err(SettingsError::Invalid { field: "tick_interval_ms", .. })));
    }
}
