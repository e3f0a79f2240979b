use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STABLE_POLL_COUNT: u8 = 20;
pub const DEFAULT_STABLE_INITIAL_DELAY_FRAMES: u32 = 5;
pub const DEFAULT_FALLBACK_FRAME_RATE_HZ: u32 = 24;
pub const DEFAULT_AUDIO_MUTE_POLL_COUNT: u32 = 3;
pub const DEFAULT_AUDIO_MUTE_CLEAR_POLL_COUNT: u32 = 6;
pub const DEFAULT_AUDIO_POLL_INTERVAL_MS: u32 = 1;
pub const DEFAULT_AUDIO_N_SETTLE_MS: u32 = 2;
pub const DEFAULT_OVERFLOW_RECOVERY_THRESHOLD: u32 = 10;
pub const DEFAULT_DEFERRED_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DprxConfig {
    /// Countdown start of the video-stability poll.
    pub stable_poll_count: u8,
    /// Frame periods to wait after video-on before the first stability check.
    pub stable_initial_delay_frames: u32,
    /// Frame rate assumed for delay computation when none has been classified yet.
    pub fallback_frame_rate_hz: u32,
    /// Mute-request polls after programming audio N on first configuration.
    pub audio_mute_poll_count: u32,
    /// Additional polls waiting for a stuck mute request to clear before forcing a PLL reset.
    pub audio_mute_clear_poll_count: u32,
    pub audio_poll_interval_ms: u32,
    pub audio_n_settle_ms: u32,
    /// Consecutive audio-overflow passes tolerated before the link is power-cycled.
    pub overflow_recovery_threshold: u32,
    pub deferred_queue_depth: usize,
}

impl Default for DprxConfig {
    fn default() -> Self {
        Self {
            stable_poll_count: DEFAULT_STABLE_POLL_COUNT,
            stable_initial_delay_frames: DEFAULT_STABLE_INITIAL_DELAY_FRAMES,
            fallback_frame_rate_hz: DEFAULT_FALLBACK_FRAME_RATE_HZ,
            audio_mute_poll_count: DEFAULT_AUDIO_MUTE_POLL_COUNT,
            audio_mute_clear_poll_count: DEFAULT_AUDIO_MUTE_CLEAR_POLL_COUNT,
            audio_poll_interval_ms: DEFAULT_AUDIO_POLL_INTERVAL_MS,
            audio_n_settle_ms: DEFAULT_AUDIO_N_SETTLE_MS,
            overflow_recovery_threshold: DEFAULT_OVERFLOW_RECOVERY_THRESHOLD,
            deferred_queue_depth: DEFAULT_DEFERRED_QUEUE_DEPTH,
        }
    }
}

impl DprxConfig {
    /// Parses a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stable_poll_count == 0 {
            return Err(ConfigError::Zero("stable_poll_count"));
        }
        if self.fallback_frame_rate_hz == 0 {
            return Err(ConfigError::Zero("fallback_frame_rate_hz"));
        }
        if self.audio_mute_poll_count == 0 {
            return Err(ConfigError::Zero("audio_mute_poll_count"));
        }
        if self.deferred_queue_depth == 0 {
            return Err(ConfigError::Zero("deferred_queue_depth"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = DprxConfig::from_json(r#"{ "stable_poll_count": 8 }"#).unwrap();
        assert_eq!(cfg.stable_poll_count, 8);
        assert_eq!(cfg.overflow_recovery_threshold, DEFAULT_OVERFLOW_RECOVERY_THRESHOLD);
        assert_eq!(cfg.audio_mute_poll_count, DEFAULT_AUDIO_MUTE_POLL_COUNT);
    }

    #[test]
    fn zero_counts_are_rejected() {
        assert_eq!(
            DprxConfig::from_json(r#"{ "deferred_queue_depth": 0 }"#),
            Err(ConfigError::Zero("deferred_queue_depth"))
        );
        assert!(matches!(
            DprxConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn default_roundtrips_through_json() {
        let json = serde_json::to_string(&DprxConfig::default()).unwrap();
        assert_eq!(DprxConfig::from_json(&json).unwrap(), DprxConfig::default());
    }
}
