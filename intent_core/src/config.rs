//! Numeric thresholds shared by every detector and actuator.
//!
//! All timing constants live here so they are supplied once at startup
//! instead of being scattered through the detectors.

use std::time::Duration;

use crate::error::ConfigError;

/// Every tunable threshold of the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds {
    /// Peak |amplitude| (i16 scale) above which a block counts as a clap.
    pub amplitude_threshold: u16,
    /// Shortest accepted gap between the two claps of a pair (inclusive).
    pub clap_window_min: Duration,
    /// Longest accepted gap between the two claps of a pair (inclusive).
    pub clap_window_max: Duration,
    /// Silence after the last clap that abandons an incomplete pair.
    pub clap_reset_after: Duration,
    /// Minimum time between two accepted light toggles, from any source.
    pub toggle_cooldown: Duration,
    /// Minimum time between two alert sends.
    pub alert_cooldown: Duration,
    /// How long the OK-sign must be held continuously.
    pub hold_duration: Duration,
    /// Thumb/index tip distance (pixels) below which fingers "touch".
    pub pinch_threshold_px: f32,
    /// How long a transient log line stays on the display.
    pub log_duration: Duration,
    /// Minimum time between two climate sensor polls.
    pub climate_poll_interval: Duration,
    /// Period of the background display updater.
    pub display_refresh: Duration,
    /// Characters per display line.
    pub display_width: usize,
    /// Period of the orchestration loop.
    pub tick: Duration,
    /// Audio samples per block.
    pub block_size: usize,
    /// Audio sample rate (Hz).
    pub sample_rate: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            amplitude_threshold:   2500,
            clap_window_min:       Duration::from_millis(1000),
            clap_window_max:       Duration::from_millis(1500),
            clap_reset_after:      Duration::from_secs(2),
            toggle_cooldown:       Duration::from_secs(1),
            alert_cooldown:        Duration::from_secs(300),
            hold_duration:         Duration::from_secs(2),
            pinch_threshold_px:    24.0,
            log_duration:          Duration::from_secs(8),
            climate_poll_interval: Duration::from_secs(5),
            display_refresh:       Duration::from_millis(500),
            display_width:         16,
            tick:                  Duration::from_millis(10),
            block_size:            512,
            sample_rate:           16_000,
        }
    }
}

impl Thresholds {
    /// Reject combinations the detectors cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amplitude_threshold == 0 {
            return Err(ConfigError::NonPositive("amplitude_threshold"));
        }
        if self.clap_window_min > self.clap_window_max {
            return Err(ConfigError::InvertedWindow {
                min: self.clap_window_min,
                max: self.clap_window_max,
            });
        }
        let positive = [
            ("clap_window_max",       self.clap_window_max),
            ("clap_reset_after",      self.clap_reset_after),
            ("alert_cooldown",        self.alert_cooldown),
            ("log_duration",          self.log_duration),
            ("climate_poll_interval", self.climate_poll_interval),
            ("display_refresh",       self.display_refresh),
            ("tick",                  self.tick),
        ];
        for (name, value) in positive {
            if value.is_zero() {
                return Err(ConfigError::NonPositive(name));
            }
        }
        if !(self.pinch_threshold_px > 0.0) {
            return Err(ConfigError::NonPositive("pinch_threshold_px"));
        }
        if self.display_width == 0 {
            return Err(ConfigError::NonPositive("display_width"));
        }
        if self.block_size == 0 {
            return Err(ConfigError::NonPositive("block_size"));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::NonPositive("sample_rate"));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
