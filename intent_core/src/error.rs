//! Error taxonomy.
//!
//! Cooldown suppression is deliberately absent: it is a normal outcome
//! ([`crate::Outcome::Suppressed`]), not an error.

use std::time::Duration;

use thiserror::Error;

/// Invalid startup configuration.  Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("clap window is inverted: min {min:?} > max {max:?}")]
    InvertedWindow { min: Duration, max: Duration },

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A relay or alert call that was attempted and did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("actuator unavailable: {0}")]
    Unavailable(String),
}

/// Failure to read one audio block or video frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Nothing arrived within the read budget.  Transient.
    #[error("capture timed out")]
    Timeout,

    /// The device reported an error for this read.  Transient.
    #[error("capture device error: {0}")]
    Device(String),

    /// The producer is gone for good; the modality is disabled.
    #[error("capture source disconnected")]
    Disconnected,
}

impl CaptureError {
    /// True when the modality can never produce data again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::Disconnected)
    }
}

/// Display or climate-sensor failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device I/O error: {0}")]
    Io(String),

    #[error("sensor returned no reading")]
    NoReading,
}

/// The engine cannot run at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no input modality available (microphone and camera both missing)")]
    NoInputs,
}
