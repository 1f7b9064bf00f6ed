//! Actuation coordinator — the only owner of actuator state.
//!
//! Both detectors ask for toggles through [`Coordinator::request_toggle`];
//! the cooldown is scoped to the actuator, not to the requesting source,
//! so a clap pair and a fist arriving together flip the light once.
//!
//! A collaborator failure still consumes the cooldown: the attempt counts.
//! Every request yields an [`Outcome`] and callers are expected to surface
//! it, suppression included.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Thresholds;
use crate::error::ActuatorError;

// ════════════════════════════════════════════════════════════════════════════
// Collaborators
// ════════════════════════════════════════════════════════════════════════════

/// Power command understood by the relay firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayCommand {
    On,
    Off,
    Toggle,
}

impl RelayCommand {
    /// Payload published on the command topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On     => "ON",
            Self::Off    => "OFF",
            Self::Toggle => "TOGGLE",
        }
    }

    pub fn for_state(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Fire-and-forget power relay.  `Ok` means the transport accepted the
/// command; no device acknowledgement is awaited.
pub trait Relay: Send {
    fn publish(&mut self, command: RelayCommand) -> Result<(), ActuatorError>;
}

/// Request/response alert channel.  `Ok` means the service answered 200.
pub trait AlertSink: Send {
    fn send_message(&mut self, text: &str) -> Result<(), ActuatorError>;
}

/// How a toggle is expressed on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelayMode {
    /// Publish `TOGGLE` and let the device flip itself.
    #[default]
    Toggle,
    /// Publish `ON`/`OFF` computed from the tracked state.
    Explicit,
}

// ════════════════════════════════════════════════════════════════════════════
// Outcome
// ════════════════════════════════════════════════════════════════════════════

/// Result of one actuation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Rejected by the cooldown; nothing was attempted.
    Suppressed,
    /// The collaborator accepted the call.
    Sent,
    /// The call was attempted and failed.  The cooldown still advanced.
    Failed(ActuatorError),
}

// ════════════════════════════════════════════════════════════════════════════
// Coordinator
// ════════════════════════════════════════════════════════════════════════════

pub struct Coordinator {
    relay:           Box<dyn Relay>,
    alert:           Box<dyn AlertSink>,
    mode:            RelayMode,
    alert_text:      String,
    toggle_cooldown: Duration,
    alert_cooldown:  Duration,

    lights_on:   bool,
    last_toggle: Option<Instant>,
    last_alert:  Option<Instant>,
}

impl Coordinator {
    pub fn new(
        cfg:        &Thresholds,
        relay:      Box<dyn Relay>,
        alert:      Box<dyn AlertSink>,
        mode:       RelayMode,
        alert_text: impl Into<String>,
    ) -> Self {
        Coordinator {
            relay,
            alert,
            mode,
            alert_text:      alert_text.into(),
            toggle_cooldown: cfg.toggle_cooldown,
            alert_cooldown:  cfg.alert_cooldown,
            lights_on:       false,
            last_toggle:     None,
            last_alert:      None,
        }
    }

    /// Flip the light unless another toggle was accepted within the
    /// cooldown (strictly greater elapsed time required).
    pub fn request_toggle(&mut self, now: Instant) -> Outcome {
        let target = !self.lights_on;
        let command = match self.mode {
            RelayMode::Toggle   => RelayCommand::Toggle,
            RelayMode::Explicit => RelayCommand::for_state(target),
        };
        self.actuate(command, target, now)
    }

    /// Force the light to a state, through the same cooldown as toggles.
    pub fn request_set(&mut self, on: bool, now: Instant) -> Outcome {
        self.actuate(RelayCommand::for_state(on), on, now)
    }

    fn actuate(&mut self, command: RelayCommand, target: bool, now: Instant) -> Outcome {
        if let Some(last) = self.last_toggle {
            if now.saturating_duration_since(last) <= self.toggle_cooldown {
                debug!(command = command.as_str(), "relay command suppressed by cooldown");
                return Outcome::Suppressed;
            }
        }
        self.last_toggle = Some(now);

        match self.relay.publish(command) {
            Ok(()) => {
                self.lights_on = target;
                info!(command = command.as_str(), lights_on = target, "relay command sent");
                Outcome::Sent
            }
            Err(e) => {
                warn!(command = command.as_str(), error = %e, "relay command failed");
                Outcome::Failed(e)
            }
        }
    }

    /// Send the alert unless one was attempted within the alert cooldown
    /// (elapsed time equal to the cooldown is enough).
    pub fn request_alert(&mut self, now: Instant) -> Outcome {
        if let Some(last) = self.last_alert {
            if now.saturating_duration_since(last) < self.alert_cooldown {
                debug!("alert suppressed by cooldown");
                return Outcome::Suppressed;
            }
        }
        self.last_alert = Some(now);

        match self.alert.send_message(&self.alert_text) {
            Ok(()) => {
                info!("alert sent");
                Outcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "alert failed");
                Outcome::Failed(e)
            }
        }
    }

    pub fn lights_on(&self) -> bool { self.lights_on }

    /// Time until the next alert would be accepted.
    pub fn alert_ready_in(&self, now: Instant) -> Duration {
        self.last_alert.map_or(Duration::ZERO, |last| {
            self.alert_cooldown.saturating_sub(now.saturating_duration_since(last))
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
