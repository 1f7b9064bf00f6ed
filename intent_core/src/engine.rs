//! Orchestration engine — one cooperative tick over both modalities.
//!
//! Each tick pulls at most one audio block and one pose frame (in that
//! order), feeds the detectors, and hands any events to the coordinator.
//! Reads must never block for long: a source with nothing to offer returns
//! [`CaptureError::Timeout`] and the tick simply has no event from it.
//!
//! The engine is single-threaded by construction; the coordinator's state
//! is only ever touched from here.  The only state shared with another
//! thread is the [`StatusBoard`].

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::acoustic::{peak_amplitude, ClapDetector, ClapVerdict, TriggerSource};
use crate::config::Thresholds;
use crate::coordinator::{Coordinator, Outcome};
use crate::error::{CaptureError, EngineError};
use crate::gesture::{GestureDetector, GestureOutput, HoldStatus};
use crate::hand::HandLandmarks;
use crate::status::{DisplayMode, StatusBoard};

// ════════════════════════════════════════════════════════════════════════════
// Capture collaborators
// ════════════════════════════════════════════════════════════════════════════

/// Pull-based audio capture.
pub trait AudioSource {
    /// One block of i16 samples, or `Timeout` when none is ready.
    fn read_block(&mut self) -> Result<Vec<i16>, CaptureError>;
}

/// Pull-based hand-pose capture.
pub trait PoseSource {
    /// The latest frame: `Some` hand, `None` when the frame shows no hand,
    /// or `Timeout` when no new frame is ready.
    fn read_frame(&mut self) -> Result<Option<HandLandmarks>, CaptureError>;
}

// ════════════════════════════════════════════════════════════════════════════
// TickReport
// ════════════════════════════════════════════════════════════════════════════

/// Everything one tick observed and did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// `None` when no audio block was read.
    pub clap:    Option<ClapVerdict>,
    /// `None` when no pose frame was read.
    pub gesture: Option<GestureOutput>,
    pub toggles: Vec<(TriggerSource, Outcome)>,
    pub alert:   Option<Outcome>,
}

// ════════════════════════════════════════════════════════════════════════════
// Engine
// ════════════════════════════════════════════════════════════════════════════

pub struct Engine {
    claps:       ClapDetector,
    gestures:    GestureDetector,
    coordinator: Coordinator,
    board:       StatusBoard,
    audio:       Option<Box<dyn AudioSource>>,
    pose:        Option<Box<dyn PoseSource>>,
    hold_label:  String,
}

impl Engine {
    /// Fails only when neither modality is available.
    pub fn new(
        cfg:         &Thresholds,
        coordinator: Coordinator,
        board:       StatusBoard,
        audio:       Option<Box<dyn AudioSource>>,
        pose:        Option<Box<dyn PoseSource>>,
    ) -> Result<Self, EngineError> {
        if audio.is_none() && pose.is_none() {
            return Err(EngineError::NoInputs);
        }
        Ok(Engine {
            claps:      ClapDetector::new(cfg),
            gestures:   GestureDetector::new(cfg),
            coordinator,
            board,
            audio,
            pose,
            hold_label: format!("hold {} sec", cfg.hold_duration.as_secs_f32()),
        })
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        // ── audio ─────────────────────────────────────────────────────────
        if let Some(verdict) = self.sample_audio(now) {
            match verdict {
                ClapVerdict::Candidate(_) => {
                    self.board.post_at("Clap", "detected", TRANSIENT, now);
                }
                ClapVerdict::OutOfWindow(_) => {
                    self.board.post_at("Clap", "bad interval", TRANSIENT, now);
                }
                ClapVerdict::Paired(event) => {
                    let outcome = self.dispatch_toggle(event.source, now);
                    report.toggles.push((event.source, outcome));
                }
                ClapVerdict::Silence | ClapVerdict::Expired => {}
            }
            report.clap = Some(verdict);
        }

        // ── pose ──────────────────────────────────────────────────────────
        if let Some(out) = self.sample_pose(now) {
            if out.hold_started {
                self.board.post_at("OK gesture", self.hold_label.as_str(), TRANSIENT, now);
            }
            if out.toggle {
                self.board.post_at("Fist", "detected", TRANSIENT, now);
                let outcome = self.dispatch_toggle(TriggerSource::Fist, now);
                report.toggles.push((TriggerSource::Fist, outcome));
            }
            if out.hold == HoldStatus::Confirmed {
                report.alert = Some(self.dispatch_alert(now));
            }
            report.gesture = Some(out);
        }

        report
    }

    fn sample_audio(&mut self, now: Instant) -> Option<ClapVerdict> {
        let source = self.audio.as_mut()?;
        match source.read_block() {
            Ok(block) => Some(self.claps.observe_peak(peak_amplitude(&block), now)),
            Err(e) => {
                self.on_capture_error(e, Modality::Audio, now);
                None
            }
        }
    }

    fn sample_pose(&mut self, now: Instant) -> Option<GestureOutput> {
        let source = self.pose.as_mut()?;
        match source.read_frame() {
            Ok(hand) => Some(self.gestures.observe_landmarks(hand.as_ref(), now)),
            Err(e) => {
                self.on_capture_error(e, Modality::Pose, now);
                None
            }
        }
    }

    fn on_capture_error(&mut self, e: CaptureError, modality: Modality, now: Instant) {
        if !e.is_fatal() {
            if e != CaptureError::Timeout {
                debug!(error = %e, modality = modality.name(), "capture read failed");
            }
            return;
        }
        warn!(modality = modality.name(), "capture source lost, modality disabled");
        match modality {
            Modality::Audio => {
                self.audio = None;
                self.claps.reset();
            }
            Modality::Pose => self.pose = None,
        }
        self.board.post_at(modality.name(), "lost", TRANSIENT, now);
    }

    fn dispatch_toggle(&mut self, source: TriggerSource, now: Instant) -> Outcome {
        let outcome = self.coordinator.request_toggle(now);
        debug!(source = source.as_str(), ?outcome, "toggle requested");
        self.post_light(&outcome, "Toggle", now);
        outcome
    }

    /// Force the light to a state (startup `--initial-state`), through the
    /// shared toggle cooldown, and report the result like any toggle.
    pub fn request_set(&mut self, on: bool, now: Instant) -> Outcome {
        let outcome = self.coordinator.request_set(on, now);
        info!(on, ?outcome, "light state requested");
        self.post_light(&outcome, "Light", now);
        outcome
    }

    fn post_light(&self, outcome: &Outcome, failed: &str, now: Instant) {
        let (line1, line2) = match outcome {
            Outcome::Sent => ("Light", if self.coordinator.lights_on() { "ON" } else { "OFF" }),
            Outcome::Suppressed => ("Light", "cooldown"),
            Outcome::Failed(_) => (failed, "error"),
        };
        self.board.post_at(line1, line2, TRANSIENT, now);
    }

    fn dispatch_alert(&mut self, now: Instant) -> Outcome {
        if self.coordinator.alert_ready_in(now).is_zero() {
            self.board.post_at("Sending", "emergency", TRANSIENT, now);
        }
        let outcome = self.coordinator.request_alert(now);
        let (line1, line2) = match &outcome {
            Outcome::Sent => ("Emergency", "sent!"),
            Outcome::Suppressed => ("Call", "cooldown"),
            Outcome::Failed(_) => ("Send", "error"),
        };
        self.board.post_at(line1, line2, TRANSIENT, now);
        outcome
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn has_audio(&self)  -> bool { self.audio.is_some() }
    pub fn has_pose(&self)   -> bool { self.pose.is_some() }
    pub fn has_inputs(&self) -> bool { self.has_audio() || self.has_pose() }

    pub fn lights_on(&self)     -> bool  { self.coordinator.lights_on() }
    pub fn pending_claps(&self) -> usize { self.claps.pending() }

    pub fn board(&self) -> &StatusBoard { &self.board }
}

const TRANSIENT: DisplayMode = DisplayMode::TransientLog;

#[derive(Clone, Copy, Debug)]
enum Modality {
    Audio,
    Pose,
}

impl Modality {
    fn name(self) -> &'static str {
        match self {
            Modality::Audio => "Microphone",
            Modality::Pose  => "Camera",
        }
    }
}
