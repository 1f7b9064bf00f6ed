//! Acoustic event detector — turns audio blocks into double-clap toggles.
//!
//! # Algorithm
//!
//! Each block is reduced to its peak |amplitude|.  A peak above the
//! threshold is a clap candidate:
//!
//! 1. Append the clap to a buffer capped at two (the oldest is evicted).
//! 2. Restart the inactivity timer.
//! 3. With two claps buffered, check `interval = t[1] - t[0]`:
//!    * inside `[min, max]` (inclusive) → emit a toggle, clear everything;
//!    * outside → keep only the newest clap as the first of a fresh pair.
//!
//! Blocks below the threshold only age the timer: once it is older than
//! `clap_reset_after` an incomplete pair is abandoned.
//!
//! The pairing always considers the *most recent* two claps, never the first
//! two of a burst.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Thresholds;

// ════════════════════════════════════════════════════════════════════════════
// Events
// ════════════════════════════════════════════════════════════════════════════

/// Which detector asked for a toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    DoubleClap,
    Fist,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoubleClap => "double-clap",
            Self::Fist => "fist",
        }
    }
}

/// Edge-triggered request to flip the actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleEvent {
    pub source: TriggerSource,
    pub at:     Instant,
}

/// One above-threshold block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clap {
    pub at:   Instant,
    pub peak: u16,
}

/// What a single observation did to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClapVerdict {
    /// Below threshold, nothing pending expired.
    Silence,
    /// A clap was buffered and is waiting for a partner.
    Candidate(Clap),
    /// Two claps inside the window: the toggle is emitted exactly once.
    Paired(ToggleEvent),
    /// Two claps outside the window; the newer one starts a fresh pair.
    OutOfWindow(Duration),
    /// The pending clap aged out and was dropped.
    Expired,
}

// ════════════════════════════════════════════════════════════════════════════
// ClapDetector
// ════════════════════════════════════════════════════════════════════════════

/// Peak |amplitude| of a block.  `i16::MIN` maps to 32768 without overflow.
pub fn peak_amplitude(block: &[i16]) -> u16 {
    block.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

#[derive(Clone, Debug)]
pub struct ClapDetector {
    threshold:   u16,
    window_min:  Duration,
    window_max:  Duration,
    reset_after: Duration,
    claps:       VecDeque<Clap>,
    timer:       Option<Instant>,
}

impl ClapDetector {
    pub fn new(cfg: &Thresholds) -> Self {
        ClapDetector {
            threshold:   cfg.amplitude_threshold,
            window_min:  cfg.clap_window_min,
            window_max:  cfg.clap_window_max,
            reset_after: cfg.clap_reset_after,
            claps:       VecDeque::with_capacity(2),
            timer:       None,
        }
    }

    /// Feed one audio block.  Returns a toggle when a clap pair completes.
    pub fn observe(&mut self, block: &[i16], now: Instant) -> Option<ToggleEvent> {
        match self.observe_peak(peak_amplitude(block), now) {
            ClapVerdict::Paired(event) => Some(event),
            _ => None,
        }
    }

    /// Same as [`observe`](Self::observe) for an already-reduced block,
    /// reporting the full verdict.
    pub fn observe_peak(&mut self, peak: u16, now: Instant) -> ClapVerdict {
        if peak > self.threshold {
            return self.on_candidate(Clap { at: now, peak });
        }

        if let Some(started) = self.timer {
            if now.saturating_duration_since(started) > self.reset_after {
                debug!(pending = self.claps.len(), "clap pair abandoned after silence");
                self.reset();
                return ClapVerdict::Expired;
            }
        }
        ClapVerdict::Silence
    }

    fn on_candidate(&mut self, clap: Clap) -> ClapVerdict {
        debug!(peak = clap.peak, "clap candidate");
        self.claps.push_back(clap);
        while self.claps.len() > 2 {
            self.claps.pop_front();
        }
        self.timer = Some(clap.at);

        if self.claps.len() < 2 {
            return ClapVerdict::Candidate(clap);
        }

        let interval = self.claps[1].at.saturating_duration_since(self.claps[0].at);
        if interval >= self.window_min && interval <= self.window_max {
            debug!(?interval, "double clap");
            self.reset();
            ClapVerdict::Paired(ToggleEvent { source: TriggerSource::DoubleClap, at: clap.at })
        } else {
            debug!(?interval, "clap interval out of window");
            self.claps.pop_front();
            ClapVerdict::OutOfWindow(interval)
        }
    }

    /// Claps waiting for a partner (0 or 1 between observations).
    pub fn pending(&self) -> usize { self.claps.len() }

    /// Drop any half-built pair.
    pub fn reset(&mut self) {
        self.claps.clear();
        self.timer = None;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
