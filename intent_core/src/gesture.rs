//! Gesture event detector — fist toggles and hold-to-confirm.
//!
//! Two independent state machines read the same stream of classified
//! frames:
//!
//! * **Fist toggle** (`Idle ⇄ Armed`): a toggle request is emitted on the
//!   `Idle → Armed` edge only, so holding a fist toggles once.  Any non-fist
//!   frame disarms.
//! * **Hold to confirm** (`Idle → Holding(start) → Confirmed → Idle`): the
//!   OK-sign must be seen on every frame for `hold_duration`.  One
//!   non-matching frame (including "no hand") throws the attempt away.
//!
//! Neither machine knows about cooldowns; the coordinator gates the
//! actuators.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Thresholds;
use crate::hand::{classify_frame, HandLandmarks, Shape};

// ════════════════════════════════════════════════════════════════════════════
// Output
// ════════════════════════════════════════════════════════════════════════════

/// Progress of the hold-to-confirm gesture after one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldStatus {
    Idle,
    Holding { remaining: Duration },
    /// The hold completed on this frame.  Reported once per attempt.
    Confirmed,
}

/// Result of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureOutput {
    pub shape:        Shape,
    /// Fist leading edge on this frame.
    pub toggle:       bool,
    pub hold:         HoldStatus,
    /// The OK-sign hold began on this frame.
    pub hold_started: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Fist toggle
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FistState {
    #[default]
    Idle,
    Armed,
}

#[derive(Clone, Debug, Default)]
pub struct FistToggle {
    state: FistState,
}

impl FistToggle {
    /// Returns true on the frame the fist first appears.
    pub fn observe(&mut self, shape: Shape) -> bool {
        match (self.state, shape == Shape::Fist) {
            (FistState::Idle, true) => {
                self.state = FistState::Armed;
                true
            }
            (FistState::Armed, false) => {
                self.state = FistState::Idle;
                false
            }
            _ => false,
        }
    }

    pub fn state(&self) -> FistState { self.state }
}

// ════════════════════════════════════════════════════════════════════════════
// Hold to confirm
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HoldState {
    Idle,
    Holding { since: Instant },
}

#[derive(Clone, Debug)]
pub struct HoldToConfirm {
    hold:  Duration,
    state: HoldState,
}

impl HoldToConfirm {
    pub fn new(hold: Duration) -> Self {
        HoldToConfirm { hold, state: HoldState::Idle }
    }

    pub fn observe(&mut self, shape: Shape, now: Instant) -> HoldStatus {
        if shape != Shape::OkSign {
            if let HoldState::Holding { since } = self.state {
                debug!(held = ?now.saturating_duration_since(since), "hold interrupted");
            }
            self.state = HoldState::Idle;
            return HoldStatus::Idle;
        }

        let since = match self.state {
            HoldState::Holding { since } => since,
            HoldState::Idle => {
                self.state = HoldState::Holding { since: now };
                now
            }
        };

        match self.hold.checked_sub(now.saturating_duration_since(since)) {
            Some(remaining) if !remaining.is_zero() => HoldStatus::Holding { remaining },
            _ => {
                self.state = HoldState::Idle;
                HoldStatus::Confirmed
            }
        }
    }

    /// Start of the current attempt, if one is running.
    pub fn holding_since(&self) -> Option<Instant> {
        match self.state {
            HoldState::Holding { since } => Some(since),
            HoldState::Idle => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureDetector
// ════════════════════════════════════════════════════════════════════════════

/// Both machines behind one `observe` call.
#[derive(Clone, Debug)]
pub struct GestureDetector {
    pinch_threshold_px: f32,
    fist:               FistToggle,
    hold:               HoldToConfirm,
}

impl GestureDetector {
    pub fn new(cfg: &Thresholds) -> Self {
        GestureDetector {
            pinch_threshold_px: cfg.pinch_threshold_px,
            fist:               FistToggle::default(),
            hold:               HoldToConfirm::new(cfg.hold_duration),
        }
    }

    /// Classify a landmark frame (`None` = no hand) and feed both machines.
    pub fn observe_landmarks(&mut self, hand: Option<&HandLandmarks>, now: Instant) -> GestureOutput {
        let shape = classify_frame(hand, self.pinch_threshold_px);
        self.observe(shape, now)
    }

    /// Feed an already-classified frame.
    pub fn observe(&mut self, shape: Shape, now: Instant) -> GestureOutput {
        let was_holding = self.hold.holding_since().is_some();
        let toggle = self.fist.observe(shape);
        let hold = self.hold.observe(shape, now);
        let hold_started = !was_holding && matches!(hold, HoldStatus::Holding { .. });
        if toggle {
            debug!("fist edge");
        }
        GestureOutput { shape, toggle, hold, hold_started }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn detector() -> GestureDetector { GestureDetector::new(&Thresholds::default()) }

    #[test]
    fn fist_run_toggles_once() {
        for n in [1usize, 2, 10, 250] {
            let mut fist = FistToggle::default();
            let toggles = (0..n).filter(|_| fist.observe(Shape::Fist)).count();
            assert_eq!(toggles, 1, "run of {}", n);
            assert_eq!(fist.state(), FistState::Armed);
        }
    }

    #[test]
    fn fist_rearms_after_other_frame() {
        let mut fist = FistToggle::default();
        assert!(fist.observe(Shape::Fist));
        assert!(!fist.observe(Shape::Fist));
        assert!(!fist.observe(Shape::None));
        assert!(fist.observe(Shape::Fist));
    }

    #[test]
    fn continuous_ok_confirms_once() {
        let t0 = Instant::now();
        let mut det = detector();
        let mut confirms = 0;
        for i in 0..=22 {
            let out = det.observe(Shape::OkSign, t0 + ms(i * 100));
            if out.hold == HoldStatus::Confirmed {
                confirms += 1;
                assert_eq!(i, 20);
            }
        }
        assert_eq!(confirms, 1);
    }

    #[test]
    fn remaining_counts_down() {
        let t0 = Instant::now();
        let mut det = detector();
        let first = det.observe(Shape::OkSign, t0);
        assert_eq!(first.hold, HoldStatus::Holding { remaining: ms(2000) });
        assert!(first.hold_started);
        let later = det.observe(Shape::OkSign, t0 + ms(1500));
        assert_eq!(later.hold, HoldStatus::Holding { remaining: ms(500) });
        assert!(!later.hold_started);
    }

    #[test]
    fn interruption_at_1_9s_loses_the_attempt() {
        let t0 = Instant::now();
        let mut det = detector();
        let mut confirms = 0;
        for i in 0..=30u64 {
            let shape = if i == 19 { Shape::Other } else { Shape::OkSign };
            if det.observe(shape, t0 + ms(i * 100)).hold == HoldStatus::Confirmed {
                confirms += 1;
            }
        }
        // Restarted at 2.0 s, so nothing can confirm before 4.0 s.
        assert_eq!(confirms, 0);
    }

    #[test]
    fn missing_hand_resets_hold() {
        let t0 = Instant::now();
        let mut det = detector();
        det.observe(Shape::OkSign, t0);
        assert_eq!(det.observe(Shape::None, t0 + ms(1000)).hold, HoldStatus::Idle);
        let resumed = det.observe(Shape::OkSign, t0 + ms(1100));
        assert!(resumed.hold_started);
        assert_eq!(resumed.hold, HoldStatus::Holding { remaining: ms(2000) });
    }

    #[test]
    fn new_attempt_after_confirm() {
        let t0 = Instant::now();
        let mut det = detector();
        det.observe(Shape::OkSign, t0);
        assert_eq!(det.observe(Shape::OkSign, t0 + ms(2000)).hold, HoldStatus::Confirmed);
        let next = det.observe(Shape::OkSign, t0 + ms(2100));
        assert!(next.hold_started);
        assert_eq!(det.observe(Shape::OkSign, t0 + ms(4100)).hold, HoldStatus::Confirmed);
    }

    #[test]
    fn zero_hold_confirms_on_first_frame() {
        let mut hold = HoldToConfirm::new(Duration::ZERO);
        assert_eq!(hold.observe(Shape::OkSign, Instant::now()), HoldStatus::Confirmed);
        assert_eq!(hold.holding_since(), None);
    }

    #[test]
    fn machines_are_independent() {
        let t0 = Instant::now();
        let mut det = detector();
        det.observe(Shape::OkSign, t0);
        let out = det.observe(Shape::Fist, t0 + ms(100));
        assert!(out.toggle);
        assert_eq!(out.hold, HoldStatus::Idle);
    }
}
