//! Keyboard simulation — capture sources fed by the visualizer's window.
//!
//! The window translates key presses into [`SimInput`] events and sends them
//! over `mpsc` channels; the sources below turn those into the same data a
//! microphone or hand tracker would deliver, paced at a realistic rate, so
//! the whole detection pipeline runs unchanged.
//!
//! | Key | Effect |
//! |---|---|
//! | `C` | next audio block carries a clap |
//! | hold `F` | fist in front of the camera |
//! | hold `P` | open palm |
//! | hold `O` | OK-sign |
//! | (nothing held) | no hand in the frame |

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use intent_core::error::{CaptureError, DeviceError};
use intent_core::hand::{Finger, LANDMARK_COUNT, THUMB_IP, THUMB_TIP, WRIST};
use intent_core::{AudioSource, ClimateSensor, HandLandmarks, Point, PoseSource, Reading, Shape, Thresholds};

// ════════════════════════════════════════════════════════════════════════════
// SimInput
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    KeyDown(SimKey),
    KeyUp(SimKey),
}

/// Simulated key codes (mapped from minifb Key).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Clap,   // C
    Fist,   // F
    Palm,   // P
    OkSign, // O
}

impl SimKey {
    fn shape(self) -> Option<Shape> {
        match self {
            SimKey::Clap   => None,
            SimKey::Fist   => Some(Shape::Fist),
            SimKey::Palm   => Some(Shape::Palm),
            SimKey::OkSign => Some(Shape::OkSign),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimAudio
// ════════════════════════════════════════════════════════════════════════════

const QUIET_LEVEL: i16 = 60;
const CLAP_LEVEL:  i16 = 12_000;

/// Emits one block per `block_size / sample_rate`.  A `C` press makes the
/// next block loud.
pub struct SimAudio {
    rx:         Receiver<SimInput>,
    block_size: usize,
    period:     Duration,
    next_due:   Option<Instant>,
    claps:      usize,
}

impl SimAudio {
    pub fn new(rx: Receiver<SimInput>, cfg: &Thresholds) -> Self {
        let period = Duration::from_secs_f64(cfg.block_size as f64 / f64::from(cfg.sample_rate));
        SimAudio { rx, block_size: cfg.block_size, period, next_due: None, claps: 0 }
    }

    fn read_at(&mut self, now: Instant) -> Result<Vec<i16>, CaptureError> {
        loop {
            match self.rx.try_recv() {
                Ok(SimInput::KeyDown(SimKey::Clap)) => self.claps += 1,
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) if self.claps == 0 => {
                    return Err(CaptureError::Disconnected)
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }

        if self.next_due.map_or(false, |due| now < due) {
            return Err(CaptureError::Timeout);
        }
        self.next_due = Some(now + self.period);

        let mut block: Vec<i16> = (0..self.block_size)
            .map(|i| if i % 2 == 0 { QUIET_LEVEL } else { -QUIET_LEVEL })
            .collect();
        if self.claps > 0 {
            self.claps -= 1;
            let mid = self.block_size / 2;
            if let Some(sample) = block.get_mut(mid) {
                *sample = CLAP_LEVEL;
            }
        }
        Ok(block)
    }
}

impl AudioSource for SimAudio {
    fn read_block(&mut self) -> Result<Vec<i16>, CaptureError> {
        self.read_at(Instant::now())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimPose
// ════════════════════════════════════════════════════════════════════════════

/// Roughly a webcam frame rate.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Shows the most recently pressed, still-held shape key; no hand when
/// nothing is held.
pub struct SimPose {
    rx:       Receiver<SimInput>,
    held:     Vec<Shape>,
    next_due: Option<Instant>,
}

impl SimPose {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimPose { rx, held: Vec::new(), next_due: None }
    }

    pub fn current(&self) -> Shape { self.held.last().copied().unwrap_or(Shape::None) }

    fn read_at(&mut self, now: Instant) -> Result<Option<HandLandmarks>, CaptureError> {
        loop {
            match self.rx.try_recv() {
                Ok(SimInput::KeyDown(key)) => {
                    if let Some(shape) = key.shape() {
                        self.held.retain(|&s| s != shape);
                        self.held.push(shape);
                    }
                }
                Ok(SimInput::KeyUp(key)) => {
                    if let Some(shape) = key.shape() {
                        self.held.retain(|&s| s != shape);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(CaptureError::Disconnected),
            }
        }

        if self.next_due.map_or(false, |due| now < due) {
            return Err(CaptureError::Timeout);
        }
        self.next_due = Some(now + FRAME_INTERVAL);
        Ok(synthetic_hand(self.current()))
    }
}

impl PoseSource for SimPose {
    fn read_frame(&mut self) -> Result<Option<HandLandmarks>, CaptureError> {
        self.read_at(Instant::now())
    }
}

/// Landmarks of an upright hand in a 640×480 frame that classify as
/// `shape`.  `Shape::None` yields no hand.
pub fn synthetic_hand(shape: Shape) -> Option<HandLandmarks> {
    let (thumb, fingers) = match shape {
        Shape::None   => return None,
        Shape::Fist   => (false, [false; 4]),
        Shape::Palm   => (true,  [true; 4]),
        Shape::OkSign => (true,  [false, true, true, true]),
        Shape::Other  => (true,  [true, true, false, false]),
    };

    let mut p = [Point::default(); LANDMARK_COUNT];
    p[WRIST]     = Point::new(320.0, 420.0);
    p[1]         = Point::new(280.0, 390.0);
    p[2]         = Point::new(260.0, 360.0);
    p[THUMB_IP]  = Point::new(250.0, 340.0);
    p[THUMB_TIP] = if thumb { Point::new(270.0, 320.0) } else { Point::new(235.0, 335.0) };

    for (i, finger) in Finger::ALL.iter().enumerate() {
        let x = 275.0 + i as f32 * 30.0;
        p[finger.pip() - 1] = Point::new(x, 300.0);
        let (pip, dip, tip) = if fingers[i] { (260.0, 235.0, 210.0) } else { (280.0, 300.0, 315.0) };
        p[finger.pip()] = Point::new(x, pip);
        p[finger.dip()] = Point::new(x, dip);
        p[finger.tip()] = Point::new(x, tip);
    }

    if shape == Shape::OkSign {
        // Curl the index onto the thumb tip.
        p[Finger::Index.tip()] = Point::new(p[THUMB_TIP].x + 4.0, p[THUMB_TIP].y + 3.0);
    }
    Some(HandLandmarks::new(p))
}

// ════════════════════════════════════════════════════════════════════════════
// SimClimate
// ════════════════════════════════════════════════════════════════════════════

/// A room that drifts slowly around 22 °C / 45 %.
#[derive(Debug, Default)]
pub struct SimClimate {
    reads: u32,
}

impl ClimateSensor for SimClimate {
    fn read(&mut self) -> Result<Reading, DeviceError> {
        let phase = self.reads as f32 * 0.3;
        self.reads = self.reads.wrapping_add(1);
        Ok(Reading {
            temperature_c: 22.0 + 0.8 * phase.sin(),
            humidity_pct:  45.0 + 3.0 * phase.cos(),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use intent_core::acoustic::peak_amplitude;
    use intent_core::hand::classify;
    use std::sync::mpsc;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn synthetic_hands_classify_as_requested() {
        for shape in [Shape::Fist, Shape::Palm, Shape::OkSign, Shape::Other] {
            let hand = synthetic_hand(shape).unwrap();
            assert_eq!(classify(&hand, 24.0), shape, "{:?}", shape);
        }
        assert!(synthetic_hand(Shape::None).is_none());
    }

    #[test]
    fn audio_is_paced_and_claps_are_loud() {
        let (tx, rx) = mpsc::channel();
        let mut audio = SimAudio::new(rx, &Thresholds::default());
        let t0 = Instant::now();

        let quiet = audio.read_at(t0).unwrap();
        assert_eq!(quiet.len(), 512);
        assert!(peak_amplitude(&quiet) < 2500);
        assert_eq!(audio.read_at(t0 + ms(10)), Err(CaptureError::Timeout));

        tx.send(SimInput::KeyDown(SimKey::Clap)).unwrap();
        let loud = audio.read_at(t0 + ms(40)).unwrap();
        assert!(peak_amplitude(&loud) > 2500);
        let after = audio.read_at(t0 + ms(80)).unwrap();
        assert!(peak_amplitude(&after) < 2500);
    }

    #[test]
    fn closed_window_disconnects_audio_after_pending_claps() {
        let (tx, rx) = mpsc::channel();
        let mut audio = SimAudio::new(rx, &Thresholds::default());
        tx.send(SimInput::KeyDown(SimKey::Clap)).unwrap();
        drop(tx);
        let t0 = Instant::now();
        assert!(peak_amplitude(&audio.read_at(t0).unwrap()) > 2500);
        assert_eq!(audio.read_at(t0 + ms(40)), Err(CaptureError::Disconnected));
    }

    #[test]
    fn pose_follows_most_recent_held_key() {
        let (tx, rx) = mpsc::channel();
        let mut pose = SimPose::new(rx);
        let t0 = Instant::now();
        let shape_at = |pose: &mut SimPose, i: u64| {
            classify_frame_opt(pose.read_at(t0 + ms(i * 50)).unwrap())
        };

        assert_eq!(shape_at(&mut pose, 0), Shape::None);
        tx.send(SimInput::KeyDown(SimKey::Fist)).unwrap();
        assert_eq!(shape_at(&mut pose, 1), Shape::Fist);
        tx.send(SimInput::KeyDown(SimKey::OkSign)).unwrap();
        assert_eq!(shape_at(&mut pose, 2), Shape::OkSign);
        tx.send(SimInput::KeyUp(SimKey::OkSign)).unwrap();
        assert_eq!(shape_at(&mut pose, 3), Shape::Fist);
        tx.send(SimInput::KeyUp(SimKey::Fist)).unwrap();
        assert_eq!(shape_at(&mut pose, 4), Shape::None);
    }

    #[test]
    fn pose_frames_are_paced() {
        let (_tx, rx) = mpsc::channel();
        let mut pose = SimPose::new(rx);
        let t0 = Instant::now();
        assert!(pose.read_at(t0).is_ok());
        assert_eq!(pose.read_at(t0 + ms(5)), Err(CaptureError::Timeout));
        assert!(pose.read_at(t0 + ms(40)).is_ok());
    }

    #[test]
    fn climate_stays_plausible() {
        let mut climate = SimClimate::default();
        for _ in 0..100 {
            let r = climate.read().unwrap();
            assert!((21.0..=23.0).contains(&r.temperature_c));
            assert!((41.0..=49.0).contains(&r.humidity_pct));
        }
    }

    fn classify_frame_opt(hand: Option<HandLandmarks>) -> Shape {
        intent_core::hand::classify_frame(hand.as_ref(), 24.0)
    }
}
