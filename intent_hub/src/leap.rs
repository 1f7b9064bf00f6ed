//! LeapMotion hand tracking (feature `leap`).
//!
//! A polling thread owns the LeapC connection and sends the latest tracked
//! hand, projected to 2-D pixel landmarks, over an `mpsc` channel.
//!
//! # Projection
//!
//! The controller looks up at a palm-down hand.  We view it from above:
//! image `x` follows the Leap `x` axis and image `y` the Leap `z` axis
//! (toward the user is down), both relative to the palm centre and scaled
//! by [`PX_PER_MM`] into a 640×480 frame.  Right hands are mirrored so the
//! thumb rule (tip right of its IP joint = extended) holds for either hand.
//!
//! Joint mapping per digit `d` (thumb = 0):
//!
//! | landmark | Leap joint |
//! |---|---|
//! | `1 + 4d` | proximal.prev |
//! | `2 + 4d` | intermediate.prev |
//! | `3 + 4d` | distal.prev |
//! | `4 + 4d` | distal.next (tip) |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use intent_core::error::CaptureError;
use intent_core::hand::{LANDMARK_COUNT, WRIST};
use intent_core::{HandLandmarks, Point, PoseSource};

pub const PX_PER_MM: f32 = 2.0;
const FRAME_CENTRE: (f32, f32) = (320.0, 300.0);
const POLL_TIMEOUT_MS: u32 = 100;

/// One joint in Leap millimetres.
pub type Joint = [f32; 3];

// ════════════════════════════════════════════════════════════════════════════
// LeapSource
// ════════════════════════════════════════════════════════════════════════════

pub struct LeapSource {
    rx:      Receiver<Option<HandLandmarks>>,
    _poller: Poller,
}

impl LeapSource {
    /// Connect to the tracking service.  Fails when LeapC cannot open a
    /// connection; the modality is then unavailable.
    pub fn open() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        let poller = Poller::spawn(move |stop| {
            use leaprs::*;

            let mut connection = match Connection::create(ConnectionConfig::default()) {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("create: {:?}", e)));
                    return;
                }
            };
            if let Err(e) = connection.open() {
                let _ = ready_tx.send(Err(format!("open: {:?}", e)));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !stop.load(Ordering::SeqCst) {
                let msg = match connection.poll(POLL_TIMEOUT_MS) {
                    Ok(m)  => m,
                    Err(_) => continue,
                };
                if let Event::Tracking(frame) = msg.event() {
                    let hands: Vec<_> = frame.hands().into_iter().collect();
                    let hand = hands.iter()
                        .find(|h| h.hand_type() == HandType::Right)
                        .or_else(|| hands.first());

                    let landmarks = hand.map(|h| {
                        let palm = h.palm().position();
                        let mut joints = [[palm.x, palm.y, palm.z]; LANDMARK_COUNT];
                        for (d, digit) in h.digits().into_iter().enumerate().take(5) {
                            let bones = [
                                digit.proximal().prev_joint(),
                                digit.intermediate().prev_joint(),
                                digit.distal().prev_joint(),
                                digit.distal().next_joint(),
                            ];
                            for (j, v) in bones.iter().enumerate() {
                                joints[1 + 4 * d + j] = [v.x, v.y, v.z];
                            }
                        }
                        project(&joints, h.hand_type() == HandType::Right)
                    });

                    if tx.send(landmarks).is_err() {
                        return;
                    }
                }
            }
        });

        ready_rx
            .recv()
            .context("LeapMotion thread exited during startup")?
            .map_err(|e| anyhow!("LeapC connection failed: {}", e))?;
        info!("LeapMotion connected");
        Ok(LeapSource { rx, _poller: poller })
    }
}

/// Background thread that runs until its stop flag is raised.  Dropping the
/// handle raises the flag and joins; the body must check it at least once
/// per poll timeout.
struct Poller {
    stop:   Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Poller {
    fn spawn<F>(body: F) -> Self
    where
        F: FnOnce(&AtomicBool) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = thread::spawn(move || body(&flag));
        Poller { stop, thread: Some(thread) }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("LeapMotion thread panicked");
            }
        }
    }
}

impl PoseSource for LeapSource {
    fn read_frame(&mut self) -> Result<Option<HandLandmarks>, CaptureError> {
        let mut latest = match self.rx.try_recv() {
            Ok(frame) => frame,
            Err(TryRecvError::Empty) => return Err(CaptureError::Timeout),
            Err(TryRecvError::Disconnected) => {
                warn!("LeapMotion thread gone");
                return Err(CaptureError::Disconnected);
            }
        };
        // Skip to the newest frame; the tracker runs faster than the tick.
        while let Ok(frame) = self.rx.try_recv() {
            latest = frame;
        }
        Ok(latest)
    }
}

/// Project Leap joints (index 0 = palm centre, standing in for the wrist)
/// into pixel landmarks.
pub fn project(joints: &[Joint; LANDMARK_COUNT], mirror: bool) -> HandLandmarks {
    let palm = joints[WRIST];
    let sx = if mirror { -PX_PER_MM } else { PX_PER_MM };
    let (cx, cy) = FRAME_CENTRE;
    let mut points = [Point::default(); LANDMARK_COUNT];
    for (p, j) in points.iter_mut().zip(joints.iter()) {
        *p = Point::new(cx + (j[0] - palm[0]) * sx, cy + (j[2] - palm[2]) * PX_PER_MM);
    }
    HandLandmarks::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent_core::hand::{classify, Finger, THUMB_IP, THUMB_TIP};
    use intent_core::Shape;

    /// Flat right hand over the controller, fingers pointing away (-z),
    /// thumb out to the left (-x).
    fn flat_right_hand() -> [Joint; LANDMARK_COUNT] {
        let mut j = [[0.0, 200.0, 0.0]; LANDMARK_COUNT];
        j[1] = [-30.0, 200.0, 10.0];
        j[2] = [-45.0, 200.0, 0.0];
        j[THUMB_IP] = [-55.0, 200.0, -10.0];
        j[THUMB_TIP] = [-65.0, 200.0, -20.0];
        for (i, f) in Finger::ALL.iter().enumerate() {
            let x = -20.0 + i as f32 * 15.0;
            j[f.pip() - 1] = [x, 200.0, -40.0];
            j[f.pip()] = [x, 200.0, -80.0];
            j[f.dip()] = [x, 200.0, -105.0];
            j[f.tip()] = [x, 200.0, -125.0];
        }
        j
    }

    #[test]
    fn dropping_the_poller_stops_its_thread() {
        let (tx, rx) = mpsc::channel();
        let poller = Poller::spawn(move |stop| {
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(std::time::Duration::from_millis(5));
            }
            let _ = tx.send(());
        });
        drop(poller);
        assert_eq!(rx.try_recv(), Ok(()));
    }

    #[test]
    fn palm_centre_maps_to_frame_centre() {
        let hand = project(&flat_right_hand(), true);
        assert_eq!(hand.point(WRIST), Point::new(320.0, 300.0));
    }

    #[test]
    fn flat_right_hand_is_a_palm() {
        let hand = project(&flat_right_hand(), true);
        assert!(hand.thumb_extended());
        assert_eq!(classify(&hand, 24.0), Shape::Palm);
    }

    #[test]
    fn unmirrored_right_thumb_reads_as_curled() {
        let hand = project(&flat_right_hand(), false);
        assert!(!hand.thumb_extended());
    }
}
