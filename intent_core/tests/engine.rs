//! End-to-end ticks through the engine with scripted sources.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use intent_core::error::{ActuatorError, CaptureError, EngineError};
use intent_core::hand::{Finger, LANDMARK_COUNT, THUMB_IP, THUMB_TIP, WRIST};
use intent_core::{
    AlertSink, AudioSource, ClapVerdict, Coordinator, Engine, HandLandmarks, HoldStatus, Outcome, Point,
    PoseSource, Relay, RelayCommand, RelayMode, Shape, StatusBoard, Thresholds, TriggerSource,
};

// ════════════════════════════════════════════════════════════════════════════
// Fakes
// ════════════════════════════════════════════════════════════════════════════

struct ScriptedAudio(VecDeque<Result<Vec<i16>, CaptureError>>);

impl AudioSource for ScriptedAudio {
    fn read_block(&mut self) -> Result<Vec<i16>, CaptureError> {
        self.0.pop_front().unwrap_or(Err(CaptureError::Timeout))
    }
}

struct ScriptedPose(VecDeque<Result<Option<HandLandmarks>, CaptureError>>);

impl PoseSource for ScriptedPose {
    fn read_frame(&mut self) -> Result<Option<HandLandmarks>, CaptureError> {
        self.0.pop_front().unwrap_or(Err(CaptureError::Timeout))
    }
}

#[derive(Clone, Default)]
struct Log {
    relay:  Arc<Mutex<Vec<RelayCommand>>>,
    alerts: Arc<Mutex<u32>>,
    fail_relay: bool,
    fail_alert: bool,
    /// When set, the board is shared with the engine and the status lines
    /// showing during each relay or alert call are recorded in `seen`.
    board: Option<StatusBoard>,
    seen:  Arc<Mutex<Vec<[String; 2]>>>,
}

impl Log {
    fn watching() -> Self {
        Log { board: Some(StatusBoard::new("", "")), ..Log::default() }
    }

    fn record_display(&self) {
        if let Some(board) = &self.board {
            self.seen.lock().unwrap().push(board.snapshot().log);
        }
    }
}

impl Relay for Log {
    fn publish(&mut self, command: RelayCommand) -> Result<(), ActuatorError> {
        self.record_display();
        if self.fail_relay {
            return Err(ActuatorError::Unavailable("broker down".into()));
        }
        self.relay.lock().unwrap().push(command);
        Ok(())
    }
}

impl AlertSink for Log {
    fn send_message(&mut self, _text: &str) -> Result<(), ActuatorError> {
        self.record_display();
        *self.alerts.lock().unwrap() += 1;
        if self.fail_alert {
            Err(ActuatorError::Transport("timeout".into()))
        } else {
            Ok(())
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════════

fn ms(n: u64) -> Duration { Duration::from_millis(n) }

fn lines(a: &str, b: &str) -> [String; 2] { [a.to_string(), b.to_string()] }

fn quiet() -> Vec<i16> { vec![40; 512] }

fn loud() -> Vec<i16> {
    let mut b = quiet();
    b[200] = -9000;
    b
}

fn hand(shape: Shape) -> HandLandmarks {
    let extended = match shape {
        Shape::Palm   => [true; 4],
        Shape::OkSign => [false, true, true, true],
        _             => [false; 4],
    };
    let mut p = [Point::default(); LANDMARK_COUNT];
    p[WRIST] = Point::new(320.0, 420.0);
    p[THUMB_IP] = Point::new(250.0, 340.0);
    p[THUMB_TIP] = if shape == Shape::Fist {
        Point::new(235.0, 335.0)
    } else {
        Point::new(270.0, 320.0)
    };
    for (i, f) in Finger::ALL.iter().enumerate() {
        let x = 270.0 + i as f32 * 30.0;
        let (pip, dip, tip) = if extended[i] { (260.0, 235.0, 210.0) } else { (280.0, 300.0, 315.0) };
        p[f.pip()] = Point::new(x, pip);
        p[f.dip()] = Point::new(x, dip);
        p[f.tip()] = Point::new(x, tip);
    }
    if shape == Shape::OkSign {
        p[Finger::Index.tip()] = Point::new(274.0, 324.0);
    }
    HandLandmarks::new(p)
}

fn engine(
    audio: Option<Vec<Result<Vec<i16>, CaptureError>>>,
    pose:  Option<Vec<Result<Option<HandLandmarks>, CaptureError>>>,
    log:   &Log,
) -> Result<Engine, EngineError> {
    let cfg = Thresholds::default();
    let coordinator = Coordinator::new(
        &cfg,
        Box::new(log.clone()),
        Box::new(log.clone()),
        RelayMode::Toggle,
        "help",
    );
    Engine::new(
        &cfg,
        coordinator,
        log.board.clone().unwrap_or_else(|| StatusBoard::new("", "")),
        audio.map(|a| Box::new(ScriptedAudio(a.into())) as Box<dyn AudioSource>),
        pose.map(|p| Box::new(ScriptedPose(p.into())) as Box<dyn PoseSource>),
    )
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn no_modalities_is_fatal() {
    assert!(matches!(engine(None, None, &Log::default()), Err(EngineError::NoInputs)));
}

#[test]
fn hand_fixtures_classify() {
    use intent_core::hand::classify;
    for shape in [Shape::Fist, Shape::Palm, Shape::OkSign] {
        assert_eq!(classify(&hand(shape), 24.0), shape);
    }
}

#[test]
fn double_clap_toggles_light() {
    let log = Log::default();
    let mut script = vec![Ok(loud())];
    script.extend((0..11).map(|_| Ok(quiet())));
    script.push(Ok(loud()));
    let mut eng = engine(Some(script), None, &log).unwrap();

    let t0 = Instant::now();
    let mut toggles = Vec::new();
    for i in 0..13u64 {
        toggles.extend(eng.tick(t0 + ms(i * 100)).toggles);
    }
    assert_eq!(toggles, vec![(TriggerSource::DoubleClap, Outcome::Sent)]);
    assert!(eng.lights_on());
    assert_eq!(eng.board().snapshot().log, ["Light".to_string(), "ON".to_string()]);
}

#[test]
fn clap_and_fist_share_one_cooldown() {
    let log = Log::default();
    let audio = vec![Ok(loud()), Ok(quiet()), Ok(loud())];
    let pose = vec![Ok(None), Ok(None), Ok(Some(hand(Shape::Fist)))];
    let mut eng = engine(Some(audio), Some(pose), &log).unwrap();

    let t0 = Instant::now();
    eng.tick(t0);
    eng.tick(t0 + ms(600));
    // Clap pair completes and the fist appears on the same tick.
    let report = eng.tick(t0 + ms(1200));
    assert_eq!(report.toggles, vec![
        (TriggerSource::DoubleClap, Outcome::Sent),
        (TriggerSource::Fist, Outcome::Suppressed),
    ]);
    assert_eq!(log.relay.lock().unwrap().len(), 1);
    assert_eq!(eng.board().snapshot().log, ["Light".to_string(), "cooldown".to_string()]);
}

#[test]
fn failed_relay_reports_toggle_error() {
    let log = Log { fail_relay: true, ..Log::default() };
    let audio = vec![Ok(loud()), Ok(quiet()), Ok(loud())];
    let mut eng = engine(Some(audio), None, &log).unwrap();

    let t0 = Instant::now();
    eng.tick(t0);
    eng.tick(t0 + ms(600));
    let report = eng.tick(t0 + ms(1200));
    assert!(matches!(
        report.toggles.as_slice(),
        [(TriggerSource::DoubleClap, Outcome::Failed(ActuatorError::Unavailable(_)))]
    ));
    assert!(!eng.lights_on());
    assert_eq!(eng.board().snapshot().log, lines("Toggle", "error"));
}

#[test]
fn clap_progress_is_shown() {
    let log = Log::default();
    let audio = vec![Ok(loud()), Ok(loud())];
    let mut eng = engine(Some(audio), None, &log).unwrap();

    let t0 = Instant::now();
    assert!(matches!(eng.tick(t0).clap, Some(ClapVerdict::Candidate(_))));
    assert_eq!(eng.board().snapshot().log, lines("Clap", "detected"));

    let report = eng.tick(t0 + ms(500));
    assert_eq!(report.clap, Some(ClapVerdict::OutOfWindow(ms(500))));
    assert!(report.toggles.is_empty());
    assert_eq!(eng.board().snapshot().log, lines("Clap", "bad interval"));
    assert_eq!(eng.pending_claps(), 1);
}

#[test]
fn initial_state_is_reported_on_the_board() {
    let log = Log::default();
    let mut eng = engine(None, Some(vec![]), &log).unwrap();

    let t0 = Instant::now();
    assert_eq!(eng.request_set(true, t0), Outcome::Sent);
    assert!(eng.lights_on());
    assert_eq!(eng.board().snapshot().log, lines("Light", "ON"));

    assert_eq!(eng.request_set(false, t0 + ms(200)), Outcome::Suppressed);
    assert_eq!(eng.board().snapshot().log, lines("Light", "cooldown"));
    assert_eq!(*log.relay.lock().unwrap(), vec![RelayCommand::On]);
}

#[test]
fn initial_state_with_broker_down_shows_error() {
    let log = Log { fail_relay: true, ..Log::default() };
    let mut eng = engine(None, Some(vec![]), &log).unwrap();

    assert!(matches!(eng.request_set(true, Instant::now()), Outcome::Failed(_)));
    assert!(!eng.lights_on());
    assert_eq!(eng.board().snapshot().log, lines("Light", "error"));
}

#[test]
fn fist_is_announced_before_the_relay_call() {
    let log = Log::watching();
    let mut eng = engine(None, Some(vec![Ok(Some(hand(Shape::Fist)))]), &log).unwrap();

    eng.tick(Instant::now());
    assert_eq!(*log.seen.lock().unwrap(), vec![lines("Fist", "detected")]);
    assert_eq!(eng.board().snapshot().log, lines("Light", "ON"));
}

#[test]
fn emergency_is_announced_before_the_alert_call() {
    let log = Log::watching();
    let pose: Vec<_> = (0..=20).map(|_| Ok(Some(hand(Shape::OkSign)))).collect();
    let mut eng = engine(None, Some(pose), &log).unwrap();

    let t0 = Instant::now();
    for i in 0..=20u64 {
        eng.tick(t0 + ms(i * 100));
    }
    assert_eq!(*log.seen.lock().unwrap(), vec![lines("Sending", "emergency")]);
    assert_eq!(eng.board().snapshot().log, lines("Emergency", "sent!"));
}

#[test]
fn fist_held_toggles_once_then_again_after_release() {
    let log = Log::default();
    let mut pose: Vec<_> = (0..50).map(|_| Ok(Some(hand(Shape::Fist)))).collect();
    pose.push(Ok(Some(hand(Shape::Palm))));
    pose.push(Ok(Some(hand(Shape::Fist))));
    let mut eng = engine(None, Some(pose), &log).unwrap();

    let t0 = Instant::now();
    let mut toggles = Vec::new();
    for i in 0..52u64 {
        toggles.extend(eng.tick(t0 + ms(i * 50)).toggles);
    }
    assert_eq!(toggles, vec![
        (TriggerSource::Fist, Outcome::Sent),
        (TriggerSource::Fist, Outcome::Sent),
    ]);
    assert!(!eng.lights_on());
}

#[test]
fn ok_hold_sends_alert_once() {
    let log = Log::default();
    let pose: Vec<_> = (0..=25).map(|_| Ok(Some(hand(Shape::OkSign)))).collect();
    let mut eng = engine(None, Some(pose), &log).unwrap();

    let t0 = Instant::now();
    let first = eng.tick(t0);
    assert_eq!(eng.board().snapshot().log, ["OK gesture".to_string(), "hold 2 sec".to_string()]);
    assert_eq!(first.gesture.map(|g| g.hold), Some(HoldStatus::Holding { remaining: ms(2000) }));

    let mut alerts = Vec::new();
    for i in 1..=25u64 {
        alerts.extend(eng.tick(t0 + ms(i * 100)).alert);
    }
    // Second attempt restarts at 2.1 s and would confirm at 4.1 s.
    assert_eq!(alerts, vec![Outcome::Sent]);
    assert_eq!(*log.alerts.lock().unwrap(), 1);
    assert_eq!(eng.board().snapshot().log[0], "OK gesture");
}

#[test]
fn failed_alert_is_reported_and_still_rate_limited() {
    let log = Log { fail_alert: true, ..Log::default() };
    let pose: Vec<_> = (0..=41).map(|_| Ok(Some(hand(Shape::OkSign)))).collect();
    let mut eng = engine(None, Some(pose), &log).unwrap();

    let t0 = Instant::now();
    let mut alerts = Vec::new();
    // Confirms at 2.0 s and again at 4.1 s.
    for i in 0..=41u64 {
        alerts.extend(eng.tick(t0 + ms(i * 100)).alert);
    }
    assert_eq!(alerts.len(), 2);
    assert!(matches!(alerts[0], Outcome::Failed(_)));
    assert_eq!(alerts[1], Outcome::Suppressed);
    assert_eq!(*log.alerts.lock().unwrap(), 1);
    assert_eq!(eng.board().snapshot().log, ["Call".to_string(), "cooldown".to_string()]);
}

#[test]
fn timeouts_are_not_events() {
    let log = Log::default();
    let audio = vec![Err(CaptureError::Timeout), Err(CaptureError::Device("xrun".into())), Ok(quiet())];
    let pose = vec![Err(CaptureError::Timeout), Ok(None)];
    let mut eng = engine(Some(audio), Some(pose), &log).unwrap();

    let t0 = Instant::now();
    let r0 = eng.tick(t0);
    assert_eq!((r0.clap, r0.gesture), (None, None));
    let r1 = eng.tick(t0 + ms(10));
    assert!(r1.clap.is_none());
    assert_eq!(r1.gesture.map(|g| g.shape), Some(Shape::None));
    assert!(eng.tick(t0 + ms(20)).clap.is_some());
    assert!(eng.has_audio() && eng.has_pose());
}

#[test]
fn disconnected_source_disables_modality() {
    let log = Log::default();
    let audio = vec![Ok(loud()), Err(CaptureError::Disconnected)];
    let pose = vec![Ok(None), Ok(None), Ok(None)];
    let mut eng = engine(Some(audio), Some(pose), &log).unwrap();

    let t0 = Instant::now();
    eng.tick(t0);
    assert_eq!(eng.pending_claps(), 1);
    eng.tick(t0 + ms(10));
    assert!(!eng.has_audio());
    assert!(eng.has_inputs());
    assert_eq!(eng.pending_claps(), 0);
    assert_eq!(eng.board().snapshot().log, ["Microphone".to_string(), "lost".to_string()]);
}

#[test]
fn hand_gap_resets_hold() {
    let log = Log::default();
    let mut pose: Vec<_> = (0..19).map(|_| Ok(Some(hand(Shape::OkSign)))).collect();
    pose.push(Ok(None));
    pose.extend((0..15).map(|_| Ok(Some(hand(Shape::OkSign)))));
    let mut eng = engine(None, Some(pose), &log).unwrap();

    let t0 = Instant::now();
    let alerts: Vec<_> = (0..35u64).filter_map(|i| eng.tick(t0 + ms(i * 100)).alert).collect();
    assert!(alerts.is_empty());
}

#[test]
fn replay_is_deterministic() {
    let audio = || {
        let mut s: Vec<Result<Vec<i16>, CaptureError>> = Vec::new();
        for i in 0..60 {
            s.push(Ok(if [0, 3, 15, 30, 42].contains(&i) { loud() } else { quiet() }));
        }
        s
    };
    let pose = || {
        (0..60)
            .map(|i| Ok(Some(hand(match i {
                10..=14 => Shape::Fist,
                20..=45 => Shape::OkSign,
                _ => Shape::Palm,
            }))))
            .collect::<Vec<_>>()
    };

    let run = || {
        let log = Log::default();
        let mut eng = engine(Some(audio()), Some(pose()), &log).unwrap();
        let t0 = Instant::now();
        (0..60u64).map(|i| eng.tick(t0 + ms(i * 100))).collect::<Vec<_>>()
    };

    let strip = |reports: Vec<intent_core::TickReport>| {
        reports.into_iter()
            .map(|r| (r.toggles, r.alert, r.gesture.map(|g| (g.shape, g.hold))))
            .collect::<Vec<_>>()
    };
    let a = strip(run());
    let b = strip(run());
    assert_eq!(a, b);
    assert!(a.iter().any(|(t, _, _)| !t.is_empty()));
    assert!(a.iter().any(|(_, alert, _)| alert.is_some()));
}
