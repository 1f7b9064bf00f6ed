//! Top-level application: open collaborators, run the engine loop, tear down.
//!
//! Startup degrades instead of failing: a capture device that cannot be
//! opened disables its modality, a broker or bot that cannot be reached is
//! reported on the display and retried by its collaborator.  Only two
//! things are fatal: an invalid configuration (rejected before `run`) and
//! having no input modality at all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
#[cfg(not(all(feature = "mic", feature = "leap")))]
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use intent_core::error::EngineError;
use intent_core::{
    AlertSink, AudioSource, Coordinator, Display, Engine, PoseSource, Relay,
    StatusBoard, StatusReporter,
};

use crate::alert::{NullAlert, TelegramAlert};
use crate::display::{ConsoleDisplay, LcdMirror};
use crate::relay::{MqttRelay, NullRelay};
use crate::settings::AppConfig;
use crate::sim::{SimClimate, SimInput};
use crate::visualizer::{Overlay, Visualizer};

const BROKER_WAIT: Duration = Duration::from_secs(5);

// ════════════════════════════════════════════════════════════════════════════
// run
// ════════════════════════════════════════════════════════════════════════════

pub fn run(cfg: AppConfig) -> Result<()> {
    let t = cfg.thresholds.clone();

    // ── Status display ────────────────────────────────────────────────────
    let board = StatusBoard::new("", "");
    board.log("System", "starting...");
    info!("system starting");

    let lcd = LcdMirror::new();
    let display: Box<dyn Display> = if cfg.headless {
        Box::new(ConsoleDisplay::default())
    } else {
        Box::new(lcd.clone())
    };
    let reporter = StatusReporter::new(&t, board.clone(), display, Some(Box::new(SimClimate::default())))
        .spawn(t.display_refresh);

    // ── Capture ───────────────────────────────────────────────────────────
    let (audio, audio_tx) = open_audio(&cfg, &board);
    let (pose, pose_tx)   = open_pose(&cfg, &board);

    let mut vis = if cfg.headless {
        None
    } else {
        let v = Visualizer::new(lcd, audio_tx, pose_tx, t.tick)
            .map_err(|e| anyhow!(e))
            .context("opening the simulation window")?;
        Some(v)
    };

    // ── Actuators ─────────────────────────────────────────────────────────
    let relay = open_relay(&cfg, &board);
    let alert = open_alert(&cfg, &board)?;
    let coordinator = Coordinator::new(&t, relay, alert, cfg.relay_mode, cfg.alert_text.clone());

    let mut engine = Engine::new(&t, coordinator, board.clone(), audio, pose)
        .context("cannot start without a microphone or a camera")?;

    // ── Interrupt flag ────────────────────────────────────────────────────
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("installing the Ctrl-C handler")?;

    board.log("System", "started");
    info!(audio = engine.has_audio(), pose = engine.has_pose(), "system started");

    if let Some(on) = cfg.initial_state {
        engine.request_set(on, Instant::now());
    }

    // ── Main loop ─────────────────────────────────────────────────────────
    let mut overlay = Overlay::new(t.hold_duration);
    let mut result = Ok(());

    loop {
        // 1. Quit requests
        let window_open = vis.as_mut().map_or(true, |v| v.poll_input());
        if let Some(reason) = stop_reason(window_open, interrupted.load(Ordering::SeqCst)) {
            let (line1, line2) = reason.lines();
            board.log(line1, line2);
            info!(?reason, "stopped");
            break;
        }

        // 2. One engine tick
        let report = engine.tick(Instant::now());
        if !engine.has_inputs() {
            result = Err(anyhow::Error::new(EngineError::NoInputs).context("every input modality was lost"));
            break;
        }

        // 3. Render (the window paces the loop) or sleep
        match vis.as_mut() {
            Some(v) => {
                overlay.update(&report, engine.lights_on(), engine.pending_claps());
                v.render(&overlay);
            }
            None => thread::sleep(t.tick),
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────
    board.log("Shutting", "down...");
    info!("shutting down");
    drop(vis);
    reporter.stop();
    drop(engine);
    result
}

// ════════════════════════════════════════════════════════════════════════════
// Stop requests
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopReason {
    /// `Q` pressed or the window closed.
    QuitKey,
    /// Ctrl-C / SIGINT.
    Interrupted,
}

impl StopReason {
    fn lines(self) -> (&'static str, &'static str) {
        match self {
            StopReason::QuitKey     => ("System", "stopped"),
            StopReason::Interrupted => ("Stopped", "by user"),
        }
    }
}

/// An interrupt wins over a closed window.
fn stop_reason(window_open: bool, interrupted: bool) -> Option<StopReason> {
    if interrupted {
        Some(StopReason::Interrupted)
    } else if !window_open {
        Some(StopReason::QuitKey)
    } else {
        None
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Collaborator setup
// ════════════════════════════════════════════════════════════════════════════

type Opened<T> = (Option<Box<T>>, Option<Sender<SimInput>>);

#[cfg(feature = "mic")]
fn open_audio(cfg: &AppConfig, board: &StatusBoard) -> Opened<dyn AudioSource> {
    match crate::mic::MicSource::open(cfg.mic_device, &cfg.thresholds) {
        Ok(mic) => {
            board.log("Microphone", "initialized");
            (Some(Box::new(mic) as Box<dyn AudioSource>), None)
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "microphone unavailable");
            board.log("Microphone", "init failed");
            (None, None)
        }
    }
}

#[cfg(not(feature = "mic"))]
fn open_audio(cfg: &AppConfig, board: &StatusBoard) -> Opened<dyn AudioSource> {
    if cfg.headless {
        warn!("headless build without the `mic` feature has no microphone");
        board.log("Microphone", "not available");
        return (None, None);
    }
    let (tx, rx) = mpsc::channel();
    board.log("Microphone", "simulated");
    (Some(Box::new(crate::sim::SimAudio::new(rx, &cfg.thresholds)) as Box<dyn AudioSource>), Some(tx))
}

#[cfg(feature = "leap")]
fn open_pose(_cfg: &AppConfig, board: &StatusBoard) -> Opened<dyn PoseSource> {
    match crate::leap::LeapSource::open() {
        Ok(leap) => {
            board.log("Camera", "initialized");
            (Some(Box::new(leap) as Box<dyn PoseSource>), None)
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "hand tracker unavailable");
            board.log("Camera", "not available");
            (None, None)
        }
    }
}

#[cfg(not(feature = "leap"))]
fn open_pose(cfg: &AppConfig, board: &StatusBoard) -> Opened<dyn PoseSource> {
    if cfg.headless {
        warn!("headless build without the `leap` feature has no hand tracker");
        board.log("Camera", "not available");
        return (None, None);
    }
    let (tx, rx) = mpsc::channel();
    board.log("Camera", "simulated");
    (Some(Box::new(crate::sim::SimPose::new(rx)) as Box<dyn PoseSource>), Some(tx))
}

fn open_relay(cfg: &AppConfig, board: &StatusBoard) -> Box<dyn Relay> {
    let Some(settings) = &cfg.mqtt else {
        info!("no MQTT broker configured; relay commands are only logged");
        board.log("MQTT", "disabled");
        return Box::new(NullRelay);
    };

    let mut relay = MqttRelay::connect(settings);
    if relay.wait_connected(BROKER_WAIT) {
        board.log("MQTT", "connected");
    } else {
        warn!(host = %settings.host, "MQTT broker not reachable yet");
        board.log("MQTT", "failed");
    }
    Box::new(relay)
}

fn open_alert(cfg: &AppConfig, board: &StatusBoard) -> Result<Box<dyn AlertSink>> {
    let Some(settings) = &cfg.telegram else {
        info!("no Telegram bot configured; alerts are only logged");
        board.log("Telegram", "disabled");
        return Ok(Box::new(NullAlert));
    };

    board.log("Testing", "Telegram");
    let alert = TelegramAlert::new(settings)?;
    match alert.probe() {
        Ok(()) => {
            info!("Telegram bot reachable");
            board.log("Telegram", "OK");
        }
        Err(e) => {
            warn!(error = %e, "Telegram probe failed");
            board.log("Telegram", "failed");
        }
    }
    Ok(Box::new(alert))
}
