//! Status reporter — a two-line display fed without blocking the detectors.
//!
//! Writers call [`StatusBoard::post`] from any thread; the board is a short
//! critical section around two small line pairs.  A [`StatusReporter`] runs
//! on its own schedule, decides what the display should show, and does all
//! display and sensor I/O *outside* the lock.
//!
//! Two slots are kept:
//!
//! * **transient log**: the latest event line, shown for `log_duration`;
//! * **live metric**: climate readings (or whatever was last posted as a
//!   metric), shown whenever no fresh log line is pending.
//!
//! The climate sensor is slow, so it is polled at most once per
//! `climate_poll_interval`, never once per refresh.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::Thresholds;
use crate::error::DeviceError;

// ════════════════════════════════════════════════════════════════════════════
// Collaborators
// ════════════════════════════════════════════════════════════════════════════

/// Character display with numbered lines.
pub trait Display: Send {
    fn render_line(&mut self, text: &str, line: usize) -> Result<(), DeviceError>;
    fn clear(&mut self) -> Result<(), DeviceError>;
}

/// Temperature / humidity pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub temperature_c: f32,
    pub humidity_pct:  f32,
}

/// Slow, possibly blocking climate sensor.
pub trait ClimateSensor: Send {
    fn read(&mut self) -> Result<Reading, DeviceError>;
}

// ════════════════════════════════════════════════════════════════════════════
// StatusBoard
// ════════════════════════════════════════════════════════════════════════════

/// Which slot a post goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    LiveMetric,
    TransientLog,
}

#[derive(Debug)]
struct BoardState {
    mode:      DisplayMode,
    log:       [String; 2],
    posted_at: Option<Instant>,
    metric:    [String; 2],
}

/// Cloneable handle to the shared status lines.
#[derive(Clone, Debug)]
pub struct StatusBoard {
    inner: Arc<Mutex<BoardState>>,
}

/// What the board currently holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub mode:   DisplayMode,
    pub log:    [String; 2],
    pub metric: [String; 2],
}

impl StatusBoard {
    /// Start in live-metric mode showing the given placeholder.
    pub fn new(line1: impl Into<String>, line2: impl Into<String>) -> Self {
        StatusBoard {
            inner: Arc::new(Mutex::new(BoardState {
                mode:      DisplayMode::LiveMetric,
                log:       [String::new(), String::new()],
                posted_at: None,
                metric:    [line1.into(), line2.into()],
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking post, stamped with the current time.
    pub fn post(&self, line1: impl Into<String>, line2: impl Into<String>, mode: DisplayMode) {
        self.post_at(line1, line2, mode, Instant::now());
    }

    /// Post with an explicit timestamp.
    pub fn post_at(
        &self,
        line1: impl Into<String>,
        line2: impl Into<String>,
        mode:  DisplayMode,
        now:   Instant,
    ) {
        let lines = [line1.into(), line2.into()];
        debug!(line1 = %lines[0], line2 = %lines[1], ?mode, "status");
        let mut s = self.lock();
        match mode {
            DisplayMode::TransientLog => {
                s.log = lines;
                s.posted_at = Some(now);
                s.mode = DisplayMode::TransientLog;
            }
            // Metrics never displace a pending log line.
            DisplayMode::LiveMetric => s.metric = lines,
        }
    }

    /// Shorthand for a transient log post.
    pub fn log(&self, line1: impl Into<String>, line2: impl Into<String>) {
        self.post(line1, line2, DisplayMode::TransientLog);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let s = self.lock();
        StatusSnapshot { mode: s.mode, log: s.log.clone(), metric: s.metric.clone() }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// StatusReporter
// ════════════════════════════════════════════════════════════════════════════

/// Cut a line to the display width (in characters).
pub fn fit_width(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

pub fn climate_lines(reading: &Result<Reading, DeviceError>) -> [String; 2] {
    match reading {
        Ok(r) => [
            format!("Temp:{:.1}C", r.temperature_c),
            format!("Hum:{:.1}%", r.humidity_pct),
        ],
        Err(_) => ["Sensor error".to_string(), "Check sensor".to_string()],
    }
}

pub struct StatusReporter {
    board:         StatusBoard,
    display:       Box<dyn Display>,
    sensor:        Option<Box<dyn ClimateSensor>>,
    width:         usize,
    log_duration:  Duration,
    poll_interval: Duration,
    last_poll:     Option<Instant>,
    shown:         Option<[String; 2]>,
}

impl StatusReporter {
    pub fn new(
        cfg:     &Thresholds,
        board:   StatusBoard,
        display: Box<dyn Display>,
        sensor:  Option<Box<dyn ClimateSensor>>,
    ) -> Self {
        StatusReporter {
            board,
            display,
            sensor,
            width:         cfg.display_width,
            log_duration:  cfg.log_duration,
            poll_interval: cfg.climate_poll_interval,
            last_poll:     None,
            shown:         None,
        }
    }

    /// Decide what to show and render it if it changed.  Returns the lines
    /// written to the display on this tick, if any.
    pub fn refresh_tick(&mut self, now: Instant) -> Option<[String; 2]> {
        // 1. Expire a stale log line and see whether the sensor is due.
        let poll_due = {
            let mut s = self.board.lock();
            if s.mode == DisplayMode::TransientLog {
                let stale = s.posted_at
                    .map_or(true, |at| now.saturating_duration_since(at) > self.log_duration);
                if stale {
                    s.mode = DisplayMode::LiveMetric;
                    self.last_poll = None;
                }
            }
            s.mode == DisplayMode::LiveMetric
                && self.sensor.is_some()
                && self.last_poll
                    .map_or(true, |at| now.saturating_duration_since(at) >= self.poll_interval)
        };

        // 2. Sensor I/O without the lock.
        let polled = match (&mut self.sensor, poll_due) {
            (Some(sensor), true) => {
                let reading = sensor.read();
                if let Err(e) = &reading {
                    warn!(error = %e, "climate sensor read failed");
                }
                self.last_poll = Some(now);
                Some(climate_lines(&reading))
            }
            _ => None,
        };

        // 3. Publish the reading and pick the lines.
        let lines = {
            let mut s = self.board.lock();
            if let Some(metric) = polled {
                s.metric = metric;
            }
            match s.mode {
                DisplayMode::TransientLog => s.log.clone(),
                DisplayMode::LiveMetric   => s.metric.clone(),
            }
        };
        let lines = [fit_width(&lines[0], self.width), fit_width(&lines[1], self.width)];

        // 4. Display I/O without the lock.
        if self.shown.as_ref() == Some(&lines) {
            return None;
        }
        for (i, text) in lines.iter().enumerate() {
            if let Err(e) = self.display.render_line(text, i) {
                warn!(error = %e, line = i, "display write failed");
                self.shown = None;
                return None;
            }
        }
        self.shown = Some(lines.clone());
        Some(lines)
    }

    /// Run on a background thread, refreshing every `period`.
    pub fn spawn(self, period: Duration) -> ReporterHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let mut reporter = self;
        let thread = thread::spawn(move || {
            loop {
                reporter.refresh_tick(Instant::now());
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            // Show whatever was posted last, then blank the panel.
            reporter.refresh_tick(Instant::now());
            if let Err(e) = reporter.display.clear() {
                warn!(error = %e, "display clear failed");
            }
        });
        ReporterHandle { stop_tx, thread: Some(thread) }
    }
}

/// Owns the background updater; stopping (or dropping) joins it and
/// clears the display.
pub struct ReporterHandle {
    stop_tx: Sender<()>,
    thread:  Option<JoinHandle<()>>,
}

impl ReporterHandle {
    pub fn stop(mut self) { self.shutdown(); }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.stop_tx.send(());
            if thread.join().is_err() {
                warn!("status reporter thread panicked");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) { self.shutdown(); }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
