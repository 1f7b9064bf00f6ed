//! # intent_hub
//!
//! Home-assistance hub built on [`intent_core`]: claps and hand gestures
//! drive a smart-plug relay over MQTT, a held OK-sign sends an emergency
//! message through a Telegram bot, and a 16×2 character display shows what
//! happened plus the room climate.
//!
//! ## Input → Action mapping
//!
//! | Input | Action |
//! |---|---|
//! | Two claps 1.0–1.5 s apart | Toggle the light (MQTT `TOGGLE`, or `ON`/`OFF`) |
//! | Fist appears | Toggle the light |
//! | OK-sign held for 2 s | Emergency alert (at most once per 5 min) |
//!
//! ## Feature flags
//!
//! * (default) — **Simulation mode**: a window mirrors the LCD and the
//!   keyboard stands in for the microphone and the hand tracker.
//! * `mic` — real microphone via `cpal`.
//! * `leap` — real hand tracking via a LeapMotion controller.
//!
//! ### Simulation keyboard shortcuts
//!
//! | Key | Input |
//! |---|---|
//! | `C` | Clap |
//! | hold `F` | Fist |
//! | hold `P` | Open palm |
//! | hold `O` | OK-sign |
//! | `Q` | Quit |
//!
//! `--headless` drops the window and sends status lines to the log.  A
//! headless build needs at least one of `mic` / `leap`.  Ctrl-C quits
//! through the normal teardown in either mode.

pub mod settings;
pub mod relay;
pub mod alert;
pub mod display;
pub mod sim;
#[cfg(feature = "mic")]
pub mod mic;
#[cfg(feature = "leap")]
pub mod leap;
pub mod visualizer;
pub mod app;
