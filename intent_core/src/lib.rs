//! # intent_core
//!
//! Turns noisy, independently-sampled sensor streams into debounced
//! **intent events** and decides when the actuators may fire.
//!
//! ## Event → Action mapping
//!
//! | Source | Event | Action |
//! |---|---|---|
//! | Microphone | Two claps 1.0–1.5 s apart | Toggle the relay |
//! | Camera | Fist (leading edge) | Toggle the relay |
//! | Camera | OK-sign held for 2 s | Send the emergency alert |
//!
//! Both toggle sources share one actuator-scoped cooldown, so a clap and a
//! fist arriving together flip the light once.  The alert has its own, much
//! longer cooldown.
//!
//! ## Layout
//!
//! * [`acoustic`] — double-clap detector over audio blocks.
//! * [`hand`] — landmark geometry and shape classification.
//! * [`gesture`] — fist-toggle and hold-to-confirm state machines.
//! * [`coordinator`] — actuator state, cooldowns, relay/alert dispatch.
//! * [`status`] — two-line status board and its background updater.
//! * [`engine`] — one orchestration tick over both modalities.
//!
//! Every detector is a pure function of `(state, input, now)`; nothing in
//! this crate reads the clock or touches hardware on its own.

pub mod config;
pub mod error;
pub mod acoustic;
pub mod hand;
pub mod gesture;
pub mod coordinator;
pub mod status;
pub mod engine;

pub use config::Thresholds;
pub use acoustic::{ClapDetector, ClapVerdict, ToggleEvent, TriggerSource};
pub use hand::{HandLandmarks, Point, Shape};
pub use gesture::{GestureDetector, GestureOutput, HoldStatus};
pub use coordinator::{AlertSink, Coordinator, Outcome, Relay, RelayCommand, RelayMode};
pub use status::{ClimateSensor, Display, DisplayMode, Reading, StatusBoard, StatusReporter};
pub use engine::{AudioSource, Engine, PoseSource, TickReport};
