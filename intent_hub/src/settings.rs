//! Command line and environment configuration.
//!
//! Every threshold has a flag; secrets (broker credentials, bot token) can
//! come from the environment instead.  [`Args::into_config`] validates the
//! whole lot before any device is opened.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use intent_core::error::ConfigError;
use intent_core::{RelayMode, Thresholds};

pub const DEFAULT_ALERT_TEXT: &str =
    "🚨 EMERGENCY CALL 🚨\n\nUser needs help! Please check immediately.";

// ════════════════════════════════════════════════════════════════════════════
// Args
// ════════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "intent_hub")]
#[command(about = "Clap and hand-gesture home assistance hub")]
pub struct Args {
    // ── relay ─────────────────────────────────────────────────────────────
    /// MQTT broker host; without it relay commands are only logged
    #[arg(long, env = "MQTT_HOST")]
    pub mqtt_host: Option<String>,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    #[arg(long, default_value = "cmnd/sonoff/POWER")]
    pub mqtt_topic: String,

    #[arg(long, env = "MQTT_USER")]
    pub mqtt_user: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, default_value = "intent_hub")]
    pub mqtt_client_id: String,

    /// How toggles are published
    #[arg(long, value_enum, default_value_t = RelayModeArg::Toggle)]
    pub relay_mode: RelayModeArg,

    /// Publish this state once at startup
    #[arg(long, value_enum)]
    pub initial_state: Option<PowerArg>,

    // ── alert ─────────────────────────────────────────────────────────────
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    #[arg(long, default_value = "https://api.telegram.org")]
    pub telegram_api: String,

    /// HTTP timeout for alert calls (seconds)
    #[arg(long, default_value_t = 10.0)]
    pub telegram_timeout: f64,

    #[arg(long, default_value = DEFAULT_ALERT_TEXT)]
    pub alert_text: String,

    // ── capture / runtime ─────────────────────────────────────────────────
    /// Input device index (`mic` builds only)
    #[arg(long)]
    pub mic_device: Option<usize>,

    /// No window: console status lines, quit with Ctrl-C
    #[arg(long)]
    pub headless: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    // ── thresholds ────────────────────────────────────────────────────────
    /// Peak |amplitude| a block must exceed to count as a clap
    #[arg(long, default_value_t = 2500)]
    pub amplitude_threshold: u16,

    /// Shortest accepted clap interval (seconds)
    #[arg(long, default_value_t = 1.0)]
    pub clap_window_min: f64,

    /// Longest accepted clap interval (seconds)
    #[arg(long, default_value_t = 1.5)]
    pub clap_window_max: f64,

    /// Silence after which a lone clap is dropped (seconds)
    #[arg(long, default_value_t = 2.0)]
    pub clap_reset_after: f64,

    #[arg(long, default_value_t = 1.0)]
    pub toggle_cooldown: f64,

    #[arg(long, default_value_t = 300.0)]
    pub alert_cooldown: f64,

    /// OK-sign hold time before the alert fires (seconds)
    #[arg(long, default_value_t = 2.0)]
    pub hold_duration: f64,

    #[arg(long, default_value_t = 24.0)]
    pub pinch_threshold: f32,

    /// How long a status message stays on the display (seconds)
    #[arg(long, default_value_t = 8.0)]
    pub log_duration: f64,

    #[arg(long, default_value_t = 5.0)]
    pub climate_interval: f64,

    #[arg(long, default_value_t = 500)]
    pub display_refresh_ms: u64,

    #[arg(long, default_value_t = 16)]
    pub display_width: usize,

    #[arg(long, default_value_t = 10)]
    pub tick_ms: u64,

    #[arg(long, default_value_t = 512)]
    pub block_size: usize,

    #[arg(long, default_value_t = 16000)]
    pub sample_rate: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RelayModeArg {
    /// Publish TOGGLE
    Toggle,
    /// Publish ON/OFF from the tracked state
    Explicit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PowerArg {
    On,
    Off,
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttSettings {
    pub host:      String,
    pub port:      u16,
    pub topic:     String,
    pub client_id: String,
    /// `(user, password)`
    pub credentials: Option<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramSettings {
    pub api_base: String,
    pub token:    String,
    pub chat_id:  String,
    pub timeout:  Duration,
}

/// Validated configuration for the whole application.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub thresholds:    Thresholds,
    pub mqtt:          Option<MqttSettings>,
    pub telegram:      Option<TelegramSettings>,
    pub relay_mode:    RelayMode,
    pub initial_state: Option<bool>,
    pub alert_text:    String,
    pub mic_device:    Option<usize>,
    pub headless:      bool,
}

impl Default for AppConfig {
    /// Simulation window, no broker, no bot.
    fn default() -> Self {
        AppConfig {
            thresholds:    Thresholds::default(),
            mqtt:          None,
            telegram:      None,
            relay_mode:    RelayMode::Toggle,
            initial_state: None,
            alert_text:    DEFAULT_ALERT_TEXT.to_string(),
            mic_device:    None,
            headless:      false,
        }
    }
}

impl Args {
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let thresholds = Thresholds {
            amplitude_threshold:   self.amplitude_threshold,
            clap_window_min:       secs("clap_window_min", self.clap_window_min)?,
            clap_window_max:       secs("clap_window_max", self.clap_window_max)?,
            clap_reset_after:      secs("clap_reset_after", self.clap_reset_after)?,
            toggle_cooldown:       secs("toggle_cooldown", self.toggle_cooldown)?,
            alert_cooldown:        secs("alert_cooldown", self.alert_cooldown)?,
            hold_duration:         secs("hold_duration", self.hold_duration)?,
            pinch_threshold_px:    self.pinch_threshold,
            log_duration:          secs("log_duration", self.log_duration)?,
            climate_poll_interval: secs("climate_interval", self.climate_interval)?,
            display_refresh:       Duration::from_millis(self.display_refresh_ms),
            display_width:         self.display_width,
            tick:                  Duration::from_millis(self.tick_ms),
            block_size:            self.block_size,
            sample_rate:           self.sample_rate,
        };
        thresholds.validate()?;

        let credentials = match (self.mqtt_user, self.mqtt_password) {
            (Some(user), password) => Some((user, password.unwrap_or_default())),
            (None, Some(_)) => {
                return Err(ConfigError::Invalid {
                    field:  "mqtt_password",
                    reason: "given without --mqtt-user".into(),
                })
            }
            (None, None) => None,
        };
        let mqtt = self.mqtt_host.map(|host| MqttSettings {
            host,
            port:      self.mqtt_port,
            topic:     self.mqtt_topic,
            client_id: self.mqtt_client_id,
            credentials,
        });

        let telegram = match (self.telegram_token, self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some(TelegramSettings {
                api_base: self.telegram_api.trim_end_matches('/').to_string(),
                token,
                chat_id,
                timeout:  secs("telegram_timeout", self.telegram_timeout)?,
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    field:  "telegram",
                    reason: "bot token and chat id must be given together".into(),
                })
            }
        };

        Ok(AppConfig {
            thresholds,
            mqtt,
            telegram,
            relay_mode: match self.relay_mode {
                RelayModeArg::Toggle   => RelayMode::Toggle,
                RelayModeArg::Explicit => RelayMode::Explicit,
            },
            initial_state: self.initial_state.map(|p| p == PowerArg::On),
            alert_text:    self.alert_text,
            mic_device:    self.mic_device,
            headless:      self.headless,
        })
    }
}

fn secs(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
