//! Alert collaborators: Telegram Bot API and a null fallback.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::warn;

use intent_core::error::ActuatorError;
use intent_core::AlertSink;

use crate::settings::TelegramSettings;

// ════════════════════════════════════════════════════════════════════════════
// TelegramAlert
// ════════════════════════════════════════════════════════════════════════════

/// `sendMessage` over a blocking HTTP client.  Only a 200 answer counts.
pub struct TelegramAlert {
    client:   Client,
    bot_url:  String,
    chat_id:  String,
}

impl TelegramAlert {
    pub fn new(settings: &TelegramSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("building Telegram HTTP client")?;
        Ok(TelegramAlert {
            client,
            bot_url: format!("{}/bot{}", settings.api_base, settings.token),
            chat_id: settings.chat_id.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.bot_url, method)
    }

    /// Startup probe: `getMe` must answer 200.
    pub fn probe(&self) -> Result<(), ActuatorError> {
        let response = self.client
            .get(self.endpoint("getMe"))
            .send()
            .map_err(transport)?;
        check(response.status())
    }
}

impl AlertSink for TelegramAlert {
    fn send_message(&mut self, text: &str) -> Result<(), ActuatorError> {
        let response = self.client
            .post(self.endpoint("sendMessage"))
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .map_err(transport)?;
        check(response.status())
    }
}

fn check(status: StatusCode) -> Result<(), ActuatorError> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(ActuatorError::Status(status.as_u16()))
    }
}

// The URL carries the bot token; keep it out of logs.
fn transport(e: reqwest::Error) -> ActuatorError {
    ActuatorError::Transport(e.without_url().to_string())
}

// ════════════════════════════════════════════════════════════════════════════
// NullAlert — no bot configured
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct NullAlert;

impl AlertSink for NullAlert {
    fn send_message(&mut self, text: &str) -> Result<(), ActuatorError> {
        warn!(text, "alert raised but no bot is configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(api_base: &str) -> TelegramSettings {
        TelegramSettings {
            api_base: api_base.into(),
            token:    "123:abc".into(),
            chat_id:  "42".into(),
            timeout:  Duration::from_millis(500),
        }
    }

    #[test]
    fn endpoints_embed_the_token() {
        let alert = TelegramAlert::new(&settings("https://api.telegram.org")).unwrap();
        assert_eq!(alert.endpoint("getMe"), "https://api.telegram.org/bot123:abc/getMe");
        assert_eq!(
            alert.endpoint("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn only_200_is_success() {
        assert_eq!(check(StatusCode::OK), Ok(()));
        assert_eq!(check(StatusCode::NO_CONTENT), Err(ActuatorError::Status(204)));
        assert_eq!(check(StatusCode::UNAUTHORIZED), Err(ActuatorError::Status(401)));
    }

    #[test]
    fn unreachable_api_is_a_transport_error() {
        let mut alert = TelegramAlert::new(&settings("http://127.0.0.1:1")).unwrap();
        let err = alert.send_message("help").unwrap_err();
        assert!(matches!(err, ActuatorError::Transport(_)));
        assert!(matches!(alert.probe(), Err(ActuatorError::Transport(_))));
    }
}
