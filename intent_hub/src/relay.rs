//! Relay collaborators: MQTT (Sonoff/Tasmota command topic) and a null
//! fallback used when no broker is configured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use intent_core::error::ActuatorError;
use intent_core::{Relay, RelayCommand};

use crate::settings::MqttSettings;

const KEEP_ALIVE:      Duration = Duration::from_secs(60);
const REQUEST_CAP:     usize    = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// ════════════════════════════════════════════════════════════════════════════
// MqttRelay
// ════════════════════════════════════════════════════════════════════════════

/// Fire-and-forget publisher.  The network event loop runs on its own
/// thread and reconnects on its own; publishing while the broker is down
/// fails immediately instead of queueing.
pub struct MqttRelay {
    client:    Client,
    topic:     String,
    connected: Arc<AtomicBool>,
    closing:   Arc<AtomicBool>,
    first:     Option<Receiver<bool>>,
    worker:    Option<JoinHandle<()>>,
}

impl MqttRelay {
    /// Start the client.  Never blocks; see [`wait_connected`](Self::wait_connected).
    pub fn connect(settings: &MqttSettings) -> Self {
        let mut opts = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        opts.set_keep_alive(KEEP_ALIVE);
        if let Some((user, password)) = &settings.credentials {
            opts.set_credentials(user, password);
        }

        let (client, mut connection) = Client::new(opts, REQUEST_CAP);
        let connected = Arc::new(AtomicBool::new(false));
        let closing   = Arc::new(AtomicBool::new(false));
        let (first_tx, first_rx) = mpsc::channel();

        let (conn_flag, close_flag) = (connected.clone(), closing.clone());
        let host = format!("{}:{}", settings.host, settings.port);
        let worker = thread::spawn(move || {
            for notification in connection.iter() {
                if close_flag.load(Ordering::SeqCst) {
                    break;
                }
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %host, "mqtt connected");
                        conn_flag.store(true, Ordering::SeqCst);
                        let _ = first_tx.send(true);
                    }
                    Ok(event) => debug!(?event, "mqtt event"),
                    Err(e) => {
                        conn_flag.store(false, Ordering::SeqCst);
                        warn!(broker = %host, error = %e, "mqtt connection error");
                        let _ = first_tx.send(false);
                        thread::sleep(RECONNECT_DELAY);
                    }
                }
            }
            debug!("mqtt event loop finished");
        });

        MqttRelay {
            client,
            topic: settings.topic.clone(),
            connected,
            closing,
            first: Some(first_rx),
            worker: Some(worker),
        }
    }

    /// Wait for the first connection attempt to settle.  `true` once the
    /// broker acknowledged the session.
    pub fn wait_connected(&mut self, timeout: Duration) -> bool {
        if let Some(rx) = self.first.take() {
            let _ = rx.recv_timeout(timeout);
        }
        self.is_connected()
    }

    pub fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }
}

impl Relay for MqttRelay {
    fn publish(&mut self, command: RelayCommand) -> Result<(), ActuatorError> {
        if !self.is_connected() {
            return Err(ActuatorError::Unavailable("mqtt broker not connected".into()));
        }
        self.client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, command.as_str())
            .map_err(|e| ActuatorError::Transport(e.to_string()))
    }
}

impl Drop for MqttRelay {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.disconnect() {
            debug!(error = %e, "mqtt disconnect");
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("mqtt event loop panicked");
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// NullRelay — no broker configured
// ════════════════════════════════════════════════════════════════════════════

/// Accepts every command and only logs it, so the hub is usable without a
/// broker.
#[derive(Debug, Default)]
pub struct NullRelay;

impl Relay for NullRelay {
    fn publish(&mut self, command: RelayCommand) -> Result<(), ActuatorError> {
        info!(command = command.as_str(), "relay (no broker)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_relay_accepts_everything() {
        let mut relay = NullRelay;
        for cmd in [RelayCommand::On, RelayCommand::Off, RelayCommand::Toggle] {
            assert_eq!(relay.publish(cmd), Ok(()));
        }
    }

    #[test]
    fn unreachable_broker_is_unavailable() {
        let settings = MqttSettings {
            host:        "127.0.0.1".into(),
            port:        1,
            topic:       "cmnd/test/POWER".into(),
            client_id:   "intent_hub_test".into(),
            credentials: None,
        };
        let mut relay = MqttRelay::connect(&settings);
        assert!(!relay.wait_connected(Duration::from_secs(2)));
        assert!(matches!(
            relay.publish(RelayCommand::Toggle),
            Err(ActuatorError::Unavailable(_))
        ));
    }

    #[test]
    fn drop_joins_the_event_loop() {
        let settings = MqttSettings {
            host:        "127.0.0.1".into(),
            port:        1,
            topic:       "cmnd/test/POWER".into(),
            client_id:   "intent_hub_drop".into(),
            credentials: None,
        };
        let relay = MqttRelay::connect(&settings);
        let connected = relay.connected.clone();
        drop(relay);
        // The event-loop thread held the other reference.
        assert_eq!(Arc::strong_count(&connected), 1);
    }
}
