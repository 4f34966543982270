//! Bridge runtime orchestration.

use crate::bus::MqttPublisher;
use crate::config::Config;
use anyhow::{Context, Result};
use doorman_adapter_sesame::{SesameClient, StatusWatcher};
use doorman_core::{LockDevice, MechStatus, Reconciler, StatePublisher};
use doorman_proto::TopicRole;
use rumqttc::{Event, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The bridge between Homebridge and the lock.
pub struct Bridge {
    config: Config,
}

impl Bridge {
    /// Create a bridge.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect, force the unlocked baseline and serve until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if a client cannot be created or the startup unlock
    /// fails.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Starting bridge runtime");

        let client_id = format!("doorman-{}", Uuid::new_v4());
        let (publisher, mut eventloop) = MqttPublisher::new(&self.config.mqtt, &client_id)
            .context("Failed to create MQTT client")?;

        let device = SesameClient::new(self.config.sesame_client()?)
            .context("Failed to create SESAME client")?;
        tracing::info!(
            device_uuid = %self.config.sesame.uuid,
            client_id = %self.config.sesame.client_id,
            "SESAME device configured"
        );

        let reconciler = Arc::new(
            Reconciler::new(publisher, device.clone(), self.config.homebridge.clone())
                .with_history_tag(self.config.history_tag()),
        );

        let statuses = StatusWatcher::new(device, self.config.poll_interval()).start();
        let status_task = tokio::spawn(forward_status(Arc::clone(&reconciler), statuses));

        reconciler
            .startup()
            .await
            .context("Failed to initialize lock state")?;

        tracing::info!("Bridge running, press Ctrl+C to stop");

        loop {
            tokio::select! {
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            tracing::info!(code = ?ack.code, "Connected to MQTT broker");
                            let topic = &reconciler.topics().set_target_state;
                            if let Err(err) = reconciler.publisher().subscribe(topic).await {
                                tracing::error!(error = %err, topic, "Failed to subscribe");
                            }
                        }
                        Ok(Event::Incoming(Packet::SubAck(_))) => {
                            tracing::info!("Subscription acknowledged");
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            handle_message(&*reconciler, &publish.topic, &publish.payload).await;
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            tracing::warn!("Broker closed the connection");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Unexpected disconnection");
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        status_task.abort();
        tracing::info!("Bridge stopped");
        Ok(())
    }
}

/// Handle one inbound MQTT message.
///
/// Runs to completion before the caller polls for the next message.
/// Device failures are logged; the bridge keeps running.
pub async fn handle_message<P, D>(reconciler: &Reconciler<P, D>, topic: &str, payload: &[u8])
where
    P: StatePublisher,
    D: LockDevice,
{
    tracing::debug!(topic, payload_len = payload.len(), "Received MQTT message");

    if reconciler.topics().role(topic) != Some(TopicRole::SetTargetState) {
        return;
    }

    match reconciler.dispatch(payload).await {
        Ok(Some(command)) => tracing::debug!(%command, "Command completed"),
        Ok(None) => {}
        Err(err) => tracing::error!(error = %err, "Failed to carry out command"),
    }
}

/// Feed pushed device statuses to the reconciler until the watcher stops.
pub async fn forward_status<P, D>(
    reconciler: Arc<Reconciler<P, D>>,
    mut statuses: mpsc::Receiver<MechStatus>,
) where
    P: StatePublisher,
    D: LockDevice,
{
    while let Some(status) = statuses.recv().await {
        reconciler.on_status(&status).await;
    }
    tracing::warn!("Device status stream ended");
}
