//! Lock state reconciliation.
//!
//! Two event sources feed the reconciler: commands arriving on the
//! set-target-state topic and status pushes from the lock. Both end in
//! [`Reconciler::announce`], which publishes the target and current topics
//! and records the published state under one lock.

use crate::status::MechStatus;
use doorman_proto::{Command, HomebridgeTopics, LockState};
use std::fmt;
use std::future::Future;
use tokio::sync::Mutex;

/// History label attached to device actions started by this bridge.
pub const DEFAULT_HISTORY_TAG: &str = "DOORMAN";

/// Outbound side of the message bus.
pub trait StatePublisher: Send + Sync {
    /// Transport error.
    type Error: fmt::Display + Send;

    /// Publish a payload to a topic.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Actions on the physical lock.
pub trait LockDevice: Send + Sync {
    /// Device or vendor API error.
    type Error: fmt::Display + Send;

    /// Lock, recording `history_tag` as the originator.
    fn lock(&self, history_tag: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Unlock, recording `history_tag` as the originator.
    fn unlock(&self, history_tag: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Single owner of the published lock state.
pub struct Reconciler<P, D> {
    publisher: P,
    device: D,
    topics: HomebridgeTopics,
    history_tag: String,
    /// Last announced state. Held across publishes so announcements never
    /// interleave on the wire.
    published: Mutex<Option<LockState>>,
}

impl<P, D> Reconciler<P, D>
where
    P: StatePublisher,
    D: LockDevice,
{
    /// Create a reconciler. Nothing is published until the first
    /// announcement.
    #[must_use]
    pub fn new(publisher: P, device: D, topics: HomebridgeTopics) -> Self {
        Self {
            publisher,
            device,
            topics,
            history_tag: DEFAULT_HISTORY_TAG.to_string(),
            published: Mutex::new(None),
        }
    }

    /// Override the history label sent with device actions.
    #[must_use]
    pub fn with_history_tag(mut self, history_tag: impl Into<String>) -> Self {
        self.history_tag = history_tag.into();
        self
    }

    /// Topic set in use.
    pub fn topics(&self) -> &HomebridgeTopics {
        &self.topics
    }

    /// History label sent with device actions.
    pub fn history_tag(&self) -> &str {
        &self.history_tag
    }

    /// The publisher.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// The device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Last announced state, `None` before the first announcement.
    pub async fn published_state(&self) -> Option<LockState> {
        *self.published.lock().await
    }

    /// Handle a raw payload from the set-target-state topic.
    ///
    /// Returns the command that was carried out, or `None` when the payload
    /// was not a lock or unlock request. Unrecognized payloads are not errors
    /// and cause no publish.
    ///
    /// # Errors
    ///
    /// Returns error if the command was recognized but could not be carried
    /// out.
    pub async fn dispatch(&self, payload: &[u8]) -> Result<Option<Command>, ReconcileError> {
        let command = match Command::parse(payload) {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!(error = %err, "Ignoring set-target-state payload");
                return Ok(None);
            }
        };

        self.execute(command).await?;
        Ok(Some(command))
    }

    /// Lock the device and announce the result.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::execute`].
    pub async fn lock(&self) -> Result<(), ReconcileError> {
        self.execute(Command::Lock).await
    }

    /// Unlock the device and announce the result.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::execute`].
    pub async fn unlock(&self) -> Result<(), ReconcileError> {
        self.execute(Command::Unlock).await
    }

    /// Carry out a locally requested transition.
    ///
    /// 1. Publish the target so subscribers see the request in flight.
    /// 2. Call the device with the history label.
    /// 3. Announce the target as both target and current state.
    ///
    /// # Errors
    ///
    /// Returns error if the in-flight publish or the device call fails; no
    /// announcement happens in either case.
    pub async fn execute(&self, command: Command) -> Result<(), ReconcileError> {
        let target = command.target();
        tracing::info!(%command, "Received {} request", command);

        self.publish_target(target).await?;

        let result = match command {
            Command::Lock => self.device.lock(&self.history_tag).await,
            Command::Unlock => self.device.unlock(&self.history_tag).await,
        };
        result.map_err(|e| ReconcileError::Device {
            command,
            message: e.to_string(),
        })?;

        tracing::info!(%command, history_tag = %self.history_tag, "Device is {}", target);

        self.announce(target).await;
        Ok(())
    }

    /// React to a status pushed by the device.
    ///
    /// Settled statuses are announced, transitional ones are dropped. The
    /// device may push the same settled status more than once for a single
    /// change; every push is announced again.
    pub async fn on_status(&self, status: &MechStatus) -> Option<LockState> {
        let Some(state) = status.lock_state() else {
            tracing::debug!(
                range = ?status.range(),
                position = ?status.position,
                "Ignoring transitional status"
            );
            return None;
        };

        tracing::debug!(
            %state,
            position = ?status.position,
            battery_percentage = ?status.battery_percentage,
            "Device reported status"
        );

        self.announce(state).await;
        Some(state)
    }

    /// Publish `state` to the target topic then the current topic, and
    /// record it as published.
    ///
    /// Publishing is best effort: a transport failure is logged and the
    /// state is recorded anyway. Repeating the same state publishes again.
    pub async fn announce(&self, state: LockState) {
        let mut published = self.published.lock().await;

        for topic in [&self.topics.get_target_state, &self.topics.get_current_state] {
            if let Err(err) = self.publisher.publish(topic, state.payload()).await {
                tracing::warn!(topic = %topic, %state, error = %err, "Failed to publish lock state");
            }
        }

        let previous = published.replace(state);
        tracing::info!(%state, previous = ?previous, "Current state is {}", state.label());
    }

    /// Force a known baseline: unlock the device, then announce unlocked.
    ///
    /// The physical state is not queried.
    ///
    /// # Errors
    ///
    /// Returns error if the unlock fails.
    pub async fn startup(&self) -> Result<(), ReconcileError> {
        tracing::info!("Initializing lock to unlocked");
        self.unlock().await?;
        self.announce(LockState::Unlocked).await;
        Ok(())
    }

    /// In-flight target publish. Shares the announcement lock so it never
    /// lands between the two publishes of an announcement.
    async fn publish_target(&self, target: LockState) -> Result<(), ReconcileError> {
        let _published = self.published.lock().await;
        let topic = &self.topics.get_target_state;

        self.publisher
            .publish(topic, target.payload())
            .await
            .map_err(|e| ReconcileError::Publish {
                topic: topic.clone(),
                message: e.to_string(),
            })
    }
}

/// Errors from a lock or unlock operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconcileError {
    /// Publishing the in-flight target failed
    #[error("publish to {topic} failed: {message}")]
    Publish {
        /// Topic that could not be published
        topic: String,
        /// Transport error
        message: String,
    },
    /// The device rejected or did not complete the action
    #[error("device {command} failed: {message}")]
    Device {
        /// Command that failed
        command: Command,
        /// Device error
        message: String,
    },
}
