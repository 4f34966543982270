//! Polling-based status subscription.

use crate::client::{ClientError, SesameClient};
use doorman_core::MechStatus;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Something that can report the lock's current mechanical status.
pub trait StatusSource: Send + Sync + 'static {
    /// Fetch the current status.
    fn status(&self) -> impl Future<Output = Result<MechStatus, ClientError>> + Send;
}

impl StatusSource for SesameClient {
    async fn status(&self) -> Result<MechStatus, ClientError> {
        SesameClient::status(self).await
    }
}

/// Turns periodic status reads into a stream of changes.
pub struct StatusWatcher<S> {
    source: S,
    poll_interval: Duration,
    /// Last emitted snapshot
    last: Option<Snapshot>,
}

/// The parts of a status that count as a change. Battery drift is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    in_lock_range: bool,
    in_unlock_range: bool,
    position: Option<i32>,
}

impl From<&MechStatus> for Snapshot {
    fn from(status: &MechStatus) -> Self {
        Self {
            in_lock_range: status.in_lock_range,
            in_unlock_range: status.in_unlock_range,
            position: status.position,
        }
    }
}

impl<S: StatusSource> StatusWatcher<S> {
    /// Create a watcher polling `source` every `poll_interval`.
    #[must_use]
    pub fn new(source: S, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            last: None,
        }
    }

    /// Start polling and return a channel of status changes.
    ///
    /// The first successful read is always emitted. Poll errors are logged
    /// and polling continues. The task ends when the receiver is dropped.
    #[must_use]
    pub fn start(mut self) -> mpsc::Receiver<MechStatus> {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            tracing::info!(poll_interval = ?self.poll_interval, "Watching device status");
            loop {
                match self.poll().await {
                    Ok(Some(status)) => {
                        if tx.send(status).await.is_err() {
                            tracing::warn!("Status receiver dropped, stopping watcher");
                            return;
                        }
                    }
                    Ok(None) => {
                        // Unchanged
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Status poll error");
                    }
                }

                tokio::time::sleep(self.poll_interval).await;
            }
        });

        rx
    }

    /// Read the status once, returning it only if it changed.
    async fn poll(&mut self) -> Result<Option<MechStatus>, ClientError> {
        let status = self.source.status().await?;
        let snapshot = Snapshot::from(&status);

        if self.last == Some(snapshot) {
            return Ok(None);
        }

        tracing::debug!(
            range = ?status.range(),
            position = ?status.position,
            "Device status changed"
        );
        self.last = Some(snapshot);
        Ok(Some(status))
    }
}
