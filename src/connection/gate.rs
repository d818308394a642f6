//! Publish coordination against in-flight reconnection
//!
//! A publish either proceeds on the live session, waits a bounded time for a
//! running reconnection episode to finish, or fails. It never touches the
//! transport without holding the manager's exclusion lock.

use super::manager::ConnectionManager;
use super::state::ConnectionState;
use crate::config::PublishSection;
use crate::error::{error_chain, redact_credentials, PublishError};
use crate::transport::{DeliveryGuarantee, Transport};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bounds for waiting on a reconnection episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Longest single wait before the state is re-checked
    pub poll_interval: Duration,
    /// Total time a publish may wait for reconnection to finish
    pub max_wait: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl From<&PublishSection> for GateConfig {
    fn from(section: &PublishSection) -> Self {
        Self {
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            max_wait: Duration::from_millis(section.max_wait_ms),
        }
    }
}

/// Serialises publishes with connection recovery
pub struct PublishGate<T>
where
    T: Transport + 'static,
{
    manager: Arc<ConnectionManager<T>>,
    config: GateConfig,
}

impl<T> Clone for PublishGate<T>
where
    T: Transport + 'static,
{
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            config: self.config,
        }
    }
}

impl<T> PublishGate<T>
where
    T: Transport + 'static,
{
    pub fn new(manager: Arc<ConnectionManager<T>>, config: GateConfig) -> Self {
        Self { manager, config }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<T>> {
        &self.manager
    }

    pub fn config(&self) -> GateConfig {
        self.config
    }

    /// Publish a payload under the exclusion lock
    ///
    /// A transport failure gets one synchronous recovery attempt and one
    /// retried publish before the error is returned.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        guarantee: DeliveryGuarantee,
    ) -> Result<(), PublishError> {
        let mut link = self.manager.lock().await;

        if self.manager.state() == ConnectionState::Reconnecting {
            drop(link);
            let state = self.wait_out_reconnection().await;
            debug!(%state, "Finished waiting for reconnection");
            link = self.manager.lock().await;
        }

        let state = self.manager.state();
        if !state.can_publish() {
            drop(link);
            warn!(%state, topic, "Publish rejected, broker not connected");
            self.manager.request_recovery();
            return Err(PublishError::NotConnected { state });
        }

        let first_error = match link.publish(topic, payload.clone(), guarantee).await {
            Ok(()) => {
                debug!(topic, bytes = payload.len(), "Published");
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(
            topic,
            error = %redact_credentials(&error_chain(&first_error)),
            "Publish failed, retrying once"
        );
        self.manager.metrics_handle().record_publish_retry();

        if let Err(e) = self.manager.recover_once(&mut link).await {
            drop(link);
            warn!(
                error = %redact_credentials(&error_chain(&e)),
                "Immediate reconnect failed, handing over to background recovery"
            );
            self.manager.request_recovery();
            return Err(PublishError::Transport(Box::new(first_error)));
        }

        match link.publish(topic, payload, guarantee).await {
            Ok(()) => {
                info!(topic, "Publish succeeded on retry");
                Ok(())
            }
            Err(e) => {
                let session_down = !link.is_connected();
                drop(link);
                if session_down {
                    self.manager.request_recovery();
                }
                Err(PublishError::Transport(Box::new(e)))
            }
        }
    }

    /// Wait until the state leaves `Reconnecting` or `max_wait` elapses
    async fn wait_out_reconnection(&self) -> ConnectionState {
        let mut state_rx = self.manager.subscribe_state();
        let deadline = Instant::now() + self.config.max_wait;

        loop {
            let state = *state_rx.borrow_and_update();
            if state != ConnectionState::Reconnecting {
                return state;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    max_wait_ms = self.config.max_wait.as_millis() as u64,
                    "Gave up waiting for reconnection"
                );
                return state;
            }

            let step = self.config.poll_interval.min(deadline - now);
            if let Ok(Err(_)) = tokio::time::timeout(step, state_rx.changed()).await {
                return *state_rx.borrow();
            }
        }
    }
}
