//! Impure I/O for the MQTT transport
//!
//! Each `connect` builds a fresh rumqttc `AsyncClient`/`EventLoop` pair and
//! spawns a task that polls the event loop. rumqttc's own reconnection is not
//! used: the task stops at the first error and reports the loss once, leaving
//! recovery to the connection manager.

use super::connection::{
    configure_mqtt_options, qos_for, LinkState, MqttError, REQUEST_CHANNEL_CAPACITY,
};
use super::message_handler::{EventRoute, MessageHandler};
use crate::connection::ConnectionOptions;
use crate::transport::{DeliveryGuarantee, DisconnectNotice, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn, Instrument};

/// Upper bound on flushing queued requests and DISCONNECT during dispose
const DISPOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One broker session and the task polling it
struct Session {
    client: AsyncClient,
    event_loop_handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// rumqttc-backed [`Transport`]
pub struct MqttTransport {
    session: Option<Session>,
    connected: Arc<AtomicBool>,
    notice_tx: Option<mpsc::UnboundedSender<DisconnectNotice>>,
}

impl MqttTransport {
    pub fn new() -> Self {
        Self {
            session: None,
            connected: Arc::new(AtomicBool::new(false)),
            notice_tx: None,
        }
    }

    /// Create link and shutdown channels for a new session
    #[allow(clippy::type_complexity)]
    fn setup_session_channels() -> (
        (watch::Sender<LinkState>, watch::Receiver<LinkState>),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        let link_channels = watch::channel(LinkState::Connecting);
        let shutdown_channels = watch::channel(false);
        (link_channels, shutdown_channels)
    }

    /// Wait for ConnAck with timeout
    async fn wait_for_connection_confirmation(
        mut link_rx: watch::Receiver<LinkState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                match &*link_rx.borrow_and_update() {
                    LinkState::Up => return Ok(()),
                    LinkState::Down(reason) => {
                        return Err(MqttError::ConnectionFailedStr(reason.clone()));
                    }
                    LinkState::Connecting => {}
                }
                if link_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailedStr(
                        "Event loop stopped before ConnAck".to_string(),
                    ));
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectionFailedStr(
                "ConnAck timeout - no connection confirmation received".to_string(),
            )),
        }
    }

    /// Poll the event loop until the first error, shutdown or DISCONNECT in
    /// either direction
    async fn run_event_loop(
        mut event_loop: EventLoop,
        link_tx: watch::Sender<LinkState>,
        mut shutdown_rx: watch::Receiver<bool>,
        connected: Arc<AtomicBool>,
        notice_tx: Option<mpsc::UnboundedSender<DisconnectNotice>>,
    ) {
        let mut acknowledged = false;

        let reason = loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Shutdown signal received, stopping MQTT event loop");
                        connected.store(false, Ordering::Release);
                        return;
                    }
                }
                event = event_loop.poll() => match event {
                    Ok(event) => match MessageHandler::route_event(&event) {
                        EventRoute::ConnectionAcknowledged => {
                            acknowledged = true;
                            connected.store(true, Ordering::Release);
                            link_tx.send_replace(LinkState::Up);
                        }
                        EventRoute::Disconnected(reason) => break reason,
                        EventRoute::DisconnectSent => {
                            debug!("DISCONNECT written, stopping MQTT event loop");
                            connected.store(false, Ordering::Release);
                            link_tx.send_replace(LinkState::Down("client disconnected".to_string()));
                            return;
                        }
                        EventRoute::PublishAcknowledged { packet_id } => {
                            debug!(packet_id, "Broker acknowledged publish");
                        }
                        EventRoute::InfrastructureEvent(detail) => {
                            trace!(%detail, "MQTT infrastructure event");
                        }
                        EventRoute::OutgoingEvent => {}
                    },
                    Err(e) => break e.to_string(),
                },
            }
        };

        connected.store(false, Ordering::Release);
        link_tx.send_replace(LinkState::Down(reason.clone()));

        if acknowledged {
            error!(%reason, "MQTT session lost");
            if let Some(notice_tx) = notice_tx {
                let _ = notice_tx.send(DisconnectNotice::new(reason));
            }
        } else {
            debug!(%reason, "MQTT session ended before ConnAck");
        }
    }

    /// Stop the current session's task without reporting a disconnect
    fn teardown(&mut self) {
        self.connected.store(false, Ordering::Release);
        if let Some(session) = self.session.take() {
            session.shutdown_tx.send_replace(true);
            session.event_loop_handle.abort();
        }
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MqttTransport {
    type Error = MqttError;

    async fn connect(&mut self, options: &ConnectionOptions) -> Result<(), Self::Error> {
        self.teardown();
        self.connected = Arc::new(AtomicBool::new(false));

        let (client, event_loop) =
            AsyncClient::new(configure_mqtt_options(options), REQUEST_CHANNEL_CAPACITY);
        let ((link_tx, link_rx), (shutdown_tx, shutdown_rx)) = Self::setup_session_channels();

        let handle = tokio::spawn(
            Self::run_event_loop(
                event_loop,
                link_tx,
                shutdown_rx,
                self.connected.clone(),
                self.notice_tx.clone(),
            )
            .instrument(crate::mqtt_span!(
                client_id = %options.client_id(),
                host = %options.host()
            )),
        );

        self.session = Some(Session {
            client,
            event_loop_handle: handle,
            shutdown_tx,
        });

        match Self::wait_for_connection_confirmation(link_rx, options.connect_timeout()).await {
            Ok(()) => {
                info!(host = %options.host(), port = options.port(), "MQTT session acknowledged");
                Ok(())
            }
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        guarantee: DeliveryGuarantee,
    ) -> Result<(), Self::Error> {
        let session = self.session.as_ref().ok_or(MqttError::NotConnected)?;
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }

        session
            .client
            .publish(topic, qos_for(guarantee), false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn on_disconnected(&mut self, sender: mpsc::UnboundedSender<DisconnectNotice>) {
        self.notice_tx = Some(sender);
    }

    async fn dispose(&mut self) -> Result<(), Self::Error> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        // DISCONNECT queues behind any publishes the client already accepted,
        // so the event loop keeps running until it has written it
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        let result = if was_connected {
            session
                .client
                .disconnect()
                .await
                .map_err(|e| MqttError::DisconnectFailed(Box::new(e)))
        } else {
            Ok(())
        };

        if !was_connected || result.is_err() {
            session.shutdown_tx.send_replace(true);
        }

        match tokio::time::timeout(DISPOSE_DRAIN_TIMEOUT, &mut session.event_loop_handle).await {
            Ok(Ok(())) => debug!("MQTT event loop task stopped"),
            Ok(Err(e)) if !e.is_cancelled() => warn!("MQTT event loop task ended with error: {}", e),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("MQTT event loop did not drain in time, aborting");
                session.shutdown_tx.send_replace(true);
                session.event_loop_handle.abort();
            }
        }

        info!("MQTT transport disposed");
        result
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        // Async cleanup is not possible here; dispose() is the graceful path
        self.teardown();
    }
}
