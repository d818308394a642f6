//! Mock implementations for testing
//!
//! [`MockTransport`] stands in for the broker connection. Clones share state, so
//! a test keeps one handle for scripting and inspection while the connection
//! manager owns another.

use crate::connection::ConnectionOptions;
use crate::transport::{DeliveryGuarantee, DisconnectNotice, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors produced by [`MockTransport`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockTransportError {
    #[error("mock connect refused")]
    ConnectRefused,
    #[error("mock publish failed")]
    PublishFailed,
    #[error("mock transport not connected")]
    NotConnected,
}

/// A publish recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
    pub guarantee: DeliveryGuarantee,
}

/// Mock transport for testing
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub connect_script: Arc<Mutex<VecDeque<bool>>>,
    pub connect_default_fails: Arc<AtomicBool>,
    pub publish_failures: Arc<AtomicUsize>,
    pub published: Arc<Mutex<Vec<PublishedMessage>>>,
    pub connected: Arc<AtomicBool>,
    pub connect_count: Arc<AtomicUsize>,
    pub publish_count: Arc<AtomicUsize>,
    pub dispose_count: Arc<AtomicUsize>,
    pub notice_tx: Arc<std::sync::Mutex<Option<mpsc::UnboundedSender<DisconnectNotice>>>>,
    pub connect_latency: Option<Duration>,
    pub publish_latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unscripted connect fails
    pub fn with_failure() -> Self {
        let transport = Self::default();
        transport.connect_default_fails.store(true, Ordering::SeqCst);
        transport
    }

    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = Some(latency);
        self
    }

    pub fn with_publish_latency(mut self, latency: Duration) -> Self {
        self.publish_latency = Some(latency);
        self
    }

    /// Queue connect outcomes (`true` succeeds); consumed before the default applies
    pub async fn script_connects<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = bool>,
    {
        self.connect_script.lock().await.extend(outcomes);
    }

    /// Outcome for connects once the script is empty
    pub fn set_connect_default(&self, succeed: bool) {
        self.connect_default_fails.store(!succeed, Ordering::SeqCst);
    }

    /// Fail the next `count` publishes while still connected
    pub async fn fail_next_publishes(&self, count: usize) {
        self.publish_failures.store(count, Ordering::SeqCst);
    }

    /// Drop the session and report it, as a broker or network failure would
    pub fn simulate_disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let sender = self
            .notice_tx
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None);
        if let Some(sender) = sender {
            let _ = sender.send(DisconnectNotice::new(reason));
        }
    }

    /// Drop the session without a notice, so only a publish can discover it
    pub fn drop_session_silently(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_count.load(Ordering::SeqCst)
    }

    pub fn dispose_calls(&self) -> usize {
        self.dispose_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self, _options: &ConnectionOptions) -> Result<(), Self::Error> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.connect_latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.connect_script.lock().await.pop_front();
        let succeed =
            scripted.unwrap_or_else(|| !self.connect_default_fails.load(Ordering::SeqCst));

        if succeed {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            self.connected.store(false, Ordering::SeqCst);
            Err(MockTransportError::ConnectRefused)
        }
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        guarantee: DeliveryGuarantee,
    ) -> Result<(), Self::Error> {
        self.publish_count.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.publish_latency {
            tokio::time::sleep(latency).await;
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(MockTransportError::NotConnected);
        }

        let failing = self
            .publish_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(MockTransportError::PublishFailed);
        }

        self.published.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            guarantee,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn on_disconnected(&mut self, sender: mpsc::UnboundedSender<DisconnectNotice>) {
        if let Ok(mut guard) = self.notice_tx.lock() {
            *guard = Some(sender);
        }
    }

    async fn dispose(&mut self) -> Result<(), Self::Error> {
        self.dispose_count.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectionOptions {
        ConnectionOptions::builder("localhost", 1883).build()
    }

    #[tokio::test]
    async fn test_scripted_connects_then_default() {
        let mut transport = MockTransport::new();
        transport.script_connects([false, true]).await;

        assert!(transport.connect(&options()).await.is_err());
        assert!(transport.connect(&options()).await.is_ok());
        assert!(transport.connect(&options()).await.is_ok());
        assert_eq!(transport.connect_calls(), 3);
    }

    #[tokio::test]
    async fn test_with_failure_refuses_connects() {
        let mut transport = MockTransport::with_failure();
        assert_eq!(
            transport.connect(&options()).await,
            Err(MockTransportError::ConnectRefused)
        );
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_publish_records_message() {
        let mut transport = MockTransport::new();
        transport.connect(&options()).await.unwrap();

        transport
            .publish("t", Bytes::from_static(b"x"), DeliveryGuarantee::AtLeastOnce)
            .await
            .unwrap();

        let published = transport.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, Bytes::from_static(b"x"));
        assert_eq!(published[0].guarantee, DeliveryGuarantee::AtLeastOnce);
    }

    #[tokio::test]
    async fn test_publish_failures_are_consumed() {
        let mut transport = MockTransport::new();
        transport.connect(&options()).await.unwrap();
        transport.fail_next_publishes(1).await;

        let payload = Bytes::from_static(b"x");
        assert!(transport
            .publish("t", payload.clone(), DeliveryGuarantee::AtLeastOnce)
            .await
            .is_err());
        assert!(transport
            .publish("t", payload, DeliveryGuarantee::AtLeastOnce)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_simulate_disconnect_sends_notice() {
        let mut transport = MockTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.on_disconnected(tx);
        transport.connect(&options()).await.unwrap();

        transport.simulate_disconnect("broker restarted");

        assert!(!transport.is_connected());
        assert_eq!(rx.recv().await.unwrap().reason, "broker restarted");
    }
}
