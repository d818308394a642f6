//! Publish gate behaviour against in-flight reconnection


use std::time::{Duration, Instant};
use test_helpers::{controller_with, wait_for_state, wait_until};
use vrgadget::connection::ConnectionState;
use vrgadget::controller::GadgetControl;
use vrgadget::error::{ControllerError, PublishError};
use vrgadget::testing::MockTransport;

const SETTLE: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_connected_send_needs_no_reconnection() {
    let transport = MockTransport::new();
    let controller = controller_with(transport.clone(), 5, Duration::from_millis(100));
    controller.initialize().await.unwrap();

    controller.start_heating().await.unwrap();

    let metrics = controller.metrics();
    assert_eq!(metrics.reconnect_episodes, 0);
    assert_eq!(metrics.publish_retries, 0);
    assert_eq!(transport.connect_calls(), 1);
    assert_eq!(transport.publish_calls(), 1);
}

#[tokio::test]
async fn test_send_waits_for_reconnection_and_succeeds() {
    // Arrange: two failed attempts keep the episode open for a while
    let transport = MockTransport::new().with_connect_latency(Duration::from_millis(10));
    let controller = controller_with(transport.clone(), 5, Duration::from_millis(1_000));
    controller.initialize().await.unwrap();
    transport.script_connects([false, false, true]).await;
    transport.simulate_disconnect("link flap");
    assert!(wait_for_state(&controller, ConnectionState::Reconnecting, SETTLE).await);

    // Act
    let result = controller.finish_heating().await;

    // Assert
    assert!(result.is_ok(), "send should succeed once reconnected: {result:?}");
    assert_eq!(controller.status(), ConnectionState::Connected);
    let published = transport.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload.as_ref(), br#"{"data":"finish_heating"}"#);
}

#[tokio::test]
async fn test_send_fails_when_reconnection_outlasts_wait_window() {
    // Arrange: reconnection keeps failing for far longer than the wait window
    let transport = MockTransport::new();
    let controller = controller_with(transport.clone(), 100, Duration::from_millis(40));
    controller.initialize().await.unwrap();
    transport.set_connect_default(false);
    transport.simulate_disconnect("broker down");
    assert!(wait_for_state(&controller, ConnectionState::Reconnecting, SETTLE).await);

    // Act
    let started = Instant::now();
    let result = controller.start_splash().await;
    let waited = started.elapsed();

    // Assert
    assert!(matches!(
        result,
        Err(ControllerError::Publish(PublishError::NotConnected {
            state: ConnectionState::Reconnecting
        }))
    ));
    assert!(waited >= Duration::from_millis(40), "waited only {waited:?}");
    assert!(waited < Duration::from_secs(1), "waited {waited:?}");
    assert_eq!(transport.publish_calls(), 0);

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_publish_reconnects_and_retries_once() {
    // Arrange: the session dies without a notice, so only the publish sees it
    let transport = MockTransport::new();
    let controller = controller_with(transport.clone(), 5, Duration::from_millis(100));
    controller.initialize().await.unwrap();
    transport.drop_session_silently();

    // Act
    controller.start_cooling().await.unwrap();

    // Assert
    assert_eq!(transport.publish_calls(), 2);
    assert_eq!(transport.connect_calls(), 2);
    assert_eq!(controller.metrics().publish_retries, 1);
    assert_eq!(controller.metrics().reconnect_episodes, 0);
    assert_eq!(controller.status(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_failed_publish_with_failed_reconnect_hands_over_to_recovery() {
    // Arrange
    let transport = MockTransport::new();
    let controller = controller_with(transport.clone(), 5, Duration::from_millis(100));
    controller.initialize().await.unwrap();
    transport.drop_session_silently();
    transport.script_connects([false]).await;

    // Act
    let result = controller.start_cooling().await;

    // Assert: one publish, one immediate reconnect, then background recovery
    assert!(matches!(
        result,
        Err(ControllerError::Publish(PublishError::Transport(_)))
    ));
    assert_eq!(transport.publish_calls(), 1);
    assert!(wait_until(SETTLE, || controller.metrics().successful_recoveries == 1).await);
    assert_eq!(controller.status(), ConnectionState::Connected);

    controller.start_cooling().await.unwrap();
}

#[tokio::test]
async fn test_publish_is_retried_at_most_once() {
    let transport = MockTransport::new();
    let controller = controller_with(transport.clone(), 5, Duration::from_millis(100));
    controller.initialize().await.unwrap();
    transport.fail_next_publishes(5).await;

    let result = controller.start_splash().await;

    assert!(matches!(
        result,
        Err(ControllerError::Publish(PublishError::Transport(_)))
    ));
    assert_eq!(transport.publish_calls(), 2);
    assert_eq!(controller.metrics().publish_retries, 1);
}

#[tokio::test]
async fn test_concurrent_sends_are_serialised() {
    let transport = MockTransport::new().with_publish_latency(Duration::from_millis(5));
    let controller = controller_with(transport.clone(), 5, Duration::from_millis(100));
    controller.initialize().await.unwrap();

    let sends = (0..10).map(|i| {
        let controller = &controller;
        async move { controller.send(&format!("command_{i}")).await }
    });
    let results = futures::future::join_all(sends).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.published().await.len(), 10);
}
