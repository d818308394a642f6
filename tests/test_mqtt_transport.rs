//! MQTT transport tests that need no external broker
//!
//! Connecting to a closed local port must fail cleanly with a connection error
//! and leave the controller disconnected. Live-session tests run against a
//! loopback listener that acknowledges CONNECT and records every packet.

use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use vrgadget::connection::{ConnectionOptions, ConnectionState, GateConfig, RetryPolicy};
use vrgadget::controller::{GadgetControl, GadgetController};
use vrgadget::error::{ConnectionError, ControllerError};
use vrgadget::protocol::COMMAND_TOPIC;
use vrgadget::transport::mqtt::MqttError;
use vrgadget::transport::{DeliveryGuarantee, MqttTransport, Transport};

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const DISCONNECT: u8 = 14;

/// Packets seen by the loopback broker as (fixed header byte, body)
type Received = Vec<(u8, Vec<u8>)>;

async fn read_packet(stream: &mut TcpStream) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    let mut header = [0u8; 1];
    if stream.read(&mut header).await? == 0 {
        return Ok(None);
    }

    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        remaining |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0u8; remaining];
    stream.read_exact(&mut body).await?;
    Ok(Some((header[0], body)))
}

/// Accept one client and record its packets until DISCONNECT or EOF
async fn spawn_loopback_broker() -> (u16, JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Received::new();

        while let Ok(Some((header, body))) = read_packet(&mut stream).await {
            match header >> 4 {
                // CONNACK: no session, success, empty properties
                CONNECT => {
                    let _ = stream.write_all(&[0x20, 0x03, 0x00, 0x00, 0x00]).await;
                }
                PUBLISH if header & 0x06 != 0 => {
                    let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
                    let packet_id = &body[2 + topic_len..4 + topic_len];
                    let _ = stream
                        .write_all(&[0x40, 0x02, packet_id[0], packet_id[1]])
                        .await;
                }
                _ => {}
            }

            let done = header >> 4 == DISCONNECT;
            received.push((header, body));
            if done {
                break;
            }
        }
        received
    });

    (port, handle)
}

async fn broker_log(broker: JoinHandle<Received>) -> Received {
    tokio::time::timeout(Duration::from_secs(5), broker)
        .await
        .expect("loopback broker should finish")
        .unwrap()
}

fn packet_kinds(received: &Received) -> Vec<u8> {
    received.iter().map(|(header, _)| header >> 4).collect()
}

fn loopback_options(port: u16) -> ConnectionOptions {
    ConnectionOptions::builder("127.0.0.1", port)
        .client_id("vrgadget-loopback")
        .connect_timeout(Duration::from_secs(2))
        .build()
}

fn unreachable_options() -> ConnectionOptions {
    ConnectionOptions::builder("127.0.0.1", 1)
        .client_id("vrgadget-unreachable")
        .connect_timeout(Duration::from_secs(2))
        .build()
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let mut transport = MqttTransport::new();

    let result = transport.connect(&unreachable_options()).await;

    assert!(matches!(result, Err(MqttError::ConnectionFailedStr(_))));
    assert!(!transport.is_connected());
    assert!(matches!(
        transport
            .publish("VRGadget/command", "{}".into(), DeliveryGuarantee::AtLeastOnce)
            .await,
        Err(MqttError::NotConnected)
    ));
    assert!(transport.dispose().await.is_ok());
}

#[tokio::test]
async fn test_controller_initialize_against_closed_port() {
    let controller = GadgetController::new(
        MqttTransport::new(),
        unreachable_options(),
        RetryPolicy::new(2, Duration::from_millis(5), Duration::from_millis(10)),
        GateConfig::default(),
    );

    let result = controller.initialize().await;

    assert!(matches!(
        result,
        Err(ControllerError::Connection(
            ConnectionError::Rejected(_) | ConnectionError::Timeout(_)
        ))
    ));
    assert_eq!(controller.status(), ConnectionState::Disconnected);
    assert!(controller.start_heating().await.is_err());
    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dispose_writes_queued_publish_before_disconnect() {
    // Arrange
    let (port, broker) = spawn_loopback_broker().await;
    let mut transport = MqttTransport::new();
    transport.connect(&loopback_options(port)).await.unwrap();
    assert!(transport.is_connected());

    // Act: the client only queues the publish; dispose follows immediately
    transport
        .publish(
            COMMAND_TOPIC,
            Bytes::from_static(br#"{"data":"start_heating"}"#),
            DeliveryGuarantee::AtLeastOnce,
        )
        .await
        .unwrap();
    let disposed = transport.dispose().await;

    // Assert
    assert!(disposed.is_ok());
    assert!(!transport.is_connected());
    let received = broker_log(broker).await;
    assert_eq!(packet_kinds(&received), vec![CONNECT, PUBLISH, DISCONNECT]);
    assert!(received[1].1.ends_with(br#"{"data":"start_heating"}"#));
    assert_eq!(received[2].0, 0xE0);
}

#[tokio::test]
async fn test_dispose_of_idle_session_sends_disconnect() {
    let (port, broker) = spawn_loopback_broker().await;
    let mut transport = MqttTransport::new();
    transport.connect(&loopback_options(port)).await.unwrap();

    transport.dispose().await.unwrap();
    assert!(transport.dispose().await.is_ok());

    let received = broker_log(broker).await;
    assert_eq!(packet_kinds(&received), vec![CONNECT, DISCONNECT]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_send_then_shutdown_delivers_command() {
    for _ in 0..10 {
        // Arrange
        let (port, broker) = spawn_loopback_broker().await;
        let controller = GadgetController::new(
            MqttTransport::new(),
            loopback_options(port),
            RetryPolicy::new(2, Duration::from_millis(5), Duration::from_millis(10)),
            GateConfig::default(),
        );
        controller.initialize().await.unwrap();

        // Act
        controller.start_heating().await.unwrap();
        controller.shutdown().await.unwrap();

        // Assert
        let received = broker_log(broker).await;
        assert_eq!(packet_kinds(&received), vec![CONNECT, PUBLISH, DISCONNECT]);
        assert!(received[1].1.ends_with(br#"{"data":"start_heating"}"#));
        assert_eq!(controller.status(), ConnectionState::Disconnected);
    }
}
