//! Pure routing of rumqttc events
//!
//! The publisher never subscribes, so the only incoming packets that matter are
//! ConnAck and broker-initiated Disconnect. Everything else is bookkeeping.

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Classifies MQTT events for the event-loop task
pub struct MessageHandler;

impl MessageHandler {
    /// Route an MQTT event to the action the event-loop task should take
    pub fn route_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Disconnect(disconnect) => EventRoute::Disconnected(format!(
                    "broker sent DISCONNECT ({:?})",
                    disconnect.reason_code
                )),
                Packet::PubAck(puback) => EventRoute::PublishAcknowledged {
                    packet_id: puback.pkid,
                },
                Packet::PubComp(pubcomp) => EventRoute::PublishAcknowledged {
                    packet_id: pubcomp.pkid,
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// Broker accepted the session
    ConnectionAcknowledged,
    /// Broker ended the session
    Disconnected(String),
    /// Our DISCONNECT has been written; everything queued before it went out
    DisconnectSent,
    /// Delivery of a QoS 1 or 2 publish confirmed
    PublishAcknowledged { packet_id: u16 },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
