//! Turns command names into publishes

use crate::connection::PublishGate;
use crate::error::{ControllerResult, PublishError};
use crate::protocol::{Command, COMMAND_TOPIC};
use crate::transport::{DeliveryGuarantee, Transport};
use tracing::{debug, Instrument};

/// Validates a command and routes it through the publish gate
///
/// The dispatcher never retries on its own.
pub struct CommandDispatcher<T>
where
    T: Transport + 'static,
{
    gate: PublishGate<T>,
}

impl<T> CommandDispatcher<T>
where
    T: Transport + 'static,
{
    pub fn new(gate: PublishGate<T>) -> Self {
        Self { gate }
    }

    /// Publish `{"data":"<name>"}` on the command topic
    ///
    /// Empty or whitespace-only names fail before the transport is touched.
    pub async fn send(&self, name: &str) -> ControllerResult<()> {
        let command = Command::new(name)?;
        let payload = command.payload().map_err(PublishError::from)?;

        async {
            debug!("Dispatching command");
            self.gate
                .publish(COMMAND_TOPIC, payload, DeliveryGuarantee::AtLeastOnce)
                .await
        }
        .instrument(crate::command_span!(command = %command.name(), topic = COMMAND_TOPIC))
        .await?;

        Ok(())
    }
}
