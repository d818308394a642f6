//! High level controller for the VR gadget

use super::dispatcher::CommandDispatcher;
use crate::config::ControllerConfig;
use crate::connection::{
    ConnectionManager, ConnectionOptions, ConnectionState, GateConfig, MetricsSnapshot,
    PublishGate, RetryPolicy,
};
use crate::error::ControllerResult;
use crate::protocol::GadgetCommand;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Named operations understood by the gadget
#[async_trait::async_trait]
pub trait GadgetControl: Send + Sync {
    /// Open the first broker session
    async fn initialize(&self) -> ControllerResult<()>;

    /// Publish a raw command name
    async fn send(&self, command: &str) -> ControllerResult<()>;

    async fn send_command(&self, command: GadgetCommand) -> ControllerResult<()> {
        self.send(command.as_str()).await
    }

    async fn start_heating(&self) -> ControllerResult<()> {
        self.send_command(GadgetCommand::StartHeating).await
    }

    async fn finish_heating(&self) -> ControllerResult<()> {
        self.send_command(GadgetCommand::FinishHeating).await
    }

    async fn start_cooling(&self) -> ControllerResult<()> {
        self.send_command(GadgetCommand::StartCooling).await
    }

    async fn finish_cooling(&self) -> ControllerResult<()> {
        self.send_command(GadgetCommand::FinishCooling).await
    }

    async fn start_splash(&self) -> ControllerResult<()> {
        self.send_command(GadgetCommand::StartSplash).await
    }

    async fn finish_splash(&self) -> ControllerResult<()> {
        self.send_command(GadgetCommand::FinishSplash).await
    }
}

/// Connection manager, publish gate and dispatcher wired together
pub struct GadgetController<T>
where
    T: Transport + 'static,
{
    manager: Arc<ConnectionManager<T>>,
    dispatcher: CommandDispatcher<T>,
}

impl<T> GadgetController<T>
where
    T: Transport + 'static,
{
    pub fn new(
        transport: T,
        options: ConnectionOptions,
        policy: RetryPolicy,
        gate_config: GateConfig,
    ) -> Self {
        let manager = ConnectionManager::new(transport, options, policy);
        let gate = PublishGate::new(Arc::clone(&manager), gate_config);
        Self {
            manager,
            dispatcher: CommandDispatcher::new(gate),
        }
    }

    /// Build from a validated configuration
    pub fn from_config(transport: T, config: &ControllerConfig) -> ControllerResult<Self> {
        config.validate()?;
        let options = ConnectionOptions::from_config(config)?;
        Ok(Self::new(
            transport,
            options,
            RetryPolicy::from(&config.reconnect),
            GateConfig::from(&config.publish),
        ))
    }

    pub fn status(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.subscribe_state()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.manager.metrics()
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<T>> {
        &self.manager
    }

    /// Stop recovery and release the transport
    pub async fn shutdown(&self) -> ControllerResult<()> {
        info!("Shutting down gadget controller");
        self.manager.shutdown().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T> GadgetControl for GadgetController<T>
where
    T: Transport + 'static,
{
    async fn initialize(&self) -> ControllerResult<()> {
        self.manager.initialize().await?;
        Ok(())
    }

    async fn send(&self, command: &str) -> ControllerResult<()> {
        self.dispatcher.send(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockTransport;

    #[tokio::test]
    async fn test_named_operations_map_to_command_names() {
        let transport = MockTransport::new();
        let controller =
            GadgetController::from_config(transport.clone(), &ControllerConfig::test_config())
                .unwrap();
        controller.initialize().await.unwrap();

        controller.start_heating().await.unwrap();
        controller.finish_heating().await.unwrap();
        controller.start_cooling().await.unwrap();
        controller.finish_cooling().await.unwrap();
        controller.start_splash().await.unwrap();
        controller.finish_splash().await.unwrap();

        let payloads: Vec<String> = transport
            .published()
            .await
            .into_iter()
            .map(|p| String::from_utf8(p.payload.to_vec()).unwrap())
            .collect();
        let expected: Vec<String> = GadgetCommand::ALL
            .iter()
            .map(|c| format!(r#"{{"data":"{}"}}"#, c.as_str()))
            .collect();
        assert_eq!(payloads, expected);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.client_id = "bad id".to_string();

        let result = GadgetController::from_config(MockTransport::new(), &config);
        assert!(result.is_err());
    }
}
