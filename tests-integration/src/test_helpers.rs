use anyhow::Result;
use fixtures::testing::TestConfigBuilder;
use fixtures::{CleanupPolicy, FixtureConfig, FixtureSession};
use store::{EndpointConfig, StoreClients};
use testcontainers_modules::dynamodb_local::DynamoDb;
use testcontainers_modules::testcontainers::{ContainerAsync, runners::AsyncRunner};

/// Port DynamoDB local listens on inside the container.
const DYNAMODB_PORT: u16 = 8000;

/// A DynamoDB local container and clients bound to it.
pub struct DynamoLocalContext {
    pub container: ContainerAsync<DynamoDb>,
    pub port: u16,
    pub clients: StoreClients,
}

impl DynamoLocalContext {
    pub async fn new() -> Result<Self> {
        let container = DynamoDb::default().start().await?;
        let port = container.get_host_port_ipv4(DYNAMODB_PORT).await?;
        tracing::info!(port, "Started DynamoDB local");

        let clients = StoreClients::connect(&EndpointConfig::local(port)).await;

        Ok(Self {
            container,
            port,
            clients,
        })
    }

    /// Harness configuration targeting this container, launcher disabled.
    pub fn config(&self) -> FixtureConfig {
        TestConfigBuilder::new().with_port(self.port).build()
    }

    /// A fresh session sharing this container's clients.
    pub fn session(&self, policy: CleanupPolicy) -> FixtureSession {
        FixtureSession::new(self.clients.clone(), policy)
    }
}
