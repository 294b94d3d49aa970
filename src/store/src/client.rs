use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::dynamo::DynamoStore;
use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::model::{Item, TableDescription, TableSchema, WriteOp};

pub const DEFAULT_REGION: &str = "us-west-2";
/// Placeholder credentials; the local emulator never checks them.
pub const PLACEHOLDER_ACCESS_KEY_ID: &str = "fakeMyKeyId";
pub const PLACEHOLDER_SECRET_ACCESS_KEY: &str = "fakeSecretAccessKey";

/// Table-level administrative operations.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()>;

    async fn describe_table(&self, table: &str) -> StoreResult<TableDescription>;

    async fn delete_table(&self, table: &str) -> StoreResult<()>;
}

/// Item-level operations.
///
/// `put`, `update`, `delete`, `batch_write` and `transact_write` mutate the
/// table; `get` and `scan` only read.
#[async_trait]
pub trait DataPlane: Send + Sync {
    async fn put(&self, table: &str, item: Item) -> StoreResult<()>;

    /// Sets every attribute of `changes` on the item identified by `key`,
    /// creating the item if it does not exist yet.
    async fn update(&self, table: &str, key: Item, changes: Item) -> StoreResult<()>;

    async fn delete(&self, table: &str, key: Item) -> StoreResult<()>;

    async fn batch_write(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    async fn transact_write(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    async fn get(&self, table: &str, key: Item) -> StoreResult<Option<Item>>;

    async fn scan(&self, table: &str) -> StoreResult<Vec<Item>>;
}

/// Where and as whom the store clients connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub region: String,
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl EndpointConfig {
    /// Endpoint of a local emulator listening on `port`.
    pub fn local(port: u16) -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: format!("http://localhost:{port}"),
            access_key_id: PLACEHOLDER_ACCESS_KEY_ID.to_string(),
            secret_access_key: PLACEHOLDER_SECRET_ACCESS_KEY.to_string(),
        }
    }

    /// Whether the endpoint points at the loopback interface.
    pub fn is_local(&self) -> bool {
        Url::parse(&self.endpoint_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .is_some_and(|host| {
                host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1"
            })
    }

    /// Port a local endpoint listens on, `None` for remote endpoints.
    pub fn local_port(&self) -> Option<u16> {
        if !self.is_local() {
            return None;
        }
        Url::parse(&self.endpoint_url).ok()?.port_or_known_default()
    }
}

/// Control plane and data plane bound to the same store.
#[derive(Clone)]
pub struct StoreClients {
    pub control: Arc<dyn ControlPlane>,
    pub data: Arc<dyn DataPlane>,
}

impl StoreClients {
    /// Build both planes over a single SDK client for `endpoint`.
    pub async fn connect(endpoint: &EndpointConfig) -> Self {
        let store = Arc::new(DynamoStore::connect(endpoint).await);
        log::debug!("Store clients bound to {}", endpoint.endpoint_url);
        Self {
            control: store.clone(),
            data: store,
        }
    }

    /// Build both planes over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::from_memory(MemoryStore::new())
    }

    /// Build both planes over an existing in-memory store, sharing its tables.
    pub fn from_memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            control: store.clone(),
            data: store,
        }
    }
}
