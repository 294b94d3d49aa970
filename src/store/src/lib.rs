//! Client side of the key-value table store: the item and schema model, the
//! control plane / data plane interfaces, and the backends implementing them.

pub mod client;
pub mod dynamo;
pub mod error;
pub mod memory;
pub mod model;

pub use client::{ControlPlane, DataPlane, EndpointConfig, StoreClients};
pub use dynamo::DynamoStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::{
    AttributeDefinition, AttributeType, BillingMode, Item, KeySchemaElement, KeyType,
    TableDescription, TableSchema, WriteOp, to_item,
};
