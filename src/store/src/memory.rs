use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::client::{ControlPlane, DataPlane};
use crate::error::{StoreError, StoreResult};
use crate::model::{Item, TableDescription, TableSchema, WriteOp};

const MAX_BATCH_WRITE_OPS: usize = 25;
const MAX_TRANSACT_WRITE_OPS: usize = 100;

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    /// Items keyed by their encoded primary key.
    items: BTreeMap<String, Item>,
}

impl MemoryTable {
    fn primary_key(&self, attributes: &Item) -> StoreResult<String> {
        let mut parts = Vec::with_capacity(self.schema.key_schema.len());
        for element in &self.schema.key_schema {
            let name = &element.attribute_name;
            let value = attributes.get(name).ok_or_else(|| {
                StoreError::Validation(format!(
                    "missing key attribute {name} for table {}",
                    self.schema.table_name
                ))
            })?;
            let accepted = self
                .schema
                .attribute_type(name)
                .is_some_and(|attribute_type| attribute_type.accepts(value));
            if !accepted {
                return Err(StoreError::Validation(format!(
                    "key attribute {name} of table {} has the wrong type",
                    self.schema.table_name
                )));
            }
            parts.push(value.clone());
        }
        Ok(Value::Array(parts).to_string())
    }

    /// Like [`primary_key`](Self::primary_key) but the map must hold only key attributes.
    fn exact_key(&self, key: &Item) -> StoreResult<String> {
        if key.len() != self.schema.key_schema.len() {
            return Err(StoreError::Validation(format!(
                "the provided key does not match the key schema of table {}",
                self.schema.table_name
            )));
        }
        self.primary_key(key)
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        self.schema
            .key_schema
            .iter()
            .any(|element| element.attribute_name == name)
    }

    fn apply(&mut self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Put { item, .. } => {
                let key = self.primary_key(&item)?;
                self.items.insert(key, item);
            }
            WriteOp::Update { key, changes, .. } => {
                let encoded = self.exact_key(&key)?;
                if let Some(name) = changes.keys().find(|name| self.is_key_attribute(name)) {
                    return Err(StoreError::Validation(format!(
                        "cannot update key attribute {name}"
                    )));
                }
                let item = self.items.entry(encoded).or_insert(key);
                item.extend(changes);
            }
            WriteOp::Delete { key, .. } => {
                let encoded = self.exact_key(&key)?;
                self.items.remove(&encoded);
            }
        }
        Ok(())
    }
}

type Tables = HashMap<String, MemoryTable>;

fn table_mut<'a>(tables: &'a mut Tables, name: &str) -> StoreResult<&'a mut MemoryTable> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::ResourceNotFound(name.to_string()))
}

fn table<'a>(tables: &'a Tables, name: &str) -> StoreResult<&'a MemoryTable> {
    tables
        .get(name)
        .ok_or_else(|| StoreError::ResourceNotFound(name.to_string()))
}

/// Applies `ops` to a copy of the tables and swaps it in only when all succeed.
fn apply_all(tables: &mut Tables, ops: Vec<WriteOp>) -> StoreResult<()> {
    let mut staged = tables.clone();
    for op in ops {
        let name = op.table().to_string();
        table_mut(&mut staged, &name)?.apply(op)?;
    }
    *tables = staged;
    Ok(())
}

/// Process-local store implementing both the control and the data plane.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn contains_table(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }
}

#[async_trait]
impl ControlPlane for MemoryStore {
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        schema.validate()?;

        let mut tables = self.tables.write().await;
        if tables.contains_key(&schema.table_name) {
            return Err(StoreError::ResourceInUse(schema.table_name.clone()));
        }
        tables.insert(
            schema.table_name.clone(),
            MemoryTable {
                schema: schema.clone(),
                items: BTreeMap::new(),
            },
        );
        log::debug!("Created in-memory table {}", schema.table_name);
        Ok(())
    }

    async fn describe_table(&self, name: &str) -> StoreResult<TableDescription> {
        let tables = self.tables.read().await;
        let table = table(&tables, name)?;
        Ok(TableDescription {
            table_name: name.to_string(),
            item_count: Some(table.items.len() as i64),
            key_schema: table.schema.key_schema.clone(),
        })
    }

    async fn delete_table(&self, name: &str) -> StoreResult<()> {
        match self.tables.write().await.remove(name) {
            Some(_) => {
                log::debug!("Deleted in-memory table {name}");
                Ok(())
            }
            None => Err(StoreError::ResourceNotFound(name.to_string())),
        }
    }
}

#[async_trait]
impl DataPlane for MemoryStore {
    async fn put(&self, name: &str, item: Item) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        table_mut(&mut tables, name)?.apply(WriteOp::Put {
            table: name.to_string(),
            item,
        })
    }

    async fn update(&self, name: &str, key: Item, changes: Item) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        table_mut(&mut tables, name)?.apply(WriteOp::Update {
            table: name.to_string(),
            key,
            changes,
        })
    }

    async fn delete(&self, name: &str, key: Item) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        table_mut(&mut tables, name)?.apply(WriteOp::Delete {
            table: name.to_string(),
            key,
        })
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        if ops.len() > MAX_BATCH_WRITE_OPS {
            return Err(StoreError::Validation(format!(
                "batch write accepts at most {MAX_BATCH_WRITE_OPS} requests, got {}",
                ops.len()
            )));
        }
        if ops.iter().any(|op| matches!(op, WriteOp::Update { .. })) {
            return Err(StoreError::Validation(
                "batch write only supports put and delete requests".into(),
            ));
        }
        apply_all(&mut *self.tables.write().await, ops)
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        if ops.len() > MAX_TRANSACT_WRITE_OPS {
            return Err(StoreError::Validation(format!(
                "transactions accept at most {MAX_TRANSACT_WRITE_OPS} actions, got {}",
                ops.len()
            )));
        }
        apply_all(&mut *self.tables.write().await, ops)
    }

    async fn get(&self, name: &str, key: Item) -> StoreResult<Option<Item>> {
        let tables = self.tables.read().await;
        let table = table(&tables, name)?;
        let encoded = table.exact_key(&key)?;
        Ok(table.items.get(&encoded).cloned())
    }

    async fn scan(&self, name: &str) -> StoreResult<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(table(&tables, name)?.items.values().cloned().collect())
    }
}
