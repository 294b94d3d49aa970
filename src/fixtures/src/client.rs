use std::sync::Arc;

use async_trait::async_trait;
use store::{DataPlane, Item, StoreResult, WriteOp};

/// Data-plane handle returned with every fixture table.
///
/// `Guarded` wraps a client whose table already held data when the fixture was
/// requested: every mutating call resolves successfully without reaching the
/// store, reads are forwarded. The variant is picked once at creation.
#[derive(Clone)]
pub enum DataClient {
    Live(Arc<dyn DataPlane>),
    Guarded(Arc<dyn DataPlane>),
}

impl DataClient {
    pub fn is_guarded(&self) -> bool {
        matches!(self, DataClient::Guarded(_))
    }

    fn inner(&self) -> &Arc<dyn DataPlane> {
        match self {
            DataClient::Live(inner) | DataClient::Guarded(inner) => inner,
        }
    }
}

impl std::fmt::Debug for DataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataClient::Live(_) => f.write_str("DataClient::Live"),
            DataClient::Guarded(_) => f.write_str("DataClient::Guarded"),
        }
    }
}

fn suppressed(operation: &str, table: &str) -> StoreResult<()> {
    tracing::debug!(operation, table, "Write suppressed on pre-seeded table");
    Ok(())
}

fn first_table(ops: &[WriteOp]) -> &str {
    ops.first().map_or("", WriteOp::table)
}

#[async_trait]
impl DataPlane for DataClient {
    async fn put(&self, table: &str, item: Item) -> StoreResult<()> {
        match self {
            DataClient::Live(inner) => inner.put(table, item).await,
            DataClient::Guarded(_) => suppressed("put", table),
        }
    }

    async fn update(&self, table: &str, key: Item, changes: Item) -> StoreResult<()> {
        match self {
            DataClient::Live(inner) => inner.update(table, key, changes).await,
            DataClient::Guarded(_) => suppressed("update", table),
        }
    }

    async fn delete(&self, table: &str, key: Item) -> StoreResult<()> {
        match self {
            DataClient::Live(inner) => inner.delete(table, key).await,
            DataClient::Guarded(_) => suppressed("delete", table),
        }
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        match self {
            DataClient::Live(inner) => inner.batch_write(ops).await,
            DataClient::Guarded(_) => suppressed("batch_write", first_table(&ops)),
        }
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        match self {
            DataClient::Live(inner) => inner.transact_write(ops).await,
            DataClient::Guarded(_) => suppressed("transact_write", first_table(&ops)),
        }
    }

    async fn get(&self, table: &str, key: Item) -> StoreResult<Option<Item>> {
        self.inner().get(table, key).await
    }

    async fn scan(&self, table: &str) -> StoreResult<Vec<Item>> {
        self.inner().scan(table).await
    }
}
