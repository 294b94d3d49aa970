//! Fixture tables and the two cleanup registries that bound their lifetime.
//!
//! # Runner contract
//!
//! The test runner driving a [`FixtureSession`] must call the hooks in strict
//! order: [`LifecycleHooks::before_all`] once before any fixture is requested,
//! [`LifecycleHooks::after_each`] after every test body (pass or fail) and
//! before the next test starts, and [`LifecycleHooks::after_all`] once after
//! the last test. A failing hook is a run-level failure, not a failure of the
//! test that happened to precede it. [`FixtureSession::run_test`] follows this
//! contract for a single test. A run that also needs the local store checked
//! registers [`FixtureHarness`](crate::FixtureHarness) as its hooks instead.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Mutex;

use store::{ControlPlane, DataPlane, StoreClients, StoreError, TableSchema};

use crate::client::DataClient;
use crate::config::CleanupPolicy;
use crate::error::{CleanupFailure, FixtureError, Result};

/// How a fixture table is created and when it goes away.
///
/// | `keep_table` | `read_only` | outcome                                         |
/// |--------------|-------------|-------------------------------------------------|
/// | false        | false       | fresh table, deleted after the current test     |
/// | false        | true        | fresh table, deleted after the whole run        |
/// | true         | ignored     | reused or created, never deleted; write-guarded when it already holds items |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreationOptions {
    pub keep_table: bool,
    pub read_only: bool,
}

impl CreationOptions {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn keep_table() -> Self {
        Self {
            keep_table: true,
            ..Self::default()
        }
    }
}

/// A fixture table handed to a test.
///
/// The test owns the handle; the session owns the obligation to delete the
/// table, if any.
#[derive(Debug, Clone)]
pub struct CreatedTable {
    pub table_name: String,
    pub client: DataClient,
}

/// Names of tables awaiting deletion.
#[derive(Debug, Default)]
struct Registry {
    names: Mutex<Vec<String>>,
}

impl Registry {
    async fn register(&self, name: String) {
        self.names.lock().await.push(name);
    }

    async fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.names.lock().await)
    }

    async fn snapshot(&self) -> Vec<String> {
        self.names.lock().await.clone()
    }
}

/// Callbacks the external test runner invokes around tests.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Runs once before the first test.
    async fn before_all(&self) -> Result<()> {
        Ok(())
    }

    /// Runs after every test, regardless of its outcome.
    async fn after_each(&self) -> Result<()>;

    /// Runs once after the last test.
    async fn after_all(&self) -> Result<()>;
}

/// Creates fixture tables and tracks which ones must be deleted, and when.
pub struct FixtureSession {
    control: Arc<dyn ControlPlane>,
    data: Arc<dyn DataPlane>,
    per_test: Registry,
    per_run: Registry,
    cleanup_policy: CleanupPolicy,
}

impl FixtureSession {
    pub fn new(clients: StoreClients, cleanup_policy: CleanupPolicy) -> Self {
        Self {
            control: clients.control,
            data: clients.data,
            per_test: Registry::default(),
            per_run: Registry::default(),
            cleanup_policy,
        }
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup_policy
    }

    /// Create (or, with `keep_table`, reuse) a table and hand back a client for it.
    pub async fn create_table(
        &self,
        schema: &TableSchema,
        options: CreationOptions,
    ) -> Result<CreatedTable> {
        let table_name = schema.table_name.clone();

        if options.keep_table {
            let client = self.reuse_or_create(schema).await?;
            return Ok(CreatedTable { table_name, client });
        }

        self.control.create_table(schema).await?;
        if options.read_only {
            tracing::debug!(table = %table_name, "Created shared fixture table");
            self.per_run.register(table_name.clone()).await;
        } else {
            tracing::debug!(table = %table_name, "Created fixture table");
            self.per_test.register(table_name.clone()).await;
        }

        Ok(CreatedTable {
            table_name,
            client: DataClient::Live(self.data.clone()),
        })
    }

    async fn reuse_or_create(&self, schema: &TableSchema) -> Result<DataClient> {
        let table = &schema.table_name;
        match self.control.describe_table(table).await {
            Ok(description) if description.item_count.unwrap_or(0) > 0 => {
                tracing::info!(
                    table = %table,
                    item_count = description.item_count,
                    "Reusing pre-seeded table, writes are disabled"
                );
                Ok(DataClient::Guarded(self.data.clone()))
            }
            Ok(_) => {
                tracing::debug!(table = %table, "Reusing empty table");
                Ok(DataClient::Live(self.data.clone()))
            }
            Err(StoreError::ResourceNotFound(_)) => {
                self.control.create_table(schema).await?;
                tracing::debug!(table = %table, "Created kept table");
                Ok(DataClient::Live(self.data.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a table directly, without touching either registry.
    pub async fn remove_table(&self, table: &str) -> Result<()> {
        self.control.delete_table(table).await?;
        Ok(())
    }

    /// Tables that the next [`after_each`](LifecycleHooks::after_each) deletes.
    pub async fn pending_per_test(&self) -> Vec<String> {
        self.per_test.snapshot().await
    }

    /// Tables that [`after_all`](LifecycleHooks::after_all) deletes.
    pub async fn pending_per_run(&self) -> Vec<String> {
        self.per_run.snapshot().await
    }

    /// Run one test body, then the per-test cleanup.
    ///
    /// Cleanup happens even when the body fails or panics; a panic resumes
    /// after cleanup. When both the body and the cleanup fail, the body's
    /// error is returned and the cleanup error is logged.
    pub async fn run_test<F, Fut, T, E>(&self, test: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<FixtureError>,
    {
        let outcome = AssertUnwindSafe(async move { test().await })
            .catch_unwind()
            .await;
        let cleanup = self.after_each().await;

        match outcome {
            Err(panic) => {
                if let Err(err) = cleanup {
                    tracing::error!(error = %err, "Cleanup after panicking test failed");
                }
                std::panic::resume_unwind(panic)
            }
            Ok(Err(err)) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::error!(error = %cleanup_err, "Cleanup after failed test failed");
                }
                Err(err)
            }
            Ok(Ok(value)) => {
                cleanup?;
                Ok(value)
            }
        }
    }

    /// Delete every table of `names` concurrently, waiting for all to settle.
    async fn delete_batch(&self, hook: &str, names: Vec<String>) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        tracing::debug!(hook, count = names.len(), "Deleting fixture tables");

        let results = join_all(names.iter().map(|name| self.control.delete_table(name))).await;
        let failures: Vec<CleanupFailure> = names
            .into_iter()
            .zip(results)
            .filter_map(|(table, result)| {
                result.err().map(|error| CleanupFailure { table, error })
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        match self.cleanup_policy {
            CleanupPolicy::AllOrNothing => Err(FixtureError::cleanup(failures)),
            CleanupPolicy::BestEffort => {
                for failure in &failures {
                    tracing::warn!(
                        hook,
                        table = %failure.table,
                        error = %failure.error,
                        "Failed to delete fixture table"
                    );
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl LifecycleHooks for FixtureSession {
    async fn after_each(&self) -> Result<()> {
        let names = self.per_test.take().await;
        self.delete_batch("after_each", names).await
    }

    async fn after_all(&self) -> Result<()> {
        let names = self.per_run.take().await;
        self.delete_batch("after_all", names).await
    }
}
