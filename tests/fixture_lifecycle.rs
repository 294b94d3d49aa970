//! End-to-end fixture scenarios against the in-memory store.

use anyhow::Result;
use futures::future::join_all;
use serde_json::json;

use dynamo_fixtures::store::{
    AttributeType, ControlPlane, DataPlane, MemoryStore, StoreClients, TableSchema, to_item,
};
use dynamo_fixtures::{
    CleanupPolicy, CreationOptions, FixtureError, FixtureSession, LifecycleHooks, generate_name,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fixtures=debug,info")
        .with_test_writer()
        .try_init();
}

fn schema(name: &str) -> TableSchema {
    TableSchema::new(name).hash_key("id", AttributeType::Number)
}

/// Schema under a freshly generated name.
fn fresh(label: &str) -> TableSchema {
    schema(&generate_name(Some(label)))
}

fn session_over(store: &MemoryStore) -> FixtureSession {
    FixtureSession::new(
        StoreClients::from_memory(store.clone()),
        CleanupPolicy::AllOrNothing,
    )
}

#[tokio::test]
async fn ephemeral_table_is_gone_after_each_test() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let session = session_over(&store);

    let table = session
        .create_table(&fresh("ephemeral"), CreationOptions::ephemeral())
        .await?;
    table
        .client
        .put(&table.table_name, to_item(json!({"id": 1}))?)
        .await?;

    session.after_each().await?;

    let err = store.describe_table(&table.table_name).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(session.pending_per_test().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn read_only_table_outlives_each_test_but_not_the_run() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let session = session_over(&store);

    let table = session
        .create_table(&fresh("shared"), CreationOptions::read_only())
        .await?;
    let item = to_item(json!({"id": 1, "kind": "reference"}))?;
    table.client.put(&table.table_name, item.clone()).await?;

    session.after_each().await?;
    assert_eq!(table.client.scan(&table.table_name).await?, vec![item]);

    session.after_all().await?;
    assert!(!store.contains_table(&table.table_name).await);
    Ok(())
}

#[tokio::test]
async fn keep_table_on_missing_table_is_fully_functional() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let session = session_over(&store);
    let name = generate_name(Some("kept"));

    let table = session
        .create_table(&schema(&name), CreationOptions::keep_table())
        .await?;
    table.client.put(&name, to_item(json!({"id": 1}))?).await?;

    assert_eq!(table.client.scan(&name).await?.len(), 1);

    session.after_each().await?;
    session.after_all().await?;
    assert!(store.contains_table(&name).await);
    Ok(())
}

#[tokio::test]
async fn keep_table_on_seeded_table_never_mutates_it() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    store.create_table(&schema("curated")).await?;
    store
        .put("curated", to_item(json!({"id": 1, "name": "hand-picked"}))?)
        .await?;
    let session = session_over(&store);

    let table = session
        .create_table(&schema("curated"), CreationOptions::keep_table())
        .await?;
    let before = table.client.scan("curated").await?;
    table
        .client
        .put("curated", to_item(json!({"id": 2, "name": "intruder"}))?)
        .await?;
    table
        .client
        .delete("curated", to_item(json!({"id": 1}))?)
        .await?;
    let after = table.client.scan("curated").await?;

    assert_eq!(before.len(), 1);
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn generated_fixtures_never_see_each_others_items() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let session = session_over(&store);

    let tables = join_all((0..8).map(|i| {
        let session = &session;
        async move {
            let schema = fresh(&format!("parallel{i}"));
            session
                .create_table(&schema, CreationOptions::ephemeral())
                .await
        }
    }))
    .await
    .into_iter()
    .collect::<Result<Vec<_>, FixtureError>>()?;

    for (i, table) in tables.iter().enumerate() {
        let item = to_item(json!({"id": i, "owner": table.table_name}))?;
        table.client.put(&table.table_name, item).await?;
    }
    for table in &tables {
        let items = table.client.scan(&table.table_name).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["owner"], json!(table.table_name));
    }

    assert_eq!(session.pending_per_test().await.len(), tables.len());
    session.after_each().await?;
    assert!(store.table_names().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn remove_table_leaves_bookkeeping_alone() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let session = session_over(&store);
    store.create_table(&schema("untracked")).await?;
    let tracked = session
        .create_table(&fresh("tracked"), CreationOptions::ephemeral())
        .await?;

    session.remove_table("untracked").await?;

    assert!(!store.contains_table("untracked").await);
    assert_eq!(session.pending_per_test().await, vec![tracked.table_name]);
    assert!(session.pending_per_run().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn run_test_cleans_up_between_tests() -> Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let session = session_over(&store);

    for round in 0..3 {
        let name = session
            .run_test(|| async {
                let table = session
                    .create_table(
                        &fresh(&format!("round{round}")),
                        CreationOptions::ephemeral(),
                    )
                    .await?;
                assert_eq!(store.table_names().await, vec![table.table_name.clone()]);
                Ok::<_, FixtureError>(table.table_name)
            })
            .await?;
        assert!(!store.contains_table(&name).await);
    }
    Ok(())
}
