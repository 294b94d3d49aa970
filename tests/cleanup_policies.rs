//! Cleanup behaviour when the store refuses some deletions.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::{eq, ne};

use dynamo_fixtures::store::{
    AttributeType, ControlPlane, MemoryStore, StoreClients, StoreError, StoreResult,
    TableDescription, TableSchema,
};
use dynamo_fixtures::{
    CleanupPolicy, CreationOptions, FixtureError, FixtureSession, LifecycleHooks,
};

mock! {
    pub Control {}

    #[async_trait]
    impl ControlPlane for Control {
        async fn create_table(&self, schema: &TableSchema) -> StoreResult<()>;
        async fn describe_table(&self, table: &str) -> StoreResult<TableDescription>;
        async fn delete_table(&self, table: &str) -> StoreResult<()>;
    }
}

/// Control plane whose deletion of `stuck` fails, every other call succeeds.
fn control_with_stuck_table() -> MockControl {
    let mut control = MockControl::new();
    control.expect_create_table().returning(|_| Ok(()));
    control
        .expect_delete_table()
        .with(eq("stuck"))
        .times(1)
        .returning(|table| Err(StoreError::ResourceInUse(table.to_string())));
    control
        .expect_delete_table()
        .with(ne("stuck"))
        .times(2)
        .returning(|_| Ok(()));
    control
}

fn session(control: MockControl, policy: CleanupPolicy) -> FixtureSession {
    FixtureSession::new(
        StoreClients {
            control: Arc::new(control),
            data: Arc::new(MemoryStore::new()),
        },
        policy,
    )
}

async fn create_three(session: &FixtureSession) {
    for name in ["first", "stuck", "last"] {
        let schema = TableSchema::new(name).hash_key("id", AttributeType::String);
        session
            .create_table(&schema, CreationOptions::ephemeral())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn all_or_nothing_fails_the_hook_after_every_deletion_settled() {
    let session = session(control_with_stuck_table(), CleanupPolicy::AllOrNothing);
    create_three(&session).await;

    let err = session.after_each().await.unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Failed to delete 1 fixture table(s)"));
    match err {
        FixtureError::Cleanup { failures, .. } => assert_eq!(failures[0].table, "stuck"),
        other => panic!("unexpected error: {other}"),
    }
    // The registry was drained before deleting; the next hook has nothing to do.
    assert!(session.pending_per_test().await.is_empty());
    session.after_each().await.unwrap();
}

#[tokio::test]
async fn best_effort_lets_the_hook_succeed() {
    let session = session(control_with_stuck_table(), CleanupPolicy::BestEffort);
    create_three(&session).await;

    session.after_each().await.unwrap();

    assert!(session.pending_per_test().await.is_empty());
}

#[tokio::test]
async fn failing_cleanup_surfaces_from_run_test() {
    let session = session(control_with_stuck_table(), CleanupPolicy::AllOrNothing);

    let result: Result<(), FixtureError> = session
        .run_test(|| async {
            create_three(&session).await;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(FixtureError::Cleanup { .. })));
}
