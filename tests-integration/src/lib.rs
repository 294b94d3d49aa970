//! Common helpers for the integration suites.

pub mod test_helpers;

use anyhow::Result;
use store::{AttributeType, TableSchema};

/// Find a free TCP port on the loopback interface.
pub async fn find_available_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Initialize tracing for tests
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fixtures=debug,store=debug,info")
        .with_test_writer()
        .try_init();
}

/// Schema with a numeric `id` hash key and a string `sk` range key.
pub fn sample_schema(table_name: &str) -> TableSchema {
    TableSchema::new(table_name)
        .hash_key("id", AttributeType::Number)
        .range_key("sk", AttributeType::String)
}
