//! Fixture lifecycle manager for tests running against a DynamoDB-style table
//! store.
//!
//! A [`FixtureHarness`] checks (and if needed launches) the local store once per
//! run and owns a [`FixtureSession`]. Tests ask the session for tables through
//! [`FixtureSession::create_table`]; the session deletes them again from its
//! [`LifecycleHooks`], either after each test or after the whole run.

pub mod client;
pub mod config;
pub mod emulator;
pub mod error;
pub mod harness;
pub mod naming;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::DataClient;
pub use config::{CleanupPolicy, FixtureConfig, LauncherKind};
pub use error::{CleanupFailure, FixtureError, Result};
pub use harness::FixtureHarness;
pub use naming::generate_name;
pub use session::{CreatedTable, CreationOptions, FixtureSession, LifecycleHooks};

pub use store;
