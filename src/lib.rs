//! Isolated, self-cleaning tables for tests against a DynamoDB-style store.
//!
//! This crate re-exports the fixture manager and the store client it drives.

pub use fixtures::*;
pub use store;
