//! Helpers for tests that drive the fixture manager.
//!
//! Available under `#[cfg(test)]` and with the `testing` feature.

mod config_builder;

pub use config_builder::TestConfigBuilder;
