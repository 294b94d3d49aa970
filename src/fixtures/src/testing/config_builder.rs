//! Test configuration builder for creating fixture setups quickly.

use std::time::Duration;

use crate::config::{CleanupPolicy, FixtureConfig, LauncherKind};

/// Builder for fixture configurations used in tests.
///
/// Unlike [`FixtureConfig::default`], the launcher starts out disabled so that
/// building a harness never reaches for Docker unless a test asks for it.
///
/// # Example
///
/// ```rust,ignore
/// use fixtures::testing::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .with_port(8000)
///     .with_cleanup_policy(CleanupPolicy::BestEffort)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: FixtureConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = FixtureConfig::default();
        config.emulator.launcher = LauncherKind::Disabled;
        Self { config }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Point the clients at a non-default endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.config.region = region.to_string();
        self
    }

    pub fn with_launcher(mut self, launcher: LauncherKind) -> Self {
        self.config.emulator.launcher = launcher;
        self
    }

    /// Use the process launcher with `command`; `{port}` is substituted at launch.
    pub fn with_process_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.emulator.launcher = LauncherKind::Process;
        self.config.emulator.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.emulator.startup_timeout = timeout;
        self
    }

    pub fn with_image_tag(mut self, tag: &str) -> Self {
        self.config.emulator.image_tag = tag.to_string();
        self
    }

    pub fn with_cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.config.cleanup = policy;
        self
    }

    pub fn build(self) -> FixtureConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let config = TestConfigBuilder::new().build();

        assert_eq!(config.emulator.launcher, LauncherKind::Disabled);
        assert_eq!(config.port, crate::config::DEFAULT_PORT);
        assert_eq!(config.cleanup, CleanupPolicy::AllOrNothing);
    }

    #[test]
    fn test_process_command() {
        let config = TestConfigBuilder::new()
            .with_port(9100)
            .with_process_command(["dynamodb-local", "-port", "{port}"])
            .with_startup_timeout(Duration::from_secs(3))
            .build();

        assert_eq!(config.port, 9100);
        assert_eq!(config.emulator.launcher, LauncherKind::Process);
        assert_eq!(
            config.emulator.command,
            vec!["dynamodb-local", "-port", "{port}"]
        );
        assert_eq!(config.emulator.startup_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_remote_endpoint() {
        let config = TestConfigBuilder::new()
            .with_endpoint("https://dynamodb.eu-west-1.amazonaws.com")
            .with_region("eu-west-1")
            .with_cleanup_policy(CleanupPolicy::BestEffort)
            .build();

        let endpoint = config.endpoint_config();
        assert!(!endpoint.is_local());
        assert_eq!(endpoint.region, "eu-west-1");
        assert_eq!(config.cleanup, CleanupPolicy::BestEffort);
    }

    #[test]
    fn test_docker_launcher_with_tag() {
        let config = TestConfigBuilder::new()
            .with_launcher(LauncherKind::Docker)
            .with_image_tag("2.5.2")
            .build();

        assert_eq!(config.emulator.launcher, LauncherKind::Docker);
        assert_eq!(config.emulator.image_tag, "2.5.2");
    }
}
