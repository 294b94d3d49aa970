use async_trait::async_trait;
use store::{EndpointConfig, StoreClients};
use tokio::sync::Mutex;

use crate::config::FixtureConfig;
use crate::emulator::{EmulatorHandle, Launcher, ensure_emulator, is_listening};
use crate::error::Result;
use crate::session::{FixtureSession, LifecycleHooks};

/// Run-level owner of the fixture session and, when one had to be launched,
/// the local store.
///
/// Its [`LifecycleHooks`] are the ones a runner registers: `before_all` checks
/// the store (launching it if needed), `after_each` and `after_all` clean up
/// through the session, and `after_all` also stops a store launched by
/// `before_all`.
pub struct FixtureHarness {
    config: FixtureConfig,
    endpoint: EndpointConfig,
    session: FixtureSession,
    emulator: Mutex<Option<EmulatorHandle>>,
}

impl FixtureHarness {
    /// Connect the clients without touching the store yet.
    pub async fn new(config: FixtureConfig) -> Self {
        let endpoint = config.endpoint_config();
        let clients = StoreClients::connect(&endpoint).await;
        let session = FixtureSession::new(clients, config.cleanup);

        Self {
            config,
            endpoint,
            session,
            emulator: Mutex::new(None),
        }
    }

    /// [`new`](Self::new) followed by `before_all`.
    pub async fn start(config: FixtureConfig) -> Result<Self> {
        let harness = Self::new(config).await;
        harness.before_all().await?;
        Ok(harness)
    }

    /// Start with the process-wide configuration.
    pub async fn from_env() -> Result<Self> {
        Self::start(FixtureConfig::global()?.clone()).await
    }

    pub fn session(&self) -> &FixtureSession {
        &self.session
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Whether `before_all` had to launch the local store itself.
    pub async fn launched_emulator(&self) -> bool {
        self.emulator.lock().await.is_some()
    }

    /// `after_all`, consuming the harness.
    pub async fn finish(self) -> Result<()> {
        self.after_all().await
    }
}

#[async_trait]
impl LifecycleHooks for FixtureHarness {
    async fn before_all(&self) -> Result<()> {
        let mut emulator = self.emulator.lock().await;
        if emulator.is_none() {
            *emulator = prepare_endpoint(&self.config, &self.endpoint).await?;
        }
        Ok(())
    }

    async fn after_each(&self) -> Result<()> {
        self.session.after_each().await
    }

    async fn after_all(&self) -> Result<()> {
        let result = self.session.after_all().await;
        if self.emulator.lock().await.take().is_some() {
            tracing::info!(endpoint = %self.endpoint.endpoint_url, "Stopped launched local store");
        }
        result
    }
}

/// Reachability check against the port the clients connect to.
async fn prepare_endpoint(
    config: &FixtureConfig,
    endpoint: &EndpointConfig,
) -> Result<Option<EmulatorHandle>> {
    let Some(port) = endpoint.local_port() else {
        tracing::debug!(
            endpoint = %endpoint.endpoint_url,
            "Remote endpoint, skipping emulator check"
        );
        return Ok(None);
    };

    match Launcher::from_config(config) {
        Some(launcher) => ensure_emulator(port, &launcher).await,
        None => {
            if !is_listening(port).await {
                tracing::warn!(
                    port,
                    "Nothing listens on the local store port and launching is disabled"
                );
            }
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LauncherKind;
    use crate::error::FixtureError;
    use ntest::timeout;
    use tokio::net::TcpListener;

    const MISSING_BINARY: &str = "definitely-not-a-dynamodb-binary";

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Configuration whose launcher always fails.
    fn failing_launch_config(port: u16) -> FixtureConfig {
        let mut config = FixtureConfig::default();
        config.port = port;
        config.emulator.launcher = LauncherKind::Process;
        config.emulator.command = vec![MISSING_BINARY.to_string()];
        config
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_disabled_launcher_never_launches() {
        let mut config = FixtureConfig::default();
        config.port = free_port().await;
        config.emulator.launcher = LauncherKind::Disabled;

        let harness = FixtureHarness::start(config).await.unwrap();

        assert!(!harness.launched_emulator().await);
        harness.finish().await.unwrap();
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_running_store_is_not_relaunched() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let harness = FixtureHarness::start(failing_launch_config(port))
            .await
            .unwrap();

        assert!(!harness.launched_emulator().await);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_local_endpoint_override_is_checked_on_its_own_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_port = listener.local_addr().unwrap().port();
        let mut config = failing_launch_config(free_port().await);
        config.endpoint = Some(format!("http://localhost:{live_port}"));

        let harness = FixtureHarness::start(config).await.unwrap();

        assert!(!harness.launched_emulator().await);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_remote_endpoint_skips_emulator() {
        let mut config = FixtureConfig::default();
        config.endpoint = Some("https://dynamodb.us-west-2.amazonaws.com".to_string());
        config.emulator.launcher = LauncherKind::Process;
        config.emulator.command = Vec::new();

        let harness = FixtureHarness::start(config).await.unwrap();

        assert!(!harness.launched_emulator().await);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_bootstrap_failure_aborts_start() {
        let config = failing_launch_config(free_port().await);

        let result = FixtureHarness::start(config).await;

        assert!(matches!(result, Err(FixtureError::Bootstrap { .. })));
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_new_defers_the_check_to_before_all() {
        let harness = FixtureHarness::new(failing_launch_config(free_port().await)).await;
        let hooks: &dyn LifecycleHooks = &harness;

        let err = hooks.before_all().await.unwrap_err();

        assert!(matches!(err, FixtureError::Bootstrap { .. }));
        assert!(!harness.launched_emulator().await);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_run_driven_through_hooks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let harness = FixtureHarness::new(failing_launch_config(port)).await;
        let hooks: &dyn LifecycleHooks = &harness;

        hooks.before_all().await.unwrap();
        hooks.after_each().await.unwrap();
        hooks.after_all().await.unwrap();

        assert!(!harness.launched_emulator().await);
        assert!(harness.session().pending_per_run().await.is_empty());
    }
}
