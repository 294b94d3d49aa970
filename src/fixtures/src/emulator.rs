//! Reachability check for the local store and the launchers used when nothing
//! is listening yet.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use testcontainers_modules::dynamodb_local::DynamoDb;
use testcontainers_modules::testcontainers::{
    ContainerAsync, ImageExt, core::ContainerPort, runners::AsyncRunner,
};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};

use crate::config::{FixtureConfig, LauncherKind};
use crate::error::{FixtureError, Result};

/// Port DynamoDB local listens on inside its container.
const CONTAINER_PORT: u16 = 8000;
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Whether something accepts TCP connections on `127.0.0.1:port`.
pub async fn is_listening(port: u16) -> bool {
    matches!(
        timeout(CONNECT_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Starts a local store bound to a given host port.
#[async_trait]
pub trait EmulatorLauncher: Send + Sync {
    /// Keeps the launched instance alive; dropping it stops the instance.
    type Handle: Send + 'static;

    async fn launch(&self, port: u16) -> Result<Self::Handle>;
}

/// Reuse a store already listening on `port`, otherwise launch one.
///
/// Returns `None` when an instance was already running. Launch failures are
/// environment errors and should abort the run.
pub async fn ensure_emulator<L: EmulatorLauncher>(
    port: u16,
    launcher: &L,
) -> Result<Option<L::Handle>> {
    if is_listening(port).await {
        tracing::debug!(port, "Local store already listening, reusing it");
        return Ok(None);
    }

    tracing::warn!(
        "It is usually better to start the local store manually so it does not have to \
         restart between test runs, do: docker run -p {port}:{CONTAINER_PORT} amazon/dynamodb-local"
    );
    let handle = launcher.launch(port).await?;
    tracing::info!(port, "Launched local store");

    Ok(Some(handle))
}

/// Runs `amazon/dynamodb-local` through testcontainers.
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    image_tag: String,
}

impl DockerLauncher {
    pub fn new(image_tag: impl Into<String>) -> Self {
        Self {
            image_tag: image_tag.into(),
        }
    }
}

#[async_trait]
impl EmulatorLauncher for DockerLauncher {
    type Handle = ContainerAsync<DynamoDb>;

    async fn launch(&self, port: u16) -> Result<Self::Handle> {
        DynamoDb::default()
            .with_tag(self.image_tag.clone())
            .with_mapped_port(port, ContainerPort::Tcp(CONTAINER_PORT))
            .start()
            .await
            .map_err(|err| FixtureError::Bootstrap {
                port,
                reason: err.to_string(),
            })
    }
}

/// Runs the local store as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    command: Vec<String>,
    startup_timeout: Duration,
}

impl ProcessLauncher {
    /// `command` is an argv whose `{port}` placeholders are replaced at launch.
    pub fn new(command: Vec<String>, startup_timeout: Duration) -> Self {
        Self {
            command,
            startup_timeout,
        }
    }
}

/// Child process of a launched store, killed on drop.
#[derive(Debug)]
pub struct EmulatorProcess {
    child: Child,
}

impl EmulatorProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for EmulatorProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[async_trait]
impl EmulatorLauncher for ProcessLauncher {
    type Handle = EmulatorProcess;

    async fn launch(&self, port: u16) -> Result<Self::Handle> {
        let bootstrap_error = |reason: String| FixtureError::Bootstrap { port, reason };

        let port_arg = port.to_string();
        let argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace("{port}", &port_arg))
            .collect();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| bootstrap_error("empty emulator command".to_string()))?;

        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                bootstrap_error(format!("failed to spawn {program}: {err}"))
            })?;
        let mut process = EmulatorProcess { child };
        tracing::debug!(pid = process.id(), program = %program, "Spawned local store");

        let deadline = Instant::now() + self.startup_timeout;
        loop {
            if is_listening(port).await {
                return Ok(process);
            }
            if let Ok(Some(status)) = process.child.try_wait() {
                return Err(bootstrap_error(format!(
                    "{program} exited early with {status}"
                )));
            }
            if Instant::now() >= deadline {
                return Err(bootstrap_error(format!(
                    "port not reachable after {:?}",
                    self.startup_timeout
                )));
            }
            tracing::debug!(port, "Waiting for the local store to accept connections");
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// Launcher selected by configuration.
#[derive(Debug, Clone)]
pub enum Launcher {
    Docker(DockerLauncher),
    Process(ProcessLauncher),
}

impl Launcher {
    /// `None` when launching is disabled.
    pub fn from_config(config: &FixtureConfig) -> Option<Self> {
        let emulator = &config.emulator;
        match emulator.launcher {
            LauncherKind::Docker => Some(Launcher::Docker(DockerLauncher::new(
                emulator.image_tag.clone(),
            ))),
            LauncherKind::Process => Some(Launcher::Process(ProcessLauncher::new(
                emulator.command.clone(),
                emulator.startup_timeout,
            ))),
            LauncherKind::Disabled => None,
        }
    }
}

/// Keeps whichever store [`Launcher`] started alive until dropped.
pub enum EmulatorHandle {
    Container(ContainerAsync<DynamoDb>),
    Process(EmulatorProcess),
}

impl std::fmt::Debug for EmulatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmulatorHandle::Container(container) => {
                f.debug_tuple("Container").field(&container.id()).finish()
            }
            EmulatorHandle::Process(process) => f.debug_tuple("Process").field(process).finish(),
        }
    }
}

#[async_trait]
impl EmulatorLauncher for Launcher {
    type Handle = EmulatorHandle;

    async fn launch(&self, port: u16) -> Result<Self::Handle> {
        match self {
            Launcher::Docker(docker) => docker.launch(port).await.map(EmulatorHandle::Container),
            Launcher::Process(process) => process.launch(port).await.map(EmulatorHandle::Process),
        }
    }
}
