use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use once_cell::sync::OnceCell;

use store::EndpointConfig;
use store::client::{DEFAULT_REGION, PLACEHOLDER_ACCESS_KEY_ID, PLACEHOLDER_SECRET_ACCESS_KEY};

use crate::error::FixtureError;

/// Environment variable carrying the emulator port.
pub const PORT_ENV_VAR: &str = "DYNAMO_TEST_PORT";
pub const DEFAULT_PORT: u16 = 4567;
pub const CONFIG_FILE: &str = "dynamo-fixtures.toml";
pub const ENV_PREFIX: &str = "DYNAMO_FIXTURES__";

pub static CONFIG: OnceCell<FixtureConfig> = OnceCell::new();

/// How a missing local store gets started.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LauncherKind {
    /// `amazon/dynamodb-local` through testcontainers
    #[default]
    Docker,
    /// A child process running the configured command
    Process,
    /// Never launch; an unreachable emulator is left to fail the first request
    Disabled,
}

/// What a cleanup hook does when some deletions of its batch fail.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Fail the hook with every failed deletion aggregated
    #[default]
    AllOrNothing,
    /// Log failed deletions and let the hook succeed
    BestEffort,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmulatorConfig {
    pub launcher: LauncherKind,
    /// Image tag used by the docker launcher
    pub image_tag: String,
    /// Argv of the process launcher; `{port}` is replaced by the configured port
    pub command: Vec<String>,
    /// How long the process launcher waits for the port to accept connections
    #[serde(with = "humantime_serde")]
    pub startup_timeout: Duration,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            launcher: LauncherKind::default(),
            image_tag: "latest".to_string(),
            command: [
                "java",
                "-Djava.library.path=./DynamoDBLocal_lib",
                "-jar",
                "DynamoDBLocal.jar",
                "-inMemory",
                "-port",
                "{port}",
            ]
            .map(String::from)
            .to_vec(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FixtureConfig {
    /// Port of the local emulator
    pub port: u16,
    pub region: String,
    /// Endpoint override, e.g. a real regional endpoint; defaults to the local emulator
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub emulator: EmulatorConfig,
    pub cleanup: CleanupPolicy,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: PLACEHOLDER_ACCESS_KEY_ID.to_string(),
            secret_access_key: PLACEHOLDER_SECRET_ACCESS_KEY.to_string(),
            emulator: EmulatorConfig::default(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl FixtureConfig {
    /// Layered sources, later ones winning: defaults, `dynamo-fixtures.toml`,
    /// `DYNAMO_FIXTURES__*` variables, then `DYNAMO_TEST_PORT`.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(FixtureConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&[PORT_ENV_VAR]).map(|_| "port".into()))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Self::figment().extract().map_err(Box::new)?;

        Ok(config)
    }

    /// Configuration of this process, loaded on first use.
    pub fn global() -> Result<&'static FixtureConfig, FixtureError> {
        CONFIG.get_or_try_init(|| Self::load().map_err(FixtureError::from))
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        let local = EndpointConfig::local(self.port);
        EndpointConfig {
            region: self.region.clone(),
            endpoint_url: self.endpoint.clone().unwrap_or(local.endpoint_url),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }
}
