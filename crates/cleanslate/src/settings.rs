//! Provisioner configuration.

use cleanslate_core::{Backoff, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "CLEANSLATE";

/// Settings shared by every fixture of a test suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Name of the database container to probe.
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Compose file that starts the container and its dependencies.
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    /// Directory relative compose and seed paths are resolved against.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Container runtime client binary.
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
    /// Published container port of the database.
    #[serde(default = "default_published_port")]
    pub published_port: String,
    /// Variable carrying the seed file path to the container entrypoint.
    #[serde(default = "default_seed_env_var")]
    pub seed_env_var: String,
    /// Metadata schema used to enumerate tables.
    #[serde(default = "default_catalog_database")]
    pub catalog_database: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Idle connections are reclaimed after this many seconds.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Maximum wait for a pooled connection, in seconds.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Base unit of the linear readiness backoff, in milliseconds.
    #[serde(default = "default_readiness_base_millis")]
    pub readiness_base_millis: u64,
    /// Readiness attempts before giving up.
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,
}

fn default_container_name() -> String {
    "cleanslate_test_mysql".to_string()
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker/docker-compose.yaml")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_published_port() -> String {
    "3306/tcp".to_string()
}

fn default_seed_env_var() -> String {
    "CLEANSLATE_SEED_FILE_PATH".to_string()
}

fn default_catalog_database() -> String {
    "information_schema".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_password() -> String {
    "root".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_readiness_base_millis() -> u64 {
    100
}

fn default_readiness_attempts() -> u32 {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            container_name: default_container_name(),
            compose_file: default_compose_file(),
            base_dir: default_base_dir(),
            docker_binary: default_docker_binary(),
            published_port: default_published_port(),
            seed_env_var: default_seed_env_var(),
            catalog_database: default_catalog_database(),
            username: default_username(),
            password: default_password(),
            idle_timeout_secs: default_idle_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            readiness_base_millis: default_readiness_base_millis(),
            readiness_attempts: default_readiness_attempts(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `CLEANSLATE_*` environment variables, e.g.
    /// `CLEANSLATE_CONTAINER_NAME` or `CLEANSLATE_READINESS_ATTEMPTS`.
    pub fn from_env() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = name.into();
        self
    }

    pub fn with_compose_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.compose_file = path.into();
        self
    }

    /// Set the directory relative paths are resolved against, typically
    /// `env!("CARGO_MANIFEST_DIR")` of the test crate.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_readiness(mut self, base: Duration, attempts: u32) -> Self {
        self.readiness_base_millis = base.as_millis() as u64;
        self.readiness_attempts = attempts;
        self
    }

    pub fn readiness(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.readiness_base_millis),
            self.readiness_attempts,
        )
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Make `path` absolute, joining relative paths onto the base directory.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(std::path::absolute(self.base_dir.join(path))?)
    }
}
