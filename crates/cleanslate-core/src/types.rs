//! Fixture domain types.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Status string docker reports for a live container.
pub const STATUS_RUNNING: &str = "running";

/// Status used when the runtime does not know the container at all.
pub const STATUS_MISSING: &str = "missing";

/// Published host binding for the database port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_address: String,
    pub host_port: String,
}

/// State of a single named container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Container name that was inspected.
    pub name: String,
    /// Runtime status, e.g. `running`, `exited`, `missing`.
    pub status: String,
    /// Published container port the binding was looked up for, e.g. `3306/tcp`.
    pub port: String,
    /// First host binding for `port`, if any.
    pub binding: Option<PortBinding>,
}

impl ContainerState {
    /// State for a container the runtime has never heard of.
    pub fn missing(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: STATUS_MISSING.to_string(),
            port: port.into(),
            binding: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }

    /// Derive the connection endpoint.
    ///
    /// The binding is only trusted while the container is running; any other
    /// status yields [`Error::NotRunning`] even when a binding is present.
    pub fn endpoint(&self) -> Result<Endpoint> {
        if !self.is_running() {
            return Err(Error::NotRunning {
                container: self.name.clone(),
                status: self.status.clone(),
            });
        }

        let binding = self
            .binding
            .as_ref()
            .ok_or_else(|| Error::MissingPortMapping {
                container: self.name.clone(),
                port: self.port.clone(),
            })?;

        Endpoint::from_binding(binding)
    }
}

/// Host and port a database server is reachable on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build an endpoint from a published binding. Wildcard bind addresses are
    /// reached through loopback.
    pub fn from_binding(binding: &PortBinding) -> Result<Self> {
        let port = binding.host_port.trim().parse::<u16>().map_err(|e| {
            Error::Parse(format!("invalid host port {:?}: {}", binding.host_port, e))
        })?;

        let host = match binding.host_address.trim() {
            "" | "0.0.0.0" | "::" | "[::]" => "127.0.0.1".to_string(),
            other => other.to_string(),
        };

        Ok(Self { host, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Per-test fixture request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Schema the target connection is scoped to and teardown truncates.
    pub database_name: String,
    /// Seed SQL file handed to the container's entrypoint on first start.
    pub seed_file_path: PathBuf,
}

impl FixtureConfig {
    pub fn new(database_name: impl Into<String>, seed_file_path: impl Into<PathBuf>) -> Self {
        Self {
            database_name: database_name.into(),
            seed_file_path: seed_file_path.into(),
        }
    }
}

/// A table row from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Outcome of a fully successful truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationReport {
    pub database: String,
    pub truncated: Vec<String>,
}
