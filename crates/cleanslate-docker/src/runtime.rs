//! Container runtime backed by the `docker` command-line client.

use crate::inspect::parse_inspect;
use async_trait::async_trait;
use cleanslate_core::ports::ContainerRuntime;
use cleanslate_core::{ContainerState, Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Container port MySQL listens on.
pub const MYSQL_PORT: &str = "3306/tcp";

/// Shells out to `docker inspect` and `docker compose`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    port: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
            port: MYSQL_PORT.to_string(),
        }
    }

    /// Use a different client binary (e.g. `podman` or an absolute path).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Look up host bindings for a different published container port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Run the client to completion and return its stdout.
    async fn run(&self, args: &[&str], env: &[(String, String)]) -> Result<Vec<u8>> {
        let command_line = format!("{} {}", self.binary, args.join(" "));
        debug!(command = %command_line, "Running container runtime");

        let output = Command::new(&self.binary)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Process {
                command: command_line.clone(),
                code: None,
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Process {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect(&self, container: &str) -> Result<ContainerState> {
        let stdout = self.run(&["inspect", container], &[]).await?;
        let state = parse_inspect(container, &self.port, &stdout)?;

        debug!(
            container,
            status = %state.status,
            binding = ?state.binding,
            "Inspected container"
        );
        Ok(state)
    }

    async fn compose_up(&self, compose_file: &Path, env: &[(String, String)]) -> Result<()> {
        let file = compose_file.to_string_lossy();
        info!(compose_file = %file, "Starting compose project");

        self.run(&["compose", "-f", &file, "up", "-d"], env).await?;
        Ok(())
    }
}
