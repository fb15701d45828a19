//! Port traits.
//!
//! These traits define the seams between the fixture lifecycle and the
//! external collaborators: the container runtime and the SQL driver.

use crate::types::{ContainerState, Endpoint, TableDescriptor};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// Container runtime capability used by the provisioner.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Inspect a named container.
    async fn inspect(&self, container: &str) -> Result<ContainerState>;

    /// Bring a compose project up in detached mode. `env` is added to the
    /// environment of the orchestration process only.
    async fn compose_up(&self, compose_file: &Path, env: &[(String, String)]) -> Result<()>;
}

/// A live database handle that can be health-checked.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// Connection scoped to the engine's metadata schema.
#[async_trait]
pub trait Catalog: Connection {
    /// Base tables belonging to `database`.
    async fn table_names(&self, database: &str) -> Result<Vec<TableDescriptor>>;
}

/// Connection scoped to a test schema that can hand out a dedicated session.
#[async_trait]
pub trait SessionSource: Connection {
    type Session: Session;

    /// Pin a single server session so session-scoped settings apply to every
    /// statement issued through it.
    async fn session(&self) -> Result<Self::Session>;
}

/// A single server session.
#[async_trait]
pub trait Session: Send {
    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()>;

    /// Empty `database`.`table`. The name is qualified so the session's
    /// default schema does not matter.
    async fn truncate_table(&mut self, database: &str, table: &str) -> Result<()>;
}

/// Opens connections against a resolved endpoint.
pub trait Connector: Send + Sync {
    type Connection: Catalog + SessionSource + 'static;

    /// Open a connection scoped to `database`. Opening does not touch the
    /// network; use [`Connection::ping`] to check reachability.
    fn open(&self, endpoint: &Endpoint, database: &str) -> Result<Self::Connection>;
}
