//! In-memory fakes for the container runtime and the database.
//!
//! Enabled with the `testing` feature. The fakes model just enough behaviour
//! to exercise the lifecycle logic: scripted inspect results, a server with
//! tables that may reference each other, and session-scoped foreign-key
//! checks that reject truncating a referenced table.

use crate::ports::{Catalog, Connection, Connector, ContainerRuntime, Session, SessionSource};
use crate::types::{ContainerState, Endpoint, PortBinding, STATUS_RUNNING, TableDescriptor};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Published port the fakes report bindings for.
pub const FAKE_PORT: &str = "3306/tcp";

/// A running container bound to `0.0.0.0:<host_port>`.
pub fn running_state(name: &str, host_port: &str) -> ContainerState {
    ContainerState {
        name: name.to_string(),
        status: STATUS_RUNNING.to_string(),
        port: FAKE_PORT.to_string(),
        binding: Some(PortBinding {
            host_address: "0.0.0.0".to_string(),
            host_port: host_port.to_string(),
        }),
    }
}

/// A container with the given non-running status. The stale binding is kept
/// so callers can check it is never used.
pub fn stopped_state(name: &str, status: &str) -> ContainerState {
    ContainerState {
        status: status.to_string(),
        ..running_state(name, "3306")
    }
}

/// One scripted answer to `inspect`.
#[derive(Debug, Clone)]
pub enum FakeProbe {
    State(ContainerState),
    /// The runtime does not know the container.
    Missing,
    /// The runtime itself failed with the given stderr.
    Failure(String),
}

/// A recorded `compose_up` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeCall {
    pub compose_file: PathBuf,
    pub env: Vec<(String, String)>,
}

#[derive(Default)]
struct RuntimeInner {
    script: VecDeque<FakeProbe>,
    last: Option<FakeProbe>,
    inspections: usize,
    compose_calls: Vec<ComposeCall>,
    compose_failure: Option<String>,
}

/// Scripted container runtime.
///
/// Each `inspect` consumes the next scripted probe; once the script runs out
/// the last probe is repeated.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    inner: Arc<Mutex<RuntimeInner>>,
}

impl FakeRuntime {
    pub fn new(script: impl IntoIterator<Item = FakeProbe>) -> Self {
        let runtime = Self::default();
        runtime.lock().script.extend(script);
        runtime
    }

    /// Make every `compose_up` fail with `stderr`.
    pub fn fail_compose(&self, stderr: impl Into<String>) {
        self.lock().compose_failure = Some(stderr.into());
    }

    pub fn inspections(&self) -> usize {
        self.lock().inspections
    }

    pub fn compose_calls(&self) -> Vec<ComposeCall> {
        self.lock().compose_calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RuntimeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, container: &str) -> Result<ContainerState> {
        let probe = {
            let mut inner = self.lock();
            inner.inspections += 1;
            if let Some(next) = inner.script.pop_front() {
                inner.last = Some(next);
            }
            inner.last.clone().unwrap_or(FakeProbe::Missing)
        };

        let command = format!("docker inspect {}", container);
        match probe {
            FakeProbe::State(state) => Ok(state),
            FakeProbe::Missing => Err(Error::Process {
                command,
                code: Some(1),
                stderr: format!("Error: No such object: {}", container),
            }),
            FakeProbe::Failure(stderr) => Err(Error::Process {
                command,
                code: Some(125),
                stderr,
            }),
        }
    }

    async fn compose_up(&self, compose_file: &Path, env: &[(String, String)]) -> Result<()> {
        let mut inner = self.lock();
        inner.compose_calls.push(ComposeCall {
            compose_file: compose_file.to_path_buf(),
            env: env.to_vec(),
        });

        match &inner.compose_failure {
            Some(stderr) => Err(Error::Process {
                command: format!("docker compose -f {} up -d", compose_file.display()),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct FakeTable {
    rows: usize,
    references: Option<String>,
}

#[derive(Default)]
struct ServerInner {
    // database -> table -> table state
    schemas: BTreeMap<String, BTreeMap<String, FakeTable>>,
    failing_truncates: BTreeSet<(String, String)>,
    failing_pings: u32,
    pings: usize,
    statements: Vec<String>,
}

/// In-memory database server shared by every connection opened against it.
#[derive(Clone, Default)]
pub struct FakeServer {
    inner: Arc<Mutex<ServerInner>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection scoped to `database`.
    pub fn connection(&self, database: &str) -> FakeConnection {
        FakeConnection {
            server: self.clone(),
            database: database.to_string(),
        }
    }

    /// Create a table, optionally with a foreign key to `references` in the
    /// same database.
    pub fn create_table(&self, database: &str, table: &str, references: Option<&str>) {
        self.lock()
            .schemas
            .entry(database.to_string())
            .or_default()
            .insert(
                table.to_string(),
                FakeTable {
                    rows: 0,
                    references: references.map(str::to_string),
                },
            );
    }

    pub fn insert(&self, database: &str, table: &str, rows: usize) {
        if let Some(t) = self
            .lock()
            .schemas
            .get_mut(database)
            .and_then(|tables| tables.get_mut(table))
        {
            t.rows += rows;
        }
    }

    pub fn row_count(&self, database: &str, table: &str) -> usize {
        self.lock()
            .schemas
            .get(database)
            .and_then(|tables| tables.get(table))
            .map_or(0, |t| t.rows)
    }

    /// Make every truncate of `table` fail.
    pub fn fail_truncate(&self, database: &str, table: &str) {
        self.lock()
            .failing_truncates
            .insert((database.to_string(), table.to_string()));
    }

    /// Make the next `count` pings (from any connection) fail.
    pub fn fail_next_pings(&self, count: u32) {
        self.lock().failing_pings = count;
    }

    pub fn ping_count(&self) -> usize {
        self.lock().pings
    }

    /// Session statements issued so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ServerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connection handle onto a [`FakeServer`].
#[derive(Clone)]
pub struct FakeConnection {
    server: FakeServer,
    database: String,
}

impl FakeConnection {
    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn ping(&self) -> Result<()> {
        let mut inner = self.server.lock();
        inner.pings += 1;
        if inner.failing_pings > 0 {
            inner.failing_pings -= 1;
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for FakeConnection {
    async fn table_names(&self, database: &str) -> Result<Vec<TableDescriptor>> {
        Ok(self
            .server
            .lock()
            .schemas
            .get(database)
            .map(|tables| tables.keys().map(TableDescriptor::new).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SessionSource for FakeConnection {
    type Session = FakeSession;

    async fn session(&self) -> Result<FakeSession> {
        Ok(FakeSession {
            server: self.server.clone(),
            foreign_key_checks: true,
        })
    }
}

/// One pinned session on a [`FakeServer`].
pub struct FakeSession {
    server: FakeServer,
    foreign_key_checks: bool,
}

#[async_trait]
impl Session for FakeSession {
    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()> {
        self.server
            .lock()
            .statements
            .push(format!("SET FOREIGN_KEY_CHECKS={}", u8::from(enabled)));
        self.foreign_key_checks = enabled;
        Ok(())
    }

    async fn truncate_table(&mut self, database: &str, table: &str) -> Result<()> {
        let mut inner = self.server.lock();
        inner
            .statements
            .push(format!("TRUNCATE TABLE `{}`.`{}`", database, table));

        if inner
            .failing_truncates
            .contains(&(database.to_string(), table.to_string()))
        {
            return Err(Error::Query(format!("Lock wait timeout exceeded on {}", table)));
        }

        let tables = inner
            .schemas
            .get_mut(database)
            .ok_or_else(|| Error::Query(format!("Unknown database '{}'", database)))?;

        if self.foreign_key_checks
            && tables
                .values()
                .any(|t| t.references.as_deref() == Some(table))
        {
            return Err(Error::Query(format!(
                "Cannot truncate a table referenced in a foreign key constraint ({})",
                table
            )));
        }

        let entry = tables.get_mut(table).ok_or_else(|| {
            Error::Query(format!("Table '{}.{}' doesn't exist", database, table))
        })?;
        entry.rows = 0;
        Ok(())
    }
}

/// Connector that opens [`FakeConnection`]s and records every endpoint used.
#[derive(Clone, Default)]
pub struct FakeConnector {
    server: FakeServer,
    opened: Arc<Mutex<Vec<(Endpoint, String)>>>,
}

impl FakeConnector {
    pub fn new(server: FakeServer) -> Self {
        Self {
            server,
            opened: Arc::default(),
        }
    }

    pub fn server(&self) -> &FakeServer {
        &self.server
    }

    /// Endpoints and databases passed to `open`, in order.
    pub fn opened(&self) -> Vec<(Endpoint, String)> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    fn open(&self, endpoint: &Endpoint, database: &str) -> Result<FakeConnection> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint.clone(), database.to_string()));
        Ok(self.server.connection(database))
    }
}
