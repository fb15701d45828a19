//! MySQL layer for cleanslate.
//!
//! [`MySqlConnector`] opens lazily-connected sqlx pools scoped to a schema.
//! The resulting [`Database`] serves both as the target connection handed to
//! tests and as the `information_schema` catalog used to enumerate tables.

pub mod session;

pub use session::{MySqlSession, quote_identifier};

use async_trait::async_trait;
use cleanslate_core::ports::{Catalog, Connection, Connector, SessionSource};
use cleanslate_core::{Endpoint, Error, Result, TableDescriptor};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{Connection as _, MySqlPool};
use std::time::Duration;
use tracing::debug;

/// Schema holding the engine's table metadata.
pub const CATALOG_DATABASE: &str = "information_schema";

const CHARSET: &str = "utf8mb4";
const COLLATION: &str = "utf8mb4_unicode_ci";

// Columns are cast because information_schema reports them with a binary
// collation on MySQL 8, which sqlx will not decode as a string.
const TABLE_NAMES_QUERY: &str = "SELECT CAST(TABLE_NAME AS CHAR) FROM TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

/// Connection pool scoped to one schema.
#[derive(Clone, Debug)]
pub struct Database {
    pool: MySqlPool,
    database: String,
}

impl Database {
    /// Get the connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Schema this pool is scoped to.
    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl Connection for Database {
    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        conn.ping()
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

#[async_trait]
impl Catalog for Database {
    async fn table_names(&self, database: &str) -> Result<Vec<TableDescriptor>> {
        let names: Vec<String> = sqlx::query_scalar(TABLE_NAMES_QUERY)
            .bind(database)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        debug!(database, tables = names.len(), "Listed tables");
        Ok(names.into_iter().map(TableDescriptor::new).collect())
    }
}

#[async_trait]
impl SessionSource for Database {
    type Session = MySqlSession;

    async fn session(&self) -> Result<MySqlSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(MySqlSession::new(conn))
    }
}

/// Opens [`Database`] pools with fixed credentials.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    username: String,
    password: String,
    idle_timeout: Duration,
    acquire_timeout: Duration,
    max_connections: Option<u32>,
}

impl MySqlConnector {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            idle_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
            max_connections: None,
        }
    }

    /// Reclaim connections idle for longer than `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bound how long a single ping or session checkout may wait for a
    /// connection.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Cap each pool at `max` connections. With one connection, every
    /// statement issued through the pool shares the teardown session.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    fn connect_options(&self, endpoint: &Endpoint, database: &str) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&endpoint.host)
            .port(endpoint.port)
            .username(&self.username)
            .password(&self.password)
            .database(database)
            .charset(CHARSET)
            .collation(COLLATION)
    }
}

impl Default for MySqlConnector {
    fn default() -> Self {
        Self::new("root", "root")
    }
}

impl Connector for MySqlConnector {
    type Connection = Database;

    fn open(&self, endpoint: &Endpoint, database: &str) -> Result<Database> {
        if endpoint.host.is_empty() || endpoint.port == 0 {
            return Err(Error::Connection(format!("invalid endpoint {}", endpoint)));
        }
        if database.is_empty() {
            return Err(Error::Connection("database name is empty".to_string()));
        }

        let mut options = MySqlPoolOptions::new()
            .max_lifetime(None)
            .idle_timeout(self.idle_timeout)
            .acquire_timeout(self.acquire_timeout);
        if let Some(max) = self.max_connections {
            options = options.max_connections(max);
        }
        let pool = options.connect_lazy_with(self.connect_options(endpoint, database));

        debug!(endpoint = %endpoint, database, "Opened connection pool");
        Ok(Database {
            pool,
            database: database.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_lazy() {
        let connector = MySqlConnector::default();
        let db = connector
            .open(&Endpoint::new("127.0.0.1", 3306), "shop")
            .unwrap();

        assert_eq!(db.database(), "shop");
        assert_eq!(db.pool().size(), 0);
    }

    #[tokio::test]
    async fn test_open_with_max_connections() {
        let connector = MySqlConnector::default().with_max_connections(1);
        let db = connector
            .open(&Endpoint::new("127.0.0.1", 3306), "shop")
            .unwrap();

        assert_eq!(db.pool().options().get_max_connections(), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_endpoint() {
        let connector = MySqlConnector::default();

        let err = connector.open(&Endpoint::new("", 3306), "shop").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let err = connector.open(&Endpoint::new("127.0.0.1", 0), "shop").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let err = connector.open(&Endpoint::new("127.0.0.1", 3306), "").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_ping_unreachable_server() {
        let connector =
            MySqlConnector::default().with_acquire_timeout(Duration::from_millis(200));
        // Port 1 is reserved (tcpmux) and not served locally.
        let db = connector
            .open(&Endpoint::new("127.0.0.1", 1), CATALOG_DATABASE)
            .unwrap();

        let err = db.ping().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
