//! Provisioned fixture handle and its teardown.

use cleanslate_core::ports::{Catalog, SessionSource};
use cleanslate_core::{Backoff, Endpoint, FixtureConfig, Result, TruncationReport};
use std::sync::Arc;
use tracing::warn;

/// Two independent connections to the same server.
#[derive(Debug)]
pub struct ConnectionPair<C> {
    /// Scoped to the test schema.
    pub target: C,
    /// Scoped to the metadata schema; only used to enumerate tables.
    pub catalog: C,
}

/// Truncates every table of one database. Safe to run any number of times.
pub struct Teardown<C> {
    pair: Arc<ConnectionPair<C>>,
    database: String,
}

impl<C> Clone for Teardown<C> {
    fn clone(&self) -> Self {
        Self {
            pair: Arc::clone(&self.pair),
            database: self.database.clone(),
        }
    }
}

impl<C> Teardown<C>
where
    C: Catalog + SessionSource,
{
    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn run(&self) -> Result<TruncationReport> {
        cleanslate_core::truncate(&self.pair.catalog, &self.pair.target, &self.database)
            .await
            .inspect_err(|e| warn!(database = %self.database, error = %e, "Teardown failed"))
    }
}

/// A provisioned database plus its connections.
///
/// Build one per test suite and share it between tests; the connections stay
/// open for the life of the handle. Tests against one fixture must run
/// serially, since a teardown races with queries issued by other tests.
pub struct Fixture<C> {
    config: FixtureConfig,
    endpoint: Endpoint,
    pair: Arc<ConnectionPair<C>>,
    teardown: Teardown<C>,
}

impl<C> Fixture<C>
where
    C: Catalog + SessionSource,
{
    pub fn new(config: FixtureConfig, endpoint: Endpoint, pair: ConnectionPair<C>) -> Self {
        let pair = Arc::new(pair);
        let teardown = Teardown {
            pair: Arc::clone(&pair),
            database: config.database_name.clone(),
        };

        Self {
            config,
            endpoint,
            pair,
            teardown,
        }
    }

    /// Connection scoped to the test schema.
    pub fn target(&self) -> &C {
        &self.pair.target
    }

    /// Connection scoped to the metadata schema.
    pub fn catalog(&self) -> &C {
        &self.pair.catalog
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn database_name(&self) -> &str {
        &self.config.database_name
    }

    /// Teardown bound to this fixture's database.
    pub fn teardown(&self) -> Teardown<C> {
        self.teardown.clone()
    }

    /// Ping both connections under the backoff policy.
    pub async fn wait_until_ready(&self, backoff: &Backoff) -> Result<()> {
        cleanslate_core::wait_until_ready(&self.pair.target, backoff).await?;
        cleanslate_core::wait_until_ready(&self.pair.catalog, backoff).await
    }

    /// Like [`Fixture::wait_until_ready`], but aborts the calling test when
    /// the database never answers.
    pub async fn ensure_ready(&self, backoff: &Backoff) {
        cleanslate_core::ensure_ready(&self.pair.target, backoff).await;
        cleanslate_core::ensure_ready(&self.pair.catalog, backoff).await;
    }
}
