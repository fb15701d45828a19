//! Fixture provisioning.
//!
//! Decides whether the shared database container has to be started, waits
//! until it is reachable and opens the target and catalog connections.

use crate::fixture::{ConnectionPair, Fixture};
use crate::settings::Settings;
use cleanslate_core::ports::{Connector, ContainerRuntime};
use cleanslate_core::{ContainerState, Endpoint, FixtureConfig, Result, retry, wait_until_ready};
use cleanslate_db::{Database, MySqlConnector};
use cleanslate_docker::DockerCli;
use tracing::{debug, info};

/// Provisioner over the docker CLI and sqlx MySQL pools.
pub type MySqlProvisioner = Provisioner<DockerCli, MySqlConnector>;

/// Fixture over sqlx MySQL pools.
pub type MySqlFixture = Fixture<Database>;

pub struct Provisioner<R, C> {
    runtime: R,
    connector: C,
    settings: Settings,
}

impl MySqlProvisioner {
    pub fn from_settings(settings: Settings) -> Self {
        let runtime = DockerCli::new()
            .with_binary(settings.docker_binary.clone())
            .with_port(settings.published_port.clone());
        let connector = MySqlConnector::new(settings.username.clone(), settings.password.clone())
            .with_idle_timeout(settings.idle_timeout())
            .with_acquire_timeout(settings.acquire_timeout());

        Self::new(runtime, connector, settings)
    }

    /// Provisioner configured from `CLEANSLATE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_settings(Settings::from_env()?))
    }
}

impl<R, C> Provisioner<R, C>
where
    R: ContainerRuntime,
    C: Connector,
{
    pub fn new(runtime: R, connector: C, settings: Settings) -> Self {
        Self {
            runtime,
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Inspect the database container. A container the runtime does not know
    /// is reported with status `missing` rather than as an error.
    pub async fn probe(&self) -> Result<ContainerState> {
        match self.runtime.inspect(&self.settings.container_name).await {
            Err(e) if e.is_container_missing() => Ok(ContainerState::missing(
                self.settings.container_name.clone(),
                self.settings.published_port.clone(),
            )),
            other => other,
        }
    }

    /// Provision a fixture for `config`.
    ///
    /// A running container is reused as is. Otherwise the compose project is
    /// started and the container is re-probed under the readiness backoff
    /// until it reports running with a published port; both connections are
    /// then pinged under the same policy. Runtime and connection failures are
    /// returned unchanged.
    pub async fn provision(&self, config: &FixtureConfig) -> Result<Fixture<C::Connection>> {
        // Resolved before any start decision: a fresh container only reads
        // the seed file while initialising.
        let seed = self.settings.resolve(&config.seed_file_path)?;
        let env = vec![(
            self.settings.seed_env_var.clone(),
            seed.to_string_lossy().into_owned(),
        )];

        let state = self.probe().await?;
        let (endpoint, started) = if state.is_running() {
            info!(container = %state.name, "Reusing running container");
            (state.endpoint()?, false)
        } else {
            info!(
                container = %state.name,
                status = %state.status,
                seed = %seed.display(),
                "Container not running, starting compose project"
            );
            let compose_file = self.settings.resolve(&self.settings.compose_file)?;
            self.runtime.compose_up(&compose_file, &env).await?;
            (self.wait_for_container().await?, true)
        };

        let pair = ConnectionPair {
            target: self.connector.open(&endpoint, &config.database_name)?,
            catalog: self
                .connector
                .open(&endpoint, &self.settings.catalog_database)?,
        };

        if started {
            let backoff = self.settings.readiness();
            wait_until_ready(&pair.target, &backoff).await?;
            wait_until_ready(&pair.catalog, &backoff).await?;
        }

        info!(
            endpoint = %endpoint,
            database = %config.database_name,
            started,
            "Fixture ready"
        );
        Ok(Fixture::new(config.clone(), endpoint, pair))
    }

    /// Re-probe until the container is running with a published port.
    ///
    /// Only a container that exists but is not yet running is retried. After
    /// a successful `compose up` the container has been created, so a runtime
    /// error here (including an unknown name) ends the wait at once.
    async fn wait_for_container(&self) -> Result<Endpoint> {
        retry(&self.settings.readiness(), "container", || async {
            let state = match self.runtime.inspect(&self.settings.container_name).await {
                Ok(state) => state,
                Err(e) => return Ok(Err(e)),
            };
            debug!(container = %state.name, status = %state.status, "Waiting for container");
            state.endpoint().map(Ok)
        })
        .await?
    }

    /// Open a connection to `database` on the running container without
    /// starting anything. Fails with [`Error::NotRunning`] when the
    /// container is down.
    ///
    /// [`Error::NotRunning`]: cleanslate_core::Error::NotRunning
    pub async fn attach(&self, database: &str) -> Result<C::Connection> {
        let state = self.probe().await?;
        let endpoint = state.endpoint()?;
        debug!(endpoint = %endpoint, database, "Attaching to running container");
        self.connector.open(&endpoint, database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleanslate_core::Error;
    use cleanslate_core::testing::{
        FakeConnector, FakeProbe, FakeRuntime, FakeServer, running_state, stopped_state,
    };
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::time::Duration;

    const CONTAINER: &str = "cleanslate_test_mysql";

    fn settings() -> Settings {
        Settings::default()
            .with_base_dir("/srv/app")
            .with_readiness(Duration::from_millis(100), 4)
    }

    fn provisioner(
        script: Vec<FakeProbe>,
    ) -> (Provisioner<FakeRuntime, FakeConnector>, FakeRuntime, FakeConnector) {
        let runtime = FakeRuntime::new(script);
        let connector = FakeConnector::new(FakeServer::new());
        let provisioner = Provisioner::new(runtime.clone(), connector.clone(), settings());
        (provisioner, runtime, connector)
    }

    fn config() -> FixtureConfig {
        FixtureConfig::new("shop", "docker/mysql/seed.sql")
    }

    #[tokio::test]
    async fn test_warm_reuse_skips_start() {
        let (provisioner, runtime, connector) =
            provisioner(vec![FakeProbe::State(running_state(CONTAINER, "49153"))]);

        let fixture = provisioner.provision(&config()).await.unwrap();

        assert!(runtime.compose_calls().is_empty());
        assert_eq!(runtime.inspections(), 1);
        assert_eq!(fixture.endpoint(), &Endpoint::new("127.0.0.1", 49153));
        assert_eq!(
            connector.opened(),
            vec![
                (Endpoint::new("127.0.0.1", 49153), "shop".to_string()),
                (
                    Endpoint::new("127.0.0.1", 49153),
                    "information_schema".to_string()
                ),
            ]
        );
        // Warm path hands back connections without pinging.
        assert_eq!(connector.server().ping_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start() {
        let (provisioner, runtime, connector) = provisioner(vec![
            FakeProbe::Missing,
            FakeProbe::State(stopped_state(CONTAINER, "created")),
            FakeProbe::State(running_state(CONTAINER, "49154")),
        ]);

        let fixture = provisioner.provision(&config()).await.unwrap();

        let calls = runtime.compose_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].compose_file,
            PathBuf::from("/srv/app/docker/docker-compose.yaml")
        );
        assert_eq!(runtime.inspections(), 3);
        assert_eq!(fixture.endpoint(), &Endpoint::new("127.0.0.1", 49154));
        assert_eq!(fixture.database_name(), "shop");
        // Both connections were health-checked once.
        assert_eq!(connector.server().ping_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_path_passed_to_orchestration() {
        let (provisioner, runtime, _) = provisioner(vec![
            FakeProbe::State(stopped_state(CONTAINER, "exited")),
            FakeProbe::State(running_state(CONTAINER, "49153")),
        ]);

        provisioner.provision(&config()).await.unwrap();

        let calls = runtime.compose_calls();
        assert_eq!(
            calls[0].env,
            vec![(
                "CLEANSLATE_SEED_FILE_PATH".to_string(),
                "/srv/app/docker/mysql/seed.sql".to_string()
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_binding_never_used() {
        // The stopped states carry a stale binding on host port 3306.
        let (provisioner, _, connector) = provisioner(vec![
            FakeProbe::State(stopped_state(CONTAINER, "exited")),
            FakeProbe::State(stopped_state(CONTAINER, "restarting")),
            FakeProbe::State(running_state(CONTAINER, "49155")),
        ]);

        provisioner.provision(&config()).await.unwrap();

        let opened = connector.opened();
        assert_eq!(opened.len(), 2);
        assert!(opened.iter().all(|(endpoint, _)| endpoint.port == 49155));
    }

    #[tokio::test(start_paused = true)]
    async fn test_container_never_running() {
        let (provisioner, runtime, connector) =
            provisioner(vec![FakeProbe::State(stopped_state(CONTAINER, "exited"))]);

        let err = provisioner.provision(&config()).await.err().unwrap();

        match err {
            Error::NotReady {
                target,
                attempts,
                last_error,
            } => {
                assert_eq!(target, "container");
                assert_eq!(attempts, 4);
                assert!(last_error.contains("not running"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // One probe before starting, then four readiness probes.
        assert_eq!(runtime.inspections(), 5);
        assert!(connector.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_container_after_start_is_reported() {
        // Compose starts its own services; the configured name stays unknown.
        let (provisioner, runtime, connector) = provisioner(vec![FakeProbe::Missing]);

        let err = provisioner.provision(&config()).await.err().unwrap();

        assert!(
            matches!(err, Error::Process { ref stderr, .. } if stderr.contains("No such object"))
        );
        assert_eq!(runtime.compose_calls().len(), 1);
        // One probe before starting and one after, without retrying.
        assert_eq!(runtime.inspections(), 2);
        assert!(connector.opened().is_empty());
    }

    #[tokio::test]
    async fn test_attach_to_running_container() {
        let (provisioner, runtime, connector) =
            provisioner(vec![FakeProbe::State(running_state(CONTAINER, "49153"))]);

        let conn = provisioner.attach("shop").await.unwrap();

        assert_eq!(conn.database(), "shop");
        assert!(runtime.compose_calls().is_empty());
        assert_eq!(
            connector.opened(),
            vec![(Endpoint::new("127.0.0.1", 49153), "shop".to_string())]
        );
    }

    #[tokio::test]
    async fn test_attach_never_starts_container() {
        let (provisioner, runtime, connector) =
            provisioner(vec![FakeProbe::State(stopped_state(CONTAINER, "exited"))]);

        let err = provisioner.attach("shop").await.err().unwrap();

        assert!(matches!(err, Error::NotRunning { ref status, .. } if status == "exited"));
        assert!(runtime.compose_calls().is_empty());
        assert!(connector.opened().is_empty());
    }

    #[tokio::test]
    async fn test_attach_to_unknown_container() {
        let (provisioner, runtime, _) = provisioner(vec![FakeProbe::Missing]);

        let err = provisioner.attach("shop").await.err().unwrap();

        assert!(matches!(err, Error::NotRunning { ref status, .. } if status == "missing"));
        assert!(runtime.compose_calls().is_empty());
    }

    #[tokio::test]
    async fn test_inspection_failure_is_propagated() {
        let (provisioner, runtime, connector) = provisioner(vec![FakeProbe::Failure(
            "Cannot connect to the Docker daemon".to_string(),
        )]);

        let err = provisioner.provision(&config()).await.err().unwrap();

        assert!(matches!(err, Error::Process { ref stderr, .. } if stderr.contains("daemon")));
        assert!(runtime.compose_calls().is_empty());
        assert!(connector.opened().is_empty());
    }

    #[tokio::test]
    async fn test_compose_failure_is_propagated() {
        let (provisioner, runtime, connector) = provisioner(vec![FakeProbe::Missing]);
        runtime.fail_compose("no configuration file provided: not found");

        let err = provisioner.provision(&config()).await.err().unwrap();

        assert!(matches!(err, Error::Process { .. }));
        assert_eq!(runtime.inspections(), 1);
        assert!(connector.opened().is_empty());
    }

    #[tokio::test]
    async fn test_running_without_port_mapping() {
        let mut state = running_state(CONTAINER, "49153");
        state.binding = None;
        let (provisioner, runtime, connector) = provisioner(vec![FakeProbe::State(state)]);

        let err = provisioner.provision(&config()).await.err().unwrap();

        assert!(matches!(err, Error::MissingPortMapping { .. }));
        assert!(runtime.compose_calls().is_empty());
        assert!(connector.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_database_unreachable() {
        let (provisioner, _, connector) = provisioner(vec![
            FakeProbe::Missing,
            FakeProbe::State(running_state(CONTAINER, "49153")),
        ]);
        connector.server().fail_next_pings(u32::MAX);

        let err = provisioner.provision(&config()).await.err().unwrap();

        assert!(matches!(err, Error::NotReady { ref target, .. } if target == "database"));
    }

    #[tokio::test]
    async fn test_probe_maps_missing_container() {
        let (provisioner, _, _) = provisioner(vec![FakeProbe::Missing]);

        let state = provisioner.probe().await.unwrap();
        assert_eq!(state.status, "missing");
        assert_eq!(state.name, CONTAINER);
    }

    #[tokio::test]
    async fn test_teardown_after_provision() {
        let (provisioner, _, connector) =
            provisioner(vec![FakeProbe::State(running_state(CONTAINER, "49153"))]);
        let server = connector.server().clone();
        server.create_table("shop", "customers", None);
        server.create_table("shop", "orders", Some("customers"));

        let fixture = provisioner.provision(&config()).await.unwrap();
        server.insert("shop", "customers", 1);
        server.insert("shop", "orders", 1);

        fixture.teardown().run().await.unwrap();

        assert_eq!(server.row_count("shop", "customers"), 0);
        assert_eq!(server.row_count("shop", "orders"), 0);
    }

    #[test]
    fn test_from_settings() {
        let provisioner =
            MySqlProvisioner::from_settings(Settings::default().with_container_name("orders_db"));
        assert_eq!(provisioner.settings().container_name, "orders_db");
    }
}
