//! Shared MySQL fixtures for integration tests.
//!
//! A suite provisions one [`Fixture`] against a shared database container
//! (starting it through docker compose when it is not running) and runs the
//! fixture's teardown after every test to truncate all tables while keeping
//! the schema.
//!
//! # Usage
//!
//! ```ignore
//! use cleanslate::{FixtureConfig, MySqlFixture, MySqlProvisioner, Settings};
//! use tokio::sync::OnceCell;
//!
//! static FIXTURE: OnceCell<MySqlFixture> = OnceCell::const_new();
//!
//! async fn fixture() -> &'static MySqlFixture {
//!     FIXTURE
//!         .get_or_init(|| async {
//!             let settings = Settings::default().with_base_dir(env!("CARGO_MANIFEST_DIR"));
//!             MySqlProvisioner::from_settings(settings)
//!                 .provision(&FixtureConfig::new("shop", "docker/mysql/seed.sql"))
//!                 .await
//!                 .expect("provision fixture")
//!         })
//!         .await
//! }
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let fixture = fixture().await;
//!     // Use fixture.target().pool() ...
//!     fixture.teardown().run().await.unwrap();
//! }
//! ```

pub mod fixture;
pub mod provisioner;
pub mod settings;

pub use cleanslate_core::{
    Backoff, ContainerState, Endpoint, Error, FixtureConfig, Result, TableDescriptor,
    TruncationReport, ensure_ready, wait_until_ready,
};
pub use cleanslate_db::Database;
pub use fixture::{ConnectionPair, Fixture, Teardown};
pub use provisioner::{MySqlFixture, MySqlProvisioner, Provisioner};
pub use settings::Settings;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,cleanslate=debug,cleanslate_core=debug")),
        )
        .with_test_writer()
        .try_init();
}
