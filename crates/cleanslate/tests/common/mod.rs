//! Shared setup for integration tests.

#![allow(dead_code)]

use cleanslate::{FixtureConfig, MySqlFixture, MySqlProvisioner, Settings};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::mysql::Mysql;

/// Database the MySQL image creates on first start.
pub const DATABASE: &str = "test";

/// MySQL container for fixture tests.
pub struct MysqlContainer {
    container: ContainerAsync<Mysql>,
}

impl MysqlContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Mysql::default().with_tag("8.0").start().await?;
        Ok(Self { container })
    }

    /// Container id; `docker inspect` accepts it in place of a name.
    pub fn id(&self) -> &str {
        self.container.id()
    }

    /// Settings pointing the provisioner at this container.
    pub fn settings(&self) -> Settings {
        Settings::default()
            .with_container_name(self.id())
            .with_base_dir(env!("CARGO_MANIFEST_DIR"))
            // The image allows root without a password.
            .with_credentials("root", "")
            .with_readiness(Duration::from_millis(100), 30)
    }

    /// Provision a fixture against the running container.
    pub async fn fixture(&self) -> anyhow::Result<MySqlFixture> {
        cleanslate::init_test_logging();

        let provisioner = MySqlProvisioner::from_settings(self.settings());
        let fixture = provisioner
            .provision(&FixtureConfig::new(DATABASE, "../../docker/mysql/seed.sql"))
            .await?;
        fixture
            .wait_until_ready(&provisioner.settings().readiness())
            .await?;
        Ok(fixture)
    }
}

/// Run each statement against the fixture's target schema.
pub async fn execute(fixture: &MySqlFixture, statements: &[&str]) -> anyhow::Result<()> {
    for statement in statements {
        sqlx::query(statement)
            .execute(fixture.target().pool())
            .await?;
    }
    Ok(())
}

pub async fn count(fixture: &MySqlFixture, table: &str) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM `{}`", table))
        .fetch_one(fixture.target().pool())
        .await?;
    Ok(count)
}

/// Parent `customers` table referenced by `orders`.
pub async fn create_shop_schema(fixture: &MySqlFixture) -> anyhow::Result<()> {
    execute(
        fixture,
        &[
            "CREATE TABLE customers (id INT PRIMARY KEY, name VARCHAR(64) NOT NULL)",
            "CREATE TABLE orders (
                id INT PRIMARY KEY,
                customer_id INT NOT NULL,
                placed_at DATETIME NOT NULL,
                FOREIGN KEY (customer_id) REFERENCES customers (id)
            )",
        ],
    )
    .await
}

pub async fn insert_shop_rows(fixture: &MySqlFixture) -> anyhow::Result<()> {
    execute(
        fixture,
        &[
            "INSERT INTO customers (id, name) VALUES (1, 'ada'), (2, 'grace')",
            "INSERT INTO orders (id, customer_id, placed_at) VALUES \
             (10, 1, '2024-03-01 10:00:00'), (11, 2, '2024-03-02 11:30:00')",
        ],
    )
    .await
}
