//! Pinned MySQL session used for truncation.

use async_trait::async_trait;
use cleanslate_core::ports::Session;
use cleanslate_core::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::{Executor, MySql};

/// One connection checked out of a target pool.
///
/// `FOREIGN_KEY_CHECKS` is a session variable, so it only affects statements
/// issued through this connection.
pub struct MySqlSession {
    conn: PoolConnection<MySql>,
}

impl MySqlSession {
    pub fn new(conn: PoolConnection<MySql>) -> Self {
        Self { conn }
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        (&mut *self.conn)
            .execute(sql)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Session for MySqlSession {
    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()> {
        let sql = if enabled {
            "SET FOREIGN_KEY_CHECKS=1"
        } else {
            "SET FOREIGN_KEY_CHECKS=0"
        };

        let result = self.execute(sql).await;
        if enabled && result.is_err() {
            // Never hand a session with checks off back to the pool.
            self.conn.close_on_drop();
        }
        result
    }

    async fn truncate_table(&mut self, database: &str, table: &str) -> Result<()> {
        self.execute(&truncate_statement(database, table)).await
    }
}

/// `TRUNCATE TABLE` for a schema-qualified table.
pub fn truncate_statement(database: &str, table: &str) -> String {
    format!(
        "TRUNCATE TABLE {}.{}",
        quote_identifier(database),
        quote_identifier(table)
    )
}

/// Quote a MySQL identifier with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
