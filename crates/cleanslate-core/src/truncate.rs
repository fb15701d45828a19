//! Schema truncation.
//!
//! Empties every base table of a schema while leaving its structure intact.
//! Foreign-key checks are switched off on one pinned session for the sweep
//! and switched back on before the session is released.

use crate::error::TableFailure;
use crate::ports::{Catalog, Session, SessionSource};
use crate::types::TruncationReport;
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Truncate every table of `database`.
///
/// Tables are listed through `catalog` and truncated through a single session
/// of `target`. Every table is attempted; if any fail, the result is
/// [`Error::Truncation`] naming each failed table.
pub async fn truncate<C, T>(catalog: &C, target: &T, database: &str) -> Result<TruncationReport>
where
    C: Catalog + ?Sized,
    T: SessionSource + ?Sized,
{
    catalog.ping().await?;
    target.ping().await?;

    let mut session = target.session().await?;
    session.set_foreign_key_checks(false).await?;

    let outcome = sweep(catalog, &mut session, database).await;

    let restored = session.set_foreign_key_checks(true).await;
    if let Err(e) = &restored {
        warn!(database, error = %e, "Failed to re-enable foreign key checks");
    }

    let report = outcome?;
    restored?;

    info!(
        database,
        tables = report.truncated.len(),
        "Truncated schema"
    );
    Ok(report)
}

async fn sweep<C, S>(catalog: &C, session: &mut S, database: &str) -> Result<TruncationReport>
where
    C: Catalog + ?Sized,
    S: Session,
{
    let tables = catalog.table_names(database).await?;

    let mut truncated = Vec::with_capacity(tables.len());
    let mut failures = Vec::new();

    for table in tables {
        match session.truncate_table(database, &table.name).await {
            Ok(()) => {
                debug!(database, table = %table.name, "Truncated table");
                truncated.push(table.name);
            }
            Err(e) => {
                warn!(database, table = %table.name, error = %e, "Failed to truncate table");
                failures.push(TableFailure {
                    table: table.name,
                    reason: e.to_string(),
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(Error::Truncation {
            database: database.to_string(),
            failures,
        });
    }

    Ok(TruncationReport {
        database: database.to_string(),
        truncated,
    })
}
