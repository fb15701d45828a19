//! Command handlers.

use crate::commands::Target;
use cleanslate::{FixtureConfig, MySqlFixture, MySqlProvisioner, wait_until_ready};
use console::style;

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Print the container state.
pub async fn status(provisioner: &MySqlProvisioner, json: bool) -> HandlerResult {
    let state = provisioner.probe().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let status = if state.is_running() {
        style(state.status.as_str()).green()
    } else {
        style(state.status.as_str()).yellow()
    };
    println!("{} {}", style(&state.name).bold(), status);

    match state.endpoint() {
        Ok(endpoint) => println!("  endpoint: {}", endpoint),
        Err(e) if state.is_running() => println!("  {} {}", style("!").red(), e),
        Err(_) => {}
    }
    Ok(())
}

/// Provision a fixture and wait for both connections.
pub async fn up(provisioner: &MySqlProvisioner, target: &Target) -> HandlerResult {
    let fixture = ready_fixture(provisioner, target).await?;
    println!(
        "{} {} ready at {}",
        style("✓").green(),
        fixture.database_name(),
        fixture.endpoint()
    );
    Ok(())
}

/// Wait for the database of an already running container. Never starts it.
pub async fn wait(provisioner: &MySqlProvisioner, database: &str) -> HandlerResult {
    let conn = provisioner.attach(database).await?;
    wait_until_ready(&conn, &provisioner.settings().readiness()).await?;
    println!("{} {} is reachable", style("✓").green(), conn.database());
    Ok(())
}

/// Truncate every table of the target schema once.
pub async fn truncate(provisioner: &MySqlProvisioner, target: &Target, json: bool) -> HandlerResult {
    let fixture = ready_fixture(provisioner, target).await?;
    let report = fixture.teardown().run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for table in &report.truncated {
        println!("  {}", table);
    }
    println!(
        "{} Truncated {} table(s) in {}",
        style("✓").green(),
        report.truncated.len(),
        report.database
    );
    Ok(())
}

async fn ready_fixture(
    provisioner: &MySqlProvisioner,
    target: &Target,
) -> Result<MySqlFixture, Box<dyn std::error::Error>> {
    let fixture = provisioner
        .provision(&FixtureConfig::new(target.database.as_str(), target.seed.clone()))
        .await?;
    fixture
        .wait_until_ready(&provisioner.settings().readiness())
        .await?;
    Ok(fixture)
}
