//! cleanslate CLI entrypoint.

use clap::Parser;
use cleanslate::MySqlProvisioner;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;

use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "cleanslate")]
#[command(author, version, about = "Manage the shared MySQL test fixture", long_about = None)]
struct Cli {
    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provisioner = MySqlProvisioner::from_env()?;
    tracing::debug!(command = ?cli.command, "running command");

    match cli.command {
        Commands::Status => handlers::status(&provisioner, cli.json).await?,
        Commands::Up(target) => handlers::up(&provisioner, &target).await?,
        Commands::Wait { database } => handlers::wait(&provisioner, &database).await?,
        Commands::Truncate(target) => handlers::truncate(&provisioner, &target, cli.json).await?,
    }

    Ok(())
}
