//! CLI command definitions.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the database container state
    Status,

    /// Start the container if needed and wait until the database answers
    Up(Target),

    /// Wait until the database of a running container answers a ping
    Wait {
        /// Schema to ping
        #[arg(short, long)]
        database: String,
    },

    /// Truncate every table of a schema
    Truncate(Target),
}

/// Fixture a command operates on.
#[derive(Args, Debug)]
pub struct Target {
    /// Schema the fixture targets
    #[arg(short, long)]
    pub database: String,

    /// Seed SQL file loaded when the container is first created
    #[arg(short, long, default_value = "docker/mysql/seed.sql")]
    pub seed: PathBuf,
}
