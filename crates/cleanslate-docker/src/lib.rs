//! Docker CLI adapter for cleanslate.
//!
//! Probes a named container with `docker inspect` and starts the compose
//! project with `docker compose up -d`. The runtime is treated as an opaque
//! process: any non-zero exit is a process error and any unexpected output is
//! a parse error.

pub mod inspect;
pub mod runtime;

pub use inspect::parse_inspect;
pub use runtime::{DockerCli, MYSQL_PORT};
