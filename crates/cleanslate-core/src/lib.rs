//! cleanslate core
//!
//! Domain types, port traits, error handling and the two lifecycle algorithms
//! that do not depend on a concrete runtime or driver: readiness backoff and
//! schema truncation. Adapters live in `cleanslate-docker` and
//! `cleanslate-db`.

pub mod error;
pub mod health;
pub mod ports;
pub mod truncate;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result, TableFailure};
pub use health::{Backoff, ensure_ready, retry, wait_until_ready};
pub use truncate::truncate;
pub use types::*;
