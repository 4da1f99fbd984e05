//! perfwatch core: request profiling primitives, error types, and the
//! activation state machine.
//!
//! This crate defines the lock-token contract, the CSV report format and the
//! metrics collector shared by the gateway middleware and the controller
//! tooling. It carries no HTTP or async runtime dependencies; process
//! sampling and liveness are injected through traits.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Profiling runs inline with request handling, so every fallible path must
//! surface as `PerfWatchError`/`Result` or be logged and dropped.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod collector;
pub mod error;
pub mod report;
pub mod sample;
pub mod token;

/// Shared result type.
pub use error::{Result, PerfWatchError};

pub use collector::{CollectorSnapshot, MetricsCollector};
pub use report::{CsvReport, MetricsRow};
pub use sample::{Clock, LivenessProbe, ProcessSampler, RequestSample, SystemClock};
pub use token::{FileTokenStore, LockToken, TokenStore};
