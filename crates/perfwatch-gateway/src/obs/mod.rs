//! Request observability layers.
//!
//! - `access_log`: combined-log style line per request (debug for noisy
//!   polling traffic, info otherwise).
//! - `profiling`: per-request resource sampling into the CSV report while a
//!   controller holds the lock token.
//! - `process`: `sysinfo`-backed sampler and liveness probe.

pub mod access_log;
pub mod process;
pub mod profiling;
