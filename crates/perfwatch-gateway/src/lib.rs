//! perfwatch gateway library entry.
//!
//! This crate wires the access-log emulator and the request profiling
//! collector into an axum stack. It is consumed by the binary (`main.rs`) and
//! by integration tests; host applications can wrap their own router with
//! `router::with_observability`.

pub mod app_state;
pub mod cli;
pub mod config;
pub mod controller;
pub mod obs;
pub mod ops;
pub mod router;
