//! Top-level facade crate for perfwatch.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use perfwatch_core::*;
}

pub mod gateway {
    pub use perfwatch_gateway::*;
}
