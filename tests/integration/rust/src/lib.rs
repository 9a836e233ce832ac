//! Integration test suite for the event loop workspace
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries.

/// Re-export components for test convenience
pub mod components {
    pub use async_runtime;
    pub use core_types;
    pub use loop_cli;
}
