//! Shared primitives for the courier workspace: logging setup, the
//! `internal!` logging macros and the process lifecycle [`Signal`].

pub mod logging;

pub use tracing;

/// Lifecycle signal broadcast to every long-running component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop accepting new work and wind down
    Shutdown,
    /// All components have finished shutting down
    Finalised,
}
