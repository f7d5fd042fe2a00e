//! Policy abstractions for dispatch decisions.
//!
//! - [`RetryPolicy`]: whether and when a failed job is attempted again

pub mod retry;

pub use retry::RetryPolicy;
