//! Retry timing and the in-process reconcile queue

pub mod reconcile;
pub mod retry;

pub use reconcile::{ReconcileEntry, ReconcileQueue};
