//! The courier process: configuration, wiring and lifecycle

pub mod controller;
