//! Health probes and control endpoints for the courier dispatcher
//!
//! # Endpoints
//!
//! - **`GET /health/live`** - Liveness: 200 while the process can answer
//! - **`GET /health/ready`** - Readiness: 200 while the scheduler is serving
//!   and the last cycle reached the job store
//! - **`GET /status`** - Scheduler counters and the last cycle report as JSON
//! - **`POST /dispatch`** - Start a cycle now: 202 when started, 409 while a
//!   cycle is already running
//!
//! # Usage
//!
//! ```rust,no_run
//! use courier_health::{HealthChecker, HealthConfig, HealthServer};
//! use courier_dispatch::Scheduler;
//! use std::sync::Arc;
//!
//! # async fn example(scheduler: Arc<Scheduler>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = HealthConfig {
//!     enabled: true,
//!     listen_address: "[::]:5000".to_string(),
//! };
//!
//! let checker = Arc::new(HealthChecker::new(scheduler));
//! let server = HealthServer::new(&config, checker).await?;
//!
//! // server.serve(shutdown_receiver).await?;
//! # Ok(())
//! # }
//! ```

mod checker;
mod config;
mod error;
mod server;

pub use checker::HealthChecker;
pub use config::HealthConfig;
pub use error::HealthError;
pub use server::HealthServer;
