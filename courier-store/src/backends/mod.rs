//! Job store implementations
//!
//! - `memory`: in-process table for development and tests
//! - `test`: memory table with failure injection and synchronisation
//! - `postgres`: the production `scheduled_emails` table

pub mod memory;
pub mod postgres;
pub mod test;

pub use memory::MemoryJobStore;
pub use postgres::PostgresJobStore;
pub use test::TestJobStore;
