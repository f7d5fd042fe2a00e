use std::{sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{JobStore, MemoryJobStore, PostgresJobStore};

const fn default_max_connections() -> u32 {
    5
}

const fn default_acquire_timeout() -> u64 {
    10
}

/// Configuration for the job store
///
/// # Examples
///
/// PostgreSQL in RON config:
/// ```ron
/// Courier (
///     store: Postgres(
///         url: "postgres://courier:secret@db/courier",
///         max_connections: 5,
///     ),
/// )
/// ```
///
/// In-memory table for local development:
/// ```ron
/// Courier (
///     store: Memory,
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub enum StoreConfig {
    /// Process-local table; contents are lost on exit
    #[default]
    Memory,
    /// The `scheduled_emails` table in PostgreSQL
    Postgres {
        /// Connection URL; `DATABASE_URL` overrides it
        url: String,

        /// Upper bound on pooled connections
        #[serde(default = "default_max_connections")]
        max_connections: u32,

        /// How long to wait for a pooled connection before the store is
        /// reported unavailable (in seconds)
        #[serde(default = "default_acquire_timeout")]
        acquire_timeout_secs: u64,

        /// Create the table and missing columns on start-up
        #[serde(default)]
        create_schema: bool,
    },
}

impl StoreConfig {
    /// A Postgres store with default pool settings
    #[must_use]
    pub fn postgres(url: impl Into<String>) -> Self {
        Self::Postgres {
            url: url.into(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            create_schema: false,
        }
    }

    /// Point the store at `url`, keeping any pool settings already configured
    #[must_use]
    pub fn with_url(self, url: impl Into<String>) -> Self {
        match self {
            Self::Memory => Self::postgres(url),
            Self::Postgres {
                max_connections,
                acquire_timeout_secs,
                create_schema,
                ..
            } => Self::Postgres {
                url: url.into(),
                max_connections,
                acquire_timeout_secs,
                create_schema,
            },
        }
    }

    /// Build the configured store as a trait object
    ///
    /// # Errors
    /// If the Postgres URL is invalid or the schema cannot be created
    pub async fn into_job_store(self) -> crate::Result<Arc<dyn JobStore>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryJobStore::new())),
            Self::Postgres {
                url,
                max_connections,
                acquire_timeout_secs,
                create_schema,
            } => {
                let store = PostgresJobStore::connect_lazy(
                    &url,
                    max_connections,
                    Duration::from_secs(acquire_timeout_secs),
                )?;
                if create_schema {
                    store.ensure_schema().await?;
                }
                Ok(Arc::new(store))
            }
        }
    }
}
