//! Postgres persistence for the pipeline: sources, events, entities, runtime
//! config, and the atomic enrichment-claim primitive. All cross-worker
//! coordination happens through this crate.

pub mod error;

mod admin;
mod entities;
mod events;
mod sources;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use admin::StatsSnapshot;
pub use error::{Result, StoreError};
pub use sources::NewSource;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to Postgres and run the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Raw pool access for integration tests that need to rewrite rows
    /// (e.g. backdating a claim to simulate a dead worker).
    #[cfg(feature = "test-utils")]
    pub fn raw_pool(&self) -> &PgPool {
        &self.pool
    }
}
