//! sqlx_pool.rs
//!
//! one Postgres pool per process, handed to whoever owns the store

use std::time::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use crate::error::StoreError;
use crate::settings::Settings;

const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// connect eagerly so a bad host or bad credentials fail here, before any tick runs
pub async fn create_sqlx_pg_pool(settings: &Settings) -> Result<PgPool, StoreError> {
    tracing::info!("[create_sqlx_pg_pool] connecting to {}", settings.describe());

    match PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(&settings.database_url())
        .await
    {
        Ok(pool) => {
            tracing::debug!("[create_sqlx_pg_pool] pool ready, max_connections: {}", settings.max_connections);
            Ok(pool)
        }
        Err(e) => {
            tracing::error!("[create_sqlx_pg_pool] could not connect: {:?}", &e);
            Err(StoreError::connectivity(e))
        }
    }
}
