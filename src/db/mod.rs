//! Database layer
//!
//! This module handles local storage of the tenant hierarchy:
//! - Connection pool setup and embedded migrations
//! - The tenant repository (row mapping, prefix-range queries, writes)

pub mod migrations;
pub mod tenant_repository;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use crate::config::DatabaseConfig;

pub use tenant_repository::TenantRepository;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Whether the URL points at a private in-memory database
pub fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Initialize the database connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    // Each in-memory connection is its own database, so keep exactly one alive
    pool_options = if is_memory_url(&config.url) {
        debug!("Using single-connection pool for in-memory database");
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    migrations::run_migrations(&pool).await?;
    info!(url = %config.url, "Database ready");

    Ok(pool)
}
