//! Database migrations
//!
//! Migrations are handled by SQLx and stored in the `migrations/` directory.
//! This module provides utilities for working with migrations programmatically.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// Tables the directory cannot work without
const REQUIRED_TABLES: &[&str] = &["tenants"];

/// Apply every pending migration
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")
}

/// Return the required tables that are missing from the schema
pub async fn missing_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(*table)
                .fetch_optional(pool)
                .await
                .context("Failed to inspect schema")?;
        if exists.is_none() {
            missing.push(table.to_string());
        }
    }
    Ok(missing)
}
