//! CROU Tenancy Library
//!
//! Tenant hierarchy and access-scope resolution for the CROU student-services
//! backend: a materialized-path tree (Ministry -> CROU -> Service) stored in
//! SQLite, with descendant/ancestor lookups, per-role access scopes and
//! transactional subtree moves.

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use services::TenantDirectory;
pub use utils::error::{AppError, AppResult};

/// Application state shared by the entry point and embedding callers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Tenant directory over `db`
    pub directory: Arc<TenantDirectory>,
}

impl AppState {
    /// Open the database described by `config` and build the directory on it
    pub async fn initialize(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::init_pool(&config.database).await?;
        let directory = Arc::new(TenantDirectory::new(db.clone()));
        Ok(Self {
            config,
            db,
            directory,
        })
    }

    /// Close the pool; pending connections are drained
    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}
