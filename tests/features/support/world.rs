//! Test world for Cucumber scenarios

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cucumber::World;
use uuid::Uuid;

use crou_tenancy::config::DatabaseConfig;
use crou_tenancy::db;
use crou_tenancy::models::{AccessScope, CreateTenantRequest, TenantNode, TenantType};
use crou_tenancy::{AppError, TenantDirectory};

/// Test world that maintains state across scenario steps
#[derive(Default, World)]
pub struct TestWorld {
    /// Directory over a private in-memory database, opened lazily
    directory: Option<Arc<TenantDirectory>>,

    /// Tenant ids by code, for everything created in the scenario
    pub tenants: HashMap<String, Uuid>,

    /// Scope computed by the last "When" step
    pub last_scope: Option<AccessScope>,

    /// Result of the last access check
    pub last_access: Option<bool>,

    /// Error returned by the last operation
    pub last_error: Option<AppError>,

    /// Tenants listed by the last query
    pub last_listing: Vec<TenantNode>,
}

impl fmt::Debug for TestWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestWorld")
            .field("tenants", &self.tenants)
            .field("last_scope", &self.last_scope)
            .field("last_access", &self.last_access)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl TestWorld {
    /// The scenario's directory, created on first use
    pub async fn directory(&mut self) -> Arc<TenantDirectory> {
        if let Some(directory) = &self.directory {
            return directory.clone();
        }

        let pool = db::init_pool(&DatabaseConfig::in_memory())
            .await
            .expect("Failed to create in-memory database");
        let directory = Arc::new(TenantDirectory::new(pool));
        self.directory = Some(directory.clone());
        directory
    }

    /// Id of a tenant created earlier in the scenario
    pub fn id_of(&self, code: &str) -> Uuid {
        *self
            .tenants
            .get(code)
            .unwrap_or_else(|| panic!("Tenant {} was not created in this scenario", code))
    }

    /// Create a tenant under `parent` (by code) and remember its id
    pub async fn create_tenant(
        &mut self,
        code: &str,
        tenant_type: TenantType,
        parent: Option<&str>,
    ) -> Result<TenantNode, AppError> {
        let parent_id = parent.map(|p| self.id_of(p));
        let directory = self.directory().await;

        let tenant = directory
            .create_tenant(&CreateTenantRequest {
                name: format!("Tenant {}", code),
                code: code.to_string(),
                tenant_type,
                parent_id,
            })
            .await?;
        self.tenants.insert(tenant.code.clone(), tenant.id);
        Ok(tenant)
    }

    /// Current state of a tenant
    pub async fn tenant(&mut self, code: &str) -> TenantNode {
        let id = self.id_of(code);
        self.directory()
            .await
            .get_tenant(id)
            .await
            .expect("Tenant should exist")
    }
}
