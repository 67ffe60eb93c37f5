//! Test factories for generating test data
//!
//! Factories create randomized tenants, useful when a test needs many unique
//! nodes and does not care about their exact names.

use std::sync::atomic::{AtomicU64, Ordering};

use fake::faker::address::en::CityName;
use fake::faker::company::en::CompanyName;
use fake::Fake;
use uuid::Uuid;

use crou_tenancy::models::{CreateTenantRequest, TenantType};

/// Factory for tenant creation requests with unique codes
pub struct TenantFactory {
    counter: AtomicU64,
}

impl Default for TenantFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantFactory {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    fn next_code(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:04}", prefix, n)
    }

    pub fn ministry(&self) -> CreateTenantRequest {
        CreateTenantRequest {
            name: CompanyName().fake(),
            code: self.next_code("MIN"),
            tenant_type: TenantType::Ministry,
            parent_id: None,
        }
    }

    pub fn crou(&self, parent_id: Uuid) -> CreateTenantRequest {
        let city: String = CityName().fake();
        CreateTenantRequest {
            name: format!("CROU de {}", city),
            code: self.next_code("CROU"),
            tenant_type: TenantType::Crou,
            parent_id: Some(parent_id),
        }
    }

    pub fn service(&self, parent_id: Uuid) -> CreateTenantRequest {
        CreateTenantRequest {
            name: CompanyName().fake(),
            code: self.next_code("SVC"),
            tenant_type: TenantType::Service,
            parent_id: Some(parent_id),
        }
    }
}
