//! Hierarchy seeding from YAML definitions
//!
//! Definitions may appear in any order; each tenant is created once its parent
//! exists. Tenants whose code is already in the directory are left untouched,
//! so seeding the same file twice is harmless.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{HierarchySeed, TenantDefinition};
use crate::models::CreateTenantRequest;
use crate::services::TenantDirectory;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::is_valid_tenant_code;

/// Outcome of a seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

/// Create every tenant of `seed` that the directory does not have yet
pub async fn seed_hierarchy(directory: &TenantDirectory, seed: &HierarchySeed) -> AppResult<SeedReport> {
    validate_definitions(&seed.tenants)?;

    let defined: HashSet<&str> = seed.tenants.iter().map(|d| d.code.as_str()).collect();
    let mut resolved: HashMap<String, Uuid> = HashMap::new();

    // Parents referenced by the file but defined only in the directory
    for def in &seed.tenants {
        if let Some(parent) = def.parent.as_deref() {
            if defined.contains(parent) || resolved.contains_key(parent) {
                continue;
            }
            match directory.get_tenant_by_code(parent).await {
                Ok(existing) => {
                    resolved.insert(existing.code.clone(), existing.id);
                }
                Err(e) if e.is_not_found() => {
                    return Err(AppError::Validation(format!(
                        "Tenant {} references unknown parent {}",
                        def.code, parent
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    let mut report = SeedReport::default();
    let mut pending: Vec<&TenantDefinition> = seed.tenants.iter().collect();

    while !pending.is_empty() {
        let mut deferred = Vec::new();
        let before = pending.len();

        for def in pending {
            let parent_id = match def.parent.as_deref() {
                None => None,
                Some(parent) => match resolved.get(parent) {
                    Some(id) => Some(*id),
                    None => {
                        deferred.push(def);
                        continue;
                    }
                },
            };

            let tenant_id = match directory.get_tenant_by_code(&def.code).await {
                Ok(existing) => {
                    debug!(code = %def.code, "Tenant already present, skipping");
                    report.skipped += 1;
                    existing.id
                }
                Err(e) if e.is_not_found() => {
                    let created = directory
                        .create_tenant(&CreateTenantRequest {
                            name: def.name.clone(),
                            code: def.code.clone(),
                            tenant_type: def.tenant_type,
                            parent_id,
                        })
                        .await?;
                    report.created += 1;
                    created.id
                }
                Err(e) => return Err(e),
            };
            resolved.insert(def.code.clone(), tenant_id);
        }

        if deferred.len() == before {
            let codes: Vec<&str> = deferred.iter().map(|d| d.code.as_str()).collect();
            return Err(AppError::Validation(format!(
                "Hierarchy definition contains a parent cycle involving: {}",
                codes.join(", ")
            )));
        }
        pending = deferred;
    }

    info!(
        created = report.created,
        skipped = report.skipped,
        "Hierarchy seed applied"
    );
    Ok(report)
}

fn validate_definitions(definitions: &[TenantDefinition]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for def in definitions {
        if !is_valid_tenant_code(&def.code) {
            return Err(AppError::Validation(format!("Invalid tenant code: {:?}", def.code)));
        }
        if def.name.trim().is_empty() {
            return Err(AppError::Validation(format!("Tenant {} has an empty name", def.code)));
        }
        if !seen.insert(def.code.as_str()) {
            return Err(AppError::Validation(format!("Duplicate tenant code: {}", def.code)));
        }
        if def.parent.as_deref() == Some(def.code.as_str()) {
            return Err(AppError::Validation(format!("Tenant {} is its own parent", def.code)));
        }
    }

    let cyclic = cyclic_codes(definitions);
    if !cyclic.is_empty() {
        return Err(AppError::Validation(format!(
            "Hierarchy definition contains a parent cycle involving: {}",
            cyclic.join(", ")
        )));
    }
    Ok(())
}

/// Codes whose parent chain inside the definitions never reaches a root, sorted
fn cyclic_codes(definitions: &[TenantDefinition]) -> Vec<&str> {
    let parents: HashMap<&str, Option<&str>> = definitions
        .iter()
        .map(|d| (d.code.as_str(), d.parent.as_deref()))
        .collect();

    let mut cyclic: Vec<&str> = definitions
        .iter()
        .map(|d| d.code.as_str())
        .filter(|code| {
            let mut current = parents.get(code).copied().flatten();
            // A chain longer than the definition list must revisit a code
            for _ in 0..parents.len() {
                match current {
                    Some(parent) if parent == *code => return true,
                    Some(parent) => current = parents.get(parent).copied().flatten(),
                    None => return false,
                }
            }
            false
        })
        .collect();
    cyclic.sort_unstable();
    cyclic
}
