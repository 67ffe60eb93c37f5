//! Tenant directory service
//!
//! Owns the Ministry -> CROU -> Service tree and answers the questions every
//! other module asks of it: who is below whom, who is above whom, and which
//! tenants an actor anchored at a given tenant may touch.
//!
//! Reads run straight against the pool. Structural writes take the
//! directory-wide writer lock and run inside a single transaction, so a
//! re-parent and its descendant cascade are applied all-or-nothing.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{DbPool, TenantRepository};
use crate::models::path::{ancestor_paths, compose_path, is_within, level_of, rebase_path};
use crate::models::{
    AccessScope, CreateTenantRequest, IntegrityIssue, IntegrityViolation, TenantNode, TenantRole,
    TenantTreeNode, TenantType,
};
use crate::utils::error::{AppError, AppResult};

/// Tenant hierarchy and access-scope resolution
pub struct TenantDirectory {
    pool: DbPool,
    /// Serializes structural mutations of the tree
    write_lock: Mutex<()>,
}

impl TenantDirectory {
    /// Create a directory over an open pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn repo(&self) -> TenantRepository<'_> {
        TenantRepository::new(&self.pool)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get_tenant(&self, tenant_id: Uuid) -> AppResult<TenantNode> {
        self.repo()
            .get_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::tenant_not_found(tenant_id))
    }

    pub async fn get_tenant_by_code(&self, code: &str) -> AppResult<TenantNode> {
        self.repo()
            .get_by_code(code)
            .await?
            .ok_or_else(|| AppError::tenant_not_found(code))
    }

    /// Every tenant, ordered by level then name
    pub async fn list_tenants(&self) -> AppResult<Vec<TenantNode>> {
        Ok(self.repo().list().await?)
    }

    pub async fn count_tenants(&self) -> AppResult<i64> {
        Ok(self.repo().count().await?)
    }

    /// Strict descendants of a tenant, ordered by level then name
    pub async fn get_descendants(&self, tenant_id: Uuid) -> AppResult<Vec<TenantNode>> {
        let tenant = self.get_tenant(tenant_id).await?;
        Ok(self.repo().list_descendants(&tenant.path).await?)
    }

    /// Ancestors of a tenant, root first.
    ///
    /// Path segments that do not resolve to a stored tenant are skipped.
    pub async fn get_ancestors(&self, tenant_id: Uuid) -> AppResult<Vec<TenantNode>> {
        let tenant = self.get_tenant(tenant_id).await?;
        let repo = self.repo();

        let mut ancestors = Vec::new();
        for ancestor_path in ancestor_paths(&tenant.path) {
            match repo.get_by_path(&ancestor_path).await? {
                Some(ancestor) => ancestors.push(ancestor),
                None => debug!(
                    tenant_id = %tenant_id,
                    path = %ancestor_path,
                    "Skipping unresolved ancestor path"
                ),
            }
        }

        Ok(ancestors)
    }

    // =========================================================================
    // Access scope
    // =========================================================================

    /// Compute the tenants an actor anchored at `tenant_id` may access
    pub async fn get_access_scope(&self, tenant_id: Uuid) -> AppResult<AccessScope> {
        let tenant = self.get_tenant(tenant_id).await?;

        let (accessible_tenant_ids, can_access_all) = match tenant.role() {
            TenantRole::Root => {
                let mut ids = vec![tenant.id];
                ids.extend(
                    self.repo()
                        .list_ids()
                        .await?
                        .into_iter()
                        .filter(|id| *id != tenant.id),
                );
                (ids, true)
            }
            TenantRole::Regional => {
                let mut ids = vec![tenant.id];
                ids.extend(
                    self.repo()
                        .list_descendants(&tenant.path)
                        .await?
                        .into_iter()
                        .map(|t| t.id),
                );
                (ids, false)
            }
            TenantRole::Leaf => (vec![tenant.id], false),
            TenantRole::Unclassified => {
                warn!(
                    tenant_id = %tenant.id,
                    tenant_type = %tenant.tenant_type,
                    level = tenant.level,
                    "Tenant type does not match its level, restricting scope to itself"
                );
                (vec![tenant.id], false)
            }
        };

        Ok(AccessScope {
            tenant_id: tenant.id,
            accessible_tenant_ids,
            level: tenant.level,
            tenant_type: tenant.tenant_type,
            can_access_all,
        })
    }

    /// Whether an actor anchored at `source` may access `target`.
    ///
    /// Any failure resolving the source scope denies access.
    pub async fn can_access_tenant(&self, source: Uuid, target: Uuid) -> bool {
        if source == target {
            return true;
        }

        match self.get_access_scope(source).await {
            Ok(scope) => scope.contains(&target),
            Err(e) => {
                debug!(source = %source, target = %target, error = %e, "Denying tenant access");
                false
            }
        }
    }

    // =========================================================================
    // Tree projection
    // =========================================================================

    /// Nested view of the subtree rooted at `root_id`
    pub async fn get_hierarchy_tree(&self, root_id: Uuid) -> AppResult<TenantTreeNode> {
        let root = self.get_tenant(root_id).await?;
        let descendants = self.repo().list_descendants(&root.path).await?;

        let mut by_parent: HashMap<Uuid, Vec<&TenantNode>> = HashMap::new();
        for node in &descendants {
            if let Some(parent_id) = node.parent_id {
                by_parent.entry(parent_id).or_default().push(node);
            }
        }

        Ok(build_subtree(&root, &by_parent))
    }

    // =========================================================================
    // Structural writes
    // =========================================================================

    /// Move a tenant under `new_parent_id` (or make it a root) and rewrite the
    /// path and level of its whole subtree.
    ///
    /// Rejects moves onto the tenant itself or into its own subtree. The node
    /// update and every descendant rewrite commit together or not at all.
    pub async fn update_tenant_path(
        &self,
        tenant_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let tenant = TenantRepository::get_by_id_with(&mut *tx, tenant_id)
            .await?
            .ok_or_else(|| AppError::tenant_not_found(tenant_id))?;
        let old_path = tenant.path.clone();

        let new_path = match new_parent_id {
            Some(parent_id) => {
                if parent_id == tenant_id {
                    return Err(AppError::InvalidHierarchyMove(format!(
                        "Tenant {} cannot become its own parent",
                        tenant.code
                    )));
                }

                let parent = TenantRepository::get_by_id_with(&mut *tx, parent_id)
                    .await?
                    .ok_or_else(|| AppError::tenant_not_found(parent_id))?;

                if is_within(&parent.path, &old_path) {
                    return Err(AppError::InvalidHierarchyMove(format!(
                        "Cannot move {} under its own descendant {}",
                        tenant.code, parent.code
                    )));
                }

                compose_path(Some(&parent.path), &tenant.code)
            }
            None => compose_path(None, &tenant.code),
        };
        let new_level = level_of(&new_path);

        // Collected before the node's own path changes
        let descendants = TenantRepository::list_descendants_with(&mut *tx, &old_path).await?;

        TenantRepository::update_placement_with(
            &mut *tx,
            tenant_id,
            new_parent_id,
            &new_path,
            new_level,
        )
        .await?;

        for descendant in &descendants {
            let rebased = rebase_path(&descendant.path, &old_path, &new_path).ok_or_else(|| {
                AppError::CascadeAborted {
                    tenant_id,
                    reason: format!(
                        "descendant {} has path {} outside {}",
                        descendant.code, descendant.path, old_path
                    ),
                }
            })?;
            let rebased_level = level_of(&rebased);

            let updated =
                TenantRepository::update_path_with(&mut *tx, descendant.id, &rebased, rebased_level)
                    .await
                    .map_err(|e| AppError::CascadeAborted {
                        tenant_id,
                        reason: format!("{:#}", e),
                    })?;
            if !updated {
                return Err(AppError::CascadeAborted {
                    tenant_id,
                    reason: format!("descendant {} disappeared during the move", descendant.id),
                });
            }
        }

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            old_path = %old_path,
            new_path = %new_path,
            descendants = descendants.len(),
            "Moved tenant subtree"
        );

        Ok(())
    }

    /// Create a tenant below an optional parent.
    ///
    /// Path and level are derived from the parent; the tenant starts active.
    pub async fn create_tenant(&self, req: &CreateTenantRequest) -> AppResult<TenantNode> {
        req.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let parent = match req.parent_id {
            Some(parent_id) => Some(
                TenantRepository::get_by_id_with(&mut *tx, parent_id)
                    .await?
                    .ok_or_else(|| AppError::tenant_not_found(parent_id))?,
            ),
            None => None,
        };

        let path = compose_path(parent.as_ref().map(|p| p.path.as_str()), &req.code);
        let now = Utc::now();
        let tenant = TenantNode {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            code: req.code.clone(),
            tenant_type: req.tenant_type,
            level: level_of(&path),
            parent_id: parent.as_ref().map(|p| p.id),
            path,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        TenantRepository::insert_with(&mut *tx, &tenant).await?;
        tx.commit().await?;

        if tenant.role() == TenantRole::Unclassified {
            warn!(
                code = %tenant.code,
                tenant_type = %tenant.tenant_type,
                level = tenant.level,
                "Created tenant outside the Ministry/CROU/Service layout"
            );
        }
        info!(tenant_id = %tenant.id, path = %tenant.path, "Created tenant");

        Ok(tenant)
    }

    /// Activate or deactivate a tenant (tenants are never deleted)
    pub async fn set_tenant_active(&self, tenant_id: Uuid, is_active: bool) -> AppResult<TenantNode> {
        let _guard = self.write_lock.lock().await;

        let updated = TenantRepository::set_active_with(&self.pool, tenant_id, is_active).await?;
        if !updated {
            return Err(AppError::tenant_not_found(tenant_id));
        }

        info!(tenant_id = %tenant_id, is_active, "Updated tenant status");
        self.get_tenant(tenant_id).await
    }

    // =========================================================================
    // Filtered listings
    // =========================================================================

    /// The ministry at the root of the hierarchy, if any
    pub async fn get_ministere(&self) -> AppResult<Option<TenantNode>> {
        Ok(self
            .repo()
            .list_by_type_and_level(TenantType::Ministry, 0)
            .await?
            .into_iter()
            .next())
    }

    pub async fn get_all_crous(&self) -> AppResult<Vec<TenantNode>> {
        Ok(self.repo().list_by_type_and_level(TenantType::Crou, 1).await?)
    }

    pub async fn get_services_of_crou(&self, crou_id: Uuid) -> AppResult<Vec<TenantNode>> {
        Ok(self
            .repo()
            .list_children(crou_id, TenantType::Service, 2)
            .await?)
    }

    pub async fn get_tenants_by_level(&self, level: i64) -> AppResult<Vec<TenantNode>> {
        Ok(self.repo().list_by_level(level).await?)
    }

    pub async fn get_tenants_by_type(&self, tenant_type: TenantType) -> AppResult<Vec<TenantNode>> {
        Ok(self.repo().list_by_type(tenant_type).await?)
    }

    // =========================================================================
    // Integrity
    // =========================================================================

    /// Check every stored tenant against the path and level invariants
    pub async fn verify_integrity(&self) -> AppResult<Vec<IntegrityViolation>> {
        let tenants = self.repo().list().await?;
        let index: HashMap<Uuid, &TenantNode> = tenants.iter().map(|t| (t.id, t)).collect();

        let mut violations = Vec::new();
        for tenant in &tenants {
            let expected_path = match tenant.parent_id {
                None => Some(compose_path(None, &tenant.code)),
                Some(parent_id) => match index.get(&parent_id) {
                    Some(parent) => Some(compose_path(Some(&parent.path), &tenant.code)),
                    None => {
                        violations.push(IntegrityViolation {
                            tenant_id: tenant.id,
                            code: tenant.code.clone(),
                            issue: IntegrityIssue::MissingParent { parent_id },
                        });
                        None
                    }
                },
            };

            if let Some(expected) = expected_path {
                if expected != tenant.path {
                    violations.push(IntegrityViolation {
                        tenant_id: tenant.id,
                        code: tenant.code.clone(),
                        issue: IntegrityIssue::PathMismatch {
                            expected,
                            actual: tenant.path.clone(),
                        },
                    });
                }
            }

            let expected_level = level_of(&tenant.path);
            if expected_level != tenant.level {
                violations.push(IntegrityViolation {
                    tenant_id: tenant.id,
                    code: tenant.code.clone(),
                    issue: IntegrityIssue::LevelMismatch {
                        expected: expected_level,
                        actual: tenant.level,
                    },
                });
            }
        }

        if !violations.is_empty() {
            warn!(count = violations.len(), "Tenant hierarchy integrity violations found");
        }

        Ok(violations)
    }
}

fn build_subtree(node: &TenantNode, by_parent: &HashMap<Uuid, Vec<&TenantNode>>) -> TenantTreeNode {
    let mut tree = TenantTreeNode::from_node(node);
    if let Some(children) = by_parent.get(&node.id) {
        tree.children = children
            .iter()
            .map(|child| build_subtree(child, by_parent))
            .collect();
    }
    tree
}
