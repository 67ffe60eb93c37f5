//! Tenant repository
//!
//! Reads go through the pool held by [`TenantRepository`]. Writes (and the reads
//! a write depends on) take any SQLite executor so they can run inside the
//! caller's transaction.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::models::path::descendant_range;
use crate::models::{TenantNode, TenantType};

const TENANT_COLUMNS: &str =
    "id, name, code, tenant_type, level, parent_id, path, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    code: String,
    tenant_type: String,
    level: i64,
    parent_id: Option<String>,
    path: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

pub struct TenantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TenantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All tenants, shallowest first
    pub async fn list(&self) -> Result<Vec<TenantNode>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants ORDER BY level, name",
            TENANT_COLUMNS
        ))
        .fetch_all(self.pool)
        .await
        .context("Failed to list tenants")?;

        rows.into_iter().map(row_to_tenant).collect()
    }

    pub async fn list_ids(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM tenants ORDER BY level, name")
            .fetch_all(self.pool)
            .await
            .context("Failed to list tenant ids")?;

        ids.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenants")
            .fetch_one(self.pool)
            .await
            .context("Failed to count tenants")?;
        Ok(count)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TenantNode>> {
        Self::get_by_id_with(self.pool, id).await
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<TenantNode>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE code = ?",
            TENANT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await
        .context("Failed to get tenant by code")?;

        row.map(row_to_tenant).transpose()
    }

    pub async fn get_by_path(&self, path: &str) -> Result<Option<TenantNode>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE path = ?",
            TENANT_COLUMNS
        ))
        .bind(path)
        .fetch_optional(self.pool)
        .await
        .context("Failed to get tenant by path")?;

        row.map(row_to_tenant).transpose()
    }

    /// Strict descendants of the node at `path`, ordered by level then name
    pub async fn list_descendants(&self, path: &str) -> Result<Vec<TenantNode>> {
        Self::list_descendants_with(self.pool, path).await
    }

    pub async fn list_by_level(&self, level: i64) -> Result<Vec<TenantNode>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE level = ? ORDER BY name",
            TENANT_COLUMNS
        ))
        .bind(level)
        .fetch_all(self.pool)
        .await
        .context("Failed to list tenants by level")?;

        rows.into_iter().map(row_to_tenant).collect()
    }

    pub async fn list_by_type(&self, tenant_type: TenantType) -> Result<Vec<TenantNode>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE tenant_type = ? ORDER BY level, name",
            TENANT_COLUMNS
        ))
        .bind(tenant_type.as_str())
        .fetch_all(self.pool)
        .await
        .context("Failed to list tenants by type")?;

        rows.into_iter().map(row_to_tenant).collect()
    }

    pub async fn list_by_type_and_level(
        &self,
        tenant_type: TenantType,
        level: i64,
    ) -> Result<Vec<TenantNode>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE tenant_type = ? AND level = ? ORDER BY name",
            TENANT_COLUMNS
        ))
        .bind(tenant_type.as_str())
        .bind(level)
        .fetch_all(self.pool)
        .await
        .context("Failed to list tenants by type and level")?;

        rows.into_iter().map(row_to_tenant).collect()
    }

    /// Direct children of `parent_id` with the given type and level
    pub async fn list_children(
        &self,
        parent_id: Uuid,
        tenant_type: TenantType,
        level: i64,
    ) -> Result<Vec<TenantNode>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE parent_id = ? AND tenant_type = ? AND level = ? ORDER BY name",
            TENANT_COLUMNS
        ))
        .bind(parent_id.to_string())
        .bind(tenant_type.as_str())
        .bind(level)
        .fetch_all(self.pool)
        .await
        .context("Failed to list child tenants")?;

        rows.into_iter().map(row_to_tenant).collect()
    }

    // =========================================================================
    // Executor-generic operations (usable inside a transaction)
    // =========================================================================

    pub async fn get_by_id_with<'e, E>(executor: E, id: Uuid) -> Result<Option<TenantNode>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE id = ?",
            TENANT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to get tenant")?;

        row.map(row_to_tenant).transpose()
    }

    pub async fn list_descendants_with<'e, E>(executor: E, path: &str) -> Result<Vec<TenantNode>>
    where
        E: SqliteExecutor<'e>,
    {
        let (lower, upper) = descendant_range(path);
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE path >= ? AND path < ? ORDER BY level, name",
            TENANT_COLUMNS
        ))
        .bind(lower)
        .bind(upper)
        .fetch_all(executor)
        .await
        .context("Failed to list descendant tenants")?;

        rows.into_iter().map(row_to_tenant).collect()
    }

    pub async fn insert_with<'e, E>(executor: E, tenant: &TenantNode) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, code, tenant_type, level, parent_id, path, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.id.to_string())
        .bind(&tenant.name)
        .bind(&tenant.code)
        .bind(tenant.tenant_type.as_str())
        .bind(tenant.level)
        .bind(tenant.parent_id.map(|id| id.to_string()))
        .bind(&tenant.path)
        .bind(tenant.is_active)
        .bind(tenant.created_at.to_rfc3339())
        .bind(tenant.updated_at.to_rfc3339())
        .execute(executor)
        .await
        .context("Failed to create tenant")?;

        Ok(())
    }

    /// Overwrite the placement fields of one tenant. Returns false if absent.
    pub async fn update_placement_with<'e, E>(
        executor: E,
        id: Uuid,
        parent_id: Option<Uuid>,
        path: &str,
        level: i64,
    ) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET parent_id = ?, path = ?, level = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(parent_id.map(|p| p.to_string()))
        .bind(path)
        .bind(level)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(executor)
        .await
        .context("Failed to update tenant placement")?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewrite path and level of a descendant during a cascade
    pub async fn update_path_with<'e, E>(executor: E, id: Uuid, path: &str, level: i64) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET path = ?, level = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(path)
        .bind(level)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(executor)
        .await
        .context("Failed to rewrite descendant path")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active_with<'e, E>(executor: E, id: Uuid, is_active: bool) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE tenants SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(executor)
            .await
            .context("Failed to update tenant status")?;

        Ok(result.rows_affected() > 0)
    }
}

fn parse_db_timestamp(ts: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc);
    }
    Utc::now()
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid tenant UUID in database: {}", value))
}

fn row_to_tenant(row: TenantRow) -> Result<TenantNode> {
    let tenant_type = row
        .tenant_type
        .parse::<TenantType>()
        .map_err(|e| anyhow!(e))?;

    Ok(TenantNode {
        id: parse_uuid(&row.id)?,
        name: row.name,
        code: row.code,
        tenant_type,
        level: row.level,
        parent_id: row.parent_id.as_deref().map(parse_uuid).transpose()?,
        path: row.path,
        is_active: row.is_active,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}
