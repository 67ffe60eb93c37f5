//! Tenant (organizational unit) model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::validate_tenant_code;

/// Kind of organizational unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    /// National ministry, root of the hierarchy
    #[serde(alias = "ministere")]
    Ministry,
    /// Regional CROU
    Crou,
    /// Operational service inside a CROU
    Service,
}

impl TenantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantType::Ministry => "ministry",
            TenantType::Crou => "crou",
            TenantType::Service => "service",
        }
    }
}

impl fmt::Display for TenantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ministry" | "ministere" => Ok(TenantType::Ministry),
            "crou" => Ok(TenantType::Crou),
            "service" => Ok(TenantType::Service),
            other => Err(format!("Unknown tenant type: {}", other)),
        }
    }
}

/// Access role of a tenant, derived from its `(type, level)` pair.
///
/// Only the three placements of the business hierarchy grant more than
/// self-access; anything else is `Unclassified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    /// Ministry at level 0: sees the whole directory
    Root,
    /// CROU at level 1: sees itself and its subtree
    Regional,
    /// Service at level 2: sees itself
    Leaf,
    /// Type and level disagree with the business hierarchy
    Unclassified,
}

impl TenantRole {
    pub fn classify(tenant_type: TenantType, level: i64) -> Self {
        match (tenant_type, level) {
            (TenantType::Ministry, 0) => TenantRole::Root,
            (TenantType::Crou, 1) => TenantRole::Regional,
            (TenantType::Service, 2) => TenantRole::Leaf,
            _ => TenantRole::Unclassified,
        }
    }
}

/// A node of the tenant hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantNode {
    pub id: Uuid,
    pub name: String,
    /// Unique short identifier, used as the node's path segment
    pub code: String,
    #[serde(rename = "type")]
    pub tenant_type: TenantType,
    /// Depth from the root, always `segments(path) - 1`
    pub level: i64,
    pub parent_id: Option<Uuid>,
    /// Materialized path of codes from the root to this node
    pub path: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantNode {
    pub fn role(&self) -> TenantRole {
        TenantRole::classify(self.tenant_type, self.level)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Request to create a tenant under an optional parent
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom(function = "validate_tenant_code"))]
    pub code: String,
    #[serde(rename = "type")]
    pub tenant_type: TenantType,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Authorization scope of an actor anchored at a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessScope {
    pub tenant_id: Uuid,
    /// Tenant ids the actor may read and write, anchor first
    pub accessible_tenant_ids: Vec<Uuid>,
    pub level: i64,
    #[serde(rename = "type")]
    pub tenant_type: TenantType,
    pub can_access_all: bool,
}

impl AccessScope {
    pub fn contains(&self, tenant_id: &Uuid) -> bool {
        self.accessible_tenant_ids.contains(tenant_id)
    }
}

/// Tree-shaped projection of a subtree, for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantTreeNode {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub tenant_type: TenantType,
    pub level: i64,
    pub path: String,
    pub parent_id: Option<Uuid>,
    pub children: Vec<TenantTreeNode>,
}

impl TenantTreeNode {
    /// Leaf projection of a node; children are attached by the caller.
    pub fn from_node(node: &TenantNode) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            code: node.code.clone(),
            tenant_type: node.tenant_type,
            level: node.level,
            path: node.path.clone(),
            parent_id: node.parent_id,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, root included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TenantTreeNode::size).sum::<usize>()
    }
}

/// Kind of broken invariant found by an integrity scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    MissingParent { parent_id: Uuid },
    PathMismatch { expected: String, actual: String },
    LevelMismatch { expected: i64, actual: i64 },
}

/// A node whose stored placement disagrees with the path invariants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityViolation {
    pub tenant_id: Uuid,
    pub code: String,
    #[serde(flatten)]
    pub issue: IntegrityIssue,
}
