//! Lookups, listings, tree projection and tenant creation

use uuid::Uuid;

use crou_tenancy::models::{CreateTenantRequest, TenantType};
use crou_tenancy::AppError;

use crate::common::*;

#[tokio::test]
async fn test_descendants_of_crou() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let descendants = dir.get_descendants(h.crou_a.id).await.unwrap();
    assert_eq!(TestDirectory::codes(&descendants), vec!["SVC-1", "SVC-2"]);
}

#[tokio::test]
async fn test_descendants_of_root_exclude_root() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let descendants = dir.get_descendants(h.min.id).await.unwrap();
    assert_eq!(descendants.len(), 5);
    assert!(descendants.iter().all(|t| t.id != h.min.id));
    // Shallowest first
    assert!(descendants.windows(2).all(|w| w[0].level <= w[1].level));
}

#[tokio::test]
async fn test_descendants_of_leaf_is_empty() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    assert!(dir.get_descendants(h.svc1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_descendants_ignore_sibling_sharing_code_prefix() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;
    let sibling = dir.create("CROU-AB", TenantType::Crou, Some(&h.min)).await;
    dir.create("SVC-9", TenantType::Service, Some(&sibling)).await;

    let descendants = dir.get_descendants(h.crou_a.id).await.unwrap();
    assert_eq!(TestDirectory::codes(&descendants), vec!["SVC-1", "SVC-2"]);
}

#[tokio::test]
async fn test_descendants_treat_underscore_literally() {
    let dir = TestDirectory::spawn().await;
    let min = dir.create("MIN", TenantType::Ministry, None).await;
    let underscored = dir.create("CROU_A", TenantType::Crou, Some(&min)).await;
    let lookalike = dir.create("CROUXA", TenantType::Crou, Some(&min)).await;
    dir.create("SVC-1", TenantType::Service, Some(&underscored)).await;
    dir.create("SVC-2", TenantType::Service, Some(&lookalike)).await;

    let descendants = dir.get_descendants(underscored.id).await.unwrap();
    assert_eq!(TestDirectory::codes(&descendants), vec!["SVC-1"]);
}

#[tokio::test]
async fn test_descendants_unknown_tenant() {
    let dir = TestDirectory::spawn().await;
    seed_standard_hierarchy(&dir).await;

    let err = dir.get_descendants(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_ancestors_root_first() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let ancestors = dir.get_ancestors(h.svc1.id).await.unwrap();
    assert_eq!(TestDirectory::codes(&ancestors), vec!["MIN", "CROU-A"]);
    assert!(dir.get_ancestors(h.min.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ancestors_skip_unresolved_segments() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;
    dir.corrupt_path(h.svc1.id, "MIN/GHOST/SVC-1").await;

    let ancestors = dir.get_ancestors(h.svc1.id).await.unwrap();
    assert_eq!(TestDirectory::codes(&ancestors), vec!["MIN"]);
}

#[tokio::test]
async fn test_levels_and_paths_follow_parent() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    assert_eq!(h.min.level, 0);
    assert_eq!(h.min.path, "MIN");
    assert!(h.min.is_root());
    assert_eq!(h.crou_a.level, 1);
    assert_eq!(h.crou_a.path, "MIN/CROU-A");
    assert_eq!(h.svc1.level, 2);
    assert_eq!(h.svc1.path, "MIN/CROU-A/SVC-1");
    assert_eq!(h.svc1.parent_id, Some(h.crou_a.id));
}

#[tokio::test]
async fn test_get_tenant_by_code() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let found = dir.get_tenant_by_code("SVC-2").await.unwrap();
    assert_eq!(found.id, h.svc2.id);

    let err = dir.get_tenant_by_code("NOPE").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_filtered_listings() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let ministere = dir.get_ministere().await.unwrap().unwrap();
    assert_eq!(ministere.id, h.min.id);

    let crous = dir.get_all_crous().await.unwrap();
    assert_eq!(TestDirectory::codes(&crous), vec!["CROU-A", "CROU-B"]);

    let services = dir.get_services_of_crou(h.crou_b.id).await.unwrap();
    assert_eq!(TestDirectory::codes(&services), vec!["SVC-3"]);

    let level_two = dir.get_tenants_by_level(2).await.unwrap();
    assert_eq!(TestDirectory::codes(&level_two), vec!["SVC-1", "SVC-2", "SVC-3"]);

    let by_type = dir.get_tenants_by_type(TenantType::Crou).await.unwrap();
    assert_eq!(by_type.len(), 2);

    assert!(dir.get_tenants_by_level(7).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_directory_listings() {
    let dir = TestDirectory::spawn().await;

    assert!(dir.get_ministere().await.unwrap().is_none());
    assert!(dir.get_all_crous().await.unwrap().is_empty());
    assert!(dir.list_tenants().await.unwrap().is_empty());
    assert!(dir.get_services_of_crou(Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hierarchy_tree() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let tree = dir.get_hierarchy_tree(h.min.id).await.unwrap();
    assert_eq!(tree.code, "MIN");
    assert_eq!(tree.size(), 6);

    let crou_codes: Vec<&str> = tree.children.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(crou_codes, vec!["CROU-A", "CROU-B"]);
    assert_eq!(tree.children[0].children.len(), 2);
    assert_eq!(tree.children[1].children[0].code, "SVC-3");

    let leaf = dir.get_hierarchy_tree(h.svc3.id).await.unwrap();
    assert!(leaf.children.is_empty());
}

#[tokio::test]
async fn test_hierarchy_tree_unknown_root() {
    let dir = TestDirectory::spawn().await;

    let err = dir.get_hierarchy_tree(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_duplicate_code_conflicts() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    let err = dir
        .create_tenant(&CreateTenantRequest {
            name: "Duplicate".to_string(),
            code: "SVC-1".to_string(),
            tenant_type: TenantType::Service,
            parent_id: Some(h.crou_b.id),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let dir = TestDirectory::spawn().await;

    let err = dir
        .create_tenant(&CreateTenantRequest {
            name: "Bad".to_string(),
            code: "A/B".to_string(),
            tenant_type: TenantType::Ministry,
            parent_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = dir
        .create_tenant(&CreateTenantRequest {
            name: String::new(),
            code: "MIN".to_string(),
            tenant_type: TenantType::Ministry,
            parent_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_create_under_unknown_parent() {
    let dir = TestDirectory::spawn().await;

    let err = dir
        .create_tenant(&CreateTenantRequest {
            name: "Orphan".to_string(),
            code: "ORPHAN".to_string(),
            tenant_type: TenantType::Service,
            parent_id: Some(Uuid::new_v4()),
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_factory_built_hierarchy() {
    let dir = TestDirectory::spawn().await;
    let factory = TenantFactory::new();

    let min = dir.create_tenant(&factory.ministry()).await.unwrap();
    let crou = dir.create_tenant(&factory.crou(min.id)).await.unwrap();
    for _ in 0..5 {
        dir.create_tenant(&factory.service(crou.id)).await.unwrap();
    }

    assert_eq!(dir.get_services_of_crou(crou.id).await.unwrap().len(), 5);
    assert_eq!(dir.get_descendants(min.id).await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;
    assert!(h.svc2.is_active);

    let inactive = dir.set_tenant_active(h.svc2.id, false).await.unwrap();
    assert!(!inactive.is_active);
    // Inactive tenants stay in the tree
    let descendants = dir.get_descendants(h.crou_a.id).await.unwrap();
    assert_eq!(descendants.len(), 2);

    let active = dir.set_tenant_active(h.svc2.id, true).await.unwrap();
    assert!(active.is_active);

    let err = dir.set_tenant_active(Uuid::new_v4(), false).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_reads_are_repeatable() {
    let dir = TestDirectory::spawn().await;
    let h = seed_standard_hierarchy(&dir).await;

    for tenant in [&h.min, &h.crou_a, &h.svc2] {
        assert_eq!(
            dir.get_descendants(tenant.id).await.unwrap(),
            dir.get_descendants(tenant.id).await.unwrap()
        );
        assert_eq!(
            dir.get_ancestors(tenant.id).await.unwrap(),
            dir.get_ancestors(tenant.id).await.unwrap()
        );
        assert_eq!(
            dir.get_access_scope(tenant.id).await.unwrap(),
            dir.get_access_scope(tenant.id).await.unwrap()
        );
        assert_eq!(
            dir.get_hierarchy_tree(tenant.id).await.unwrap(),
            dir.get_hierarchy_tree(tenant.id).await.unwrap()
        );
    }
}
