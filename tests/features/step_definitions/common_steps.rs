//! Common step definitions used across features

use cucumber::{given, then};

use crou_tenancy::models::TenantType;

use crate::features::support::TestWorld;

#[given("the standard CROU hierarchy")]
async fn standard_hierarchy(world: &mut TestWorld) {
    world.create_tenant("MIN", TenantType::Ministry, None).await.unwrap();
    for crou in ["CROU-A", "CROU-B"] {
        world.create_tenant(crou, TenantType::Crou, Some("MIN")).await.unwrap();
    }
    for (service, crou) in [("SVC-1", "CROU-A"), ("SVC-2", "CROU-A"), ("SVC-3", "CROU-B")] {
        world
            .create_tenant(service, TenantType::Service, Some(crou))
            .await
            .unwrap();
    }
}

#[given(expr = "a ministry {string}")]
async fn ministry_exists(world: &mut TestWorld, code: String) {
    world
        .create_tenant(&code, TenantType::Ministry, None)
        .await
        .expect("Failed to create ministry");
}

#[given(expr = "a CROU {string} under {string}")]
async fn crou_exists(world: &mut TestWorld, code: String, parent: String) {
    world
        .create_tenant(&code, TenantType::Crou, Some(&parent))
        .await
        .expect("Failed to create CROU");
}

#[given(expr = "a service {string} under {string}")]
async fn service_exists(world: &mut TestWorld, code: String, parent: String) {
    world
        .create_tenant(&code, TenantType::Service, Some(&parent))
        .await
        .expect("Failed to create service");
}

#[then(expr = "the operation should fail with {string}")]
async fn operation_failed(world: &mut TestWorld, kind: String) {
    match &world.last_error {
        Some(err) => assert_eq!(err.kind(), kind),
        None => panic!("Expected the last operation to fail"),
    }
}

#[then("the operation should succeed")]
async fn operation_succeeded(world: &mut TestWorld) {
    if let Some(err) = &world.last_error {
        panic!("Unexpected error: {}", err);
    }
}
