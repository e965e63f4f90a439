// tests/service_tests.rs

mod common;

use common::{memory_service, new_key, SEC};
use key_registry::{
    error::AppError,
    registry::ChangeSet,
    service::{now_millis, validate_registry_id},
};

#[test]
fn test_registry_id_validation() {
    assert!(validate_registry_id("tenant-a:openai").is_ok());
    assert!(validate_registry_id("").is_err());
    assert!(validate_registry_id("has space").is_err());
    assert!(validate_registry_id("tab\tinside").is_err());
    assert!(validate_registry_id(&"x".repeat(257)).is_err());
    assert!(validate_registry_id(&"x".repeat(256)).is_ok());
}

#[test]
fn test_now_millis_is_wall_clock() {
    // 2020-01-01T00:00:00Z
    assert!(now_millis() > 1_577_836_800_000);
}

#[tokio::test]
async fn test_apply_rejects_invalid_registry_id() {
    let service = memory_service();
    let result = service
        .apply("", &ChangeSet::new().add(new_key("k1")), SEC)
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_apply_rejects_now_near_u64_max() {
    let service = memory_service();
    let result = service
        .apply("tenant-a", &ChangeSet::new().add(new_key("k1")), u64::MAX - 10)
        .await;
    assert!(matches!(result, Err(AppError::Validation { ref field, .. }) if field == "now"));
    assert!(service.read("tenant-a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_apply_and_read_through_service() {
    let service = memory_service();
    let applied = service
        .apply("tenant-a", &ChangeSet::new().add(new_key("k1")), SEC)
        .await
        .unwrap();
    let read = service.read("tenant-a").await.unwrap();
    assert_eq!(read, Some(applied));
}

#[tokio::test]
async fn test_apply_now_uses_wall_clock() {
    let service = memory_service();
    let before = now_millis();
    let registry = service
        .apply_now("tenant-a", &ChangeSet::new().add(new_key("k1")))
        .await
        .unwrap();
    assert!(registry.states[0].last_used_at >= before);
}

#[tokio::test]
async fn test_purge_rejects_empty_prefix_and_zero_batch() {
    let service = memory_service();
    assert!(matches!(
        service.purge_by_prefix("", 0, 10).await,
        Err(AppError::Validation { .. })
    ));
    assert!(matches!(
        service.purge_by_prefix("openai:", 0, 0).await,
        Err(AppError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_purge_all_by_prefix_sums_batches() {
    let service = memory_service();
    for i in 0..5 {
        service
            .apply(
                &format!("openai:{i}"),
                &ChangeSet::new().add(new_key("k1")),
                SEC,
            )
            .await
            .unwrap();
    }
    service
        .apply("google:0", &ChangeSet::new().add(new_key("k1")), SEC)
        .await
        .unwrap();

    let total = service.purge_all_by_prefix("openai:", 2).await.unwrap();
    assert_eq!(total.deleted, 5);
    assert!(total.is_complete());
    assert!(service.read("openai:0").await.unwrap().is_none());
    assert!(service.read("google:0").await.unwrap().is_some());
}
