//! Best-effort bulk reassignment: partial completion is reported, never
//! rolled back.

mod common;

use common::{seeded_product, RecordingBackend};
use std::sync::Arc;
use stockwell::{
    GroupKind, GroupRef, InventoryApi, PoolError, ProductId, ReassignError,
};

async fn api() -> (InventoryApi, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::new());
    let api = InventoryApi::new(backend.clone());
    api.sync().await.unwrap();
    (api, backend)
}

#[tokio::test]
async fn partial_failure_is_reported_without_rollback() {
    let (api, backend) = api().await;
    let from = api.create_pool("from", 10.0).await.unwrap();
    let to = api.create_pool("to", 20.0).await.unwrap();

    // Three members linked to the source pool, two strangers that will
    // fail with NotLinked.
    let mut members = Vec::new();
    for (name, ratio) in [("a", 1.0), ("b", 2.0), ("c", 12.0)] {
        let id = seeded_product(&backend, name, 5.0, 1.0);
        api.sync().await.unwrap();
        api.link_product(from.id, id, ratio).await.unwrap();
        members.push(id);
    }
    let strangers = [ProductId::new(), ProductId::new()];
    members.insert(1, strangers[0]);
    members.push(strangers[1]);

    let report = api
        .bulk_reassign(
            GroupKind::Pool,
            &GroupRef::Pool(from.id),
            &GroupRef::Pool(to.id),
            &members,
        )
        .await
        .unwrap();

    assert_eq!(report.attempted(), 5);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed.len(), 2);
    assert!(!report.is_complete());
    for failure in &report.failed {
        assert!(strangers.contains(&failure.product_id));
        assert!(matches!(failure.error, PoolError::NotLinked { .. }));
    }

    // The three successes stayed moved, ratios intact.
    api.sync().await.unwrap();
    let to_pool = api.pool(&to.id).unwrap();
    assert_eq!(to_pool.linked_products.len(), 3);
    assert_eq!(to_pool.link(&members[3]).unwrap().normalize_ratio, 12.0);
    assert!(api.pool(&from.id).unwrap().linked_products.is_empty());
}

#[tokio::test]
async fn type_reassignment_goes_through_the_backend_primitive() {
    let (api, backend) = api().await;
    let a = seeded_product(&backend, "cola", 1.0, 1.0);
    let b = seeded_product(&backend, "soda", 1.0, 1.0);
    api.sync().await.unwrap();
    backend.clear_calls();

    let report = api
        .bulk_reassign(
            GroupKind::ProductType,
            &GroupRef::Named("drinks".into()),
            &GroupRef::Named("beverages".into()),
            &[a, b],
        )
        .await
        .unwrap();
    assert_eq!(report.succeeded, 2);

    assert_eq!(
        backend.mutation_calls(),
        vec![
            format!("reassign_product {a} product_type beverages"),
            format!("reassign_product {b} product_type beverages"),
        ]
    );
}

#[tokio::test]
async fn mismatched_group_shape_rejected_before_any_work() {
    let (api, backend) = api().await;
    let pool = api.create_pool("bulk", 1.0).await.unwrap();
    let member = seeded_product(&backend, "cola", 1.0, 1.0);
    api.sync().await.unwrap();
    api.link_product(pool.id, member, 1.0).await.unwrap();
    backend.clear_calls();

    // Pool moves need pool references on both sides.
    let err = api
        .bulk_reassign(
            GroupKind::Pool,
            &GroupRef::Pool(pool.id),
            &GroupRef::Named("not-a-pool".into()),
            &[member],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReassignError::GroupMismatch { .. }));
    assert!(backend.mutation_calls().is_empty());
}

#[tokio::test]
async fn company_deletion_guard_through_the_api() {
    let (api, backend) = api().await;
    let product = seeded_product(&backend, "cola", 1.0, 1.0);
    api.sync().await.unwrap();
    api.bulk_reassign(
        GroupKind::Company,
        &GroupRef::Named("".into()),
        &GroupRef::Named("acme".into()),
        &[product],
    )
    .await
    .unwrap();
    api.sync().await.unwrap();

    let err = api
        .ensure_deletable(GroupKind::Company, &GroupRef::Named("acme".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReassignError::HasActiveReferences { count: 1, .. }
    ));

    api.ensure_deletable(GroupKind::Company, &GroupRef::Named("unused".into()))
        .await
        .unwrap();
}
