//! The override state machine exercised through the public API.

mod common;

use common::{seeded_product, RecordingBackend};
use chrono::{Duration, Utc};
use std::sync::Arc;
use stockwell::{
    CauseType, InventoryApi, OverrideDraft, OverrideError, OverridePhase, ProductId, StockField,
};

async fn api_with_product() -> (InventoryApi, Arc<RecordingBackend>, ProductId) {
    let backend = Arc::new(RecordingBackend::new());
    let product = seeded_product(&backend, "cola", 10.0, 4.0);
    let api = InventoryApi::new(backend.clone());
    api.sync().await.unwrap();
    (api, backend, product)
}

fn fill_audit(draft: &mut OverrideDraft) {
    draft.set_explanation("cycle count found spillage");
    draft.set_cause_type(CauseType::Operation);
    draft.set_category("breakage");
    let now = Utc::now();
    draft.set_error_range(now - Duration::hours(2), now);
}

#[tokio::test]
async fn full_flow_commits_delta_and_patches_cache() {
    let (api, backend, product) = api_with_product().await;

    let mut draft = api.begin_override(product, StockField::StoredStock).await.unwrap();
    assert_eq!(*draft.phase(), OverridePhase::Editing);
    assert_eq!(draft.before_value(), 10.0);

    draft.set_target(7.5);
    assert_eq!(*draft.phase(), OverridePhase::AwaitingAudit);
    fill_audit(&mut draft);

    let payload = api.submit_override(&mut draft).await.unwrap();
    assert_eq!(payload.delta, -2.5);
    assert_eq!(*draft.phase(), OverridePhase::Committed);

    // Local cache patched without a resync.
    assert_eq!(api.inventory(&product).unwrap().stored_stock, 7.5);
    // The remote ledger holds exactly this entry.
    let ledger = backend.override_ledger();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].delta, -2.5);
    assert_eq!(ledger[0].before_value, 10.0);
}

#[tokio::test]
async fn locked_field_refused_before_any_remote_write() {
    let (api, backend, product) = api_with_product().await;
    let pool = api.create_pool("bulk", 100.0).await.unwrap();
    api.link_product(pool.id, product, 1.0).await.unwrap();
    backend.clear_calls();

    let err = api
        .begin_override(product, StockField::StoredStock)
        .await
        .unwrap_err();
    match err {
        OverrideError::FieldLockedByPool { pool: p, field, .. } => {
            assert_eq!(p, pool.id);
            assert_eq!(field, StockField::StoredStock);
        }
        other => panic!("expected FieldLockedByPool, got {other:?}"),
    }

    // Only the registry refetch happened; nothing was written.
    assert!(backend.mutation_calls().is_empty());
    assert!(backend.override_ledger().is_empty());

    // The same product's active stock stays editable.
    api.begin_override(product, StockField::ActiveStock).await.unwrap();
}

#[tokio::test]
async fn incomplete_audit_is_a_local_refusal() {
    let (api, backend, product) = api_with_product().await;

    let mut draft = api.begin_override(product, StockField::ActiveStock).await.unwrap();
    draft.set_target(5.0);
    backend.clear_calls();

    let err = api.submit_override(&mut draft).await.unwrap_err();
    match err {
        OverrideError::IncompleteAudit { missing } => {
            assert_eq!(
                missing,
                vec!["explanation", "cause_type", "category", "error_range.start", "error_range.end"]
            );
        }
        other => panic!("expected IncompleteAudit, got {other:?}"),
    }
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn rejected_submit_keeps_the_draft_retryable() {
    let (api, backend, product) = api_with_product().await;

    let mut draft = api.begin_override(product, StockField::ActiveStock).await.unwrap();
    draft.set_target(9.0);
    fill_audit(&mut draft);

    backend.fail_on("submit_stock_override");
    let err = api.submit_override(&mut draft).await.unwrap_err();
    match &err {
        OverrideError::Rejected(reason) => {
            assert!(reason.contains("injected failure in submit_stock_override"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    match draft.phase() {
        OverridePhase::Rejected { reason } => {
            assert!(reason.contains("submit_stock_override"));
        }
        other => panic!("expected Rejected phase, got {other:?}"),
    }
    // Entered values survive the rejection.
    assert_eq!(draft.target_value(), Some(9.0));

    // Retrying the same draft succeeds once the remote recovers.
    backend.clear_failures();
    let payload = api.submit_override(&mut draft).await.unwrap();
    assert_eq!(payload.target_value, 9.0);
    assert_eq!(*draft.phase(), OverridePhase::Committed);
}

#[tokio::test]
async fn unknown_product_is_reported_at_begin() {
    let (api, _backend, _product) = api_with_product().await;
    let stranger = ProductId::new();
    let err = api
        .begin_override(stranger, StockField::ActiveStock)
        .await
        .unwrap_err();
    assert!(matches!(err, OverrideError::NoInventoryRecord(_)));
}
