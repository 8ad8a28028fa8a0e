//! Override state machine: `Editing -> AwaitingAudit -> Committing ->
//! Committed | Rejected`.
//!
//! A rejected attempt keeps every entered value so the audit entry is
//! never re-typed; the failure reason is surfaced verbatim.

use super::{CauseType, ErrorRange, OverrideError, OverrideResult, StockOverride};
use crate::backend::{BackendError, InventoryBackend};
use crate::catalog::{ProductCatalog, ProductId, StockField};
use crate::pool::PoolRegistry;
use crate::resolver::LinkResolver;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where an override attempt currently is
#[derive(Debug, Clone, PartialEq)]
pub enum OverridePhase {
    /// Product and field selected, before value captured
    Editing,
    /// Target entered; audit fields may still be missing
    AwaitingAudit,
    /// Handed to the transport
    Committing,
    /// Remote accepted; local inventory patched optimistically
    Committed,
    /// Remote refused; entered values preserved for retry
    Rejected { reason: String },
}

impl OverridePhase {
    fn label(&self) -> &'static str {
        match self {
            Self::Editing => "editing",
            Self::AwaitingAudit => "awaiting_audit",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl std::fmt::Display for OverridePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One in-flight override attempt.
///
/// Discarded after the commit succeeds or the user abandons it; nothing
/// is persisted locally for rejected attempts beyond this value.
#[derive(Debug, Clone)]
pub struct OverrideDraft {
    product_id: ProductId,
    field: StockField,
    before_value: f64,
    target_value: Option<f64>,
    explanation: String,
    cause_type: Option<CauseType>,
    category: String,
    range_start: Option<DateTime<Utc>>,
    range_end: Option<DateTime<Utc>>,
    phase: OverridePhase,
}

impl OverrideDraft {
    fn new(product_id: ProductId, field: StockField, before_value: f64) -> Self {
        Self {
            product_id,
            field,
            before_value,
            target_value: None,
            explanation: String::new(),
            cause_type: None,
            category: String::new(),
            range_start: None,
            range_end: None,
            phase: OverridePhase::Editing,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn field(&self) -> StockField {
        self.field
    }

    pub fn before_value(&self) -> f64 {
        self.before_value
    }

    pub fn target_value(&self) -> Option<f64> {
        self.target_value
    }

    pub fn phase(&self) -> &OverridePhase {
        &self.phase
    }

    /// `target - before`; what the remote ledger receives
    pub fn delta(&self) -> Option<f64> {
        self.target_value.map(|t| t - self.before_value)
    }

    /// Enter the target value. Moves `Editing -> AwaitingAudit`; later
    /// edits (including after a rejection) keep the current phase.
    pub fn set_target(&mut self, value: f64) {
        self.target_value = Some(value);
        if self.phase == OverridePhase::Editing {
            self.phase = OverridePhase::AwaitingAudit;
        }
    }

    pub fn set_explanation(&mut self, explanation: impl Into<String>) {
        self.explanation = explanation.into();
    }

    pub fn set_cause_type(&mut self, cause_type: CauseType) {
        self.cause_type = Some(cause_type);
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    pub fn set_error_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.range_start = Some(start);
        self.range_end = Some(end);
    }

    /// Local validation: all four audit fields present, target entered,
    /// range well-formed. Runs before anything reaches the transport.
    fn validate(&self) -> OverrideResult<StockOverride> {
        let mut missing = Vec::new();
        if self.target_value.is_none() {
            missing.push("target_value");
        }
        if self.explanation.trim().is_empty() {
            missing.push("explanation");
        }
        if self.cause_type.is_none() {
            missing.push("cause_type");
        }
        if self.category.trim().is_empty() {
            missing.push("category");
        }
        if self.range_start.is_none() {
            missing.push("error_range.start");
        }
        if self.range_end.is_none() {
            missing.push("error_range.end");
        }
        if !missing.is_empty() {
            return Err(OverrideError::IncompleteAudit { missing });
        }

        let start = self.range_start.unwrap();
        let end = self.range_end.unwrap();
        if start > end {
            return Err(OverrideError::InvalidErrorRange { start, end });
        }
        let target_value = self.target_value.unwrap();

        Ok(StockOverride {
            product_id: self.product_id,
            field: self.field,
            before_value: self.before_value,
            target_value,
            delta: target_value - self.before_value,
            explanation: self.explanation.clone(),
            cause_type: self.cause_type.unwrap(),
            category: self.category.clone(),
            error_range: ErrorRange::new(start, end),
        })
    }
}

/// Manages manual stock adjustments
pub struct StockOverrideEngine {
    backend: Arc<dyn InventoryBackend>,
    registry: Arc<PoolRegistry>,
    catalog: Arc<ProductCatalog>,
}

impl StockOverrideEngine {
    pub fn new(
        backend: Arc<dyn InventoryBackend>,
        registry: Arc<PoolRegistry>,
        catalog: Arc<ProductCatalog>,
    ) -> Self {
        Self {
            backend,
            registry,
            catalog,
        }
    }

    /// Start an override attempt for one product and field.
    ///
    /// For `stored_stock` the registry is refetched and scanned (the
    /// authoritative resolver step): a pool-linked product's stored stock
    /// is derived, so the attempt is refused with `FieldLockedByPool`
    /// before any edit happens. `active_stock` is always editable.
    pub async fn begin(
        &self,
        product_id: ProductId,
        field: StockField,
    ) -> OverrideResult<OverrideDraft> {
        if field == StockField::StoredStock {
            let snapshot = self
                .registry
                .refresh()
                .await
                .map_err(|e| OverrideError::Rejected(e.to_string()))?;
            if let Some(pool) = LinkResolver::authoritative_pool(&product_id, &snapshot) {
                return Err(OverrideError::FieldLockedByPool {
                    product: product_id,
                    field,
                    pool,
                });
            }
        }

        let record = match self.catalog.inventory(&product_id) {
            Some(record) => record,
            None => {
                // Cache miss: resynchronize the inventory cache once.
                let records = self
                    .backend
                    .get_inventory()
                    .await
                    .map_err(|e| OverrideError::Rejected(e.to_string()))?;
                self.catalog.replace_inventory(records);
                self.catalog
                    .inventory(&product_id)
                    .ok_or(OverrideError::NoInventoryRecord(product_id))?
            }
        };

        Ok(OverrideDraft::new(product_id, field, record.get(field)))
    }

    /// Submit a draft.
    ///
    /// Validates the audit payload locally first, then commits. On
    /// success the local inventory record is patched optimistically. On
    /// refusal the draft moves to `Rejected` with the reason verbatim and
    /// every entered value intact; calling submit again retries.
    pub async fn submit(&self, draft: &mut OverrideDraft) -> OverrideResult<StockOverride> {
        match draft.phase {
            OverridePhase::AwaitingAudit | OverridePhase::Rejected { .. } => {}
            ref other => {
                return Err(OverrideError::InvalidPhase {
                    expected: "awaiting_audit or rejected",
                    actual: other.to_string(),
                })
            }
        }

        let payload = draft.validate()?;
        draft.phase = OverridePhase::Committing;

        match self.backend.submit_stock_override(&payload).await {
            Ok(()) => {
                draft.phase = OverridePhase::Committed;
                self.catalog.patch_inventory(
                    &payload.product_id,
                    payload.field,
                    payload.target_value,
                );
                debug!(
                    product = %payload.product_id,
                    field = %payload.field,
                    delta = payload.delta,
                    "override committed"
                );
                Ok(payload)
            }
            Err(err) => {
                let reason = match err {
                    BackendError::Rejected(reason) => reason,
                    other => other.to_string(),
                };
                warn!(
                    product = %payload.product_id,
                    field = %payload.field,
                    reason = %reason,
                    "override rejected"
                );
                draft.phase = OverridePhase::Rejected {
                    reason: reason.clone(),
                };
                Err(OverrideError::Rejected(reason))
            }
        }
    }
}
