//! Best-effort bulk reassignment.
//!
//! Moves every member product from one grouping entity (pool, type,
//! company) to another by issuing one primitive per member, sequentially.
//! Partial completion is the normal case: prior successes are never
//! rolled back, and the report lists exactly which members failed and
//! why. Sequential on purpose — parallelizing would amplify the
//! unguarded snapshot race, so the cap and per-item progress events are
//! the throughput story instead.

use crate::backend::GroupKind;
use crate::catalog::{ProductCatalog, ProductId};
use crate::pool::{LinkMutator, PoolError, PoolId, PoolRegistry};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default cap on batch size; configurable via `Config::max_batch`
pub const DEFAULT_MAX_BATCH: usize = 256;

/// Identifies a grouping entity: pools by ID, types/companies by name
#[derive(Debug, Clone, PartialEq)]
pub enum GroupRef {
    Pool(PoolId),
    Named(String),
}

impl std::fmt::Display for GroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool(id) => write!(f, "{id}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Errors that reject a bulk operation up front (individual member
/// failures are report entries, never errors)
#[derive(Debug, Error)]
pub enum ReassignError {
    /// Deletion guard: a grouping entity with member products cannot be
    /// removed; reassign the members away first
    #[error("{kind} {group} still has {count} member products")]
    HasActiveReferences {
        kind: GroupKind,
        group: String,
        count: usize,
    },

    #[error("batch of {size} exceeds the cap of {cap}")]
    BatchTooLarge { size: usize, cap: usize },

    #[error("group kind {kind} does not match reference {group}")]
    GroupMismatch { kind: GroupKind, group: String },
}

/// One member that could not be moved
#[derive(Debug)]
pub struct BatchFailure {
    pub product_id: ProductId,
    pub error: PoolError,
}

/// Outcome of a bulk operation: what committed and what failed
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates moving group members, one primitive per product
pub struct BulkReassignment {
    registry: Arc<PoolRegistry>,
    catalog: Arc<ProductCatalog>,
    mutator: LinkMutator,
    max_batch: usize,
}

impl BulkReassignment {
    pub fn new(registry: Arc<PoolRegistry>, catalog: Arc<ProductCatalog>) -> Self {
        Self {
            mutator: LinkMutator::new(registry.clone()),
            registry,
            catalog,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Move every listed member from one group to another.
    ///
    /// Applies one primitive per member, in order. Never aborts on a
    /// member failure and never rolls back earlier successes; the report
    /// is always complete, so the caller can retry just the failed
    /// subset.
    pub async fn move_all(
        &self,
        kind: GroupKind,
        from: &GroupRef,
        to: &GroupRef,
        members: &[ProductId],
    ) -> Result<BatchReport, ReassignError> {
        if members.len() > self.max_batch {
            return Err(ReassignError::BatchTooLarge {
                size: members.len(),
                cap: self.max_batch,
            });
        }

        // Shape check up front so a mismatch never follows partial work.
        match (kind, from, to) {
            (GroupKind::Pool, GroupRef::Pool(_), GroupRef::Pool(_)) => {}
            (GroupKind::ProductType | GroupKind::Company, _, GroupRef::Named(_)) => {}
            _ => {
                return Err(ReassignError::GroupMismatch {
                    kind,
                    group: to.to_string(),
                })
            }
        }

        let mut report = BatchReport::default();
        for (index, product_id) in members.iter().enumerate() {
            let outcome = match (kind, from, to) {
                (GroupKind::Pool, GroupRef::Pool(from_pool), GroupRef::Pool(to_pool)) => {
                    self.move_pool_member(*from_pool, *to_pool, *product_id).await
                }
                (_, _, GroupRef::Named(to_name)) => self
                    .registry
                    .backend()
                    .reassign_product(*product_id, kind, to_name)
                    .await
                    .map_err(PoolError::from),
                _ => unreachable!("shape checked above"),
            };
            match outcome {
                Ok(()) => {
                    report.succeeded += 1;
                    debug!(
                        %product_id, %kind, progress = index + 1, total = members.len(),
                        "reassigned member"
                    );
                }
                Err(error) => {
                    warn!(%product_id, %kind, error = %error, "member reassignment failed");
                    report.failed.push(BatchFailure {
                        product_id: *product_id,
                        error,
                    });
                }
            }
        }
        info!(
            %kind, %from, %to,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "bulk reassignment finished"
        );
        Ok(report)
    }

    /// Move one product between pools, preserving its normalize ratio
    async fn move_pool_member(
        &self,
        from: PoolId,
        to: PoolId,
        product_id: ProductId,
    ) -> Result<(), PoolError> {
        let snapshot = self.registry.snapshot();
        let pool = snapshot.pool(&from).ok_or(PoolError::PoolNotFound(from))?;
        let ratio = pool
            .link(&product_id)
            .ok_or(PoolError::NotLinked {
                product: product_id,
                pool: from,
            })?
            .normalize_ratio;
        self.mutator.remove_link(from, product_id).await?;
        self.mutator.add_link(to, product_id, ratio).await?;
        self.catalog.note_pool_hint(&product_id, Some(to));
        Ok(())
    }

    /// Deletion guard shared by every grouping entity: rejected while any
    /// product still references the group
    pub async fn ensure_deletable(
        &self,
        kind: GroupKind,
        group: &GroupRef,
    ) -> Result<(), ReassignError> {
        let count = match (kind, group) {
            (GroupKind::Pool, GroupRef::Pool(pool_id)) => self
                .registry
                .snapshot()
                .pool(pool_id)
                .map(|p| p.linked_products.len())
                .unwrap_or(0),
            (GroupKind::ProductType, GroupRef::Named(name)) => self
                .catalog
                .list_products()
                .iter()
                .filter(|p| p.product_type.as_deref() == Some(name.as_str()))
                .count(),
            (GroupKind::Company, GroupRef::Named(name)) => self
                .catalog
                .list_products()
                .iter()
                .filter(|p| p.company.as_deref() == Some(name.as_str()))
                .count(),
            _ => {
                return Err(ReassignError::GroupMismatch {
                    kind,
                    group: group.to_string(),
                })
            }
        };
        if count > 0 {
            return Err(ReassignError::HasActiveReferences {
                kind,
                group: group.to_string(),
                count,
            });
        }
        Ok(())
    }
}
