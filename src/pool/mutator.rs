//! Link mutation: the two idempotent primitives and the operations
//! composed from them.
//!
//! A ratio change is not a primitive. It is remove-then-add against the
//! same pool, with no transaction across the two remote calls: if the
//! add fails after the remove succeeded, the product ends up unlinked.
//! That divergence is surfaced as `RatioUpdatePartiallyFailed` (never a
//! generic error) carrying the old ratio, and `restore_link` is the
//! compensating action that re-establishes the previous link.

use super::registry::PoolRegistry;
use super::types::{Pool, PoolId};
use super::{PoolError, PoolResult};
use crate::backend::CreatePool;
use crate::catalog::ProductId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Performs link create/update/remove against the registry
pub struct LinkMutator {
    registry: Arc<PoolRegistry>,
}

impl LinkMutator {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }

    /// Link a product to a pool.
    ///
    /// The registry is refetched and consulted first: if the product is
    /// linked anywhere, this fails with `AlreadyLinked` naming the owning
    /// pool, before the remote call. Returns the updated pool.
    pub async fn add_link(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> PoolResult<Pool> {
        if normalize_ratio <= 0.0 {
            return Err(PoolError::InvalidRatio(normalize_ratio));
        }
        let fresh = self.registry.refresh().await?;
        if let Some(owner) = fresh.pool_of(&product_id) {
            return Err(PoolError::AlreadyLinked {
                product: product_id,
                pool: owner.id,
            });
        }
        if fresh.pool(&pool_id).is_none() {
            return Err(PoolError::PoolNotFound(pool_id));
        }
        self.registry
            .backend()
            .add_linked_product(pool_id, product_id, normalize_ratio)
            .await?;
        debug!(%pool_id, %product_id, ratio = normalize_ratio, "linked product");
        let fresh = self.registry.refresh().await?;
        fresh
            .pool(&pool_id)
            .cloned()
            .ok_or(PoolError::PoolNotFound(pool_id))
    }

    /// Unlink a product from a pool; fails with `NotLinked` if absent.
    /// Returns the updated pool.
    pub async fn remove_link(&self, pool_id: PoolId, product_id: ProductId) -> PoolResult<Pool> {
        let fresh = self.registry.refresh().await?;
        let pool = fresh
            .pool(&pool_id)
            .ok_or(PoolError::PoolNotFound(pool_id))?;
        if !pool.links(&product_id) {
            return Err(PoolError::NotLinked {
                product: product_id,
                pool: pool_id,
            });
        }
        self.registry
            .backend()
            .remove_linked_product(pool_id, product_id)
            .await?;
        debug!(%pool_id, %product_id, "unlinked product");
        let fresh = self.registry.refresh().await?;
        fresh
            .pool(&pool_id)
            .cloned()
            .ok_or(PoolError::PoolNotFound(pool_id))
    }

    /// Change a product's normalize ratio: remove-then-add against the
    /// same pool. The pool's virtual stock is left untouched.
    ///
    /// Failure before the remove leaves everything as it was and surfaces
    /// the primitive's error unchanged. Failure after the remove leaves
    /// the product unlinked and surfaces `RatioUpdatePartiallyFailed`;
    /// the caller chooses between retrying the add at the new ratio and
    /// calling `restore_link` with the carried old ratio.
    pub async fn update_ratio(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        new_ratio: f64,
    ) -> PoolResult<Pool> {
        if new_ratio <= 0.0 {
            return Err(PoolError::InvalidRatio(new_ratio));
        }
        let fresh = self.registry.refresh().await?;
        let pool = fresh
            .pool(&pool_id)
            .ok_or(PoolError::PoolNotFound(pool_id))?;
        let old_ratio = pool
            .link(&product_id)
            .ok_or(PoolError::NotLinked {
                product: product_id,
                pool: pool_id,
            })?
            .normalize_ratio;

        self.registry
            .backend()
            .remove_linked_product(pool_id, product_id)
            .await?;
        match self
            .registry
            .backend()
            .add_linked_product(pool_id, product_id, new_ratio)
            .await
        {
            Ok(()) => {
                debug!(%pool_id, %product_id, old_ratio, new_ratio, "ratio updated");
                let fresh = self.registry.refresh().await?;
                fresh
                    .pool(&pool_id)
                    .cloned()
                    .ok_or(PoolError::PoolNotFound(pool_id))
            }
            Err(source) => {
                warn!(
                    %pool_id, %product_id, old_ratio, new_ratio,
                    error = %source,
                    "ratio update left product unlinked"
                );
                // Resynchronize so callers comparing pre/post state see
                // the divergence; the error itself carries the recovery data.
                let _ = self.registry.refresh().await;
                Err(PoolError::RatioUpdatePartiallyFailed {
                    pool: pool_id,
                    product: product_id,
                    old_ratio,
                    attempted_ratio: new_ratio,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Compensating action for a partially failed ratio update: re-add
    /// the link at the old ratio
    pub async fn restore_link(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        old_ratio: f64,
    ) -> PoolResult<Pool> {
        self.add_link(pool_id, product_id, old_ratio).await
    }

    /// Create a pool and link one seed product in the same call.
    ///
    /// If the create succeeds but the receipt does not echo the new pool's
    /// ID, the registry is refetched and the pool matched by name — safe
    /// only because names are unique at creation.
    pub async fn create_pool_and_link(
        &self,
        name: &str,
        initial_stock: f64,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> PoolResult<Pool> {
        if name.trim().is_empty() {
            return Err(PoolError::EmptyName);
        }
        if normalize_ratio <= 0.0 {
            return Err(PoolError::InvalidRatio(normalize_ratio));
        }
        let fresh = self.registry.refresh().await?;
        if fresh.pool_by_name(name).is_some() {
            return Err(PoolError::DuplicateName(name.to_string()));
        }
        if let Some(owner) = fresh.pool_of(&product_id) {
            return Err(PoolError::AlreadyLinked {
                product: product_id,
                pool: owner.id,
            });
        }
        let receipt = self
            .registry
            .backend()
            .create_pool(CreatePool {
                name: name.to_string(),
                initial_stock,
                seed_product: Some(product_id),
                seed_ratio: Some(normalize_ratio),
            })
            .await?;
        debug!(pool = name, %product_id, "created pool with seed link");
        self.registry.resolve_created(name, receipt).await
    }
}
