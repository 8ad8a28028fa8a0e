//! Pool registry: snapshot holder and pool-level mutations.
//!
//! The registry never patches its snapshot in place. Every successful
//! mutation triggers a full refetch-and-replace; readers clone an
//! `Arc<RegistrySnapshot>` out and can hold it across awaits without
//! observing later writes. This is the system's only synchronization
//! mechanism (eventual consistency across open views).

use super::types::{Pool, PoolId, PoolLink};
use super::{PoolError, PoolResult};
use crate::backend::{CreatePool, CreatePoolReceipt, InventoryBackend};
use crate::catalog::ProductId;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// An immutable point-in-time view of all pools.
///
/// The linear scan over `pools` is the authoritative answer to "which
/// pool links this product"; anything stored on a product record is a
/// hint that may be stale.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub pools: Vec<Pool>,
    pub fetched_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        Self {
            pools: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn pool(&self, id: &PoolId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id == *id)
    }

    pub fn pool_by_name(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// Authoritative link lookup: scan every pool's linked products
    pub fn pool_of(&self, product_id: &ProductId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.links(product_id))
    }

    /// Authoritative link lookup returning the link entry as well
    pub fn link_of(&self, product_id: &ProductId) -> Option<(&Pool, &PoolLink)> {
        self.pools
            .iter()
            .find_map(|p| p.link(product_id).map(|l| (p, l)))
    }
}

/// Snapshot-holding registry over a remote-backed pool store
pub struct PoolRegistry {
    backend: Arc<dyn InventoryBackend>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl PoolRegistry {
    /// Create a registry with an empty snapshot; call `refresh` before
    /// the first read that matters
    pub fn new(backend: Arc<dyn InventoryBackend>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::empty())),
        }
    }

    pub fn backend(&self) -> &Arc<dyn InventoryBackend> {
        &self.backend
    }

    /// The current snapshot (copy-on-read; may be stale)
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().unwrap().clone()
    }

    /// Refetch the full pool list and replace the snapshot
    pub async fn refresh(&self) -> PoolResult<Arc<RegistrySnapshot>> {
        let pools = self.backend.list_pools().await?;
        let fresh = Arc::new(RegistrySnapshot {
            pools,
            fetched_at: Utc::now(),
        });
        *self.snapshot.write().unwrap() = fresh.clone();
        Ok(fresh)
    }

    /// List pools from the current snapshot
    pub fn list(&self) -> Vec<Pool> {
        self.snapshot().pools.clone()
    }

    /// Create an empty pool. Names are required unique so the
    /// match-by-name fallback in `resolve_created` stays unambiguous.
    pub async fn create(&self, name: &str, initial_stock: f64) -> PoolResult<Pool> {
        if name.trim().is_empty() {
            return Err(PoolError::EmptyName);
        }
        let fresh = self.refresh().await?;
        if fresh.pool_by_name(name).is_some() {
            return Err(PoolError::DuplicateName(name.to_string()));
        }
        let receipt = self
            .backend
            .create_pool(CreatePool {
                name: name.to_string(),
                initial_stock,
                seed_product: None,
                seed_ratio: None,
            })
            .await?;
        debug!(pool = name, "created pool");
        self.resolve_created(name, receipt).await
    }

    /// Resolve the pool a create call produced.
    ///
    /// Preferred path: the receipt echoed the ID. Fallback: refetch the
    /// registry and match by name — race-prone if names were not unique,
    /// which is why creation enforces uniqueness.
    pub(crate) async fn resolve_created(
        &self,
        name: &str,
        receipt: CreatePoolReceipt,
    ) -> PoolResult<Pool> {
        let fresh = self.refresh().await?;
        if let Some(id) = receipt.pool_id {
            if let Some(pool) = fresh.pool(&id) {
                return Ok(pool.clone());
            }
        }
        fresh
            .pool_by_name(name)
            .cloned()
            .ok_or_else(|| PoolError::CreatedPoolUnresolvable(name.to_string()))
    }

    /// Rename a pool
    pub async fn rename(&self, pool_id: PoolId, new_name: &str) -> PoolResult<()> {
        if new_name.trim().is_empty() {
            return Err(PoolError::EmptyName);
        }
        self.backend.rename_pool(pool_id, new_name).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Set a pool's virtual stock balance
    pub async fn set_virtual_stock(&self, pool_id: PoolId, new_stock: f64) -> PoolResult<()> {
        self.backend.set_pool_stock(pool_id, new_stock).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Delete a pool. Refused with `HasLinkedProducts` while any link
    /// remains; the sanctioned path to zero links is bulk reassignment.
    pub async fn remove(&self, pool_id: PoolId) -> PoolResult<()> {
        let fresh = self.refresh().await?;
        if let Some(pool) = fresh.pool(&pool_id) {
            let count = pool.linked_products.len();
            if count > 0 {
                return Err(PoolError::HasLinkedProducts {
                    pool: pool_id,
                    count,
                });
            }
        }
        self.backend.delete_pool(pool_id).await?;
        debug!(%pool_id, "deleted pool");
        self.refresh().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn registry() -> PoolRegistry {
        PoolRegistry::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn create_refresh_and_list() {
        let registry = registry();
        let pool = registry.create("bulk-cola", 120.0).await.unwrap();
        assert_eq!(pool.name, "bulk-cola");

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, pool.id);
        assert_eq!(listed[0].virtual_stock, 120.0);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name_locally() {
        let registry = registry();
        registry.create("bulk", 1.0).await.unwrap();
        let err = registry.create("bulk", 2.0).await.unwrap_err();
        assert!(matches!(err, PoolError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn create_without_id_echo_matches_by_name() {
        let registry = PoolRegistry::new(Arc::new(MemoryBackend::without_id_echo()));
        let pool = registry.create("quiet", 5.0).await.unwrap();
        assert_eq!(pool.name, "quiet");
        assert!(registry.snapshot().pool(&pool.id).is_some());
    }

    #[tokio::test]
    async fn snapshot_is_copy_on_read() {
        let registry = registry();
        let before = registry.snapshot();
        registry.create("bulk", 1.0).await.unwrap();
        // The earlier snapshot is unchanged; only a new read sees the pool.
        assert!(before.pools.is_empty());
        assert_eq!(registry.snapshot().pools.len(), 1);
    }

    #[tokio::test]
    async fn rename_and_set_stock_round_trip() {
        let registry = registry();
        let pool = registry.create("old", 1.0).await.unwrap();
        registry.rename(pool.id, "new").await.unwrap();
        registry.set_virtual_stock(pool.id, 42.0).await.unwrap();

        let snapshot = registry.snapshot();
        let reread = snapshot.pool(&pool.id).unwrap();
        assert_eq!(reread.name, "new");
        assert_eq!(reread.virtual_stock, 42.0);
    }

    #[tokio::test]
    async fn remove_empty_pool_succeeds() {
        let registry = registry();
        let pool = registry.create("bulk", 1.0).await.unwrap();
        registry.remove(pool.id).await.unwrap();
        assert!(registry.list().is_empty());
    }
}
