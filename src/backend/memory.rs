//! In-memory backend.
//!
//! Reference implementation of `InventoryBackend` enforcing every remote
//! invariant: unique pool names, the single-link invariant, and the
//! deletion guard. Used directly in tests and as the behavioral model
//! the sqlite backend mirrors.

use super::traits::{
    BackendError, BackendResult, CreatePool, CreatePoolReceipt, GroupKind, InventoryBackend,
};
use crate::catalog::{InventoryRecord, Product, ProductId};
use crate::overrides::StockOverride;
use crate::pool::{Pool, PoolId, PoolLink};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    pools: Vec<Pool>,
    products: Vec<Product>,
    inventory: Vec<InventoryRecord>,
    override_ledger: Vec<StockOverride>,
}

/// In-memory inventory store
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    /// When false, `create_pool` does not echo the new pool's ID,
    /// simulating stores where the caller must refetch and match by name.
    echo_pool_id: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            echo_pool_id: true,
        }
    }

    /// Build a backend whose create calls do not echo the new pool ID
    pub fn without_id_echo() -> Self {
        Self {
            echo_pool_id: false,
            ..Self::new()
        }
    }

    /// Seed product records (stands in for the external catalog)
    pub fn seed_products(&self, products: Vec<Product>) {
        self.state.lock().unwrap().products.extend(products);
    }

    /// Seed inventory records
    pub fn seed_inventory(&self, records: Vec<InventoryRecord>) {
        self.state.lock().unwrap().inventory.extend(records);
    }

    /// Snapshot of the override audit ledger, oldest first
    pub fn override_ledger(&self) -> Vec<StockOverride> {
        self.state.lock().unwrap().override_ledger.clone()
    }

    fn find_link_anywhere(pools: &[Pool], product_id: &ProductId) -> Option<PoolId> {
        pools
            .iter()
            .find(|p| p.links(product_id))
            .map(|p| p.id)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryBackend for MemoryBackend {
    async fn list_pools(&self) -> BackendResult<Vec<Pool>> {
        Ok(self.state.lock().unwrap().pools.clone())
    }

    async fn create_pool(&self, req: CreatePool) -> BackendResult<CreatePoolReceipt> {
        let mut state = self.state.lock().unwrap();
        if req.name.trim().is_empty() {
            return Err(BackendError::Rejected("pool name must not be empty".into()));
        }
        if state.pools.iter().any(|p| p.name == req.name) {
            return Err(BackendError::DuplicateName(req.name));
        }
        let mut pool = Pool::new(req.name, req.initial_stock);
        if let Some(product_id) = req.seed_product {
            if let Some(existing) = Self::find_link_anywhere(&state.pools, &product_id) {
                return Err(BackendError::AlreadyLinked {
                    product: product_id,
                    pool: existing,
                });
            }
            let ratio = req.seed_ratio.unwrap_or(1.0);
            if ratio <= 0.0 {
                return Err(BackendError::Rejected(format!(
                    "normalize ratio must be positive, got {ratio}"
                )));
            }
            pool.linked_products.push(PoolLink::new(product_id, ratio));
        }
        let id = pool.id;
        state.pools.push(pool);
        Ok(CreatePoolReceipt {
            pool_id: self.echo_pool_id.then_some(id),
        })
    }

    async fn rename_pool(&self, pool_id: PoolId, new_name: &str) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        if state
            .pools
            .iter()
            .any(|p| p.name == new_name && p.id != pool_id)
        {
            return Err(BackendError::DuplicateName(new_name.to_string()));
        }
        let pool = state
            .pools
            .iter_mut()
            .find(|p| p.id == pool_id)
            .ok_or(BackendError::PoolNotFound(pool_id))?;
        pool.name = new_name.to_string();
        Ok(())
    }

    async fn set_pool_stock(&self, pool_id: PoolId, new_stock: f64) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        let pool = state
            .pools
            .iter_mut()
            .find(|p| p.id == pool_id)
            .ok_or(BackendError::PoolNotFound(pool_id))?;
        pool.virtual_stock = new_stock;
        Ok(())
    }

    async fn delete_pool(&self, pool_id: PoolId) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .pools
            .iter()
            .position(|p| p.id == pool_id)
            .ok_or(BackendError::PoolNotFound(pool_id))?;
        let count = state.pools[index].linked_products.len();
        if count > 0 {
            return Err(BackendError::HasLinkedProducts {
                pool: pool_id,
                count,
            });
        }
        state.pools.remove(index);
        Ok(())
    }

    async fn add_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        if normalize_ratio <= 0.0 {
            return Err(BackendError::Rejected(format!(
                "normalize ratio must be positive, got {normalize_ratio}"
            )));
        }
        if let Some(existing) = Self::find_link_anywhere(&state.pools, &product_id) {
            return Err(BackendError::AlreadyLinked {
                product: product_id,
                pool: existing,
            });
        }
        let pool = state
            .pools
            .iter_mut()
            .find(|p| p.id == pool_id)
            .ok_or(BackendError::PoolNotFound(pool_id))?;
        pool.linked_products
            .push(PoolLink::new(product_id, normalize_ratio));
        Ok(())
    }

    async fn remove_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        let pool = state
            .pools
            .iter_mut()
            .find(|p| p.id == pool_id)
            .ok_or(BackendError::PoolNotFound(pool_id))?;
        let index = pool
            .linked_products
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or(BackendError::NotLinked {
                product: product_id,
                pool: pool_id,
            })?;
        pool.linked_products.remove(index);
        Ok(())
    }

    async fn list_products(&self) -> BackendResult<Vec<Product>> {
        Ok(self.state.lock().unwrap().products.clone())
    }

    async fn get_inventory(&self) -> BackendResult<Vec<InventoryRecord>> {
        Ok(self.state.lock().unwrap().inventory.clone())
    }

    async fn submit_stock_override(&self, req: &StockOverride) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .inventory
            .iter_mut()
            .find(|r| r.product_id == req.product_id)
            .ok_or(BackendError::ProductNotFound(req.product_id))?;
        // The ledger applies the delta, not the absolute value, so trails
        // from concurrent editors compose.
        let current = record.get(req.field);
        record.set(req.field, current + req.delta);
        state.override_ledger.push(req.clone());
        Ok(())
    }

    async fn reassign_product(
        &self,
        product_id: ProductId,
        kind: GroupKind,
        to_id: &str,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or(BackendError::ProductNotFound(product_id))?;
        match kind {
            GroupKind::ProductType => product.product_type = Some(to_id.to_string()),
            GroupKind::Company => product.company = Some(to_id.to_string()),
            GroupKind::Pool => {
                return Err(BackendError::Rejected(
                    "pool reassignment goes through the link primitives".into(),
                ))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryBackend, ProductId) {
        let backend = MemoryBackend::new();
        let product = Product::new("cola");
        let id = product.id;
        backend.seed_products(vec![product]);
        backend.seed_inventory(vec![InventoryRecord::new(id, 10.0, 4.0)]);
        (backend, id)
    }

    #[tokio::test]
    async fn create_pool_rejects_duplicate_name() {
        let backend = MemoryBackend::new();
        let req = CreatePool {
            name: "bulk".into(),
            initial_stock: 100.0,
            seed_product: None,
            seed_ratio: None,
        };
        backend.create_pool(req.clone()).await.unwrap();
        let err = backend.create_pool(req).await.unwrap_err();
        assert!(matches!(err, BackendError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn single_link_invariant_enforced_across_pools() {
        let (backend, product) = seeded();
        let a = backend
            .create_pool(CreatePool {
                name: "a".into(),
                initial_stock: 10.0,
                seed_product: Some(product),
                seed_ratio: Some(1.0),
            })
            .await
            .unwrap()
            .pool_id
            .unwrap();
        let b = backend
            .create_pool(CreatePool {
                name: "b".into(),
                initial_stock: 10.0,
                seed_product: None,
                seed_ratio: None,
            })
            .await
            .unwrap()
            .pool_id
            .unwrap();

        let err = backend.add_linked_product(b, product, 2.0).await.unwrap_err();
        match err {
            BackendError::AlreadyLinked { product: p, pool } => {
                assert_eq!(p, product);
                assert_eq!(pool, a);
            }
            other => panic!("expected AlreadyLinked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_guard_until_links_removed() {
        let (backend, product) = seeded();
        let pool = backend
            .create_pool(CreatePool {
                name: "bulk".into(),
                initial_stock: 50.0,
                seed_product: Some(product),
                seed_ratio: Some(12.0),
            })
            .await
            .unwrap()
            .pool_id
            .unwrap();

        let err = backend.delete_pool(pool).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::HasLinkedProducts { count: 1, .. }
        ));

        backend.remove_linked_product(pool, product).await.unwrap();
        backend.delete_pool(pool).await.unwrap();
        assert!(backend.list_pools().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn override_applies_delta_and_appends_ledger() {
        let (backend, product) = seeded();
        let req = StockOverride {
            product_id: product,
            field: crate::catalog::StockField::ActiveStock,
            before_value: 4.0,
            target_value: 6.5,
            delta: 2.5,
            explanation: "cycle count".into(),
            cause_type: crate::overrides::CauseType::Employee,
            category: "count".into(),
            error_range: crate::overrides::ErrorRange::new(
                chrono::Utc::now() - chrono::Duration::hours(1),
                chrono::Utc::now(),
            ),
        };
        backend.submit_stock_override(&req).await.unwrap();
        let inventory = backend.get_inventory().await.unwrap();
        assert_eq!(inventory[0].active_stock, 6.5);
        assert_eq!(backend.override_ledger().len(), 1);
    }

    #[tokio::test]
    async fn without_echo_returns_no_pool_id() {
        let backend = MemoryBackend::without_id_echo();
        let receipt = backend
            .create_pool(CreatePool {
                name: "quiet".into(),
                initial_stock: 1.0,
                seed_product: None,
                seed_ratio: None,
            })
            .await
            .unwrap();
        assert!(receipt.pool_id.is_none());
    }
}
